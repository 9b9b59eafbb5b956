//! Optimistic lock guard for one version column.
//!
//! A single [`OptimisticLockGuard`] is both halves of the mechanism:
//!
//! - as an [`InputTypeHook`](crate::hooks::InputTypeHook) it adds a required
//!   version field to every update/delete input of a guarded table;
//! - as a [`MutationHook`](crate::hooks::MutationHook) it locks the target
//!   rows, compares their stored version with the client-supplied one, and
//!   only then lets the wrapped executor run.
//!
//! Tables that lack the version column, or carry the opt-out tag, are passed
//! through untouched by both halves.

mod augment;
mod verify;

use crate::catalog::{Attribute, TableDescriptor};
use crate::config::GuardConfig;
use crate::core::Result;
use crate::hooks::HostServices;

pub struct OptimisticLockGuard {
    config: GuardConfig,
    services: HostServices,
}

impl OptimisticLockGuard {
    pub fn new(config: GuardConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            services: HostServices::default(),
        })
    }

    /// Shorthand for a guard with default settings on `version_column`.
    pub fn for_column(version_column: &str) -> Result<Self> {
        Self::new(GuardConfig::new(version_column))
    }

    pub fn with_services(mut self, services: HostServices) -> Self {
        self.services = services;
        self
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn services(&self) -> &HostServices {
        &self.services
    }

    pub fn version_attribute<'t>(&self, table: &'t TableDescriptor) -> Option<&'t Attribute> {
        table.find_attribute(&self.config.version_column)
    }

    /// Whether either hook does anything for `table`.
    pub fn applies_to(&self, table: &TableDescriptor) -> bool {
        !table.is_opted_out() && self.version_attribute(table).is_some()
    }

    /// Name of the generated version field on `table`'s inputs.
    pub fn version_field_name(&self, table: &TableDescriptor) -> Option<String> {
        self.version_attribute(table)
            .map(|attribute| self.services.inflector.column_field(attribute))
    }
}
