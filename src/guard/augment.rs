use super::OptimisticLockGuard;
use crate::core::Result;
use crate::hooks::{
    InputField, InputKind, InputObjectFragment, InputTypeHook, InputTypeScope, ScalarType,
};

impl InputTypeHook for OptimisticLockGuard {
    fn augment_input_type(
        &self,
        scope: &InputTypeScope,
        fragment: InputObjectFragment,
    ) -> Result<InputObjectFragment> {
        if !matches!(scope.kind, InputKind::Update | InputKind::Delete) {
            return Ok(fragment);
        }
        if scope.table.is_opted_out() {
            return Ok(fragment);
        }
        let Some(attribute) = self.version_attribute(&scope.table) else {
            return Ok(fragment);
        };

        let field = InputField::new(
            self.services.inflector.column_field(attribute),
            ScalarType::for_data_type(&attribute.data_type),
        )
        .required()
        .description(self.config.field_description.as_str());

        fragment.add_field(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Attribute, TableDescriptor, TableTags};
    use crate::core::{DataType, DbError};
    use std::sync::Arc;

    fn posts() -> Arc<TableDescriptor> {
        Arc::new(
            TableDescriptor::new("app", "posts")
                .attribute(Attribute::new("id", DataType::Integer).not_null())
                .attribute(Attribute::new("updated_at", DataType::Timestamp).not_null())
                .primary_key(&["id"]),
        )
    }

    fn update_input() -> InputObjectFragment {
        InputObjectFragment::new("UpdatePostInput")
            .field(InputField::new("id", ScalarType::Int).required())
            .field(InputField::new("patch", ScalarType::Object("PostPatch".into())).required())
    }

    #[test]
    fn test_adds_required_version_field() {
        let guard = OptimisticLockGuard::for_column("updated_at").unwrap();
        for kind in [InputKind::Update, InputKind::Delete] {
            let scope = InputTypeScope::new(posts(), kind);
            let fragment = guard.augment_input_type(&scope, update_input()).unwrap();

            let field = fragment.get_field("updatedAt").unwrap();
            assert_eq!(field.field_type, ScalarType::Datetime);
            assert!(!field.nullable);
            assert_eq!(
                field.description.as_deref(),
                Some("The value of the existing row to be updated/deleted.")
            );
            assert_eq!(fragment.fields().len(), 3);
        }
    }

    #[test]
    fn test_other_input_kinds_untouched() {
        let guard = OptimisticLockGuard::for_column("updated_at").unwrap();
        for kind in [InputKind::Create, InputKind::Patch, InputKind::Other] {
            let scope = InputTypeScope::new(posts(), kind);
            assert_eq!(
                guard.augment_input_type(&scope, update_input()).unwrap(),
                update_input()
            );
        }
    }

    #[test]
    fn test_missing_column_is_noop() {
        let guard = OptimisticLockGuard::for_column("row_version").unwrap();
        let scope = InputTypeScope::new(posts(), InputKind::Update);
        assert_eq!(
            guard.augment_input_type(&scope, update_input()).unwrap(),
            update_input()
        );
    }

    #[test]
    fn test_opted_out_table_is_noop() {
        let guard = OptimisticLockGuard::for_column("updated_at").unwrap();
        let table = Arc::new((*posts()).clone().tags(TableTags {
            omit_optimistic_lock: true,
        }));
        let scope = InputTypeScope::new(table, InputKind::Delete);
        assert_eq!(
            guard.augment_input_type(&scope, update_input()).unwrap(),
            update_input()
        );
    }

    #[test]
    fn test_existing_field_collides() {
        let guard = OptimisticLockGuard::for_column("updated_at").unwrap();
        let scope = InputTypeScope::new(posts(), InputKind::Update);
        let fragment = update_input().field(InputField::new("updatedAt", ScalarType::Datetime));
        assert!(matches!(
            guard.augment_input_type(&scope, fragment),
            Err(DbError::SchemaConflict(_))
        ));
    }
}
