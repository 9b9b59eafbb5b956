use super::{
    InputObjectFragment, InputTypeHook, InputTypeScope, MutationExecutor, MutationHook,
    MutationRequest, MutationScope,
};
use crate::core::Result;
use crate::result::QueryResult;
use async_trait::async_trait;
use std::sync::Arc;

/// Ordered set of hooks applied by the host.
///
/// Input-type hooks are folded in registration order. Mutation hooks nest:
/// the first registered is the outermost wrapper around the executor.
pub struct HookRegistry<T: ?Sized + Send + 'static> {
    input_hooks: Vec<Arc<dyn InputTypeHook>>,
    mutation_hooks: Vec<Arc<dyn MutationHook<T>>>,
}

impl<T: ?Sized + Send + 'static> Default for HookRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized + Send + 'static> HookRegistry<T> {
    pub fn new() -> Self {
        Self {
            input_hooks: Vec::new(),
            mutation_hooks: Vec::new(),
        }
    }

    /// Registers a hook that acts on both input types and mutations.
    pub fn register<H>(&mut self, hook: H)
    where
        H: InputTypeHook + MutationHook<T> + 'static,
    {
        let hook = Arc::new(hook);
        self.input_hooks.push(hook.clone());
        self.mutation_hooks.push(hook);
    }

    pub fn register_input_hook(&mut self, hook: Arc<dyn InputTypeHook>) {
        self.input_hooks.push(hook);
    }

    pub fn register_mutation_hook(&mut self, hook: Arc<dyn MutationHook<T>>) {
        self.mutation_hooks.push(hook);
    }

    pub fn input_hook_count(&self) -> usize {
        self.input_hooks.len()
    }

    pub fn mutation_hook_count(&self) -> usize {
        self.mutation_hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_hooks.is_empty() && self.mutation_hooks.is_empty()
    }

    pub fn build_input_type(
        &self,
        scope: &InputTypeScope,
        fragment: InputObjectFragment,
    ) -> Result<InputObjectFragment> {
        self.input_hooks
            .iter()
            .try_fold(fragment, |fragment, hook| hook.augment_input_type(scope, fragment))
    }

    /// Runs `executor` behind every registered mutation hook.
    ///
    /// # Examples
    ///
    /// ```
    /// use rowguard::{
    ///     Attribute, DataType, HookRegistry, MemoryDatabase, MutationRequest, MutationScope,
    ///     OptimisticLockGuard, TableDescriptor, TableMutationExecutor, Value,
    /// };
    /// use serde_json::json;
    ///
    /// # tokio_test::block_on(async {
    /// let db = MemoryDatabase::new();
    /// let posts = db
    ///     .create_table(
    ///         TableDescriptor::new("app", "posts")
    ///             .attribute(Attribute::new("id", DataType::Integer).not_null())
    ///             .attribute(Attribute::new("updated_at", DataType::Timestamp))
    ///             .primary_key(&["id"]),
    ///     )
    ///     .unwrap();
    /// let version = chrono::Utc::now();
    /// db.insert(posts.name(), vec![Value::Integer(1), Value::Timestamp(version)]).unwrap();
    ///
    /// let mut registry = HookRegistry::new();
    /// registry.register(OptimisticLockGuard::for_column("updated_at").unwrap());
    ///
    /// let request = MutationRequest::new()
    ///     .with("id", json!(1))
    ///     .with("updatedAt", json!(version.to_rfc3339()));
    /// let mut tx = db.begin();
    /// let result = registry
    ///     .resolve(&mut tx, &MutationScope::delete(posts), &request, &TableMutationExecutor::new())
    ///     .await
    ///     .unwrap();
    /// tx.commit().unwrap();
    /// assert_eq!(result.affected_rows, 1);
    /// # });
    /// ```
    pub async fn resolve(
        &self,
        tx: &mut T,
        scope: &MutationScope,
        request: &MutationRequest,
        executor: &dyn MutationExecutor<T>,
    ) -> Result<QueryResult> {
        let chain = HookChain {
            hooks: &self.mutation_hooks,
            terminal: executor,
        };
        chain.execute(tx, scope, request).await
    }
}

struct HookChain<'a, T: ?Sized + Send + 'static> {
    hooks: &'a [Arc<dyn MutationHook<T>>],
    terminal: &'a dyn MutationExecutor<T>,
}

#[async_trait]
impl<'a, T: ?Sized + Send + 'static> MutationExecutor<T> for HookChain<'a, T> {
    async fn execute(
        &self,
        tx: &mut T,
        scope: &MutationScope,
        request: &MutationRequest,
    ) -> Result<QueryResult> {
        match self.hooks.split_first() {
            Some((hook, rest)) => {
                let next = HookChain {
                    hooks: rest,
                    terminal: self.terminal,
                };
                hook.resolve(tx, scope, request, &next).await
            }
            None => self.terminal.execute(tx, scope, request).await,
        }
    }
}
