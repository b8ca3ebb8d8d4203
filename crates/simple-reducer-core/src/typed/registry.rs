//! ActionRegistry - the action table a reducer is bound to.
//!
//! Built once (or rebuilt on every "render", it does not matter): binding a
//! registry to a reducer only derives dispatchers, the queue and the state
//! live in the reducer and survive any number of re-bindings.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use super::action::{Action, DynAction, FnAction, TypedAction};
use super::dispatch::{Dispatcher, Dispatchers};
use crate::domain::{ActionName, BoxError, ReducerError};
use crate::queue::QueueRunner;

/// Name -> action.
///
/// # Example
/// ```ignore
/// let mut actions = ActionRegistry::new();
/// actions.register_fn("add", |s: Counter, (n,): (i64,)| async move {
///     Ok(Counter { count: s.count + n })
/// })?;
/// ```
pub struct ActionRegistry<S> {
    actions: HashMap<ActionName, Arc<dyn DynAction<S>>>,
}

impl<S: Clone + Send + Sync + 'static> ActionRegistry<S> {
    pub fn new() -> Self {
        Self {
            actions: HashMap::new(),
        }
    }

    /// Register a typed action. Names are unique.
    pub fn register<A: Action<S> + 'static>(
        &mut self,
        name: impl Into<ActionName>,
        action: A,
    ) -> Result<(), ReducerError> {
        let name = name.into();
        if self.actions.contains_key(&name) {
            return Err(ReducerError::DuplicateAction(name));
        }
        let typed = TypedAction::new(name.clone(), action);
        self.actions.insert(name, Arc::new(typed));
        Ok(())
    }

    /// Register an async closure `(state, args) -> Result<state, _>`.
    pub fn register_fn<F, Fut, Args>(
        &mut self,
        name: impl Into<ActionName>,
        f: F,
    ) -> Result<(), ReducerError>
    where
        F: Fn(S, Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<S, BoxError>> + Send + 'static,
        Args: DeserializeOwned + Send + 'static,
    {
        self.register(name, FnAction::new(f))
    }

    /// Chaining form of [`register_fn`](Self::register_fn).
    pub fn with_fn<F, Fut, Args>(
        mut self,
        name: impl Into<ActionName>,
        f: F,
    ) -> Result<Self, ReducerError>
    where
        F: Fn(S, Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<S, BoxError>> + Send + 'static,
        Args: DeserializeOwned + Send + 'static,
    {
        self.register_fn(name, f)?;
        Ok(self)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(&ActionName::new(name))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<ActionName> {
        let mut names: Vec<ActionName> = self.actions.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// One dispatcher per registered action, all feeding `runner`.
    pub(crate) fn bind(&self, runner: &QueueRunner<S>) -> Dispatchers<S> {
        let dispatchers = self
            .actions
            .iter()
            .map(|(name, action)| {
                let dispatcher = Dispatcher::new(name.clone(), Arc::clone(action), runner.clone());
                (name.clone(), dispatcher)
            })
            .collect();
        Dispatchers::new(dispatchers)
    }
}

impl<S: Clone + Send + Sync + 'static> Default for ActionRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}
