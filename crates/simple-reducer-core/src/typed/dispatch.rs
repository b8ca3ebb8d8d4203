//! Dispatchers - fire-and-forget callables, one per action.

use std::collections::HashMap;
use std::fmt;
use std::ops::Index;
use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use super::action::{DynAction, Rejected};
use crate::domain::action::encode_args;
use crate::domain::{ActionArgs, ActionName};
use crate::queue::QueueRunner;

/// Enqueues calls to one action.
///
/// Calling it never runs the action directly and never fails. Problems
/// (including arguments that cannot be encoded) show up later, as the reason
/// of an ErrorRecord.
pub struct Dispatcher<S> {
    name: ActionName,
    action: Arc<dyn DynAction<S>>,
    runner: QueueRunner<S>,
}

impl<S: Clone + Send + Sync + 'static> Dispatcher<S> {
    pub(crate) fn new(name: ActionName, action: Arc<dyn DynAction<S>>, runner: QueueRunner<S>) -> Self {
        Self {
            name,
            action,
            runner,
        }
    }

    pub fn name(&self) -> &ActionName {
        &self.name
    }

    /// Queue a call. `args` is everything after the state, usually a tuple:
    /// `add.dispatch((2,))`.
    pub fn dispatch<A: Serialize>(&self, args: A) {
        match encode_args(args) {
            Ok(args) => self.dispatch_raw(args),
            Err(err) => {
                warn!(action = %self.name, error = %err, "dispatch arguments could not be encoded");
                self.runner
                    .enqueue(self.name.clone(), Vec::new(), Arc::new(Rejected::new(err)));
            }
        }
    }

    /// Queue a call with already-encoded arguments.
    pub fn dispatch_raw(&self, args: ActionArgs) {
        self.runner
            .enqueue(self.name.clone(), args, Arc::clone(&self.action));
    }
}

impl<S> Clone for Dispatcher<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            action: Arc::clone(&self.action),
            runner: self.runner.clone(),
        }
    }
}

impl<S> fmt::Debug for Dispatcher<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Name -> dispatcher, mirroring the registry it was derived from.
pub struct Dispatchers<S> {
    dispatchers: HashMap<ActionName, Dispatcher<S>>,
}

impl<S> Dispatchers<S> {
    pub(crate) fn new(dispatchers: HashMap<ActionName, Dispatcher<S>>) -> Self {
        Self { dispatchers }
    }

    pub fn get(&self, name: &str) -> Option<&Dispatcher<S>> {
        self.dispatchers.get(&ActionName::new(name))
    }

    /// Names, sorted.
    pub fn names(&self) -> Vec<ActionName> {
        let mut names: Vec<ActionName> = self.dispatchers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.dispatchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dispatchers.is_empty()
    }
}

impl<S> Index<&str> for Dispatchers<S> {
    type Output = Dispatcher<S>;

    /// Panics if no action with that name was registered.
    fn index(&self, name: &str) -> &Dispatcher<S> {
        match self.get(name) {
            Some(dispatcher) => dispatcher,
            None => panic!("no action named '{name}' is registered"),
        }
    }
}

impl<S> Clone for Dispatchers<S> {
    fn clone(&self) -> Self {
        Self {
            dispatchers: self.dispatchers.clone(),
        }
    }
}

impl<S> fmt::Debug for Dispatchers<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.dispatchers.keys()).finish()
    }
}
