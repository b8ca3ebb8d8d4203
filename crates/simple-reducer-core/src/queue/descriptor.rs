//! ActionDescriptor: one queued unit of work.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;

use crate::domain::{ActionArgs, ActionId, ActionName, Reason, ReducerError};
use crate::typed::DynAction;

/// Which action, with which arguments, bound at enqueue time.
///
/// Cloning is cheap (the action itself is shared). A descriptor keeps the
/// action it was created with, so re-binding the reducer to a new action
/// table does not change work that is already queued or captured in an
/// ErrorRecord.
#[derive(Serialize)]
pub struct ActionDescriptor<S> {
    pub id: ActionId,
    pub name: ActionName,
    pub args: ActionArgs,
    pub enqueued_at: DateTime<Utc>,

    #[serde(skip)]
    action: Arc<dyn DynAction<S>>,
}

impl<S: Send + 'static> ActionDescriptor<S> {
    pub(crate) fn new(
        id: ActionId,
        name: ActionName,
        args: ActionArgs,
        enqueued_at: DateTime<Utc>,
        action: Arc<dyn DynAction<S>>,
    ) -> Self {
        Self {
            id,
            name,
            args,
            enqueued_at,
            action,
        }
    }

    /// Run the action against `state`.
    ///
    /// A panic, whether raised while building the future or while polling
    /// it, comes back as a rejection like any other.
    pub(crate) async fn invoke(&self, state: S) -> Result<S, Reason> {
        let action = Arc::clone(&self.action);
        let args = self.args.clone();

        match AssertUnwindSafe(async move { action.invoke_dyn(state, args).await })
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(panic) => Err(ReducerError::ActionPanicked {
                action: self.name.clone(),
                message: panic_message(panic.as_ref()),
            }
            .into_reason()),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl<S> Clone for ActionDescriptor<S> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            name: self.name.clone(),
            args: self.args.clone(),
            enqueued_at: self.enqueued_at,
            action: Arc::clone(&self.action),
        }
    }
}

impl<S> fmt::Debug for ActionDescriptor<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("args", &self.args)
            .field("enqueued_at", &self.enqueued_at)
            .finish_non_exhaustive()
    }
}
