//! QueueStatus: read-only projection published for observers.

use serde::Serialize;

use super::ActionDescriptor;

/// Snapshot of the queue at publish time.
///
/// Derived, never authoritative: the live pending list stays inside the
/// runner, this only holds copies of its descriptors.
#[derive(Debug, Serialize)]
#[serde(bound = "")]
pub struct QueueStatus<S> {
    pub active: bool,
    pub running_action: Option<ActionDescriptor<S>>,
    pub pending_actions: Vec<ActionDescriptor<S>>,
}

impl<S> QueueStatus<S> {
    /// `{active: false, running_action: None, pending_actions: []}`.
    pub fn idle() -> Self {
        Self {
            active: false,
            running_action: None,
            pending_actions: Vec::new(),
        }
    }

    pub fn is_idle(&self) -> bool {
        !self.active && self.running_action.is_none() && self.pending_actions.is_empty()
    }

    /// Names of the pending actions, in execution order.
    pub fn pending_names(&self) -> Vec<&str> {
        self.pending_actions.iter().map(|d| d.name.as_str()).collect()
    }
}

impl<S> Clone for QueueStatus<S> {
    fn clone(&self) -> Self {
        Self {
            active: self.active,
            running_action: self.running_action.clone(),
            pending_actions: self.pending_actions.clone(),
        }
    }
}

impl<S> Default for QueueStatus<S> {
    fn default() -> Self {
        Self::idle()
    }
}
