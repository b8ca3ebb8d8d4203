//! Error/Recovery facade: the ErrorRecord published when an action rejects.
//!
//! # Life of a record
//! 1. An action rejects. The runner takes everything still pending out of the
//!    live queue, stores it next to the failed descriptor and suspends.
//! 2. The record is published through `Reducer::error`. It holds only a weak
//!    handle to the runner, so a record kept around after the reducer is
//!    gone just refuses with `Disposed`.
//! 3. One of `run_failed_action`, `run_pending_actions` or `run_all_actions`
//!    builds a batch from the captured work and puts it at the *front* of the
//!    queue. Work dispatched since the failure that has not run yet (see
//!    `DispatchWhileSuspended`) runs after the batch.
//! 4. The record is cleared on the first successful settle, or replaced if
//!    the batch rejects again. A replaced record is stale: recovering through
//!    it returns `StaleFailure` and enqueues nothing.
//!
//! The captured actions are re-run with the state current when they are
//! popped, not the state they were dispatched against.

use std::fmt;
use std::sync::Weak;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ActionDescriptor;
use super::runner::{QueueRunner, Shared};
use crate::domain::{ActionId, ActionName, FailureId, Reason, ReducerError};

/// Which captured work a recovery operation puts back on the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryMode {
    /// Retry only the failed action; the captured pending actions are dropped.
    FailedAction,

    /// Skip the failed action and run the captured pending actions.
    PendingActions,

    /// Retry the failed action, then run the captured pending actions.
    AllActions,
}

impl RecoveryMode {
    /// Build the batch to re-queue, in execution order.
    pub fn batch<S>(
        self,
        failed: &ActionDescriptor<S>,
        pending: &[ActionDescriptor<S>],
    ) -> Vec<ActionDescriptor<S>> {
        match self {
            RecoveryMode::FailedAction => vec![failed.clone()],
            RecoveryMode::PendingActions => pending.to_vec(),
            RecoveryMode::AllActions => {
                let mut batch = Vec::with_capacity(pending.len() + 1);
                batch.push(failed.clone());
                batch.extend_from_slice(pending);
                batch
            }
        }
    }
}

/// Structured failure report plus the bound recovery operations.
///
/// Created once per rejection. Replaced by a newer record if a later action
/// rejects, cleared once work settles successfully again.
///
/// Each record can start at most one recovery; calling a second operation
/// (or the same one twice) returns [`ReducerError::RecoveryInProgress`] and
/// enqueues nothing.
pub struct ErrorRecord<S> {
    pub id: FailureId,

    /// The rejection value, as the action produced it.
    pub reason: Reason,

    pub failed_action: ActionDescriptor<S>,

    /// What was still queued when the action rejected (removed from the live
    /// queue at that moment).
    pub pending_actions: Vec<ActionDescriptor<S>>,

    pub failed_at: DateTime<Utc>,

    runner: Weak<Shared<S>>,
}

impl<S: Clone + Send + Sync + 'static> ErrorRecord<S> {
    pub(crate) fn new(
        id: FailureId,
        reason: Reason,
        failed_action: ActionDescriptor<S>,
        pending_actions: Vec<ActionDescriptor<S>>,
        failed_at: DateTime<Utc>,
        runner: Weak<Shared<S>>,
    ) -> Self {
        Self {
            id,
            reason,
            failed_action,
            pending_actions,
            failed_at,
            runner,
        }
    }

    /// Re-run only the failed action against the current state.
    pub fn run_failed_action(&self) -> Result<(), ReducerError> {
        self.recover(RecoveryMode::FailedAction)
    }

    /// Run the captured pending actions, skipping the failed one.
    pub fn run_pending_actions(&self) -> Result<(), ReducerError> {
        self.recover(RecoveryMode::PendingActions)
    }

    /// Re-run the failed action followed by the captured pending actions.
    pub fn run_all_actions(&self) -> Result<(), ReducerError> {
        self.recover(RecoveryMode::AllActions)
    }

    pub fn recover(&self, mode: RecoveryMode) -> Result<(), ReducerError> {
        let runner = self
            .runner
            .upgrade()
            .map(QueueRunner::from_shared)
            .ok_or(ReducerError::Disposed)?;
        let batch = mode.batch(&self.failed_action, &self.pending_actions);
        runner.recover(self.id, mode, batch)
    }

    /// Serializable view (no recovery handles).
    pub fn summary(&self) -> FailureSummary {
        FailureSummary {
            id: self.id,
            reason: self.reason.to_string(),
            failed_action: self.failed_action.name.clone(),
            failed_action_id: self.failed_action.id,
            pending_actions: self
                .pending_actions
                .iter()
                .map(|d| d.name.clone())
                .collect(),
            failed_at: self.failed_at,
        }
    }
}

impl<S> Clone for ErrorRecord<S> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            reason: self.reason.clone(),
            failed_action: self.failed_action.clone(),
            pending_actions: self.pending_actions.clone(),
            failed_at: self.failed_at,
            runner: Weak::clone(&self.runner),
        }
    }
}

impl<S> fmt::Debug for ErrorRecord<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorRecord")
            .field("id", &self.id)
            .field("reason", &self.reason.to_string())
            .field("failed_action", &self.failed_action)
            .field("pending_actions", &self.pending_actions)
            .field("failed_at", &self.failed_at)
            .finish_non_exhaustive()
    }
}

/// ErrorRecord without the recovery handles, for logs and reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureSummary {
    pub id: FailureId,
    pub reason: String,
    pub failed_action: ActionName,
    pub failed_action_id: ActionId,
    pub pending_actions: Vec<ActionName>,
    pub failed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::descriptor::test_support::add;
    use rstest::rstest;

    #[rstest]
    #[case::failed_only(RecoveryMode::FailedAction, vec![1])]
    #[case::pending_only(RecoveryMode::PendingActions, vec![2, 3])]
    #[case::all(RecoveryMode::AllActions, vec![1, 2, 3])]
    fn batch_follows_mode(#[case] mode: RecoveryMode, #[case] expected: Vec<i64>) {
        let failed = add(1);
        let pending = vec![add(2), add(3)];

        let batch = mode.batch(&failed, &pending);
        let args: Vec<serde_json::Value> = batch.iter().map(|d| d.args[0].clone()).collect();
        assert_eq!(args, expected);
    }

    #[test]
    fn batch_reuses_captured_descriptors() {
        let failed = add(1);
        let batch = RecoveryMode::FailedAction.batch(&failed, &[]);
        assert_eq!(batch[0].id, failed.id);
    }

    #[test]
    fn recovery_after_runner_is_gone_reports_disposed() {
        let record = ErrorRecord::new(
            FailureId::from_ulid(ulid::Ulid::new()),
            ReducerError::Disposed.into_reason(),
            add(1),
            vec![],
            Utc::now(),
            Weak::new(),
        );
        assert!(matches!(record.run_all_actions(), Err(ReducerError::Disposed)));
    }

    #[test]
    fn summary_lists_names() {
        let record = ErrorRecord::new(
            FailureId::from_ulid(ulid::Ulid::new()),
            std::sync::Arc::new(std::io::Error::other("disk full")),
            add(1),
            vec![add(2)],
            Utc::now(),
            Weak::new(),
        );
        let summary = record.summary();
        assert_eq!(summary.reason, "disk full");
        assert_eq!(summary.failed_action, "add");
        assert_eq!(summary.pending_actions.len(), 1);
    }
}
