//! Reducer configuration.

use serde::{Deserialize, Serialize};

/// What a dispatch does while the queue is suspended on an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchWhileSuspended {
    /// Start draining again right away. The stale ErrorRecord stays
    /// published until the new work settles successfully.
    #[default]
    Resume,

    /// Queue the new work behind the suspended error. It runs after one of
    /// the recovery operations restarts the drain.
    Hold,
}

/// Facade configuration.
///
/// Every field has a default, so a partial JSON document is enough:
/// ```json
/// { "include_queue_status": false }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReducerConfig {
    /// Publish the full `QueueStatus` (full projection) instead of only the
    /// processing flag (minimal projection).
    pub include_queue_status: bool,

    /// Suspend on rejection and publish an ErrorRecord. When off, a rejected
    /// action is logged and dropped and the drain carries on.
    pub include_error_recovery: bool,

    pub dispatch_while_suspended: DispatchWhileSuspended,
}

impl Default for ReducerConfig {
    fn default() -> Self {
        Self {
            include_queue_status: true,
            include_error_recovery: true,
            dispatch_while_suspended: DispatchWhileSuspended::Resume,
        }
    }
}

impl ReducerConfig {
    /// State, processing flag and dispatchers only; rejections are dropped.
    pub fn minimal() -> Self {
        Self {
            include_queue_status: false,
            include_error_recovery: false,
            ..Self::default()
        }
    }

    pub fn with_queue_status(mut self, on: bool) -> Self {
        self.include_queue_status = on;
        self
    }

    pub fn with_error_recovery(mut self, on: bool) -> Self {
        self.include_error_recovery = on;
        self
    }

    pub fn with_dispatch_while_suspended(mut self, policy: DispatchWhileSuspended) -> Self {
        self.dispatch_while_suspended = policy;
        self
    }
}
