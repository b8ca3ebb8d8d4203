//! Runner lifecycle.

use serde::{Deserialize, Serialize};

/// Runner state.
///
/// State transitions:
/// - Idle -> Draining (first dispatch)
/// - Draining -> Idle (pending list exhausted)
/// - Draining -> Suspended (an action rejected)
/// - Suspended -> Draining (recovery operation, or a new dispatch under `Resume`)
///
/// There is no terminal state; disposal just stops publishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerStatus {
    #[default]
    Idle,

    /// Exactly one drain loop is popping and running actions.
    Draining,

    /// An action rejected; waiting for recovery.
    Suspended,
}

impl RunnerStatus {
    pub fn is_draining(self) -> bool {
        matches!(self, RunnerStatus::Draining)
    }

    pub fn can_start_drain(self) -> bool {
        !self.is_draining()
    }
}
