//! Queue module: the runner, its owned core, the published projections and
//! the error/recovery facade.

mod descriptor;
mod publish;
mod recovery;
mod runner;
mod state;
mod status;
mod store;

pub use descriptor::ActionDescriptor;
pub use recovery::{ErrorRecord, FailureSummary, RecoveryMode};
pub use runner::QueueRunner;
pub use state::RunnerStatus;
pub use status::QueueStatus;

pub(crate) use runner::RunnerParts;
