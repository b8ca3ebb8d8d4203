//! Domain model (IDs, action names/arguments, errors).
//!
//! Nothing in here knows about queues or runtimes; it only defines the shapes
//! the registry and the runner pass around.

pub mod action;
pub mod errors;
pub mod ids;

pub use action::{ActionArgs, ActionName};
pub use errors::{BoxError, Reason, ReducerError};
pub use ids::{ActionId, FailureId};
