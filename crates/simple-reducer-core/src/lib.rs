//! simple-reducer-core
//!
//! Serializes asynchronous, state-transforming actions against one piece of
//! state. At most one action runs at a time, actions run in dispatch order,
//! and a rejected action suspends the queue behind an [`ErrorRecord`] that
//! offers three ways to resume.
//!
//! # Modules
//! - **domain**: names, arguments, ids, errors
//! - **ports**: seams to the host (state cell, liveness, clock, ids)
//! - **impls**: watch-channel cell, cancellation-token lifecycle
//! - **typed**: `Action` trait, `ActionRegistry`, dispatchers
//! - **queue**: the runner, its state machine, queue status and recovery
//! - **app**: `ReducerBuilder` and the `Reducer` facade
//! - **config**: `ReducerConfig`
//!
//! # Example
//! ```ignore
//! let reducer = Reducer::new(Counter { count: 0 })?;
//! let actions = ActionRegistry::new()
//!     .with_fn("add", |s: Counter, n: i64| async move { Ok(Counter { count: s.count + n }) })?;
//!
//! let dispatchers = reducer.bind(&actions);
//! dispatchers["add"].dispatch(2);
//! reducer.settled().await;
//! ```

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod queue;
pub mod typed;

pub use crate::app::{InitialState, Reducer, ReducerBuilder, ReducerView};
pub use crate::config::{DispatchWhileSuspended, ReducerConfig};
pub use crate::domain::{ActionArgs, ActionName, BoxError, Reason, ReducerError};
pub use crate::queue::{ActionDescriptor, ErrorRecord, QueueStatus, RecoveryMode, RunnerStatus};
pub use crate::typed::{Action, ActionRegistry, Dispatcher, Dispatchers};
