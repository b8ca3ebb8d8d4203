//! Default adapters for the ports.
//!
//! - [`WatchCell`]: a `StateCell` backed by `tokio::sync::watch`
//! - [`LifecycleGuard`]: a `Liveness` backed by a `CancellationToken`

pub mod lifecycle;
pub mod watch_cell;

pub use self::lifecycle::LifecycleGuard;
pub use self::watch_cell::WatchCell;
