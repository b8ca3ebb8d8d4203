//! Ports - capabilities the reducer consumes from its host.
//!
//! The runner never talks to a UI or a framework directly. It publishes
//! through a [`StateCell`], checks a [`Liveness`] guard before every publish,
//! and asks a [`Clock`] / [`IdGenerator`] for timestamps and ids.
//! Default adapters live in `impls`.

pub mod clock;
pub mod id_generator;
pub mod liveness;
pub mod state_cell;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::liveness::Liveness;
pub use self::state_cell::StateCell;
