//! Typed - the Action Registry.
//!
//! - **Typed layer**: [`Action`] trait / [`FnAction`] closures, each with its
//!   own argument type.
//! - **Dyn layer**: [`DynAction`], object-safe, what the queue stores.
//! - **Dispatchers**: generated per bind, one per registered name.

pub mod action;
pub mod dispatch;
pub mod registry;

pub use self::action::{Action, DynAction, FnAction, TypedAction};
pub use self::dispatch::{Dispatcher, Dispatchers};
pub use self::registry::ActionRegistry;
