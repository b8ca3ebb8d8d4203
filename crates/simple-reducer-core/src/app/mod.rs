//! App - the reducer facade.
//!
//! - **ReducerBuilder**: wiring (config, lifecycle, host cell, clock, ids)
//! - **Reducer**: bind action tables, read projections, wait, dispose

pub mod builder;
pub mod reducer;

pub use self::builder::{InitialState, ReducerBuilder};
pub use self::reducer::{FullView, MinimalView, Reducer, ReducerView};
