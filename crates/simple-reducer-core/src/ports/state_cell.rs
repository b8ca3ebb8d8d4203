//! StateCell port - the host's reactive state primitive.

/// A published value observers can read.
///
/// The runner only ever calls `set` with a fresh snapshot and never reads
/// back through the cell to decide what to do next: the authoritative latest
/// state lives inside the runner, a cell may lag behind it.
///
/// `set` is called with no runner lock held, so an implementation may react
/// to a new value by reading from or dispatching to the reducer.
pub trait StateCell<T>: Send + Sync {
    /// Current published value.
    fn get(&self) -> T;

    /// Publish a new value.
    fn set(&self, value: T);
}
