//! Liveness port - "is the owning context still alive?"

/// Guard the runner checks before every publish that follows a suspension.
///
/// Once `is_alive` returns false it must keep returning false.
pub trait Liveness: Send + Sync {
    fn is_alive(&self) -> bool;
}

impl dyn Liveness + '_ {
    /// Run `f` only if the owning context has not been torn down.
    ///
    /// Returns `None` when `f` was skipped.
    pub fn run_if_alive<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        if self.is_alive() { Some(f()) } else { None }
    }
}
