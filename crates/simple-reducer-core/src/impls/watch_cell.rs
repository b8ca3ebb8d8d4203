//! WatchCell - `StateCell` on top of a tokio watch channel.

use tokio::sync::watch;

use crate::ports::StateCell;

/// Reactive cell observers can subscribe to.
///
/// Publishing never fails, even with no receivers alive.
#[derive(Debug)]
pub struct WatchCell<T> {
    tx: watch::Sender<T>,
}

impl<T> WatchCell<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Receiver that is notified on every publish.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }
}

impl<T: Clone + Send + Sync> StateCell<T> for WatchCell<T> {
    fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    fn set(&self, value: T) {
        self.tx.send_replace(value);
    }
}
