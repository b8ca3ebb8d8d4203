//! Publisher: the cells observers read.
//!
//! # Ordering
//! Snapshots are built while the runner holds its core lock and published
//! after the lock is released, so a host cell may call straight back into
//! the reducer from `set`. Every snapshot carries a sequence number taken
//! under the core lock; a cell ignores a value older than the one it already
//! holds, so two threads publishing out of order cannot leave a stale value
//! behind (e.g. `processing = false` from a finished drain arriving after
//! `processing = true` from the next one).

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

use super::{ErrorRecord, QueueStatus};
use crate::impls::WatchCell;
use crate::ports::StateCell;

/// Values taken under the core lock, published once it is released.
pub(crate) struct Snapshot<S> {
    seq: u64,
    state: Option<S>,
    processing: Option<bool>,
    queue: Option<QueueStatus<S>>,
    error: Option<Option<ErrorRecord<S>>>,
}

impl<S> Snapshot<S> {
    pub(crate) fn new(seq: u64) -> Self {
        Self {
            seq,
            state: None,
            processing: None,
            queue: None,
            error: None,
        }
    }

    pub(crate) fn state(mut self, state: S) -> Self {
        self.state = Some(state);
        self
    }

    pub(crate) fn processing(mut self, processing: bool) -> Self {
        self.processing = Some(processing);
        self
    }

    pub(crate) fn queue(mut self, status: QueueStatus<S>) -> Self {
        self.queue = Some(status);
        self
    }

    pub(crate) fn error(mut self, error: Option<ErrorRecord<S>>) -> Self {
        self.error = Some(error);
        self
    }
}

/// Sequence of the last value written to each cell.
#[derive(Default)]
struct Written {
    state: u64,
    processing: u64,
    queue: u64,
    error: u64,
}

fn newer(last: &mut u64, seq: u64) -> bool {
    if seq > *last {
        *last = seq;
        true
    } else {
        false
    }
}

/// Owns every published value.
///
/// Each publish is a fresh snapshot, observers never share memory with the
/// runner's live queue.
pub(crate) struct Publisher<S> {
    state: WatchCell<S>,

    /// Host-provided cell mirroring every state publish.
    host_state: Option<Arc<dyn StateCell<S>>>,

    processing: WatchCell<bool>,
    queue: WatchCell<QueueStatus<S>>,
    error: WatchCell<Option<ErrorRecord<S>>>,

    /// Held only while writing the watch cells, never around host code.
    written: Mutex<Written>,

    include_queue_status: bool,
}

impl<S: Clone + Send + Sync + 'static> Publisher<S> {
    pub(crate) fn new(
        initial: S,
        host_state: Option<Arc<dyn StateCell<S>>>,
        include_queue_status: bool,
    ) -> Self {
        if let Some(host) = &host_state {
            host.set(initial.clone());
        }
        Self {
            state: WatchCell::new(initial),
            host_state,
            processing: WatchCell::new(false),
            queue: WatchCell::new(QueueStatus::idle()),
            error: WatchCell::new(None),
            written: Mutex::new(Written::default()),
            include_queue_status,
        }
    }

    /// Write `snapshot` to the cells, skipping fields a newer snapshot has
    /// already written. The host cell is called last, with no lock held.
    pub(crate) fn publish(&self, snapshot: Snapshot<S>) {
        let Snapshot {
            seq,
            state,
            processing,
            queue,
            error,
        } = snapshot;

        let state_written = {
            let mut written = self.written.lock().unwrap_or_else(PoisonError::into_inner);

            let state_written = match state {
                Some(state) if newer(&mut written.state, seq) => {
                    self.state.set(state);
                    true
                }
                _ => false,
            };
            match processing {
                Some(processing) if newer(&mut written.processing, seq) => {
                    self.processing.set(processing)
                }
                _ => {}
            }
            match queue {
                Some(status) if self.include_queue_status && newer(&mut written.queue, seq) => {
                    self.queue.set(status)
                }
                _ => {}
            }
            match error {
                Some(error) if newer(&mut written.error, seq) => self.error.set(error),
                _ => {}
            }
            state_written
        };

        // Read back rather than forwarding our own value: if another publish
        // raced us, the host still ends on the newest state.
        if let (true, Some(host)) = (state_written, &self.host_state) {
            host.set(self.state.get());
        }
    }

    pub(crate) fn state(&self) -> S {
        self.state.get()
    }

    pub(crate) fn processing(&self) -> bool {
        self.processing.get()
    }

    /// `None` when only the processing flag is published.
    pub(crate) fn queue(&self) -> Option<QueueStatus<S>> {
        self.include_queue_status.then(|| self.queue.get())
    }

    pub(crate) fn error(&self) -> Option<ErrorRecord<S>> {
        self.error.get()
    }

    pub(crate) fn subscribe_state(&self) -> watch::Receiver<S> {
        self.state.subscribe()
    }

    pub(crate) fn subscribe_processing(&self) -> watch::Receiver<bool> {
        self.processing.subscribe()
    }

    pub(crate) fn subscribe_queue(&self) -> watch::Receiver<QueueStatus<S>> {
        self.queue.subscribe()
    }

    pub(crate) fn subscribe_error(&self) -> watch::Receiver<Option<ErrorRecord<S>>> {
        self.error.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::descriptor::test_support::add;

    #[test]
    fn older_snapshot_does_not_overwrite_newer() {
        let publisher = Publisher::new(0_i64, None, true);

        publisher.publish(Snapshot::new(2).processing(true).state(2));
        publisher.publish(Snapshot::new(1).processing(false).state(1));

        assert!(publisher.processing());
        assert_eq!(publisher.state(), 2);
    }

    #[test]
    fn fields_are_ordered_independently() {
        let publisher = Publisher::new(0_i64, None, true);

        publisher.publish(Snapshot::new(2).processing(true));
        // older, but the only one carrying a state
        publisher.publish(Snapshot::new(1).state(5));

        assert_eq!(publisher.state(), 5);
        assert!(publisher.processing());
    }

    #[test]
    fn queue_is_skipped_without_queue_status() {
        let publisher = Publisher::new(0_i64, None, false);

        let status = QueueStatus {
            active: true,
            running_action: Some(add(1)),
            pending_actions: vec![],
        };
        publisher.publish(Snapshot::new(1).queue(status));

        assert!(publisher.queue().is_none());
    }

    #[test]
    fn host_cell_mirrors_state() {
        let host = Arc::new(WatchCell::new(-1_i64));
        let publisher = Publisher::new(0_i64, Some(host.clone() as Arc<dyn StateCell<i64>>), true);
        assert_eq!(host.get(), 0);

        publisher.publish(Snapshot::new(1).state(3));
        assert_eq!(host.get(), 3);

        // processing-only snapshots leave the host alone
        publisher.publish(Snapshot::new(2).processing(true));
        assert_eq!(host.get(), 3);
    }
}
