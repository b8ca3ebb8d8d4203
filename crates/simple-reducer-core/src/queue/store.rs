//! RunnerCore: the explicitly owned mutable state of one runner.
//!
//! Design:
//! - This is the single source of truth for the pending list, the latest
//!   state and the lifecycle. Everything the runner publishes is derived
//!   from it.
//! - Plain data behind one lock. No method here awaits or publishes, so the
//!   runner can hold the lock only for short, synchronous sections.

use std::collections::VecDeque;

use super::{ActionDescriptor, QueueStatus, RunnerStatus};
use crate::domain::FailureId;

/// The failure the current ErrorRecord refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FailureSlot {
    pub(crate) id: FailureId,

    /// A recovery operation of this record has already been issued.
    pub(crate) recovering: bool,
}

pub(crate) struct RunnerCore<S> {
    /// FIFO, insertion order = execution order.
    pending: VecDeque<ActionDescriptor<S>>,

    /// State the next action is applied to. Always the true latest value,
    /// which may be ahead of what observers have seen.
    latest: S,

    /// False while a deferred initial state is still resolving.
    initialized: bool,

    status: RunnerStatus,

    /// Descriptor whose invocation is currently in flight.
    running: Option<ActionDescriptor<S>>,

    failure: Option<FailureSlot>,

    /// Stamp of the last snapshot taken. Orders publishes made after the
    /// lock is released.
    seq: u64,
}

impl<S: Clone> RunnerCore<S> {
    pub(crate) fn new(latest: S, initialized: bool) -> Self {
        Self {
            pending: VecDeque::new(),
            latest,
            initialized,
            status: RunnerStatus::Idle,
            running: None,
            failure: None,
            seq: 0,
        }
    }

    /// Stamp for a snapshot taken now.
    pub(crate) fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    pub(crate) fn status(&self) -> RunnerStatus {
        self.status
    }

    pub(crate) fn set_status(&mut self, status: RunnerStatus) {
        self.status = status;
    }

    pub(crate) fn latest(&self) -> S {
        self.latest.clone()
    }

    pub(crate) fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Adopt the resolved initial state.
    pub(crate) fn initialize(&mut self, state: S) {
        self.latest = state;
        self.initialized = true;
    }

    // ---- pending list -------------------------------------------------

    /// Dispatcher push.
    pub(crate) fn push_back(&mut self, descriptor: ActionDescriptor<S>) {
        self.pending.push_back(descriptor);
    }

    /// Recovery re-queue. The batch goes ahead of anything already waiting,
    /// keeping its own order.
    pub(crate) fn prepend_batch(&mut self, batch: Vec<ActionDescriptor<S>>) {
        for descriptor in batch.into_iter().rev() {
            self.pending.push_front(descriptor);
        }
    }

    /// Runner pop. The popped descriptor becomes the running one.
    pub(crate) fn pop_front(&mut self) -> Option<ActionDescriptor<S>> {
        let next = self.pending.pop_front();
        self.running = next.clone();
        next
    }

    /// Error capture: empties the live list and returns what was in it.
    pub(crate) fn take_pending(&mut self) -> Vec<ActionDescriptor<S>> {
        self.pending.drain(..).collect()
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }

    // ---- settle -------------------------------------------------------

    /// The running action resolved: its value becomes the latest state.
    pub(crate) fn settle_success(&mut self, next: S) {
        self.latest = next;
        self.running = None;
    }

    /// The running action rejected: record the failure and capture the
    /// pending list. State is left untouched.
    pub(crate) fn settle_failure(&mut self, id: FailureId) -> Vec<ActionDescriptor<S>> {
        self.running = None;
        self.status = RunnerStatus::Suspended;
        self.failure = Some(FailureSlot {
            id,
            recovering: false,
        });
        self.take_pending()
    }

    /// The running action rejected and the failure is dropped.
    pub(crate) fn settle_discarded(&mut self) {
        self.running = None;
    }

    // ---- failure slot -------------------------------------------------

    pub(crate) fn failure(&self) -> Option<FailureSlot> {
        self.failure
    }

    /// Clear the current failure. Returns whether one was set.
    pub(crate) fn clear_failure(&mut self) -> bool {
        self.failure.take().is_some()
    }

    /// Mark `id` as being recovered.
    pub(crate) fn begin_recovery(&mut self, id: FailureId) -> Result<(), RecoveryRefusal> {
        match self.failure.as_mut() {
            Some(slot) if slot.id == id && slot.recovering => Err(RecoveryRefusal::InProgress),
            Some(slot) if slot.id == id => {
                slot.recovering = true;
                Ok(())
            }
            _ => Err(RecoveryRefusal::Stale),
        }
    }

    // ---- projection ---------------------------------------------------

    /// Snapshot for observers. Copies, never aliases, the live list.
    pub(crate) fn queue_status(&self) -> QueueStatus<S> {
        if !self.status.is_draining() {
            return QueueStatus::idle();
        }
        QueueStatus {
            active: true,
            running_action: self.running.clone(),
            pending_actions: self.pending.iter().cloned().collect(),
        }
    }

    /// Snapshot right after `just_settled` resolved: it stays visible as the
    /// running action until the next pop.
    pub(crate) fn queue_status_after(&self, just_settled: &ActionDescriptor<S>) -> QueueStatus<S> {
        QueueStatus {
            active: true,
            running_action: Some(just_settled.clone()),
            pending_actions: self.pending.iter().cloned().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RecoveryRefusal {
    Stale,
    InProgress,
}
