//! Reducer - the facade a consumer holds.
//!
//! A reducer owns one runner (queue, latest state, lifecycle). Action tables
//! are bound to it with [`Reducer::bind`] as often as needed; every binding
//! feeds the same queue.

use tokio::sync::watch;

use super::builder::{InitialState, ReducerBuilder};
use crate::domain::ReducerError;
use crate::queue::{ErrorRecord, QueueRunner, QueueStatus, RunnerStatus};
use crate::typed::{ActionRegistry, Dispatchers};

/// Serializes registered actions against one piece of state.
///
/// Dropping the reducer disposes it: queued work stops and nothing is
/// published afterwards.
pub struct Reducer<S: Clone + Send + Sync + 'static> {
    runner: QueueRunner<S>,
}

impl<S: Clone + Send + Sync + 'static> Reducer<S> {
    pub fn builder(initial: impl Into<InitialState<S>>) -> ReducerBuilder<S> {
        ReducerBuilder::new(initial)
    }

    /// Default configuration on the current Tokio runtime.
    pub fn new(initial: impl Into<InitialState<S>>) -> Result<Self, ReducerError> {
        Self::builder(initial).build()
    }

    pub(crate) fn from_runner(runner: QueueRunner<S>) -> Self {
        Self { runner }
    }

    /// Dispatchers for `actions`, all feeding this reducer's queue.
    ///
    /// Cheap. Rebinding never touches queued or running work.
    pub fn bind(&self, actions: &ActionRegistry<S>) -> Dispatchers<S> {
        actions.bind(&self.runner)
    }

    /// The projection selected by `include_queue_status`.
    pub fn view(&self, actions: &ActionRegistry<S>) -> ReducerView<S> {
        let dispatchers = self.bind(actions);
        match self.runner.queue_status() {
            Some(queue_status) => ReducerView::Full(FullView {
                state: self.state(),
                dispatchers,
                queue_status,
                error: self.error(),
            }),
            None => ReducerView::Minimal(MinimalView {
                state: self.state(),
                is_processing: self.is_processing(),
                dispatchers,
                error: self.error(),
            }),
        }
    }

    /// Last published state.
    pub fn state(&self) -> S {
        self.runner.state()
    }

    pub fn is_processing(&self) -> bool {
        self.runner.is_processing()
    }

    /// `None` when the reducer publishes only the processing flag.
    pub fn queue_status(&self) -> Option<QueueStatus<S>> {
        self.runner.queue_status()
    }

    pub fn error(&self) -> Option<ErrorRecord<S>> {
        self.runner.error()
    }

    pub fn status(&self) -> RunnerStatus {
        self.runner.status()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<S> {
        self.runner.subscribe_state()
    }

    pub fn subscribe_processing(&self) -> watch::Receiver<bool> {
        self.runner.subscribe_processing()
    }

    pub fn subscribe_queue(&self) -> watch::Receiver<QueueStatus<S>> {
        self.runner.subscribe_queue()
    }

    pub fn subscribe_error(&self) -> watch::Receiver<Option<ErrorRecord<S>>> {
        self.runner.subscribe_error()
    }

    /// Resolves once nothing is draining: the queue is empty, suspended on an
    /// error, or the reducer was disposed.
    pub async fn settled(&self) {
        self.runner.settled().await;
    }

    pub fn dispose(&self) {
        self.runner.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        !self.runner.is_alive()
    }
}

impl<S: Clone + Send + Sync + 'static> Drop for Reducer<S> {
    fn drop(&mut self) {
        self.runner.dispose();
    }
}

/// State, processing flag and dispatchers.
///
/// `error` can only be set when error recovery is on; with it off,
/// rejections are dropped and the queue never suspends.
#[derive(Debug)]
pub struct MinimalView<S> {
    pub state: S,
    pub is_processing: bool,
    pub dispatchers: Dispatchers<S>,
    pub error: Option<ErrorRecord<S>>,
}

/// State, dispatchers, queue status and the current error.
#[derive(Debug)]
pub struct FullView<S> {
    pub state: S,
    pub dispatchers: Dispatchers<S>,
    pub queue_status: QueueStatus<S>,
    pub error: Option<ErrorRecord<S>>,
}

#[derive(Debug)]
pub enum ReducerView<S> {
    Minimal(MinimalView<S>),
    Full(FullView<S>),
}

impl<S> ReducerView<S> {
    pub fn state(&self) -> &S {
        match self {
            Self::Minimal(view) => &view.state,
            Self::Full(view) => &view.state,
        }
    }

    pub fn dispatchers(&self) -> &Dispatchers<S> {
        match self {
            Self::Minimal(view) => &view.dispatchers,
            Self::Full(view) => &view.dispatchers,
        }
    }

    pub fn error(&self) -> Option<&ErrorRecord<S>> {
        match self {
            Self::Minimal(view) => view.error.as_ref(),
            Self::Full(view) => view.error.as_ref(),
        }
    }
}
