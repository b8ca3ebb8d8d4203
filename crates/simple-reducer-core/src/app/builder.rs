//! ReducerBuilder - wiring a reducer from its collaborators.
//!
//! Everything is optional except the initial state: a bare
//! `Reducer::builder(state).build()?` gets the wall clock, ULID ids, a fresh
//! lifecycle and the full projection.

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use super::reducer::Reducer;
use crate::config::ReducerConfig;
use crate::domain::ReducerError;
use crate::impls::LifecycleGuard;
use crate::ports::{Clock, IdGenerator, Liveness, StateCell, SystemClock, UlidGenerator};
use crate::queue::{QueueRunner, RunnerParts};

/// The state a reducer starts from.
pub enum InitialState<S> {
    Ready(S),

    /// `placeholder` is published until `future` resolves. Actions dispatched
    /// in the meantime wait and then run against the resolved value.
    Deferred {
        placeholder: S,
        future: BoxFuture<'static, S>,
    },
}

impl<S> InitialState<S> {
    pub fn deferred<F>(placeholder: S, future: F) -> Self
    where
        F: Future<Output = S> + Send + 'static,
    {
        Self::Deferred {
            placeholder,
            future: future.boxed(),
        }
    }
}

impl<S> From<S> for InitialState<S> {
    fn from(state: S) -> Self {
        Self::Ready(state)
    }
}

/// Builds a [`Reducer`].
///
/// # Example
/// ```ignore
/// let reducer = Reducer::builder(Counter { count: 0 })
///     .config(ReducerConfig::minimal())
///     .cancellation_token(shutdown.clone())
///     .build()?;
/// ```
pub struct ReducerBuilder<S> {
    initial: InitialState<S>,
    config: ReducerConfig,
    token: Option<CancellationToken>,
    host_liveness: Option<Arc<dyn Liveness>>,
    state_cell: Option<Arc<dyn StateCell<S>>>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    runtime: Option<Handle>,
}

impl<S: Clone + Send + Sync + 'static> ReducerBuilder<S> {
    pub fn new(initial: impl Into<InitialState<S>>) -> Self {
        Self {
            initial: initial.into(),
            config: ReducerConfig::default(),
            token: None,
            host_liveness: None,
            state_cell: None,
            clock: None,
            ids: None,
            runtime: None,
        }
    }

    pub fn config(mut self, config: ReducerConfig) -> Self {
        self.config = config;
        self
    }

    /// Mirror every state publish into a host-owned cell.
    pub fn state_cell(mut self, cell: Arc<dyn StateCell<S>>) -> Self {
        self.state_cell = Some(cell);
        self
    }

    /// Tie the reducer to a host token: cancelling it disposes the reducer.
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    /// Consulted before every publish, next to the reducer's own lifecycle.
    pub fn liveness(mut self, host: Arc<dyn Liveness>) -> Self {
        self.host_liveness = Some(host);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Runtime the drain loop is spawned on. Defaults to the current one.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// # Errors
    /// [`ReducerError::NoRuntime`] when called outside a Tokio runtime and no
    /// handle was given.
    pub fn build(self) -> Result<Reducer<S>, ReducerError> {
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|_| ReducerError::NoRuntime)?,
        };

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(Arc::clone(&clock))));

        let mut guard = match &self.token {
            Some(token) => LifecycleGuard::child_of(token),
            None => LifecycleGuard::new(),
        };
        if let Some(host) = self.host_liveness {
            guard = guard.with_host(host);
        }

        let (initial, deferred) = match self.initial {
            InitialState::Ready(state) => (state, None),
            InitialState::Deferred {
                placeholder,
                future,
            } => (placeholder, Some(future)),
        };

        let runner = QueueRunner::start(RunnerParts {
            initial,
            deferred,
            config: self.config,
            guard,
            runtime,
            ids,
            clock,
            host_state: self.state_cell,
        });
        Ok(Reducer::from_runner(runner))
    }
}
