//! QueueRunner: the single-flight drain loop.
//!
//! ```text
//! dispatch ─► RunnerCore.pending ─► (Idle?) spawn drain
//!
//! drain loop {
//!   ├─► pop head                         (none ─► Idle, publish idle status)
//!   ├─► publish QueueStatus{running, pending}
//!   ├─► invoke(latest, args).await       (the only suspension point)
//!   │     ├─ Ok(next)  ─► latest = next, publish state, clear error, continue
//!   │     └─ Err(why)  ─► capture pending, Suspended, publish ErrorRecord, exit
//! }
//! ```
//!
//! At most one drain loop exists per runner: a new one is only spawned from
//! Idle or Suspended, and the status flips to Draining under the same lock.
//!
//! Nothing is published while the core lock is held. Each critical section
//! returns a [`Snapshot`] that is published after the guard is dropped, so
//! a host cell reacting to a publish may call back into the runner.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, error, warn};

use super::publish::{Publisher, Snapshot};
use super::store::{RecoveryRefusal, RunnerCore};
use super::{ActionDescriptor, ErrorRecord, QueueStatus, RecoveryMode, RunnerStatus};
use crate::config::{DispatchWhileSuspended, ReducerConfig};
use crate::domain::{ActionArgs, ActionName, FailureId, Reason, ReducerError};
use crate::impls::LifecycleGuard;
use crate::ports::{Clock, IdGenerator, Liveness, StateCell};
use crate::typed::DynAction;

/// Everything a runner is built from.
pub(crate) struct RunnerParts<S> {
    /// Initial state, or the placeholder published while `deferred` resolves.
    pub(crate) initial: S,
    pub(crate) deferred: Option<futures::future::BoxFuture<'static, S>>,
    pub(crate) config: ReducerConfig,
    pub(crate) guard: LifecycleGuard,
    pub(crate) runtime: Handle,
    pub(crate) ids: Arc<dyn IdGenerator>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) host_state: Option<Arc<dyn StateCell<S>>>,
}

pub(crate) struct Shared<S> {
    core: Mutex<RunnerCore<S>>,
    publisher: Publisher<S>,
    guard: LifecycleGuard,

    /// Flips to true once the initial state is known.
    ready: watch::Sender<bool>,

    config: ReducerConfig,
    runtime: Handle,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl<S> Shared<S> {
    fn lock(&self) -> MutexGuard<'_, RunnerCore<S>> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_alive(&self) -> bool {
        self.guard.is_alive()
    }

    /// Every publish goes through here. Must be called without the core
    /// lock held.
    fn publish(&self, snapshot: Snapshot<S>)
    where
        S: Clone + Send + Sync + 'static,
    {
        let liveness: &dyn Liveness = &self.guard;
        liveness.run_if_alive(|| self.publisher.publish(snapshot));
    }

    /// Wait for the initial state. False if disposed first.
    async fn wait_ready(&self) -> bool {
        let mut rx = self.ready.subscribe();
        tokio::select! {
            ready = async { rx.wait_for(|ready| *ready).await.is_ok() } => ready,
            _ = self.guard.disposed() => false,
        }
    }
}

/// Handle to one runner. Clones share the same queue and state.
pub struct QueueRunner<S> {
    shared: Arc<Shared<S>>,
}

impl<S> Clone for QueueRunner<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: Clone + Send + Sync + 'static> QueueRunner<S> {
    /// Build the runner. Spawns the initial-state resolution when deferred.
    pub(crate) fn start(parts: RunnerParts<S>) -> Self {
        let initialized = parts.deferred.is_none();
        let (ready, _) = watch::channel(initialized);
        let placeholder = parts.initial.clone();

        let shared = Arc::new(Shared {
            core: Mutex::new(RunnerCore::new(parts.initial.clone(), initialized)),
            publisher: Publisher::new(
                parts.initial,
                parts.host_state,
                parts.config.include_queue_status,
            ),
            guard: parts.guard,
            ready,
            config: parts.config,
            runtime: parts.runtime,
            ids: parts.ids,
            clock: parts.clock,
        });
        let runner = Self { shared };

        if let Some(deferred) = parts.deferred {
            let resolver = runner.clone();
            runner.shared.runtime.spawn(async move {
                use futures::FutureExt;
                match std::panic::AssertUnwindSafe(deferred).catch_unwind().await {
                    Ok(state) => resolver.adopt_initial(state),
                    Err(_) => {
                        error!("deferred initial state panicked; continuing from the placeholder");
                        resolver.adopt_initial(placeholder);
                    }
                }
            });
        }

        runner
    }

    pub(crate) fn from_shared(shared: Arc<Shared<S>>) -> Self {
        Self { shared }
    }

    /// Adopt the initial state and release the drains waiting for it.
    fn adopt_initial(&self, state: S) {
        let snapshot = {
            let mut core = self.shared.lock();
            if core.is_initialized() {
                return;
            }
            core.initialize(state.clone());
            debug!(pending = core.pending_len(), "initial state resolved");
            Snapshot::new(core.next_seq()).state(state)
        };
        self.shared.publish(snapshot);
        self.shared.ready.send_replace(true);
    }

    // ---- operations -----------------------------------------------------

    /// Append one unit of work. Never fails: after disposal the call is
    /// dropped, everything else surfaces through the ErrorRecord.
    pub(crate) fn enqueue(&self, name: ActionName, args: ActionArgs, action: Arc<dyn DynAction<S>>) {
        if !self.shared.is_alive() {
            debug!(action = %name, "reducer disposed, dispatch dropped");
            return;
        }

        let descriptor = ActionDescriptor::new(
            self.shared.ids.action_id(),
            name,
            args,
            self.shared.clock.now(),
            action,
        );
        debug!(action = %descriptor.name, id = %descriptor.id, "action enqueued");

        let snapshot = {
            let mut core = self.shared.lock();
            core.push_back(descriptor);

            match core.status() {
                RunnerStatus::Idle => Some(self.start_drain(&mut core)),
                RunnerStatus::Draining => {
                    let seq = core.next_seq();
                    Some(Snapshot::new(seq).queue(core.queue_status()))
                }
                RunnerStatus::Suspended => match self.shared.config.dispatch_while_suspended {
                    DispatchWhileSuspended::Resume => {
                        debug!("new dispatch resumes the suspended queue");
                        Some(self.start_drain(&mut core))
                    }
                    DispatchWhileSuspended::Hold => {
                        debug!(held = core.pending_len(), "queue suspended, dispatch held");
                        None
                    }
                },
            }
        };

        if let Some(snapshot) = snapshot {
            self.shared.publish(snapshot);
        }
    }

    /// Put a recovery batch at the front of the live queue and make sure a
    /// drain is running.
    pub(crate) fn recover(
        &self,
        id: FailureId,
        mode: RecoveryMode,
        batch: Vec<ActionDescriptor<S>>,
    ) -> Result<(), ReducerError> {
        if !self.shared.is_alive() {
            return Err(ReducerError::Disposed);
        }

        let snapshot = {
            let mut core = self.shared.lock();
            if let Err(refusal) = core.begin_recovery(id) {
                warn!(failure = %id, ?mode, ?refusal, "recovery refused");
                return Err(match refusal {
                    RecoveryRefusal::Stale => ReducerError::StaleFailure(id),
                    RecoveryRefusal::InProgress => ReducerError::RecoveryInProgress(id),
                });
            }

            debug!(failure = %id, ?mode, batch = batch.len(), "recovery requested");
            core.prepend_batch(batch);

            if core.status().can_start_drain() {
                self.start_drain(&mut core)
            } else {
                let seq = core.next_seq();
                Snapshot::new(seq).queue(core.queue_status())
            }
        };

        self.shared.publish(snapshot);
        Ok(())
    }

    /// Caller holds the lock, so the status check and the flip to Draining
    /// are atomic. The returned snapshot is for the caller to publish once
    /// the lock is released.
    fn start_drain(&self, core: &mut RunnerCore<S>) -> Snapshot<S> {
        core.set_status(RunnerStatus::Draining);
        debug!(pending = core.pending_len(), "drain started");
        self.shared.runtime.spawn(drain(Arc::clone(&self.shared)));

        let seq = core.next_seq();
        Snapshot::new(seq)
            .processing(true)
            .queue(core.queue_status())
    }

    // ---- observation ----------------------------------------------------

    pub(crate) fn status(&self) -> RunnerStatus {
        self.shared.lock().status()
    }

    pub(crate) fn state(&self) -> S {
        self.shared.publisher.state()
    }

    pub(crate) fn is_processing(&self) -> bool {
        self.shared.publisher.processing()
    }

    pub(crate) fn queue_status(&self) -> Option<QueueStatus<S>> {
        self.shared.publisher.queue()
    }

    pub(crate) fn error(&self) -> Option<ErrorRecord<S>> {
        self.shared.publisher.error()
    }

    pub(crate) fn subscribe_state(&self) -> watch::Receiver<S> {
        self.shared.publisher.subscribe_state()
    }

    pub(crate) fn subscribe_processing(&self) -> watch::Receiver<bool> {
        self.shared.publisher.subscribe_processing()
    }

    pub(crate) fn subscribe_queue(&self) -> watch::Receiver<QueueStatus<S>> {
        self.shared.publisher.subscribe_queue()
    }

    pub(crate) fn subscribe_error(&self) -> watch::Receiver<Option<ErrorRecord<S>>> {
        self.shared.publisher.subscribe_error()
    }

    /// Wait until no drain is running (Idle or Suspended) or the runner is
    /// disposed.
    pub(crate) async fn settled(&self) {
        let mut rx = self.shared.publisher.subscribe_processing();
        tokio::select! {
            _ = async { rx.wait_for(|processing| !*processing).await.is_ok() } => {}
            _ = self.shared.guard.disposed() => {}
        }
    }

    pub(crate) fn dispose(&self) {
        if self.shared.is_alive() {
            debug!("reducer disposed");
        }
        self.shared.guard.dispose();
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.shared.is_alive()
    }
}

/// What the drain loop does after an action settles.
enum Step {
    Continue,
    Stop,
}

async fn drain<S: Clone + Send + Sync + 'static>(shared: Arc<Shared<S>>) {
    if !shared.wait_ready().await {
        return;
    }

    loop {
        let (next, snapshot) = {
            let mut core = shared.lock();
            if !shared.is_alive() {
                core.set_status(RunnerStatus::Idle);
                return;
            }
            match core.pop_front() {
                Some(descriptor) => {
                    let seq = core.next_seq();
                    let snapshot = Snapshot::new(seq).queue(core.queue_status());
                    (Some((descriptor, core.latest())), snapshot)
                }
                None => (None, finish(&mut core)),
            }
        };
        shared.publish(snapshot);
        let Some((descriptor, state)) = next else {
            debug!("queue drained");
            return;
        };

        debug!(action = %descriptor.name, id = %descriptor.id, "invoking action");
        let outcome = descriptor.invoke(state).await;

        let (step, snapshot) = {
            let mut core = shared.lock();
            if !shared.is_alive() {
                core.set_status(RunnerStatus::Idle);
                return;
            }
            settle(&shared, &mut core, descriptor, outcome)
        };
        shared.publish(snapshot);

        if let Step::Stop = step {
            return;
        }
    }
}

/// Apply one outcome to the core. Runs under the lock.
fn settle<S: Clone + Send + Sync + 'static>(
    shared: &Arc<Shared<S>>,
    core: &mut RunnerCore<S>,
    descriptor: ActionDescriptor<S>,
    outcome: Result<S, Reason>,
) -> (Step, Snapshot<S>) {
    match outcome {
        Ok(next) => {
            core.settle_success(next.clone());
            let cleared = core.clear_failure();
            debug!(action = %descriptor.name, id = %descriptor.id, "action settled");

            let seq = core.next_seq();
            let mut snapshot = Snapshot::new(seq)
                .state(next)
                .queue(core.queue_status_after(&descriptor));
            if cleared {
                snapshot = snapshot.error(None);
            }
            (Step::Continue, snapshot)
        }
        Err(reason) if shared.config.include_error_recovery => {
            let id = shared.ids.failure_id();
            let pending = core.settle_failure(id);
            warn!(
                action = %descriptor.name,
                id = %descriptor.id,
                failure = %id,
                pending = pending.len(),
                %reason,
                "action rejected, queue suspended"
            );
            let record = ErrorRecord::new(
                id,
                reason,
                descriptor,
                pending,
                shared.clock.now(),
                Arc::downgrade(shared),
            );

            let seq = core.next_seq();
            let snapshot = Snapshot::new(seq)
                .processing(false)
                .queue(QueueStatus::idle())
                .error(Some(record));
            (Step::Stop, snapshot)
        }
        Err(reason) => {
            core.settle_discarded();
            warn!(
                action = %descriptor.name,
                id = %descriptor.id,
                %reason,
                "action rejected, dropped"
            );
            let seq = core.next_seq();
            (Step::Continue, Snapshot::new(seq).queue(core.queue_status()))
        }
    }
}

/// Pending list exhausted: back to Idle.
///
/// A failure whose recovery was started and produced no new failure is
/// resolved at this point, even if its batch was empty.
fn finish<S: Clone>(core: &mut RunnerCore<S>) -> Snapshot<S> {
    core.set_status(RunnerStatus::Idle);
    let cleared = core.failure().is_some_and(|slot| slot.recovering) && core.clear_failure();

    let seq = core.next_seq();
    let snapshot = Snapshot::new(seq)
        .processing(false)
        .queue(QueueStatus::idle());
    if cleared { snapshot.error(None) } else { snapshot }
}
