//! End-to-end behaviour of a counter reducer: ordering, suspension on
//! failure, the three recovery operations, and lifecycle edges.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::Duration;

use rstest::rstest;
use simple_reducer_core::ports::StateCell;
use simple_reducer_core::{
    ActionRegistry, BoxError, DispatchWhileSuspended, InitialState, Reducer, ReducerConfig,
    ReducerError, ReducerView, RecoveryMode, RunnerStatus,
};
use tokio::sync::Notify;

const FAIL_MESSAGE: &str = "This action has failed being executed";

#[derive(Debug, Clone, PartialEq)]
struct Counter {
    count: i64,
}

fn counter(count: i64) -> Counter {
    Counter { count }
}

/// `add`, `subtract`, and `fail` (rejects while `failing` is set, otherwise
/// subtracts).
fn counter_actions(failing: Arc<AtomicBool>) -> ActionRegistry<Counter> {
    let mut actions = ActionRegistry::new();
    actions
        .register_fn("add", |s: Counter, n: i64| async move {
            tokio::time::sleep(Duration::from_millis(1)).await;
            Ok::<_, BoxError>(counter(s.count + n))
        })
        .unwrap();
    actions
        .register_fn("subtract", |s: Counter, n: i64| async move {
            tokio::time::sleep(Duration::from_millis(1)).await;
            Ok::<_, BoxError>(counter(s.count - n))
        })
        .unwrap();
    actions
        .register_fn("fail", move |s: Counter, n: i64| {
            let failing = failing.clone();
            async move {
                if failing.load(Ordering::SeqCst) {
                    return Err::<Counter, BoxError>(BoxError::from(FAIL_MESSAGE));
                }
                Ok(counter(s.count - n))
            }
        })
        .unwrap();
    actions
}

struct Suspended {
    reducer: Reducer<Counter>,
    actions: ActionRegistry<Counter>,
    failing: Arc<AtomicBool>,
}

/// add(2), subtract(1), fail(1), add(2), subtract(1) from zero.
async fn suspend_on_fail(config: ReducerConfig) -> Suspended {
    let failing = Arc::new(AtomicBool::new(true));
    let actions = counter_actions(failing.clone());
    let reducer = Reducer::builder(counter(0)).config(config).build().unwrap();

    let d = reducer.bind(&actions);
    d["add"].dispatch(2);
    d["subtract"].dispatch(1);
    d["fail"].dispatch(1);
    d["add"].dispatch(2);
    d["subtract"].dispatch(1);
    reducer.settled().await;

    Suspended {
        reducer,
        actions,
        failing,
    }
}

#[tokio::test]
async fn actions_fold_in_dispatch_order() {
    let reducer = Reducer::new(counter(0)).unwrap();
    let actions = counter_actions(Arc::new(AtomicBool::new(false)));
    let d = reducer.bind(&actions);

    d["add"].dispatch(2);
    d["subtract"].dispatch(1);
    d["add"].dispatch(5);

    let queued = reducer.queue_status().unwrap();
    assert!(queued.active);
    assert!(reducer.is_processing());
    assert_eq!(queued.pending_names(), vec!["add", "subtract", "add"]);

    reducer.settled().await;

    assert_eq!(reducer.state(), counter(6));
    let done = reducer.queue_status().unwrap();
    assert!(!done.active);
    assert!(done.running_action.is_none());
    assert!(done.pending_actions.is_empty());
    assert!(reducer.error().is_none());
}

#[tokio::test]
async fn running_action_is_visible_while_in_flight() {
    let gate = Arc::new(Notify::new());
    let mut actions = counter_actions(Arc::new(AtomicBool::new(false)));
    let held = gate.clone();
    actions
        .register_fn("wait", move |s: Counter, (): ()| {
            let held = held.clone();
            async move {
                held.notified().await;
                Ok::<_, BoxError>(s)
            }
        })
        .unwrap();

    let reducer = Reducer::new(counter(0)).unwrap();
    let d = reducer.bind(&actions);
    d["wait"].dispatch(());
    d["add"].dispatch(1);
    tokio::time::sleep(Duration::from_millis(10)).await;

    let status = reducer.queue_status().unwrap();
    assert!(status.active);
    assert_eq!(status.running_action.as_ref().unwrap().name, "wait");
    assert_eq!(status.pending_names(), vec!["add"]);
    assert_eq!(reducer.state(), counter(0));

    gate.notify_one();
    reducer.settled().await;
    assert_eq!(reducer.state(), counter(1));
}

#[tokio::test]
async fn failure_suspends_and_captures_pending() {
    let Suspended { reducer, .. } = suspend_on_fail(ReducerConfig::default()).await;

    assert_eq!(reducer.state(), counter(1));
    assert_eq!(reducer.status(), RunnerStatus::Suspended);
    assert!(!reducer.is_processing());

    let error = reducer.error().expect("error record");
    assert_eq!(error.reason.to_string(), FAIL_MESSAGE);
    assert_eq!(error.failed_action.name, "fail");
    assert_eq!(error.failed_action.args, vec![serde_json::json!(1)]);
    assert_eq!(error.pending_actions.len(), 2);
    assert_eq!(error.pending_actions[0].name, "add");
    assert_eq!(error.pending_actions[0].args, vec![serde_json::json!(2)]);

    let queue = reducer.queue_status().unwrap();
    assert!(!queue.active);
    assert!(queue.pending_actions.is_empty());
}

#[rstest]
#[case::failed_action(RecoveryMode::FailedAction, 0)]
#[case::pending_actions(RecoveryMode::PendingActions, 2)]
#[case::all_actions(RecoveryMode::AllActions, 1)]
#[tokio::test]
async fn recovery_applies_its_batch(#[case] mode: RecoveryMode, #[case] expected: i64) {
    let s = suspend_on_fail(ReducerConfig::default()).await;
    s.failing.store(false, Ordering::SeqCst);

    s.reducer.error().unwrap().recover(mode).unwrap();
    s.reducer.settled().await;

    assert_eq!(s.reducer.state(), counter(expected));
    assert!(s.reducer.error().is_none());
    assert_eq!(s.reducer.status(), RunnerStatus::Idle);
}

#[tokio::test]
async fn run_failed_action_after_fix() {
    let s = suspend_on_fail(ReducerConfig::default()).await;
    s.failing.store(false, Ordering::SeqCst);

    s.reducer.error().unwrap().run_failed_action().unwrap();
    s.reducer.settled().await;

    assert_eq!(s.reducer.state(), counter(0));
    assert!(s.reducer.error().is_none());
}

#[tokio::test]
async fn run_pending_actions_skips_the_failure() {
    let s = suspend_on_fail(ReducerConfig::default()).await;

    // still failing: the failed action is not part of the batch
    s.reducer.error().unwrap().run_pending_actions().unwrap();
    s.reducer.settled().await;

    assert_eq!(s.reducer.state(), counter(2));
    assert!(s.reducer.error().is_none());
}

#[tokio::test]
async fn run_all_actions_still_failing_reproduces_the_error() {
    let s = suspend_on_fail(ReducerConfig::default()).await;
    let first = s.reducer.error().unwrap();

    first.run_all_actions().unwrap();
    s.reducer.settled().await;

    let second = s.reducer.error().expect("new error record");
    assert_ne!(second.id, first.id);
    assert_eq!(second.reason.to_string(), FAIL_MESSAGE);
    assert_eq!(second.failed_action.name, "fail");
    assert_eq!(second.pending_actions.len(), 2);
    assert_eq!(s.reducer.state(), counter(1));
}

#[tokio::test]
async fn a_record_recovers_once() {
    let s = suspend_on_fail(ReducerConfig::default()).await;
    let record = s.reducer.error().unwrap();

    record.run_failed_action().unwrap();
    let again = record.run_pending_actions();
    assert!(matches!(again, Err(ReducerError::RecoveryInProgress(id)) if id == record.id));

    // the retry failed again, so `record` has been superseded
    s.reducer.settled().await;
    let stale = record.run_all_actions();
    assert!(matches!(stale, Err(ReducerError::StaleFailure(id)) if id == record.id));
}

#[tokio::test]
async fn new_dispatch_resumes_and_clears_the_error() {
    let s = suspend_on_fail(ReducerConfig::default()).await;

    s.reducer.bind(&s.actions)["add"].dispatch(10);
    s.reducer.settled().await;

    assert_eq!(s.reducer.state(), counter(11));
    assert!(s.reducer.error().is_none());
    assert_eq!(s.reducer.status(), RunnerStatus::Idle);
}

#[tokio::test]
async fn hold_keeps_new_work_behind_the_error() {
    let config = ReducerConfig::default().with_dispatch_while_suspended(DispatchWhileSuspended::Hold);
    let s = suspend_on_fail(config).await;

    s.reducer.bind(&s.actions)["add"].dispatch(10);
    s.reducer.settled().await;
    assert_eq!(s.reducer.state(), counter(1));
    assert_eq!(s.reducer.status(), RunnerStatus::Suspended);
    assert!(s.reducer.error().is_some());

    // batch first (add 2, subtract 1), then the held add 10
    s.reducer.error().unwrap().run_pending_actions().unwrap();
    s.reducer.settled().await;
    assert_eq!(s.reducer.state(), counter(12));
    assert!(s.reducer.error().is_none());
}

#[tokio::test]
async fn minimal_config_drops_rejections() {
    let failing = Arc::new(AtomicBool::new(true));
    let actions = counter_actions(failing);
    let reducer = Reducer::builder(counter(0))
        .config(ReducerConfig::minimal())
        .build()
        .unwrap();

    let d = reducer.bind(&actions);
    d["add"].dispatch(2);
    d["fail"].dispatch(1);
    d["add"].dispatch(3);
    reducer.settled().await;

    assert_eq!(reducer.state(), counter(5));
    assert!(reducer.error().is_none());
    assert!(reducer.queue_status().is_none());
    assert_eq!(reducer.status(), RunnerStatus::Idle);
}

#[tokio::test]
async fn actions_never_overlap() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut actions = ActionRegistry::new();
    let (flight, top) = (in_flight.clone(), peak.clone());
    actions
        .register_fn("tick", move |s: Counter, (): ()| {
            let (flight, top) = (flight.clone(), top.clone());
            async move {
                let now = flight.fetch_add(1, Ordering::SeqCst) + 1;
                top.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                flight.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, BoxError>(counter(s.count + 1))
            }
        })
        .unwrap();

    let reducer = Reducer::new(counter(0)).unwrap();
    for _ in 0..10 {
        // a fresh binding per call, like a re-render
        reducer.bind(&actions)["tick"].dispatch(());
    }
    reducer.settled().await;

    assert_eq!(reducer.state(), counter(10));
    assert_eq!(peak.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn dispatch_from_many_tasks_is_serialized() {
    let reducer = Arc::new(Reducer::new(counter(0)).unwrap());
    let actions = Arc::new(counter_actions(Arc::new(AtomicBool::new(false))));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let (reducer, actions) = (reducer.clone(), actions.clone());
        handles.push(tokio::spawn(async move {
            let d = reducer.bind(&actions);
            for _ in 0..5 {
                d["add"].dispatch(1);
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    reducer.settled().await;

    assert_eq!(reducer.state(), counter(40));
}

#[tokio::test]
async fn deferred_initial_state_is_resolved_once() {
    let initial = InitialState::deferred(counter(-1), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        counter(10)
    });
    let reducer: Reducer<Counter> = Reducer::new(initial).unwrap();
    let actions = counter_actions(Arc::new(AtomicBool::new(false)));

    assert_eq!(reducer.state(), counter(-1));
    reducer.bind(&actions)["add"].dispatch(1);
    reducer.settled().await;

    assert_eq!(reducer.state(), counter(11));
}

#[tokio::test]
async fn dispose_mid_drain_suppresses_publishing() {
    let reducer = Reducer::new(counter(0)).unwrap();
    let actions = counter_actions(Arc::new(AtomicBool::new(false)));
    let mut state_rx = reducer.subscribe_state();

    let d = reducer.bind(&actions);
    d["add"].dispatch(1);
    d["add"].dispatch(1);
    tokio::task::yield_now().await;
    reducer.dispose();

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(reducer.state(), counter(0));
    assert!(!state_rx.has_changed().unwrap());

    let err = reducer.error();
    assert!(err.is_none());
}

#[tokio::test]
async fn recovery_after_dispose_is_refused() {
    let s = suspend_on_fail(ReducerConfig::default()).await;
    let record = s.reducer.error().unwrap();

    s.reducer.dispose();
    assert!(matches!(record.run_all_actions(), Err(ReducerError::Disposed)));

    drop(s);
    assert!(matches!(record.run_all_actions(), Err(ReducerError::Disposed)));
}

#[tokio::test]
async fn panicking_action_becomes_the_reason() {
    let mut actions = ActionRegistry::new();
    actions
        .register_fn("boom", |_s: Counter, (): ()| async move {
            if true {
                panic!("kaboom");
            }
            Ok::<_, BoxError>(counter(0))
        })
        .unwrap();

    let reducer = Reducer::new(counter(3)).unwrap();
    reducer.bind(&actions)["boom"].dispatch(());
    reducer.settled().await;

    let error = reducer.error().unwrap();
    assert_eq!(error.reason.to_string(), "action 'boom' panicked: kaboom");
    assert_eq!(reducer.state(), counter(3));
}

#[tokio::test]
async fn bad_arguments_surface_through_the_error_record() {
    let reducer = Reducer::new(counter(0)).unwrap();
    let actions = counter_actions(Arc::new(AtomicBool::new(false)));

    reducer.bind(&actions)["add"].dispatch("two");
    reducer.settled().await;

    let error = reducer.error().unwrap();
    let cause = error.reason.downcast_ref::<ReducerError>();
    assert!(matches!(cause, Some(ReducerError::InvalidArgs { action, .. }) if action == "add"));
    assert_eq!(reducer.state(), counter(0));
}

#[tokio::test]
async fn host_token_cancellation_stops_the_queue() {
    let token = tokio_util::sync::CancellationToken::new();
    let reducer = Reducer::builder(counter(0))
        .cancellation_token(token.clone())
        .build()
        .unwrap();

    token.cancel();
    reducer
        .bind(&counter_actions(Arc::new(AtomicBool::new(false))))["add"]
        .dispatch(1);
    reducer.settled().await;

    assert!(reducer.is_disposed());
    assert_eq!(reducer.state(), counter(0));
}

#[tokio::test]
async fn timestamps_come_from_the_injected_clock() {
    use chrono::{TimeZone, Utc};
    use simple_reducer_core::ports::FixedClock;

    let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
    let failing = Arc::new(AtomicBool::new(true));
    let reducer = Reducer::builder(counter(0))
        .clock(Arc::new(FixedClock::new(at)))
        .build()
        .unwrap();

    reducer.bind(&counter_actions(failing))["fail"].dispatch(1);
    reducer.settled().await;

    let error = reducer.error().unwrap();
    assert_eq!(error.failed_at, at);
    assert_eq!(error.failed_action.enqueued_at, at);
    assert_eq!(error.summary().failed_action, "fail");
}

#[tokio::test]
async fn panicking_initial_state_falls_back_to_the_placeholder() {
    let initial = InitialState::deferred(counter(5), async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        if true {
            panic!("initial state unavailable");
        }
        counter(0)
    });
    let reducer = Reducer::<Counter>::new(initial).unwrap();
    let actions = counter_actions(Arc::new(AtomicBool::new(false)));

    reducer.bind(&actions)["add"].dispatch(1);
    let settled = tokio::time::timeout(Duration::from_secs(2), reducer.settled()).await;

    assert!(settled.is_ok());
    assert_eq!(reducer.state(), counter(6));
    assert_eq!(reducer.status(), RunnerStatus::Idle);
    assert!(!reducer.is_processing());
}

#[tokio::test]
async fn hold_does_not_apply_while_waiting_for_initial_state() {
    let initial = InitialState::deferred(counter(-1), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        counter(10)
    });
    let config = ReducerConfig::default().with_dispatch_while_suspended(DispatchWhileSuspended::Hold);
    let reducer = Reducer::<Counter>::builder(initial)
        .config(config)
        .build()
        .unwrap();
    let actions = counter_actions(Arc::new(AtomicBool::new(false)));

    let d = reducer.bind(&actions);
    d["add"].dispatch(1);
    d["add"].dispatch(2);
    assert_eq!(reducer.status(), RunnerStatus::Draining);
    assert_eq!(reducer.state(), counter(-1));

    reducer.settled().await;
    assert_eq!(reducer.state(), counter(13));
    assert_eq!(reducer.status(), RunnerStatus::Idle);
}

#[tokio::test]
async fn recovery_during_a_resumed_drain_goes_first() {
    let s = suspend_on_fail(ReducerConfig::default()).await;
    let record = s.reducer.error().unwrap();

    let gate = Arc::new(Notify::new());
    let mut actions = counter_actions(s.failing.clone());
    let held = gate.clone();
    actions
        .register_fn("wait", move |st: Counter, (): ()| {
            let held = held.clone();
            async move {
                held.notified().await;
                Ok::<_, BoxError>(st)
            }
        })
        .unwrap();

    // resume with new work, park it on the gate
    let d = s.reducer.bind(&actions);
    d["wait"].dispatch(());
    d["add"].dispatch(100);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(s.reducer.status(), RunnerStatus::Draining);

    record.run_pending_actions().unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    // batch ahead of the held add(100), and nothing ran beside `wait`
    let queue = s.reducer.queue_status().unwrap();
    assert_eq!(queue.running_action.as_ref().unwrap().name, "wait");
    assert_eq!(queue.pending_names(), vec!["add", "subtract", "add"]);
    assert_eq!(s.reducer.state(), counter(1));

    gate.notify_one();
    s.reducer.settled().await;

    assert_eq!(s.reducer.state(), counter(102));
    assert!(s.reducer.error().is_none());
    assert_eq!(s.reducer.status(), RunnerStatus::Idle);
}

#[tokio::test]
async fn minimal_projection_still_exposes_the_error() {
    let s = suspend_on_fail(ReducerConfig::default().with_queue_status(false)).await;

    let view = s.reducer.view(&s.actions);
    let ReducerView::Minimal(minimal) = &view else {
        panic!("expected the minimal projection, got {view:?}");
    };
    assert!(!minimal.is_processing);
    assert_eq!(minimal.state, counter(1));
    let error = minimal.error.as_ref().expect("error record in minimal view");
    assert_eq!(error.failed_action.name, "fail");
    assert!(s.reducer.queue_status().is_none());

    s.failing.store(false, Ordering::SeqCst);
    view.error().unwrap().run_all_actions().unwrap();
    s.reducer.settled().await;

    assert_eq!(s.reducer.state(), counter(1));
    assert!(s.reducer.error().is_none());
}

/// Host cell that reads from and dispatches to the reducer from `set`.
struct ReentrantCell {
    reducer: OnceLock<Weak<Reducer<Counter>>>,
    actions: Arc<ActionRegistry<Counter>>,
    last: Mutex<Counter>,
    observed: Mutex<Vec<(i64, RunnerStatus)>>,
}

impl StateCell<Counter> for ReentrantCell {
    fn get(&self) -> Counter {
        self.last.lock().unwrap().clone()
    }

    fn set(&self, value: Counter) {
        *self.last.lock().unwrap() = value.clone();
        let Some(reducer) = self.reducer.get().and_then(Weak::upgrade) else {
            return;
        };
        self.observed
            .lock()
            .unwrap()
            .push((value.count, reducer.status()));
        if value.count == 1 {
            reducer.bind(&self.actions)["add"].dispatch(10);
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn host_cell_may_call_back_into_the_reducer() {
    let actions = Arc::new(counter_actions(Arc::new(AtomicBool::new(false))));
    let cell = Arc::new(ReentrantCell {
        reducer: OnceLock::new(),
        actions: actions.clone(),
        last: Mutex::new(counter(0)),
        observed: Mutex::new(Vec::new()),
    });
    let reducer = Arc::new(
        Reducer::builder(counter(0))
            .state_cell(cell.clone())
            .build()
            .unwrap(),
    );
    assert!(cell.reducer.set(Arc::downgrade(&reducer)).is_ok());

    reducer.bind(&actions)["add"].dispatch(1);
    let settled = tokio::time::timeout(Duration::from_secs(5), reducer.settled()).await;

    assert!(settled.is_ok());
    assert_eq!(reducer.state(), counter(11));
    assert_eq!(cell.get(), counter(11));
    let observed = cell.observed.lock().unwrap().clone();
    assert_eq!(observed.first(), Some(&(1, RunnerStatus::Draining)));
}
