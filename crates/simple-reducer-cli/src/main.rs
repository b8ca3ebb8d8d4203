use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use simple_reducer_core::{
    Action, ActionRegistry, BoxError, RecoveryMode, Reducer, ReducerConfig, ReducerError,
};

#[derive(Parser, Debug)]
#[command(name = "simple-reducer", version, about = "Two steps forward, one step back")]
struct Cli {
    /// Rounds of add(2) / subtract(1).
    #[arg(long, default_value_t = 3)]
    steps: u32,

    /// Recovery operation to run when the queue suspends.
    #[arg(long, value_enum, default_value_t = Recover::All)]
    recover: Recover,

    /// Simulated latency of every action.
    #[arg(long = "delay-ms", default_value_t = 50)]
    delay_ms: u64,

    /// JSON file with a ReducerConfig.
    #[arg(long = "config", value_name = "PATH")]
    config_path: Option<PathBuf>,

    /// Used when RUST_LOG is not set.
    #[arg(long = "log-level", default_value = "info")]
    log_level: String,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Recover {
    Failed,
    Pending,
    All,
}

impl From<Recover> for RecoveryMode {
    fn from(value: Recover) -> Self {
        match value {
            Recover::Failed => RecoveryMode::FailedAction,
            Recover::Pending => RecoveryMode::PendingActions,
            Recover::All => RecoveryMode::AllActions,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("read config {path}: {source}")]
    ReadConfig {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid log level: {0}")]
    LogLevel(String),

    #[error(transparent)]
    Reducer(#[from] ReducerError),
}

#[derive(Debug, Clone, Serialize)]
struct Counter {
    count: i64,
}

/// add that rejects its first `remaining_failures` calls.
struct FlakyAdd {
    remaining_failures: AtomicU32,
    delay: Duration,
}

impl FlakyAdd {
    fn new(failures: u32, delay: Duration) -> Self {
        Self {
            remaining_failures: AtomicU32::new(failures),
            delay,
        }
    }
}

#[async_trait]
impl Action<Counter> for FlakyAdd {
    type Args = i64;

    async fn apply(&self, state: Counter, n: i64) -> Result<Counter, BoxError> {
        tokio::time::sleep(self.delay).await;

        let left = self.remaining_failures.load(Ordering::Relaxed);
        if left > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(format!("intentional failure (left={left})").into());
        }
        Ok(Counter {
            count: state.count + n,
        })
    }
}

fn counter_actions(delay: Duration) -> Result<ActionRegistry<Counter>, ReducerError> {
    let mut actions = ActionRegistry::new();
    actions.register("flaky_add", FlakyAdd::new(1, delay))?;
    actions.register_fn("add", move |s: Counter, n: i64| async move {
        tokio::time::sleep(delay).await;
        Ok::<_, BoxError>(Counter { count: s.count + n })
    })?;
    actions.register_fn("subtract", move |s: Counter, n: i64| async move {
        tokio::time::sleep(delay).await;
        Ok::<_, BoxError>(Counter { count: s.count - n })
    })?;
    Ok(actions)
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let args = Cli::parse();
    init_tracing(&args.log_level)?;

    let config = match &args.config_path {
        Some(path) => load_config(path)?,
        None => ReducerConfig::default(),
    };
    info!(steps = args.steps, recover = ?args.recover, ?config, "starting counter demo");

    let reducer = Reducer::builder(Counter { count: 0 })
        .config(config)
        .build()?;
    let actions = counter_actions(Duration::from_millis(args.delay_ms))?;

    // (A) print every published state
    let mut state_rx = reducer.subscribe_state();
    let printer = tokio::spawn(async move {
        while state_rx.changed().await.is_ok() {
            let state = state_rx.borrow_and_update().clone();
            println!("state: {}", state.count);
        }
    });

    // (B) enqueue: rounds of +2 / -1, the flaky add in the middle
    let dispatchers = reducer.bind(&actions);
    for round in 0..args.steps {
        dispatchers["add"].dispatch(2);
        if round == args.steps / 2 {
            dispatchers["flaky_add"].dispatch(2);
        }
        dispatchers["subtract"].dispatch(1);
    }
    if let Some(queue) = reducer.queue_status() {
        println!("queued: {}", serde_json::to_string(&queue.pending_names())?);
    }
    reducer.settled().await;

    // (C) suspended? report and recover
    if let Some(error) = reducer.error() {
        println!("suspended: {}", serde_json::to_string_pretty(&error.summary())?);
        let mode = RecoveryMode::from(args.recover);
        info!(?mode, "recovering");
        error.recover(mode)?;
        reducer.settled().await;
    }

    match reducer.error() {
        Some(error) => warn!(reason = %error.reason, "still suspended"),
        None => info!("queue drained"),
    }
    println!("final: {}", serde_json::to_string(&reducer.state())?);

    reducer.dispose();
    printer.abort();
    Ok(())
}

fn init_tracing(log_level: &str) -> Result<(), CliError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(log_level).map_err(|e| CliError::LogLevel(e.to_string()))?,
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

fn load_config(path: &Path) -> Result<ReducerConfig, CliError> {
    let raw = std::fs::read_to_string(path).map_err(|source| CliError::ReadConfig {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&raw)?)
}
