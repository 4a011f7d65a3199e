//! Isolated, timeout-bounded execution of the function under test.
//!
//! The [`Runner`] drives one [`Worker`] at a time. Each call replaces the
//! worker's listener, posts the inputs and races the reply against a timer.
//! A worker that times out or dies is terminated and never reused; the next
//! call lazily spawns a replacement.

pub mod native_worker;
pub mod v8_worker;
pub mod worker;

use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Once};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

use crate::error::{FuzzError, Result};
use crate::spec::Args;

pub use native_worker::NativeWorkerFactory;
pub use v8_worker::V8WorkerFactory;
pub use worker::{FunctionRef, NativeFn, Worker, WorkerFactory, WorkerMessage, WorkerState};

pub const DEFAULT_HEAP_MEMORY_MAX_MB: usize = 64;
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(10);

// ── V8 initialization ───────────────────────────────────────────────────

static INIT: Once = Once::new();
static mut PLATFORM: Option<v8::SharedRef<v8::Platform>> = None;

pub fn initialize_v8() {
    INIT.call_once(|| {
        let platform = v8::new_default_platform(0, false).make_shared();
        v8::V8::initialize_platform(platform.clone());
        v8::V8::initialize();
        unsafe {
            PLATFORM = Some(platform);
        }
    });
}

// ── Outcomes ────────────────────────────────────────────────────────────

/// What happened to one call of the function under test. None of these are
/// engine errors.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Returned normally. `None` is `undefined`.
    Output { value: Option<Value> },
    /// Threw; `message` is the error's message.
    Exception { message: String },
    Timeout,
    /// The worker went away without answering.
    Crashed,
}

impl RunOutcome {
    pub fn is_failure(&self) -> bool {
        !matches!(self, RunOutcome::Output { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RunOutcome::Output { .. } => "output",
            RunOutcome::Exception { .. } => "exception",
            RunOutcome::Timeout => "timeout",
            RunOutcome::Crashed => "crashed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResult {
    #[serde(flatten)]
    pub outcome: RunOutcome,
    pub elapsed_ms: u64,
}

// ── Runner ──────────────────────────────────────────────────────────────

pub struct Runner {
    function: FunctionRef,
    factory: Arc<dyn WorkerFactory>,
    worker: Option<Box<dyn Worker>>,
    load_timeout: Duration,
    terminated: bool,
}

impl Runner {
    /// A runner on the backend matching `function`.
    pub fn new(function: FunctionRef) -> Self {
        let factory = function.default_factory();
        Self::with_factory(function, factory)
    }

    pub fn with_factory(function: FunctionRef, factory: Arc<dyn WorkerFactory>) -> Self {
        Self {
            function,
            factory,
            worker: None,
            load_timeout: DEFAULT_LOAD_TIMEOUT,
            terminated: false,
        }
    }

    pub fn load_timeout(mut self, load_timeout: Duration) -> Self {
        self.load_timeout = load_timeout;
        self
    }

    pub fn function(&self) -> &FunctionRef {
        &self.function
    }

    /// State of the current worker; `Uninitialized` between a retired worker
    /// and its lazy replacement.
    pub fn worker_state(&self) -> WorkerState {
        if self.terminated {
            return WorkerState::Terminated;
        }
        self.worker
            .as_ref()
            .map(|w| w.state())
            .unwrap_or(WorkerState::Uninitialized)
    }

    /// Spawns and loads a worker now instead of on the first call.
    pub async fn warm_up(&mut self) -> Result<()> {
        if self.terminated {
            return Err(FuzzError::RunnerTerminated);
        }
        self.ensure_worker().await
    }

    /// Calls the function with a copy of `inputs`, giving up after `timeout`.
    pub async fn run(&mut self, inputs: &Args, timeout: Duration) -> Result<RunResult> {
        if self.terminated {
            return Err(FuzzError::RunnerTerminated);
        }
        self.ensure_worker().await?;
        let Some(worker) = self.worker.as_mut() else {
            return Err(FuzzError::Spawn("no worker after spawn".to_string()));
        };

        let (tx, rx) = oneshot::channel();
        worker.on_message(tx);
        let started = Instant::now();

        if let Err(e) = worker.post_message(WorkerMessage::Input(inputs.clone())) {
            tracing::warn!("failed to post input to worker: {}", e);
            self.retire();
            return Ok(RunResult {
                outcome: RunOutcome::Crashed,
                elapsed_ms: elapsed_ms(started),
            });
        }

        let outcome = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(WorkerMessage::Output(outcome))) => outcome,
            Ok(Ok(other)) => {
                tracing::warn!("worker sent unexpected message: {:?}", other);
                self.retire();
                RunOutcome::Crashed
            }
            Ok(Err(_)) => {
                tracing::warn!("worker for '{}' exited without answering", self.function.name());
                self.retire();
                RunOutcome::Crashed
            }
            Err(_) => {
                tracing::info!(
                    "call to '{}' timed out after {}ms; replacing worker",
                    self.function.name(),
                    timeout.as_millis()
                );
                self.retire();
                RunOutcome::Timeout
            }
        };

        Ok(RunResult {
            outcome,
            elapsed_ms: elapsed_ms(started),
        })
    }

    /// Shuts the runner down. Later calls fail with `RunnerTerminated`.
    pub fn terminate(&mut self) {
        self.retire();
        self.terminated = true;
    }

    async fn ensure_worker(&mut self) -> Result<()> {
        if self
            .worker
            .as_ref()
            .is_some_and(|w| w.state() != WorkerState::Terminated)
        {
            return Ok(());
        }

        let mut worker = self.factory.spawn()?;
        let (tx, rx) = oneshot::channel();
        worker.on_message(tx);
        if let Err(e) = worker.post_message(WorkerMessage::Code(self.function.clone())) {
            worker.terminate();
            return Err(e);
        }

        let failure = match tokio::time::timeout(self.load_timeout, rx).await {
            Ok(Ok(WorkerMessage::Output(RunOutcome::Output { .. }))) => None,
            Ok(Ok(WorkerMessage::Output(RunOutcome::Exception { message }))) => Some(message),
            Ok(Ok(other)) => Some(format!("unexpected reply {:?}", other)),
            Ok(Err(_)) => Some("worker exited while loading".to_string()),
            Err(_) => Some(format!("timed out after {}ms", self.load_timeout.as_millis())),
        };
        if let Some(message) = failure {
            worker.terminate();
            return Err(FuzzError::Load(format!("{}: {}", self.function.name(), message)));
        }

        tracing::debug!("worker loaded '{}'", self.function.name());
        self.worker = Some(worker);
        Ok(())
    }

    fn retire(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            worker.terminate();
        }
    }
}

impl Drop for Runner {
    fn drop(&mut self) {
        self.retire();
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
