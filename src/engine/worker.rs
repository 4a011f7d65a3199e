//! Message-passing worker abstraction.
//!
//! A [`Worker`] is an isolated execution context driven only through
//! [`WorkerMessage`] envelopes. Replies go to a single-shot listener that the
//! driver replaces before every request, so a stale reply from an earlier
//! request can never be mistaken for the current one.

use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use tokio::sync::oneshot;

use super::native_worker::NativeWorkerFactory;
use super::v8_worker::V8WorkerFactory;
use super::RunOutcome;
use crate::error::{FuzzError, Result};
use crate::spec::Args;

/// A function body executed by the thread backend. `Err` is a thrown exception.
pub type NativeFn = Arc<dyn Fn(Args) -> std::result::Result<Option<Value>, String> + Send + Sync>;

/// Receives the next reply of a worker.
pub type Listener = oneshot::Sender<WorkerMessage>;

#[derive(Clone)]
pub enum FunctionRef {
    /// JavaScript evaluated in a fresh V8 context. `function_name` is then
    /// looked up on the global object.
    Script {
        module_ref: String,
        source: String,
        function_name: String,
    },
    /// A Rust closure run on a dedicated thread.
    Native { name: String, function: NativeFn },
}

impl FunctionRef {
    pub fn script(module_ref: &str, source: &str, function_name: &str) -> Self {
        FunctionRef::Script {
            module_ref: module_ref.to_string(),
            source: source.to_string(),
            function_name: function_name.to_string(),
        }
    }

    pub fn native<F>(name: &str, function: F) -> Self
    where
        F: Fn(Args) -> std::result::Result<Option<Value>, String> + Send + Sync + 'static,
    {
        FunctionRef::Native {
            name: name.to_string(),
            function: Arc::new(function),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FunctionRef::Script { function_name, .. } => function_name,
            FunctionRef::Native { name, .. } => name,
        }
    }

    /// The backend able to run this function.
    pub fn default_factory(&self) -> Arc<dyn WorkerFactory> {
        match self {
            FunctionRef::Script { .. } => Arc::new(V8WorkerFactory::default()),
            FunctionRef::Native { .. } => Arc::new(NativeWorkerFactory),
        }
    }
}

impl fmt::Debug for FunctionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionRef::Script {
                module_ref,
                function_name,
                ..
            } => f
                .debug_struct("Script")
                .field("module_ref", module_ref)
                .field("function_name", function_name)
                .finish(),
            FunctionRef::Native { name, .. } => f.debug_struct("Native").field("name", name).finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum WorkerMessage {
    /// Load the function under test. Answered with an `Output` ack, or an
    /// `Exception` when loading failed.
    Code(FunctionRef),
    /// Call the function with these arguments.
    Input(Args),
    Output(RunOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Uninitialized,
    Running,
    Terminated,
}

pub trait Worker: Send {
    fn post_message(&mut self, message: WorkerMessage) -> Result<()>;

    /// Replaces the listener for the next reply.
    fn on_message(&mut self, listener: Listener);

    /// Stops the worker for good. Pending and future replies are dropped.
    fn terminate(&mut self);

    fn state(&self) -> WorkerState;
}

pub trait WorkerFactory: Send + Sync {
    fn spawn(&self) -> Result<Box<dyn Worker>>;
}

// ── Thread-backed worker ────────────────────────────────────────────────

/// The single reply slot shared by a worker and its thread.
#[derive(Clone, Default)]
pub(crate) struct Mailbox(Arc<Mutex<Option<Listener>>>);

impl Mailbox {
    fn set(&self, listener: Listener) {
        *self.lock() = Some(listener);
    }

    fn deliver(&self, message: WorkerMessage) {
        if let Some(listener) = self.lock().take() {
            // The driver may have given up waiting.
            let _ = listener.send(message);
        }
    }

    fn clear(&self) {
        self.lock().take();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Listener>> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Drops any waiting listener when the worker thread exits, so the driver
/// observes a crash instead of waiting for its timer.
struct ExitGuard(Mailbox);

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.0.clear();
    }
}

/// The worker thread's side of the channel.
pub(crate) struct WorkerInbox {
    rx: mpsc::Receiver<WorkerMessage>,
    mailbox: Mailbox,
    cancelled: Arc<AtomicBool>,
}

impl WorkerInbox {
    /// Blocks for the next request. `None` once the worker is terminated.
    pub(crate) fn recv(&self) -> Option<WorkerMessage> {
        let message = self.rx.recv().ok()?;
        if self.cancelled.load(Ordering::SeqCst) {
            return None;
        }
        Some(message)
    }

    pub(crate) fn reply(&self, outcome: RunOutcome) {
        if !self.cancelled.load(Ordering::SeqCst) {
            self.mailbox.deliver(WorkerMessage::Output(outcome));
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// A worker whose body runs on its own OS thread. `interrupt` is called on
/// termination to pre-empt a body that is stuck; without it the thread is
/// simply detached.
pub(crate) struct ThreadWorker {
    inbox: Option<mpsc::Sender<WorkerMessage>>,
    mailbox: Mailbox,
    cancelled: Arc<AtomicBool>,
    interrupt: Option<Box<dyn Fn() + Send>>,
    state: WorkerState,
}

impl ThreadWorker {
    pub(crate) fn spawn<F>(name: &str, interrupt: Option<Box<dyn Fn() + Send>>, body: F) -> Result<Self>
    where
        F: FnOnce(WorkerInbox) + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let mailbox = Mailbox::default();
        let cancelled = Arc::new(AtomicBool::new(false));
        let inbox = WorkerInbox {
            rx,
            mailbox: mailbox.clone(),
            cancelled: cancelled.clone(),
        };
        let guard = ExitGuard(mailbox.clone());
        thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let _guard = guard;
                body(inbox);
            })
            .map_err(|e| FuzzError::Spawn(e.to_string()))?;

        Ok(Self {
            inbox: Some(tx),
            mailbox,
            cancelled,
            interrupt,
            state: WorkerState::Uninitialized,
        })
    }
}

impl Worker for ThreadWorker {
    fn post_message(&mut self, message: WorkerMessage) -> Result<()> {
        let Some(inbox) = &self.inbox else {
            return Err(FuzzError::RunnerTerminated);
        };
        inbox
            .send(message)
            .map_err(|_| FuzzError::Spawn("worker thread has exited".to_string()))?;
        self.state = WorkerState::Running;
        Ok(())
    }

    fn on_message(&mut self, listener: Listener) {
        if self.state != WorkerState::Terminated {
            self.mailbox.set(listener);
        }
    }

    fn terminate(&mut self) {
        if self.state == WorkerState::Terminated {
            return;
        }
        self.state = WorkerState::Terminated;
        self.cancelled.store(true, Ordering::SeqCst);
        self.inbox = None;
        self.mailbox.clear();
        if let Some(interrupt) = &self.interrupt {
            interrupt();
        }
    }

    fn state(&self) -> WorkerState {
        self.state
    }
}

impl Drop for ThreadWorker {
    fn drop(&mut self) {
        self.terminate();
    }
}
