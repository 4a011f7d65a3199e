/// Tests for worker failure handling that do not need V8: a worker that dies
/// without answering, and native functions that panic or hang.

use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use typefuzz::engine::worker::Listener;
use typefuzz::engine::{FunctionRef, RunOutcome, Runner, Worker, WorkerFactory, WorkerMessage, WorkerState};
use typefuzz::FuzzError;

/// Answers the load, then either echoes the first argument or drops the
/// listener without a word.
struct FakeWorker {
    listener: Option<Listener>,
    crash: bool,
    state: WorkerState,
}

impl FakeWorker {
    fn reply(&mut self, outcome: RunOutcome) {
        if let Some(listener) = self.listener.take() {
            let _ = listener.send(WorkerMessage::Output(outcome));
        }
    }
}

impl Worker for FakeWorker {
    fn post_message(&mut self, message: WorkerMessage) -> typefuzz::Result<()> {
        self.state = WorkerState::Running;
        match message {
            WorkerMessage::Code(_) => self.reply(RunOutcome::Output { value: None }),
            WorkerMessage::Input(_) if self.crash => self.listener = None,
            WorkerMessage::Input(args) => self.reply(RunOutcome::Output {
                value: args.into_iter().next().flatten(),
            }),
            WorkerMessage::Output(_) => {}
        }
        Ok(())
    }

    fn on_message(&mut self, listener: Listener) {
        self.listener = Some(listener);
    }

    fn terminate(&mut self) {
        self.state = WorkerState::Terminated;
        self.listener = None;
    }

    fn state(&self) -> WorkerState {
        self.state
    }
}

/// The first worker crashes, later ones behave.
#[derive(Default)]
struct FlakyFactory {
    spawned: AtomicUsize,
}

impl WorkerFactory for FlakyFactory {
    fn spawn(&self) -> typefuzz::Result<Box<dyn Worker>> {
        let n = self.spawned.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeWorker {
            listener: None,
            crash: n == 0,
            state: WorkerState::Uninitialized,
        }))
    }
}

#[tokio::test]
async fn test_silent_worker_death_is_a_crash() {
    let factory = Arc::new(FlakyFactory::default());
    let function = FunctionRef::native("unused", |_| Ok(None));
    let mut runner = Runner::with_factory(function, factory.clone());

    let result = runner
        .run(&vec![Some(json!("a"))], Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(result.outcome, RunOutcome::Crashed);
    assert_eq!(runner.worker_state(), WorkerState::Uninitialized);

    let result = runner
        .run(&vec![Some(json!("b"))], Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(result.outcome, RunOutcome::Output { value: Some(json!("b")) });
    assert_eq!(factory.spawned.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_native_panic_is_an_exception() {
    let mut runner = Runner::new(FunctionRef::native("explode", |args| {
        if args.first().and_then(|a| a.as_ref()) == Some(&json!(0)) {
            panic!("division by zero");
        }
        Ok(Some(json!("fine")))
    }));

    let result = runner
        .run(&vec![Some(json!(0))], Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(
        result.outcome,
        RunOutcome::Exception {
            message: "division by zero".to_string()
        }
    );

    // The same worker keeps serving after a panic.
    let result = runner
        .run(&vec![Some(json!(1))], Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(result.outcome, RunOutcome::Output { value: Some(json!("fine")) });
}

#[tokio::test]
async fn test_native_hang_times_out_and_recovers() {
    let mut runner = Runner::new(FunctionRef::native("slow", |args| {
        if args.first().and_then(|a| a.as_ref()) == Some(&json!(true)) {
            std::thread::sleep(Duration::from_secs(2));
        }
        Ok(Some(json!("done")))
    }));

    let result = runner
        .run(&vec![Some(json!(true))], Duration::from_millis(50))
        .await
        .unwrap();
    assert_eq!(result.outcome, RunOutcome::Timeout);

    let result = runner
        .run(&vec![Some(json!(false))], Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(result.outcome, RunOutcome::Output { value: Some(json!("done")) });
}

#[tokio::test]
async fn test_native_worker_rejects_scripts() {
    let factory = Arc::new(typefuzz::engine::NativeWorkerFactory);
    let mut runner = Runner::with_factory(FunctionRef::script("x.js", "function f() {}", "f"), factory);
    assert!(matches!(
        runner.run(&vec![], Duration::from_secs(5)).await,
        Err(FuzzError::Load(_))
    ));
}
