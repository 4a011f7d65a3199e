//! Thread backend for functions written in Rust.
//!
//! A plain thread cannot be pre-empted. Terminating a native worker detaches
//! its thread and drops both channel ends, so whatever the function
//! eventually returns is discarded.

use std::panic::{catch_unwind, AssertUnwindSafe};

use super::worker::{FunctionRef, NativeFn, ThreadWorker, Worker, WorkerFactory, WorkerInbox, WorkerMessage};
use super::RunOutcome;
use crate::error::Result;

#[derive(Debug, Default, Clone, Copy)]
pub struct NativeWorkerFactory;

impl WorkerFactory for NativeWorkerFactory {
    fn spawn(&self) -> Result<Box<dyn Worker>> {
        let worker = ThreadWorker::spawn("typefuzz-native", None, serve)?;
        tracing::debug!("spawned native worker");
        Ok(Box::new(worker))
    }
}

fn serve(inbox: WorkerInbox) {
    let mut function: Option<NativeFn> = None;
    while let Some(message) = inbox.recv() {
        match message {
            WorkerMessage::Code(FunctionRef::Native { function: f, .. }) => {
                function = Some(f);
                inbox.reply(RunOutcome::Output { value: None });
            }
            WorkerMessage::Code(FunctionRef::Script { module_ref, .. }) => {
                inbox.reply(RunOutcome::Exception {
                    message: format!("native worker cannot load script module '{}'", module_ref),
                });
            }
            WorkerMessage::Input(args) => {
                let outcome = match &function {
                    Some(f) => call(f, args),
                    None => RunOutcome::Exception {
                        message: "no function loaded".to_string(),
                    },
                };
                inbox.reply(outcome);
            }
            WorkerMessage::Output(_) => {}
        }
    }
}

fn call(function: &NativeFn, args: crate::spec::Args) -> RunOutcome {
    match catch_unwind(AssertUnwindSafe(|| function(args))) {
        Ok(Ok(value)) => RunOutcome::Output { value },
        Ok(Err(message)) => RunOutcome::Exception { message },
        Err(panic) => RunOutcome::Exception {
            message: panic_message(panic.as_ref()),
        },
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "function panicked".to_string()
    }
}
