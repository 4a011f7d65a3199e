//! Type-directed fuzzing library
//!
//! Given a structural description of a function's arguments, this library
//! generates, mutates and validates concrete inputs, runs the function in an
//! isolated worker with a hard timeout, and keeps the most interesting inputs
//! around for further mutation.
//!
//! # Features
//!
//! - Recursive type specs: numbers, strings, booleans, objects, unions and
//!   literals, each optionally wrapped in array dimensions
//! - Seeded, reproducible generation and mutation
//! - JavaScript functions run in V8 isolates, Rust closures on plain threads
//! - Hung workers are terminated and replaced transparently
//!
//! # Example
//!
//! ```rust,no_run
//! use typefuzz::{FunctionRef, FuzzSession, NumberSpec, SessionConfig, TypeSpec};
//!
//! # async fn demo() -> typefuzz::Result<()> {
//! let specs = vec![TypeSpec::number("n", NumberSpec::new().range(0.0, 100.0).integer(true))];
//! let function = FunctionRef::script(
//!     "inline",
//!     "function half(n) { if (n === 42) throw new Error('boom'); return n / 2; }",
//!     "half",
//! );
//! let mut session = FuzzSession::new(specs, function, SessionConfig::default())?;
//! let report = session.run().await?;
//! println!("{} tests, {} failures", report.tests, report.failures);
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod error;
pub mod generator;
pub mod leaderboard;
pub mod mutator;
pub mod prng;
pub mod session;
pub mod spec;
pub mod validator;

// Re-export commonly used items
pub use engine::{initialize_v8, FunctionRef, RunOutcome, RunResult, Runner};
pub use error::{FuzzError, Result};
pub use generator::{generate, generate_args};
pub use leaderboard::{Leader, Leaderboard};
pub use mutator::{get_mutators, Mutator};
pub use prng::{seeded, Prng};
pub use session::{AbortHandle, FuzzSession, NoveltyScorer, Scorer, SessionConfig, SessionReport, StopReason};
pub use spec::{
    apply_overrides, ArgDecl, Args, BooleanSpec, Interval, NumberSpec, SpecOverrides, StringSpec, TypeKind,
    TypeSpec,
};
pub use validator::{validate, validate_args, validate_value};
