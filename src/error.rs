//! Engine error taxonomy.
//!
//! Only failures of the fuzzing engine itself live here. Exceptions, timeouts
//! and crashes of the function under test are ordinary [`RunOutcome`]s.
//!
//! [`RunOutcome`]: crate::engine::RunOutcome

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FuzzError>;

#[derive(Debug, Error)]
pub enum FuzzError {
    /// A type spec or option set makes no sense (empty charset, inverted bounds, ...).
    #[error("invalid configuration for '{name}': {reason}")]
    Configuration { name: String, reason: String },

    /// An override names a child (or argument) that does not exist.
    #[error("no child named '{child}' under '{parent}'")]
    UnknownChild { parent: String, child: String },

    /// A mutator from a set that has already been applied was used again.
    #[error("mutator '{name}' belongs to a set that was already applied; recompute mutators")]
    AlreadyMutated { name: String },

    #[error("leaderboard is empty")]
    EmptyLeaderboard,

    /// An unresolved type reached generation or validation.
    #[error("type of '{name}' is unresolved")]
    Unresolved { name: String },

    /// The function under test could not be resolved inside the worker.
    #[error("failed to load function: {0}")]
    Load(String),

    #[error("failed to spawn worker: {0}")]
    Spawn(String),

    #[error("runner has been terminated")]
    RunnerTerminated,

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
}

impl FuzzError {
    pub(crate) fn config(name: &str, reason: impl Into<String>) -> Self {
        FuzzError::Configuration {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
