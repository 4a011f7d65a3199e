//! The fuzzing loop.
//!
//! A [`FuzzSession`] owns every piece of mutable state of one run: the seeded
//! generator, the leaderboard, the runner and the scorer. Nothing here is
//! shared with the worker beyond the argument copies sent to it.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::engine::{FunctionRef, RunOutcome, RunResult, Runner};
use crate::error::{FuzzError, Result};
use crate::generator::generate_args;
use crate::leaderboard::{Leader, Leaderboard};
use crate::mutator::get_mutators;
use crate::prng::{seeded, Prng};
use crate::spec::{Args, TypeSpec};
use crate::validator::validate_args;

pub const DEFAULT_SEED: &str = "typefuzz";
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_CAPACITY: usize = 32;
pub const DEFAULT_MAX_MUTATIONS: usize = 3;
pub const DEFAULT_MAX_TESTS: usize = 1000;
pub const DEFAULT_MAX_DURATION_MS: u64 = 60_000;
pub const DEFAULT_MAX_DUPE_INPUTS: usize = 1000;
pub const DEFAULT_MUTATION_RATE: f64 = 0.5;

pub const NEW_OUTPUT_SCORE: f64 = 1.0;
pub const NEW_EXCEPTION_SCORE: f64 = 5.0;
pub const FIRST_HANG_SCORE: f64 = 2.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionConfig {
    pub seed: String,
    /// Per-call timeout.
    pub timeout_ms: u64,
    /// Leaderboard size.
    pub capacity: usize,
    /// Upper bound of mutations stacked on one leader.
    pub max_mutations: usize,
    pub max_tests: usize,
    pub max_duration_ms: u64,
    /// Stop after this many exceptions, timeouts and crashes.
    pub max_failures: Option<usize>,
    /// Stop after this many consecutive candidates that were duplicates or
    /// failed validation.
    pub max_dupe_inputs: usize,
    /// Chance of mutating a leader instead of generating from scratch.
    pub mutation_rate: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            capacity: DEFAULT_CAPACITY,
            max_mutations: DEFAULT_MAX_MUTATIONS,
            max_tests: DEFAULT_MAX_TESTS,
            max_duration_ms: DEFAULT_MAX_DURATION_MS,
            max_failures: None,
            max_dupe_inputs: DEFAULT_MAX_DUPE_INPUTS,
            mutation_rate: DEFAULT_MUTATION_RATE,
        }
    }
}

impl SessionConfig {
    fn check(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(FuzzError::config("session", "timeoutMs must be positive"));
        }
        if self.max_mutations == 0 {
            return Err(FuzzError::config("session", "maxMutations must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(FuzzError::config(
                "session",
                format!("mutationRate {} is outside [0, 1]", self.mutation_rate),
            ));
        }
        Ok(())
    }
}

/// Rates how interesting a result is. Positive scores are offered to the
/// leaderboard.
pub trait Scorer {
    fn score(&mut self, input: &Args, result: &RunResult) -> f64;
}

/// Rewards outcomes never seen before in this session.
#[derive(Debug, Default)]
pub struct NoveltyScorer {
    outputs: HashSet<String>,
    exceptions: HashSet<String>,
    timed_out: bool,
    crashed: bool,
}

impl Scorer for NoveltyScorer {
    fn score(&mut self, _input: &Args, result: &RunResult) -> f64 {
        let novel = match &result.outcome {
            RunOutcome::Output { value } => {
                let key = serde_json::to_string(value).unwrap_or_default();
                self.outputs.insert(key)
            }
            RunOutcome::Exception { message } => {
                return if self.exceptions.insert(message.clone()) {
                    NEW_EXCEPTION_SCORE
                } else {
                    0.0
                };
            }
            RunOutcome::Timeout => {
                return if std::mem::replace(&mut self.timed_out, true) {
                    0.0
                } else {
                    FIRST_HANG_SCORE
                };
            }
            RunOutcome::Crashed => {
                return if std::mem::replace(&mut self.crashed, true) {
                    0.0
                } else {
                    FIRST_HANG_SCORE
                };
            }
        };
        if novel {
            NEW_OUTPUT_SCORE
        } else {
            0.0
        }
    }
}

/// Stops a running session from another task or thread.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    MaxTests,
    MaxDuration,
    MaxFailures,
    MaxDupeInputs,
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestRecord {
    pub input: Args,
    #[serde(flatten)]
    pub result: RunResult,
    pub score: f64,
    /// Derived from a leader rather than freshly generated.
    pub mutated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub tests: usize,
    pub failures: usize,
    /// Candidates dropped as duplicates or as invalid.
    pub skipped: usize,
    pub results: Vec<TestRecord>,
    pub leaders: Vec<Leader<Args>>,
    pub stop_reason: StopReason,
    pub elapsed_ms: u64,
}

pub struct FuzzSession {
    specs: Vec<TypeSpec>,
    config: SessionConfig,
    rng: Prng,
    leaderboard: Leaderboard<Args>,
    runner: Runner,
    scorer: Box<dyn Scorer + Send>,
    abort: AbortHandle,
    seen: HashSet<String>,
}

impl FuzzSession {
    pub fn new(specs: Vec<TypeSpec>, function: FunctionRef, config: SessionConfig) -> Result<Self> {
        Self::with_runner(specs, Runner::new(function), config)
    }

    pub fn with_runner(specs: Vec<TypeSpec>, runner: Runner, config: SessionConfig) -> Result<Self> {
        config.check()?;
        for spec in &specs {
            spec.is_option_valid()?;
        }
        Ok(Self {
            rng: seeded(&config.seed),
            leaderboard: Leaderboard::new(config.capacity)?,
            specs,
            config,
            runner,
            scorer: Box::new(NoveltyScorer::default()),
            abort: AbortHandle::default(),
            seen: HashSet::new(),
        })
    }

    pub fn with_scorer<S: Scorer + Send + 'static>(mut self, scorer: S) -> Self {
        self.scorer = Box::new(scorer);
        self
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn leaderboard(&self) -> &Leaderboard<Args> {
        &self.leaderboard
    }

    /// Runs until a budget is exhausted or the session is aborted. Failures
    /// of the function under test are results; only engine errors are `Err`.
    pub async fn run(&mut self) -> Result<SessionReport> {
        let started = Instant::now();
        let max_duration = Duration::from_millis(self.config.max_duration_ms);
        let timeout = Duration::from_millis(self.config.timeout_ms);

        let mut results = Vec::new();
        let mut tests = 0;
        let mut failures = 0;
        let mut skipped = 0;
        let mut stale = 0;

        let stop_reason = loop {
            if self.abort.is_aborted() {
                break StopReason::Aborted;
            }
            if tests >= self.config.max_tests {
                break StopReason::MaxTests;
            }
            if started.elapsed() >= max_duration {
                break StopReason::MaxDuration;
            }
            if self.config.max_failures.is_some_and(|max| failures >= max) {
                break StopReason::MaxFailures;
            }
            if stale >= self.config.max_dupe_inputs {
                break StopReason::MaxDupeInputs;
            }

            let (input, mutated) = self.next_input()?;
            if !validate_args(&input, &self.specs)? {
                tracing::warn!("skipping invalid candidate {}", serde_json::to_string(&input)?);
                skipped += 1;
                stale += 1;
                continue;
            }
            if !self.seen.insert(serde_json::to_string(&input)?) {
                skipped += 1;
                stale += 1;
                continue;
            }
            stale = 0;

            let result = self.runner.run(&input, timeout).await?;
            tests += 1;
            if result.outcome.is_failure() {
                failures += 1;
            }
            let score = self.scorer.score(&input, &result);
            if score > 0.0 && self.leaderboard.post_score(input.clone(), score) {
                tracing::debug!("leaderboard admitted input with score {}", score);
            }
            results.push(TestRecord {
                input,
                result,
                score,
                mutated,
            });
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            "session stopped ({:?}) after {} tests, {} failures, {} skipped in {}ms",
            stop_reason,
            tests,
            failures,
            skipped,
            elapsed_ms
        );

        Ok(SessionReport {
            tests,
            failures,
            skipped,
            results,
            leaders: self.leaderboard.get_leaders().to_vec(),
            stop_reason,
            elapsed_ms,
        })
    }

    /// A mutated leader with probability `mutationRate`, else a fresh input.
    fn next_input(&mut self) -> Result<(Args, bool)> {
        if self.leaderboard.is_empty() || !self.rng.gen_bool(self.config.mutation_rate) {
            return Ok((generate_args(&self.specs, &mut self.rng)?, false));
        }
        let mut input = self.leaderboard.get_random_leader(&mut self.rng)?.clone();
        let rounds = self.rng.gen_range(1..=self.config.max_mutations);
        for _ in 0..rounds {
            let mutators = get_mutators(&self.specs, &input, &mut self.rng)?;
            if mutators.is_empty() {
                break;
            }
            let mutator = &mutators[self.rng.gen_range(0..mutators.len())];
            input = mutator.apply(&input)?;
        }
        Ok((input, true))
    }
}
