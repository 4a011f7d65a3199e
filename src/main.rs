//! typefuzz command line: fuzz one JavaScript function against a JSON type
//! declaration and print the session report as JSON on stdout.

use anyhow::{Context, Result};
use clap::Parser;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use typefuzz::engine::{V8WorkerFactory, DEFAULT_HEAP_MEMORY_MAX_MB};
use typefuzz::session::{
    DEFAULT_CAPACITY, DEFAULT_MAX_DUPE_INPUTS, DEFAULT_MAX_DURATION_MS, DEFAULT_MAX_MUTATIONS,
    DEFAULT_MAX_TESTS, DEFAULT_MUTATION_RATE, DEFAULT_SEED, DEFAULT_TIMEOUT_MS,
};
use typefuzz::{apply_overrides, FunctionRef, FuzzSession, Runner, SessionConfig, SpecOverrides, TypeSpec};

/// CLI arguments
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON file with the argument declarations
    #[arg(long)]
    spec: PathBuf,

    /// JavaScript file defining the function under test
    #[arg(long)]
    module: PathBuf,

    /// Name of the function to call
    #[arg(long)]
    function: String,

    /// JSON file with option overrides keyed by argument name
    #[arg(long)]
    overrides: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_SEED)]
    seed: String,

    /// Per-call timeout in milliseconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_MS)]
    timeout_ms: u64,

    /// Leaderboard capacity
    #[arg(long, default_value_t = DEFAULT_CAPACITY)]
    capacity: usize,

    #[arg(long, default_value_t = DEFAULT_MAX_MUTATIONS)]
    max_mutations: usize,

    #[arg(long, default_value_t = DEFAULT_MAX_TESTS)]
    max_tests: usize,

    #[arg(long, default_value_t = DEFAULT_MAX_DURATION_MS)]
    max_duration_ms: u64,

    /// Stop after this many failing tests
    #[arg(long)]
    max_failures: Option<usize>,

    #[arg(long, default_value_t = DEFAULT_MAX_DUPE_INPUTS)]
    max_dupe_inputs: usize,

    #[arg(long, default_value_t = DEFAULT_MUTATION_RATE)]
    mutation_rate: f64,

    /// V8 heap limit per worker, in megabytes
    #[arg(long, default_value_t = DEFAULT_HEAP_MEMORY_MAX_MB)]
    heap_mb: usize,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,
}

impl Cli {
    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            seed: self.seed.clone(),
            timeout_ms: self.timeout_ms,
            capacity: self.capacity,
            max_mutations: self.max_mutations,
            max_tests: self.max_tests,
            max_duration_ms: self.max_duration_ms,
            max_failures: self.max_failures,
            max_dupe_inputs: self.max_dupe_inputs,
            mutation_rate: self.mutation_rate,
        }
    }
}

fn load_specs(cli: &Cli) -> Result<Vec<TypeSpec>> {
    let json = std::fs::read_to_string(&cli.spec)
        .with_context(|| format!("failed to read {}", cli.spec.display()))?;
    let specs = TypeSpec::from_json(&json)
        .with_context(|| format!("invalid declarations in {}", cli.spec.display()))?;

    let Some(path) = &cli.overrides else {
        return Ok(specs);
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let overrides: BTreeMap<String, SpecOverrides> = serde_json::from_str(&json)
        .with_context(|| format!("invalid overrides in {}", path.display()))?;
    apply_overrides(&specs, &overrides).context("failed to apply overrides")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let specs = load_specs(&cli)?;
    let source = std::fs::read_to_string(&cli.module)
        .with_context(|| format!("failed to read {}", cli.module.display()))?;
    let function = FunctionRef::script(&cli.module.display().to_string(), &source, &cli.function);

    let factory = Arc::new(V8WorkerFactory::new(cli.heap_mb * 1024 * 1024));
    let mut runner = Runner::with_factory(function, factory);
    runner
        .warm_up()
        .await
        .with_context(|| format!("failed to load '{}'", cli.function))?;

    tracing::info!(
        "fuzzing '{}' with {} argument(s), seed {:?}",
        cli.function,
        specs.len(),
        cli.seed
    );
    let mut session = FuzzSession::with_runner(specs, runner, cli.session_config())?;

    let abort = session.abort_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted; stopping after the current test");
            abort.abort();
        }
    });

    let report = session.run().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
