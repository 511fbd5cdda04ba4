use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::config::{Config, LoggingConfig};
use crate::executor::{initialize, NullHandler};
use crate::model::StateMachine;
use crate::parser::{parse_verify_script, semantic_validator::validate};
use crate::recording::diff_transcripts;
use crate::runner::{run_until_complete, RunOptions};
use crate::simulation::{RandomInterpreter, ScriptInterpreter, TransitionSource, VerifyInterpreter};

#[derive(Parser)]
#[command(name = "cadence")]
#[command(about = "Cadence - stepwise state-table interpreter tooling", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level filter (overrides config file and env vars, not RUST_LOG)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check a state table for structural problems
    Validate {
        /// State table file
        table: PathBuf,
    },

    /// Run a state table without handler code
    Simulate {
        /// State table file
        table: PathBuf,

        /// Replay values from a simulation script
        #[arg(long, conflicts_with_all = ["random", "seed"])]
        script: Option<PathBuf>,

        /// Pick values at random (the default without --script)
        #[arg(long)]
        random: bool,

        /// Seed for random simulation
        #[arg(long)]
        seed: Option<u64>,

        /// Stop after this many steps (default: simulation.max_steps)
        #[arg(long)]
        max_steps: Option<usize>,

        /// Sleep for the waits the table asks for
        #[arg(long)]
        honor_waits: bool,

        /// Print a simulation script that replays this run
        #[arg(long)]
        emit_script: bool,

        /// Print the run as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replay a verification script and check the visit order
    Verify {
        /// State table file
        table: PathBuf,

        /// Verification script file
        script: PathBuf,
    },

    /// Compare two transcripts, ignoring timestamps
    Diff {
        /// Actual transcript
        actual: PathBuf,

        /// Expected transcript
        expected: PathBuf,
    },

    /// Print the effective configuration
    Config,
}

/// Run the CLI by parsing process arguments
pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli).await
}

/// Run the CLI with provided arguments
pub async fn run_cli_from_args(args: Vec<String>) -> Result<()> {
    let cli = Cli::parse_from(args);
    run_cli_with_args(cli).await
}

async fn run_cli_with_args(cli: Cli) -> Result<()> {
    // Load configuration before any command so config errors show first
    let config = Config::builder()
        .config_path(cli.config.clone())
        .log_level(cli.log_level.clone())
        .build()
        .context("Failed to load configuration")?;
    init_logging(&config.logging);

    match cli.command {
        Commands::Validate { table } => {
            let (report, ok) = validate_table(&table)?;
            print!("{}", report);
            if !ok {
                bail!("validation failed for {}", table.display());
            }
        }

        Commands::Simulate {
            table,
            script,
            random,
            seed,
            max_steps,
            honor_waits,
            emit_script,
            json,
        } => {
            if random {
                debug!("random simulation requested explicitly");
            }
            let options = SimulateOptions {
                script,
                seed,
                max_steps,
                honor_waits,
                emit_script,
                json,
            };
            print!("{}", simulate(&table, options, &config).await?);
        }

        Commands::Verify { table, script } => {
            println!("{}", verify(&table, &script, &config).await?);
        }

        Commands::Diff { actual, expected } => {
            let diff = diff_files(&actual, &expected)?;
            if !diff.is_empty() {
                println!("{}", diff);
                bail!("transcripts differ");
            }
            println!("✓ Transcripts match");
        }

        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

/// `RUST_LOG` wins, then the configured level
fn init_logging(logging: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    // A subscriber may already be installed when the CLI is embedded
    let _ = match logging.format.as_str() {
        "compact" => tracing_subscriber::fmt()
            .compact()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init(),
        _ => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init(),
    };
}

/* ===================== Commands ===================== */

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn load_table(path: &Path) -> Result<StateMachine> {
    let source = read_file(path)?;
    StateMachine::compile(&source).with_context(|| format!("Failed to compile {}", path.display()))
}

/// Report for `validate`, and whether the table is free of errors
fn validate_table(path: &Path) -> Result<(String, bool)> {
    let source = read_file(path)?;
    let machine = StateMachine::compile(&source)
        .with_context(|| format!("Failed to compile {}", path.display()))?;
    let result = validate(&machine, Some(&source), None);
    Ok((result.to_string(), !result.has_errors()))
}

struct SimulateOptions {
    script: Option<PathBuf>,
    seed: Option<u64>,
    max_steps: Option<usize>,
    honor_waits: bool,
    emit_script: bool,
    json: bool,
}

async fn simulate(table: &Path, options: SimulateOptions, config: &Config) -> Result<String> {
    let machine = load_table(table)?;

    let mut seed_used = None;
    let source: Box<dyn TransitionSource> = match &options.script {
        Some(path) => Box::new(
            ScriptInterpreter::parse(&read_file(path)?)
                .with_context(|| format!("Failed to parse {}", path.display()))?,
        ),
        None => {
            let mut random = RandomInterpreter::new(&machine, None)
                .with_failure_probability(config.simulation.failure_probability)?;
            if let Some(seed) = options.seed.or(config.simulation.seed) {
                random = random.with_seed(seed);
            }
            seed_used = Some(random.seed());
            Box::new(random)
        }
    };

    let mut interpreter = initialize(machine, NullHandler)
        .pause_wait(config.interpreter.pause_wait_seconds)
        .simulation(source)
        .build()?;
    let run_options = RunOptions {
        max_steps: options.max_steps.unwrap_or(config.simulation.max_steps),
        honor_waits: options.honor_waits,
    };
    let summary = run_until_complete(&mut interpreter, run_options).await?;
    let recording = interpreter.recording();

    if options.json {
        let report = serde_json::json!({
            "task_id": interpreter.task_id(),
            "steps": summary.steps,
            "complete": summary.last.complete,
            "status": summary.last.status,
            "message": summary.last.message,
            "seed": seed_used,
            "recording": recording,
        });
        return Ok(format!("{}\n", serde_json::to_string_pretty(&report)?));
    }

    if options.emit_script {
        return Ok(recording.simulation_script());
    }

    let mut out = format!("{}\n\n", recording.transcript());
    if let Some(seed) = seed_used {
        out.push_str(&format!("Seed: {}\n", seed));
    }
    out.push_str(&format!("Steps: {}\n", summary.steps));
    if summary.reached_limit {
        out.push_str("Status: incomplete (step limit reached)\n");
    } else {
        out.push_str(&format!("Status: {}\n", summary.last.status));
        if let Some(message) = &summary.last.message {
            out.push_str(&format!("Message: {}\n", message));
        }
    }
    Ok(out)
}

async fn verify(table: &Path, script: &Path, config: &Config) -> Result<String> {
    let machine = load_table(table)?;
    let entries = parse_verify_script(&read_file(script)?)
        .with_context(|| format!("Failed to parse {}", script.display()))?;
    let expected = entries.len();

    let mut interpreter = initialize(machine, NullHandler)
        .simulation(VerifyInterpreter::from_entries(entries.clone()))
        .build()?;
    let run_options = RunOptions {
        max_steps: config.simulation.max_steps,
        honor_waits: false,
    };
    let summary = run_until_complete(&mut interpreter, run_options)
        .await
        .context("Verification failed")?;

    let replayed = parse_verify_script(&interpreter.recording().verification_script())?;
    if replayed.len() < expected {
        bail!(
            "Verification failed: task stopped after {} of {} entries (status: {})",
            replayed.len(),
            expected,
            summary.last.status
        );
    }
    Ok(format!(
        "✓ Verified {} entries, status: {}",
        expected, summary.last.status
    ))
}

fn diff_files(actual: &Path, expected: &Path) -> Result<String> {
    Ok(diff_transcripts(&read_file(actual)?, &read_file(expected)?))
}
