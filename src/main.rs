//! wordfold CLI - Resumable word-frequency aggregation over labelled reviews.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;
use wordfold::models::CountKey;
use wordfold::{Aggregator, Config, SqliteSource, WordfoldError, shutdown_channel};

#[derive(Parser)]
#[command(name = "wordfold")]
#[command(version)]
#[command(about = "Resumable word-frequency aggregation over labelled reviews")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate the source to exhaustion, resuming from the last checkpoint
    Run {
        /// Discard checkpoint and final result before starting
        #[arg(long)]
        fresh: bool,

        /// Override engine.batch_size
        #[arg(long)]
        batch_size: Option<usize>,

        /// Override engine.pacing_delay_ms
        #[arg(long)]
        delay_ms: Option<u64>,
    },

    /// Print the most frequent words of the final result
    Show {
        /// Words per accumulator
        #[arg(short = 'n', long, default_value = "20")]
        top: usize,

        /// Skip the common/short word filter
        #[arg(long)]
        raw: bool,

        /// Recompute from the source instead of replaying the last result
        #[arg(long)]
        recompute: bool,

        /// Also write the four word-count maps as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate configuration file
    Validate,

    /// Show example configuration
    Example,
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");
}

fn print_example_config() {
    let example = r#"# wordfold configuration file

[source]
# SQLite database holding the reviews table (env vars expand)
uri = "${DATABASE_URL}"
table = "reviews"

[engine]
batch_size = 1000
pacing_delay_ms = 1000   # pause between batches
backoff_delay_ms = 5000  # pause before retrying a failed fetch
persist_attempts = 3
progress = true

[checkpoint]
dir = "state"

[filter]
min_word_length = 3
freq_threshold = 0.0004
# extra_common_words = ["product", "item"]
"#;
    println!("{example}");
}

fn load_config(path: &Path) -> Result<Config> {
    let config = Config::from_file(path)
        .with_context(|| format!("Failed to load config from {path:?}"))?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Trigger a cooperative shutdown on Ctrl-C.
fn install_ctrl_c() -> wordfold::ShutdownSignal {
    let (handle, signal) = shutdown_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received, stopping after the current step");
            handle.trigger();
        }
    });
    signal
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Example => {
            print_example_config();
            return Ok(());
        }

        Commands::Validate => {
            let config = load_config(&cli.config)?;
            let uri = config
                .resolve_source_uri()
                .context("Failed to resolve source URI")?;

            info!("Configuration is valid");
            info!("  Source: {} (table {})", uri, config.source.table);
            info!(
                "  Batch size: {}, pacing {}ms, backoff {}ms",
                config.engine.batch_size, config.engine.pacing_delay_ms, config.engine.backoff_delay_ms
            );
            info!("  Checkpoint dir: {:?}", config.checkpoint.dir);
            return Ok(());
        }

        Commands::Run {
            fresh,
            batch_size,
            delay_ms,
        } => {
            let mut config = load_config(&cli.config)?;
            if let Some(n) = batch_size {
                config.engine.batch_size = n;
            }
            if let Some(ms) = delay_ms {
                config.engine.pacing_delay_ms = ms;
            }

            let aggregator = Aggregator::new(config)?.with_shutdown(install_ctrl_c());
            if fresh {
                aggregator
                    .checkpoint_manager()?
                    .reset()
                    .context("Failed to reset checkpoint")?;
            }

            let source = SqliteSource::from_config(aggregator.config())
                .context("Failed to open record source")?;

            let outcome = match aggregator.aggregate_with(source).await {
                Ok(outcome) => outcome,
                Err(WordfoldError::Cancelled { last_id }) => {
                    println!("\nStopped at id {last_id}; run again to resume.");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            };
            let stats = outcome.stats;

            println!("\n=== Aggregation Complete ===");
            println!("Resumed:     {}", if stats.resumed { "yes" } else { "no" });
            println!("Start id:    {}", stats.start_last_id);
            println!("Last id:     {}", stats.last_id);
            println!("Records:     {} this run, {} total", stats.records_processed, stats.total_records);
            println!("Batches:     {}", stats.batches);
            println!("Retries:     {}", stats.fetch_retries);
            println!("Throughput:  {:.0}/s", stats.throughput_per_sec);
            println!("Runtime:     {:.1}s", stats.runtime_secs);
        }

        Commands::Show {
            top,
            raw,
            recompute,
            output,
        } => {
            let config = load_config(&cli.config)?;
            let aggregator = Aggregator::new(config)?.with_shutdown(install_ctrl_c());
            let result = aggregator.aggregate(recompute).await?;

            let counts = if raw {
                result.accumulators.clone()
            } else {
                aggregator.prepare(&result)
            };

            println!(
                "Final result: last id {}, {} records, completed {}",
                result.last_id, result.records_processed, result.completed_at
            );
            for key in CountKey::ALL {
                let words = counts.get(key);
                println!("\n== {key} ({} words) ==", words.len());
                for (word, count) in words.top(top) {
                    println!("{count:>10}  {word}");
                }
            }

            if let Some(path) = output {
                let json = serde_json::to_string_pretty(&counts)
                    .context("Failed to serialize word counts")?;
                std::fs::write(&path, json)
                    .with_context(|| format!("Failed to write {path:?}"))?;
                println!("\nOutput:      {path:?}");
            }
        }
    }

    Ok(())
}
