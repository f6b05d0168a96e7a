//! Aggregation checkpoint engine.
//!
//! Loop flow:
//! Load checkpoint → Fetch after watermark → Fold → Persist → Pace → Fetch …
//!
//! An empty fetch ends the run. A failed fetch backs off and retries the same
//! cursor; nothing is folded from a failed or partial batch. The checkpoint
//! is only written once a whole batch is folded, and cancellation is only
//! observed while fetching or sleeping, so the persisted watermark always
//! matches the persisted counts.

use super::pacer::{Pacer, ShutdownSignal, Tick};
use crate::checkpoint::{CheckpointManager, CheckpointState, FinalResult};
use crate::models::{EngineConfig, Result, RunStats, WordfoldError};
use crate::source::{RecordSource, check_batch};
use crate::text::{Tokenize, WordTokenizer};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Where the engine is in its batch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    Init,
    Resuming,
    Fresh,
    Fetching,
    Backoff,
    Folding,
    Persisting,
    Pacing,
    /// Terminal: source exhausted, final result written
    Exhausted,
    /// Terminal: shutdown requested, last checkpoint kept
    Cancelled,
}

/// What a completed run hands back.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub result: FinalResult,
    pub stats: RunStats,
}

/// Drives the fetch → fold → persist → pace loop to exhaustion.
pub struct Engine<S, T = WordTokenizer> {
    source: S,
    tokenizer: T,
    checkpoint: CheckpointManager,
    config: EngineConfig,
    shutdown: ShutdownSignal,
    phase: watch::Sender<EnginePhase>,
}

impl<S: RecordSource> Engine<S, WordTokenizer> {
    /// Create an engine using the default tokenizer.
    pub fn new(config: &EngineConfig, source: S, checkpoint: CheckpointManager) -> Self {
        Self::with_tokenizer(config, source, WordTokenizer, checkpoint)
    }
}

impl<S: RecordSource, T: Tokenize> Engine<S, T> {
    /// Create an engine with a custom tokenizer.
    pub fn with_tokenizer(
        config: &EngineConfig,
        source: S,
        tokenizer: T,
        checkpoint: CheckpointManager,
    ) -> Self {
        let (phase, _) = watch::channel(EnginePhase::Init);
        Self {
            source,
            tokenizer,
            checkpoint,
            config: config.clone(),
            shutdown: ShutdownSignal::never(),
            phase,
        }
    }

    /// Stop the loop when `signal` fires.
    pub fn with_shutdown(mut self, signal: ShutdownSignal) -> Self {
        self.shutdown = signal;
        self
    }

    /// Observe phase transitions.
    pub fn subscribe_phase(&self) -> watch::Receiver<EnginePhase> {
        self.phase.subscribe()
    }

    pub fn phase(&self) -> EnginePhase {
        *self.phase.borrow()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn checkpoint(&self) -> &CheckpointManager {
        &self.checkpoint
    }

    fn enter(&self, phase: EnginePhase) {
        self.phase.send_replace(phase);
        debug!(?phase, "Engine phase");
    }

    /// Run the batch loop until the source is exhausted.
    ///
    /// Resumes from the persisted checkpoint when one is usable. Source
    /// failures are retried forever; persistence failures and cancellation
    /// end the run with an error.
    pub async fn run(&self) -> Result<RunOutcome> {
        if self.config.batch_size == 0 {
            return Err(WordfoldError::InvalidInput(
                "batch_size must be at least 1".to_string(),
            ));
        }

        let start = Instant::now();
        self.enter(EnginePhase::Init);

        let (mut state, resumed) = match self.checkpoint.load() {
            Some(state) => {
                self.enter(EnginePhase::Resuming);
                (state, true)
            }
            None => {
                self.enter(EnginePhase::Fresh);
                (CheckpointState::new(), false)
            }
        };

        let mut stats = RunStats {
            resumed,
            start_last_id: state.last_id,
            last_id: state.last_id,
            ..Default::default()
        };

        info!(
            source = %self.source.describe(),
            last_id = state.last_id,
            records = state.records_processed,
            resumed,
            batch_size = self.config.batch_size,
            "Starting aggregation"
        );

        let mut pacer = Pacer::new(
            self.config.pacing_delay(),
            self.config.backoff_delay(),
            self.shutdown.clone(),
        );
        let pb = self.progress_bar(state.records_processed);

        loop {
            self.enter(EnginePhase::Fetching);
            let fetched = tokio::select! {
                biased;
                _ = pacer.cancelled() => return Err(self.cancelled(&state, &pb)),
                fetched = self.source.fetch(state.last_id, self.config.batch_size) => fetched,
            };

            let batch = match fetched
                .and_then(|batch| check_batch(state.last_id, self.config.batch_size, &batch).map(|_| batch))
            {
                Ok(batch) => batch,
                Err(e) => {
                    stats.fetch_retries += 1;
                    warn!(
                        error = %e,
                        last_id = state.last_id,
                        attempt = pacer.consecutive_failures() + 1,
                        retry_in_ms = pacer.backoff_delay().as_millis() as u64,
                        "Fetch failed, backing off"
                    );
                    self.enter(EnginePhase::Backoff);
                    if pacer.backoff().await == Tick::Cancelled {
                        return Err(self.cancelled(&state, &pb));
                    }
                    continue;
                }
            };

            if batch.is_empty() {
                break;
            }

            self.enter(EnginePhase::Folding);
            let mut folded = 0u64;
            for record in &batch {
                if state.fold(record, &self.tokenizer) {
                    folded += 1;
                } else {
                    warn!(id = record.id, last_id = state.last_id, "Skipping already counted record");
                }
            }

            self.enter(EnginePhase::Persisting);
            self.persist(&state).await?;

            stats.batches += 1;
            stats.records_processed += folded;
            stats.last_id = state.last_id;

            info!(
                records = state.records_processed,
                batch = folded,
                last_id = state.last_id,
                "Batch folded"
            );
            pb.set_position(state.records_processed);
            pb.set_message(format!("last id {}", state.last_id));

            self.enter(EnginePhase::Pacing);
            if pacer.pace().await == Tick::Cancelled {
                return Err(self.cancelled(&state, &pb));
            }
        }

        self.enter(EnginePhase::Exhausted);
        let result = state.to_result();
        self.checkpoint.save_result(&result)?;

        pb.finish_with_message(format!("exhausted at id {}", state.last_id));

        stats.total_records = state.records_processed;
        stats.last_id = state.last_id;
        stats.runtime_secs = start.elapsed().as_secs_f64();
        stats.finalize();

        info!(
            records = stats.records_processed,
            total = stats.total_records,
            batches = stats.batches,
            retries = stats.fetch_retries,
            last_id = stats.last_id,
            throughput_per_sec = stats.throughput_per_sec,
            "Source exhausted, aggregation complete"
        );

        Ok(RunOutcome { result, stats })
    }

    /// Write the checkpoint, retrying the same write a bounded number of times.
    ///
    /// State stays in memory between attempts, so a retry writes exactly what
    /// the failed attempt would have.
    async fn persist(&self, state: &CheckpointState) -> Result<()> {
        let attempts = self.config.persist_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.checkpoint.save(state) {
                Ok(()) => return Ok(()),
                Err(e) if attempt < attempts => {
                    error!(error = %e, attempt, attempts, last_id = state.last_id, "Checkpoint write failed, retrying");
                    attempt += 1;
                    tokio::time::sleep(self.config.backoff_delay()).await;
                }
                Err(e) => {
                    error!(error = %e, attempts, last_id = state.last_id, "Checkpoint write failed, stopping");
                    return Err(e);
                }
            }
        }
    }

    fn cancelled(&self, state: &CheckpointState, pb: &ProgressBar) -> WordfoldError {
        self.enter(EnginePhase::Cancelled);
        pb.abandon_with_message(format!("cancelled at id {}", state.last_id));
        info!(last_id = state.last_id, "Shutdown requested, stopping at last checkpoint");
        WordfoldError::Cancelled {
            last_id: state.last_id,
        }
    }

    fn progress_bar(&self, position: u64) -> ProgressBar {
        if !self.config.progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner} [{elapsed_precise}] {pos} records {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(200));
        pb.set_position(position);
        pb
    }
}
