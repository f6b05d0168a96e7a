//! Trigger-facing entry point.
//!
//! A caller asks for the aggregate and says whether to recompute it from the
//! source or replay the last final result.

use super::engine::{Engine, RunOutcome};
use super::pacer::ShutdownSignal;
use crate::checkpoint::{CheckpointManager, FinalResult};
use crate::models::{Accumulators, Config, Result};
use crate::source::{RecordSource, SqliteSource};
use crate::text::WordFilter;
use tracing::info;

/// Builds engines from configuration and serves the final aggregate.
pub struct Aggregator {
    config: Config,
    filter: WordFilter,
    shutdown: ShutdownSignal,
}

impl Aggregator {
    /// Create an aggregator from validated configuration.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let filter = WordFilter::new(&config.filter);
        Ok(Self {
            config,
            filter,
            shutdown: ShutdownSignal::never(),
        })
    }

    /// Stop recomputation when `signal` fires.
    pub fn with_shutdown(mut self, signal: ShutdownSignal) -> Self {
        self.shutdown = signal;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Open the checkpoint directory named in configuration.
    pub fn checkpoint_manager(&self) -> Result<CheckpointManager> {
        CheckpointManager::new(&self.config.checkpoint.dir)
    }

    /// Recompute from the configured source, or replay the last result.
    pub async fn aggregate(&self, recompute: bool) -> Result<FinalResult> {
        if !recompute {
            return self.replay();
        }
        // An unopenable database is fatal here; only fetches are retried
        let source = SqliteSource::from_config(&self.config)?;
        Ok(self.aggregate_with(source).await?.result)
    }

    /// Run the engine against `source` to exhaustion.
    pub async fn aggregate_with<S: RecordSource>(&self, source: S) -> Result<RunOutcome> {
        let engine = Engine::new(&self.config.engine, source, self.checkpoint_manager()?)
            .with_shutdown(self.shutdown.clone());
        engine.run().await
    }

    /// Load the last persisted final result without touching the source.
    pub fn replay(&self) -> Result<FinalResult> {
        let result = self.checkpoint_manager()?.load_result()?;
        info!(
            last_id = result.last_id,
            records = result.records_processed,
            completed_at = %result.completed_at,
            "Replaying final result"
        );
        Ok(result)
    }

    /// Apply the configured word filter for downstream rendering.
    pub fn prepare(&self, result: &FinalResult) -> Accumulators {
        result.prepared(&self.filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Label, Record, WordfoldError};
    use crate::source::MemorySource;
    use rusqlite::Connection;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.checkpoint.dir = dir.path().join("state");
        config.engine.pacing_delay_ms = 0;
        config.engine.backoff_delay_ms = 1;
        config.engine.progress = false;
        config
    }

    #[tokio::test]
    async fn test_replay_without_result_fails() {
        let dir = TempDir::new().unwrap();
        let aggregator = Aggregator::new(config(&dir)).unwrap();
        assert!(matches!(
            aggregator.aggregate(false).await,
            Err(WordfoldError::ResultNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_replay_returns_last_computed_result() {
        let dir = TempDir::new().unwrap();
        let aggregator = Aggregator::new(config(&dir)).unwrap();
        let source = MemorySource::new([
            Record::new(1, "Battery life", "The battery lasts", Label::Positive),
            Record::new(2, "Battery died", "Battery died fast", Label::Negative),
        ]);

        let computed = aggregator.aggregate_with(source).await.unwrap().result;
        let replayed = aggregator.aggregate(false).await.unwrap();
        assert_eq!(computed, replayed);

        let prepared = aggregator.prepare(&replayed);
        assert_eq!(prepared.text_pos.get("battery"), 1);
        assert_eq!(prepared.text_pos.get("the"), 0);
        assert_eq!(replayed.accumulators.text_pos.get("the"), 1);
    }

    #[tokio::test]
    async fn test_recompute_reads_configured_sqlite() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("reviews.db");
        Connection::open(&db)
            .unwrap()
            .execute_batch(
                "CREATE TABLE reviews (id INTEGER PRIMARY KEY, title TEXT, text TEXT, polarity INTEGER);
                 INSERT INTO reviews VALUES (1, 'Good Day', 'It was good', 2);
                 INSERT INTO reviews VALUES (2, 'Bad Day', 'it was Bad', 1);",
            )
            .unwrap();

        let mut config = config(&dir);
        config.source.uri = db.display().to_string();
        let aggregator = Aggregator::new(config).unwrap();

        let result = aggregator.aggregate(true).await.unwrap();
        assert_eq!(result.last_id, 2);
        assert_eq!(result.accumulators.title_neg.get("bad"), 1);
        assert_eq!(result.accumulators.title_pos.get("day"), 1);
    }

    #[tokio::test]
    async fn test_unopenable_source_fails_before_engine_starts() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir);
        config.source.uri = dir.path().join("missing.db").display().to_string();
        let state_dir = config.checkpoint.dir.clone();
        let aggregator = Aggregator::new(config).unwrap();

        assert!(matches!(
            aggregator.aggregate(true).await,
            Err(WordfoldError::SourceUnavailable(_))
        ));
        assert!(!state_dir.join("checkpoint.json").exists());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir);
        config.engine.batch_size = 0;
        assert!(matches!(
            Aggregator::new(config),
            Err(WordfoldError::Config(_))
        ));
    }
}
