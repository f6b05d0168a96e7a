//! Checkpoint state management for resumable aggregation.
//!
//! - The checkpoint pairs the watermark with the accumulators it produced
//! - State is persisted atomically (write temp, sync, rename)
//! - A missing or corrupt checkpoint means a fresh start
//! - The previous checkpoint is kept as a backup and tried before giving up

use super::envelope::{self, ArtifactKind};
use crate::models::{Accumulators, Record, Result, WordfoldError};
use crate::text::{Tokenize, WordFilter};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Resumable engine state: watermark plus the counts folded up to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointState {
    /// Highest record id fully folded into the accumulators
    pub last_id: i64,
    /// Word counts up to and including `last_id`
    #[serde(flatten)]
    pub accumulators: Accumulators,
    /// Records folded since the checkpoint was first created
    pub records_processed: u64,
    /// Identifies the aggregation this checkpoint belongs to
    pub run_id: Uuid,
    /// When the aggregation started
    pub started_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

impl Default for CheckpointState {
    fn default() -> Self {
        Self::new()
    }
}

impl CheckpointState {
    /// Create empty state at watermark 0.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            last_id: 0,
            accumulators: Accumulators::new(),
            records_processed: 0,
            run_id: Uuid::new_v4(),
            started_at: now,
            updated_at: now,
        }
    }

    /// Fold one record and advance the watermark to its id.
    ///
    /// Records at or below the watermark were already counted and are
    /// skipped; returns whether the record was folded.
    pub fn fold<T: Tokenize + ?Sized>(&mut self, record: &Record, tokenizer: &T) -> bool {
        if record.id <= self.last_id {
            return false;
        }

        let title_words = tokenizer.tokenize(&record.title);
        let text_words = tokenizer.tokenize(&record.text);
        self.accumulators.fold(record, &title_words, &text_words);

        self.last_id = record.id;
        self.records_processed += 1;
        self.updated_at = Utc::now();
        true
    }

    /// Freeze the current counts as the final result.
    pub fn to_result(&self) -> FinalResult {
        FinalResult {
            last_id: self.last_id,
            accumulators: self.accumulators.clone(),
            records_processed: self.records_processed,
            run_id: self.run_id,
            completed_at: Utc::now(),
        }
    }
}

/// Aggregate produced when the source is exhausted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalResult {
    /// Watermark at exhaustion
    pub last_id: i64,
    /// The four word-count maps
    #[serde(flatten)]
    pub accumulators: Accumulators,
    /// Records folded in total
    pub records_processed: u64,
    /// Aggregation that produced this result
    pub run_id: Uuid,
    /// When the source was found exhausted
    pub completed_at: DateTime<Utc>,
}

impl FinalResult {
    /// Copy of the accumulators with the downstream filter applied.
    pub fn prepared(&self, filter: &WordFilter) -> Accumulators {
        filter.apply_all(&self.accumulators)
    }
}

/// Checkpoint manager for persisting and loading checkpoint state.
pub struct CheckpointManager {
    /// Directory for checkpoint files
    dir: PathBuf,
    /// Path to main checkpoint file
    checkpoint_path: PathBuf,
    /// Path to backup file
    backup_path: PathBuf,
    /// Path to final result file
    result_path: PathBuf,
}

impl CheckpointManager {
    /// Create a new checkpoint manager.
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|e| WordfoldError::io("creating checkpoint dir", e))?;

        Ok(Self {
            dir: dir.to_path_buf(),
            checkpoint_path: dir.join("checkpoint.json"),
            backup_path: dir.join("checkpoint.backup.json"),
            result_path: dir.join("result.json"),
        })
    }

    /// Check if a checkpoint exists.
    pub fn exists(&self) -> bool {
        self.checkpoint_path.exists()
    }

    /// Check if a final result exists.
    pub fn has_result(&self) -> bool {
        self.result_path.exists()
    }

    /// Load the checkpoint, falling back to the backup.
    ///
    /// Returns `None` when neither file holds usable state. A corrupt
    /// checkpoint is logged as a warning: starting over means every record
    /// is read again, and counts only stay correct because the fresh run
    /// starts from empty accumulators too.
    pub fn load(&self) -> Option<CheckpointState> {
        for path in [&self.checkpoint_path, &self.backup_path] {
            match Self::read_state(path) {
                Ok(Some(state)) => {
                    info!(
                        path = %path.display(),
                        last_id = state.last_id,
                        records = state.records_processed,
                        "Loaded checkpoint"
                    );
                    return Some(state);
                }
                Ok(None) => debug!(path = %path.display(), "No checkpoint file"),
                Err(e) => warn!(
                    error = %e,
                    "Ignoring unusable checkpoint; records may be re-processed from an earlier watermark"
                ),
            }
        }
        None
    }

    fn read_state(path: &Path) -> Result<Option<CheckpointState>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(WordfoldError::io("reading checkpoint", e)),
        };
        envelope::open(ArtifactKind::Checkpoint, path, &bytes).map(Some)
    }

    /// Save checkpoint to disk (atomic write).
    pub fn save(&self, state: &CheckpointState) -> Result<()> {
        let bytes = envelope::seal(ArtifactKind::Checkpoint, state)?;

        // Backup existing checkpoint
        if self.checkpoint_path.exists() {
            fs::copy(&self.checkpoint_path, &self.backup_path)
                .map_err(|e| WordfoldError::persistence("checkpoint backup", e))?;
        }

        envelope::write_atomic(&self.checkpoint_path, &bytes, "checkpoint")?;

        debug!(last_id = state.last_id, "Checkpoint saved");
        Ok(())
    }

    /// Persist the final result (atomic write).
    pub fn save_result(&self, result: &FinalResult) -> Result<()> {
        let bytes = envelope::seal(ArtifactKind::FinalResult, result)?;
        envelope::write_atomic(&self.result_path, &bytes, "final result")?;
        info!(path = %self.result_path.display(), last_id = result.last_id, "Final result saved");
        Ok(())
    }

    /// Load the last persisted final result.
    pub fn load_result(&self) -> Result<FinalResult> {
        let bytes = match fs::read(&self.result_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(WordfoldError::ResultNotFound(
                    self.result_path.display().to_string(),
                ));
            }
            Err(e) => return Err(WordfoldError::io("reading final result", e)),
        };
        envelope::open(ArtifactKind::FinalResult, &self.result_path, &bytes)
    }

    /// Remove checkpoint, backup and final result.
    pub fn reset(&self) -> Result<()> {
        for path in [&self.checkpoint_path, &self.backup_path, &self.result_path] {
            match fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "Removed"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(WordfoldError::io("removing checkpoint files", e)),
            }
        }
        info!(dir = %self.dir.display(), "Checkpoint state reset");
        Ok(())
    }

    pub fn checkpoint_path(&self) -> &Path {
        &self.checkpoint_path
    }

    /// Get checkpoint directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Label;
    use crate::text::WordTokenizer;
    use tempfile::TempDir;

    fn folded(records: &[Record]) -> CheckpointState {
        let mut state = CheckpointState::new();
        for record in records {
            state.fold(record, &WordTokenizer);
        }
        state
    }

    #[test]
    fn test_fold_advances_watermark_and_skips_seen_ids() {
        let mut state = folded(&[
            Record::new(1, "cat cat dog", "", Label::Positive),
            Record::new(4, "dog", "", Label::Positive),
        ]);
        assert_eq!(state.last_id, 4);
        assert_eq!(state.accumulators.title_pos.get("cat"), 1);
        assert_eq!(state.accumulators.title_pos.get("dog"), 2);

        assert!(!state.fold(&Record::new(4, "dog", "", Label::Positive), &WordTokenizer));
        assert!(!state.fold(&Record::new(2, "dog", "", Label::Positive), &WordTokenizer));
        assert_eq!(state.accumulators.title_pos.get("dog"), 2);
        assert_eq!(state.records_processed, 2);
    }

    #[test]
    fn test_missing_checkpoint_loads_none() {
        let dir = TempDir::new().unwrap();
        let mgr = CheckpointManager::new(dir.path()).unwrap();
        assert!(!mgr.exists());
        assert!(mgr.load().is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let mgr = CheckpointManager::new(dir.path()).unwrap();
        let state = folded(&[Record::new(7, "Great phone", "Works", Label::Positive)]);

        mgr.save(&state).unwrap();
        assert!(mgr.exists());
        assert_eq!(mgr.load().unwrap(), state);
    }

    #[test]
    fn test_corrupt_checkpoint_falls_back_to_backup() {
        let dir = TempDir::new().unwrap();
        let mgr = CheckpointManager::new(dir.path()).unwrap();
        let first = folded(&[Record::new(1, "one", "", Label::Negative)]);
        let mut second = first.clone();
        second.fold(&Record::new(2, "two", "", Label::Negative), &WordTokenizer);

        mgr.save(&first).unwrap();
        mgr.save(&second).unwrap();
        fs::write(mgr.checkpoint_path(), b"{\"format\": \"wordfold.checkpoint\"").unwrap();

        assert_eq!(mgr.load().unwrap(), first);
    }

    #[test]
    fn test_corrupt_checkpoint_without_backup_is_absent() {
        let dir = TempDir::new().unwrap();
        let mgr = CheckpointManager::new(dir.path()).unwrap();
        fs::write(mgr.checkpoint_path(), b"not json at all").unwrap();
        assert!(mgr.exists());
        assert!(mgr.load().is_none());
    }

    #[test]
    fn test_result_roundtrip_and_missing() {
        let dir = TempDir::new().unwrap();
        let mgr = CheckpointManager::new(dir.path()).unwrap();
        assert!(matches!(
            mgr.load_result(),
            Err(WordfoldError::ResultNotFound(_))
        ));

        let result = folded(&[Record::new(3, "Solid build", "", Label::Positive)]).to_result();
        mgr.save_result(&result).unwrap();
        assert!(mgr.has_result());
        assert_eq!(mgr.load_result().unwrap(), result);
    }

    #[test]
    fn test_checkpoint_file_is_not_a_result() {
        let dir = TempDir::new().unwrap();
        let mgr = CheckpointManager::new(dir.path()).unwrap();
        mgr.save(&CheckpointState::new()).unwrap();
        fs::copy(mgr.checkpoint_path(), dir.path().join("result.json")).unwrap();
        assert!(matches!(
            mgr.load_result(),
            Err(WordfoldError::CorruptCheckpoint { .. })
        ));
    }

    #[test]
    fn test_reset_removes_everything() {
        let dir = TempDir::new().unwrap();
        let mgr = CheckpointManager::new(dir.path()).unwrap();
        let state = CheckpointState::new();
        mgr.save(&state).unwrap();
        mgr.save(&state).unwrap();
        mgr.save_result(&state.to_result()).unwrap();

        mgr.reset().unwrap();
        assert!(!mgr.exists());
        assert!(!mgr.has_result());
        assert!(mgr.load().is_none());
        mgr.reset().unwrap();
    }
}
