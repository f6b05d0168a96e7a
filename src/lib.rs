//! wordfold - Resumable word-frequency aggregation over labelled reviews.
//!
//! ## Architecture
//!
//! - **Source**: cursor-paginated reads of `id > watermark`, ascending
//! - **Engine**: fetch → fold → persist → pace, until an empty fetch
//! - **Checkpoint**: watermark and accumulators persisted atomically per batch
//!
//! ## Accumulators
//!
//! Title and text words are counted separately for positive and negative
//! records. A record adds at most one to any word per accumulator, so counts
//! measure how many records mention a word.
//!
//! ## Guarantees
//!
//! - A restart resumes from the last persisted watermark; no record is counted twice
//! - A failed fetch is retried with the same watermark after a backoff delay
//! - A failed checkpoint write stops the run instead of advancing silently

pub mod checkpoint;
pub mod models;
pub mod pipeline;
pub mod source;
pub mod text;

// Re-exports for convenience
pub use checkpoint::{CheckpointManager, CheckpointState, FinalResult};
pub use models::{Accumulators, Config, Label, Record, Result, RunStats, WordCounts, WordfoldError};
pub use pipeline::{Aggregator, Engine, RunOutcome, ShutdownHandle, ShutdownSignal, shutdown_channel};
pub use source::{MemorySource, RecordSource, SqliteSource};
pub use text::{Tokenize, WordFilter, WordTokenizer, tokenize};
