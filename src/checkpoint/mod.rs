//! Checkpoint module for resumable aggregation.
//!
//! Provides:
//! - `CheckpointState`: watermark plus accumulators, folded record by record
//! - `FinalResult`: the frozen aggregate written at exhaustion
//! - `CheckpointManager`: atomic persistence with backup fallback
//! - `envelope`: the versioned, checksummed file format

pub mod envelope;
mod state;

pub use state::*;
