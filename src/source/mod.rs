//! Record sources.
//!
//! A source answers one question: "give me at most N records with id greater
//! than X, ascending". It holds no engine state; the cursor is always passed
//! in by the caller.

mod memory;
mod sqlite;

pub use memory::MemorySource;
pub use sqlite::SqliteSource;

use crate::models::{Record, SourceError};
use std::future::Future;

/// An ordered, cursor-paginated record store.
pub trait RecordSource: Send + Sync {
    /// Fetch up to `limit` records with `id > after`, ascending by id.
    ///
    /// An empty result means the source is exhausted past `after`.
    fn fetch(
        &self,
        after: i64,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Record>, SourceError>> + Send;

    /// Human-readable description for logs.
    fn describe(&self) -> String;
}

/// Verify a fetched batch honors the pagination contract.
pub fn check_batch(after: i64, limit: usize, records: &[Record]) -> Result<(), SourceError> {
    if records.len() > limit {
        return Err(SourceError::Contract(format!(
            "returned {} records for limit {limit}",
            records.len()
        )));
    }

    let mut prev = after;
    for record in records {
        if record.id <= prev {
            return Err(SourceError::Contract(format!(
                "record id {} not greater than {prev} (cursor {after})",
                record.id
            )));
        }
        prev = record.id;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Label;

    fn rec(id: i64) -> Record {
        Record::new(id, "t", "x", Label::Positive)
    }

    #[test]
    fn test_check_batch_accepts_ascending() {
        assert!(check_batch(0, 3, &[rec(1), rec(4), rec(9)]).is_ok());
        assert!(check_batch(5, 3, &[]).is_ok());
    }

    #[test]
    fn test_check_batch_rejects_violations() {
        assert!(check_batch(0, 2, &[rec(1), rec(2), rec(3)]).is_err());
        assert!(check_batch(3, 5, &[rec(3)]).is_err());
        assert!(check_batch(0, 5, &[rec(2), rec(2)]).is_err());
        assert!(check_batch(0, 5, &[rec(4), rec(2)]).is_err());
    }
}
