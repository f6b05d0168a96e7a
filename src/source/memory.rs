//! In-memory record source with failure injection.

use super::RecordSource;
use crate::models::{Record, SourceError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Inner {
    /// Records sorted by id
    records: Vec<Record>,
    /// Remaining injected failures keyed by cursor; `None` key fails any cursor
    failures: HashMap<Option<i64>, u32>,
    /// Every `(after, limit)` the source was asked for
    calls: Vec<(i64, usize)>,
}

/// A record source backed by a sorted `Vec`.
#[derive(Debug, Default)]
pub struct MemorySource {
    inner: Mutex<Inner>,
    injected: AtomicU32,
}

impl MemorySource {
    pub fn new(records: impl IntoIterator<Item = Record>) -> Self {
        let source = Self::default();
        source.extend(records);
        source
    }

    /// Append records, keeping the store sorted and ids unique.
    pub fn extend(&self, records: impl IntoIterator<Item = Record>) {
        let mut inner = self.lock();
        for record in records {
            match inner.records.binary_search_by_key(&record.id, |r| r.id) {
                Ok(pos) => inner.records[pos] = record,
                Err(pos) => inner.records.insert(pos, record),
            }
        }
    }

    /// Fail the next `times` fetches, whatever their cursor.
    pub fn fail_next(&self, times: u32) {
        self.lock().failures.insert(None, times);
    }

    /// Fail the next `times` fetches issued with cursor `after`.
    pub fn fail_at(&self, after: i64, times: u32) {
        self.lock().failures.insert(Some(after), times);
    }

    /// Cursors and limits of every fetch so far, failed ones included.
    pub fn calls(&self) -> Vec<(i64, usize)> {
        self.lock().calls.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Inner holds plain data; a panic elsewhere cannot leave it half-updated
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn take_failure(inner: &mut Inner, after: i64) -> bool {
        for key in [Some(after), None] {
            if let Some(left) = inner.failures.get_mut(&key) {
                if *left > 0 {
                    *left -= 1;
                    return true;
                }
            }
        }
        false
    }
}

impl RecordSource for MemorySource {
    async fn fetch(&self, after: i64, limit: usize) -> Result<Vec<Record>, SourceError> {
        let mut inner = self.lock();
        inner.calls.push((after, limit));

        if Self::take_failure(&mut inner, after) {
            let n = self.injected.fetch_add(1, Ordering::Relaxed) + 1;
            return Err(SourceError::Unavailable(format!("failure #{n} after id {after}")));
        }

        let start = inner.records.partition_point(|r| r.id <= after);
        Ok(inner.records[start..]
            .iter()
            .take(limit)
            .cloned()
            .collect())
    }

    fn describe(&self) -> String {
        format!("memory ({} records)", self.len())
    }
}
