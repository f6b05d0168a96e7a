//! Records read from the source and per-run statistics.

use serde::{Deserialize, Serialize};

/// Polarity code the record store uses for positive reviews.
pub const POSITIVE_POLARITY: i64 = 2;

/// Binary label partitioning the accumulators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Positive,
    Negative,
}

impl Label {
    /// Map a raw polarity code onto the binary partition.
    ///
    /// Only [`POSITIVE_POLARITY`] is positive. Every other value, including
    /// codes outside the documented domain, is negative.
    pub fn from_polarity(polarity: i64) -> Self {
        if polarity == POSITIVE_POLARITY {
            Self::Positive
        } else {
            Self::Negative
        }
    }

    pub fn is_positive(self) -> bool {
        self == Self::Positive
    }
}

/// One unit read from the source. Immutable once read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Strictly increasing id; doubles as the cursor
    pub id: i64,
    pub title: String,
    pub text: String,
    pub label: Label,
}

impl Record {
    pub fn new(id: i64, title: impl Into<String>, text: impl Into<String>, label: Label) -> Self {
        Self {
            id,
            title: title.into(),
            text: text.into(),
            label,
        }
    }
}

/// Statistics for a single engine run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    /// Records folded during this run
    pub records_processed: u64,

    /// Records folded across every run sharing the checkpoint
    pub total_records: u64,

    /// Non-empty batches folded during this run
    pub batches: u64,

    /// Fetch attempts that failed and were retried
    pub fetch_retries: u64,

    /// Whether the run started from a persisted checkpoint
    pub resumed: bool,

    /// Watermark the run started from
    pub start_last_id: i64,

    /// Watermark when the run ended
    pub last_id: i64,

    /// Total runtime in seconds
    pub runtime_secs: f64,

    /// Records per second over this run
    pub throughput_per_sec: f64,
}

impl RunStats {
    /// Calculate derived stats.
    pub fn finalize(&mut self) {
        if self.runtime_secs > 0.0 {
            self.throughput_per_sec = self.records_processed as f64 / self.runtime_secs;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_sentinel_polarity_is_positive() {
        assert_eq!(Label::from_polarity(2), Label::Positive);
        assert_eq!(Label::from_polarity(1), Label::Negative);
        assert_eq!(Label::from_polarity(0), Label::Negative);
        assert_eq!(Label::from_polarity(3), Label::Negative);
        assert_eq!(Label::from_polarity(-2), Label::Negative);
    }

    #[test]
    fn test_run_stats_throughput() {
        let mut stats = RunStats {
            records_processed: 500,
            runtime_secs: 2.0,
            ..Default::default()
        };
        stats.finalize();
        assert_eq!(stats.throughput_per_sec, 250.0);

        let mut idle = RunStats::default();
        idle.finalize();
        assert_eq!(idle.throughput_per_sec, 0.0);
    }
}
