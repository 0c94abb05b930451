//! Aggregates channel-level progress into the final [`BatchResult`],
//! computing quota usage and the most common error category.

use std::collections::HashMap;

use crate::error::ErrorCategory;
use crate::model::{BatchResult, BatchTotals, Channel, ChannelSummary};

pub struct Aggregator {
    summaries: Vec<ChannelSummary>,
    error_counts: HashMap<ErrorCategory, u64>,
    /// Insertion order of first occurrence, used to break frequency ties
    /// by first-seen category rather than an arbitrary enum ordering.
    error_first_seen_order: Vec<ErrorCategory>,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl Aggregator {
    pub fn new() -> Self {
        Self {
            summaries: Vec::new(),
            error_counts: HashMap::new(),
            error_first_seen_order: Vec::new(),
        }
    }

    pub fn record_channel(&mut self, channel: Channel, progress: crate::model::ChannelProgress) {
        self.summaries.push(ChannelSummary { channel, progress });
    }

    pub fn record_error(&mut self, category: ErrorCategory) {
        if !self.error_counts.contains_key(&category) {
            self.error_first_seen_order.push(category);
        }
        *self.error_counts.entry(category).or_insert(0) += 1;
    }

    fn most_common_error(&self) -> Option<ErrorCategory> {
        let max_count = self.error_counts.values().copied().max()?;
        self.error_first_seen_order
            .iter()
            .copied()
            .find(|cat| self.error_counts.get(cat) == Some(&max_count))
    }

    pub fn finalize(self, quota_used: u64, duration_sec: f64, cancelled: bool) -> BatchResult {
        let mut totals = BatchTotals {
            videos_total: 0,
            videos_succeeded: 0,
            videos_failed: 0,
            videos_skipped: 0,
        };
        for summary in &self.summaries {
            totals.videos_total += summary.progress.processed;
            totals.videos_succeeded += summary.progress.successes;
            totals.videos_failed += summary.progress.failures;
            totals.videos_skipped += summary.progress.skips;
        }
        BatchResult {
            most_common_error: self.most_common_error(),
            channels: self.summaries,
            totals,
            quota_used,
            duration_sec,
            cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::model::ChannelProgress;

    fn channel(id: &str) -> Channel {
        Channel {
            id: id.to_string(),
            title: "title".to_string(),
            subscriber_count: None,
            video_count: Some(1),
            uploads_list_token: None,
        }
    }

    #[test]
    fn totals_sum_across_channels() {
        let mut agg = Aggregator::new();
        let mut p1 = ChannelProgress::new("UC1", 1, Utc::now());
        p1.processed = 1;
        p1.successes = 1;
        agg.record_channel(channel("UC1"), p1);
        let mut p2 = ChannelProgress::new("UC2", 1, Utc::now());
        p2.processed = 1;
        p2.failures = 1;
        agg.record_channel(channel("UC2"), p2);

        let result = agg.finalize(100, 12.5, false);
        assert_eq!(result.totals.videos_total, 2);
        assert_eq!(result.totals.videos_succeeded, 1);
        assert_eq!(result.totals.videos_failed, 1);
    }

    #[test]
    fn most_common_error_breaks_ties_by_first_seen() {
        let mut agg = Aggregator::new();
        agg.record_error(ErrorCategory::Network);
        agg.record_error(ErrorCategory::Timeout);
        let result = agg.finalize(0, 1.0, false);
        assert_eq!(result.most_common_error, Some(ErrorCategory::Network));
    }

    #[test]
    fn most_common_error_is_none_with_no_errors() {
        let agg = Aggregator::new();
        let result = agg.finalize(0, 1.0, false);
        assert_eq!(result.most_common_error, None);
    }
}
