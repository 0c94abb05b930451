//! Data model shared by the resolver, pipeline, orchestrator and report.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ErrorCategory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelRefKind {
    Url,
    Handle,
    Id,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRef {
    pub input: String,
    pub kind: ChannelRefKind,
}

impl ChannelRef {
    pub fn new(input: impl Into<String>, kind: ChannelRefKind) -> Self {
        Self {
            input: input.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub title: String,
    pub subscriber_count: Option<u64>,
    pub video_count: Option<u64>,
    pub uploads_list_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Video {
    pub id: String,
    pub channel_id: String,
    pub title: String,
    pub published_at: DateTime<Utc>,
    pub duration_sec: Option<u64>,
    pub is_live: bool,
    pub is_private: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub text: String,
    pub start_sec: f64,
    pub duration_sec: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub video_id: String,
    pub language: String,
    pub auto_generated: bool,
    pub segments: Vec<TranscriptSegment>,
}

impl Transcript {
    pub fn word_count(&self) -> u64 {
        self.segments
            .iter()
            .map(|s| s.text.split_whitespace().count() as u64)
            .sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VideoState {
    Success,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoOutcome {
    pub video_id: String,
    pub state: VideoState,
    pub error_category: Option<ErrorCategory>,
    pub attempts: u32,
    pub processing_sec: f64,
    pub word_count: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelState {
    Pending,
    Validating,
    Running,
    Done,
    Partial,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelProgress {
    pub channel_id: String,
    pub state: ChannelState,
    pub total_videos: u64,
    pub processed: u64,
    pub successes: u64,
    pub failures: u64,
    pub skips: u64,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Video ids committed so far, so a resumed run can skip them instead
    /// of re-processing the whole channel.
    pub committed_video_ids: HashSet<String>,
}

impl ChannelProgress {
    pub fn new(channel_id: impl Into<String>, total_videos: u64, now: DateTime<Utc>) -> Self {
        Self {
            channel_id: channel_id.into(),
            state: ChannelState::Pending,
            total_videos,
            processed: 0,
            successes: 0,
            failures: 0,
            skips: 0,
            started_at: now,
            updated_at: now,
            committed_video_ids: HashSet::new(),
        }
    }

    /// Single place that advances counters and `updated_at` together, so
    /// `processed == successes + failures + skips` always holds.
    pub fn record_outcome(&mut self, outcome: &VideoOutcome, now: DateTime<Utc>) {
        self.processed += 1;
        match outcome.state {
            VideoState::Success => self.successes += 1,
            VideoState::Failed => self.failures += 1,
            VideoState::Skipped => self.skips += 1,
        }
        self.committed_video_ids.insert(outcome.video_id.clone());
        self.updated_at = now;
    }

    pub fn is_complete(&self) -> bool {
        self.processed >= self.total_videos
    }

    /// DONE iff no failures were recorded, including the skips-only case.
    /// FAILED rather than PARTIAL when not a single video succeeded, even
    /// if some were skipped.
    pub fn finalize(&mut self, now: DateTime<Utc>) {
        self.state = if self.failures == 0 {
            ChannelState::Done
        } else if self.successes > 0 {
            ChannelState::Partial
        } else {
            ChannelState::Failed
        };
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSummary {
    pub channel: Channel,
    pub progress: ChannelProgress,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchTotals {
    pub videos_total: u64,
    pub videos_succeeded: u64,
    pub videos_failed: u64,
    pub videos_skipped: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub channels: Vec<ChannelSummary>,
    pub totals: BatchTotals,
    pub quota_used: u64,
    pub duration_sec: f64,
    pub most_common_error: Option<ErrorCategory>,
    pub cancelled: bool,
}

/// Pure mapping from a finished batch to a process exit code, so
/// an external CLI can drive `std::process::exit` without depending on
/// the scheduler's internals. Configuration/validation failures are a
/// separate `Err` path from `BatchOrchestrator::run` and map to `2`
/// there, never reaching this function.
pub fn exit_code(result: &BatchResult) -> i32 {
    if result.channels.is_empty() {
        return 0;
    }
    if result.cancelled {
        return 3;
    }
    let total = result.channels.len();
    let done = result
        .channels
        .iter()
        .filter(|c| c.progress.state == ChannelState::Done)
        .count();
    if done == total {
        return 0;
    }
    if done == 0 && result.most_common_error == Some(ErrorCategory::QuotaExceeded) {
        return 4;
    }
    let failed = result
        .channels
        .iter()
        .filter(|c| c.progress.state == ChannelState::Failed)
        .count();
    if failed == total {
        return 2;
    }
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Event {
    BatchStarted {
        channel_count: usize,
    },
    ChannelStarted {
        channel_id: String,
    },
    VideoDone {
        channel_id: String,
        outcome: VideoOutcome,
    },
    ChannelProgressed {
        progress: ChannelProgress,
    },
    ChannelDone {
        progress: ChannelProgress,
    },
    BatchDone {
        result: BatchResult,
    },
}

impl Event {
    /// CHANNEL_DONE and BATCH_DONE must never be dropped or coalesced by
    /// the event bus under backpressure.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Event::ChannelDone { .. } | Event::BatchDone { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn record_outcome_keeps_processed_in_sync() {
        let mut progress = ChannelProgress::new("UC1", 3, now());
        for state in [VideoState::Success, VideoState::Failed, VideoState::Skipped] {
            progress.record_outcome(
                &VideoOutcome {
                    video_id: "v".into(),
                    state,
                    error_category: None,
                    attempts: 1,
                    processing_sec: 0.1,
                    word_count: Some(10),
                },
                now(),
            );
        }
        assert_eq!(progress.processed, 3);
        assert_eq!(progress.successes + progress.failures + progress.skips, 3);
    }

    #[test]
    fn skips_only_channel_finalizes_done() {
        let mut progress = ChannelProgress::new("UC1", 1, now());
        progress.record_outcome(
            &VideoOutcome {
                video_id: "v".into(),
                state: VideoState::Skipped,
                error_category: None,
                attempts: 0,
                processing_sec: 0.0,
                word_count: None,
            },
            now(),
        );
        progress.finalize(now());
        assert_eq!(progress.state, ChannelState::Done);
    }

    #[test]
    fn finalizes_failed_when_no_successes_despite_skips() {
        let mut progress = ChannelProgress::new("UC1", 2, now());
        progress.record_outcome(
            &VideoOutcome {
                video_id: "v1".into(),
                state: VideoState::Skipped,
                error_category: None,
                attempts: 0,
                processing_sec: 0.0,
                word_count: None,
            },
            now(),
        );
        progress.record_outcome(
            &VideoOutcome {
                video_id: "v2".into(),
                state: VideoState::Failed,
                error_category: None,
                attempts: 1,
                processing_sec: 0.0,
                word_count: None,
            },
            now(),
        );
        progress.finalize(now());
        assert_eq!(progress.state, ChannelState::Failed);
    }

    #[test]
    fn record_outcome_tracks_committed_ids() {
        let mut progress = ChannelProgress::new("UC1", 1, now());
        progress.record_outcome(
            &VideoOutcome {
                video_id: "v1".into(),
                state: VideoState::Success,
                error_category: None,
                attempts: 1,
                processing_sec: 0.1,
                word_count: Some(5),
            },
            now(),
        );
        assert!(progress.committed_video_ids.contains("v1"));
    }

    fn summary_with_state(id: &str, state: ChannelState) -> ChannelSummary {
        let mut progress = ChannelProgress::new(id, 1, now());
        progress.state = state;
        ChannelSummary {
            channel: Channel {
                id: id.to_string(),
                title: id.to_string(),
                subscriber_count: None,
                video_count: Some(1),
                uploads_list_token: None,
            },
            progress,
        }
    }

    fn base_result(channels: Vec<ChannelSummary>) -> BatchResult {
        BatchResult {
            channels,
            totals: BatchTotals {
                videos_total: 0,
                videos_succeeded: 0,
                videos_failed: 0,
                videos_skipped: 0,
            },
            quota_used: 0,
            duration_sec: 1.0,
            most_common_error: None,
            cancelled: false,
        }
    }

    #[test]
    fn exit_code_zero_when_all_channels_done() {
        let result = base_result(vec![summary_with_state("UC1", ChannelState::Done)]);
        assert_eq!(exit_code(&result), 0);
    }

    #[test]
    fn exit_code_one_when_some_done_some_failed() {
        let result = base_result(vec![
            summary_with_state("UC1", ChannelState::Done),
            summary_with_state("UC2", ChannelState::Failed),
        ]);
        assert_eq!(exit_code(&result), 1);
    }

    #[test]
    fn exit_code_two_when_all_channels_failed() {
        let result = base_result(vec![
            summary_with_state("UC1", ChannelState::Failed),
            summary_with_state("UC2", ChannelState::Failed),
        ]);
        assert_eq!(exit_code(&result), 2);
    }

    #[test]
    fn exit_code_three_when_cancelled() {
        let mut result = base_result(vec![summary_with_state("UC1", ChannelState::Partial)]);
        result.cancelled = true;
        assert_eq!(exit_code(&result), 3);
    }

    #[test]
    fn exit_code_four_when_quota_blocked_every_channel() {
        let mut result = base_result(vec![
            summary_with_state("UC1", ChannelState::Failed),
            summary_with_state("UC2", ChannelState::Failed),
        ]);
        result.most_common_error = Some(ErrorCategory::QuotaExceeded);
        assert_eq!(exit_code(&result), 4);

        // Once at least one channel reaches DONE, a quota-caused failure
        // elsewhere is a partial-progress `1`, not `4`.
        let mut mixed = base_result(vec![
            summary_with_state("UC1", ChannelState::Done),
            summary_with_state("UC2", ChannelState::Failed),
        ]);
        mixed.most_common_error = Some(ErrorCategory::QuotaExceeded);
        assert_eq!(exit_code(&mixed), 1);
    }
}
