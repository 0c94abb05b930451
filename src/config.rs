use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{HarvestError, Result};
use crate::model::{ChannelRef, Video};

pub const MIN_CHANNEL_CONCURRENCY: usize = 1;
pub const MAX_CHANNEL_CONCURRENCY: usize = 10;
pub const MIN_VIDEO_CONCURRENCY: usize = 1;
pub const MAX_VIDEO_CONCURRENCY: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    pub daily_unit_cap: u64,
    pub reset_hour_utc: u32,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            daily_unit_cap: 10_000,
            reset_hour_utc: 0,
        }
    }
}

/// Token-bucket tuning, named to mirror the `rateLimit` request knob:
/// `base`/`burst` seed the bucket, `min`/`max` bound where
/// [`crate::governor::AdaptiveRateLimiter`]'s adaptation can take it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub base_rate_per_sec: f64,
    pub burst_capacity: f64,
    pub min_rate_per_sec: f64,
    pub max_rate_per_sec: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            base_rate_per_sec: 1.0,
            burst_capacity: 60.0,
            min_rate_per_sec: 0.1,
            max_rate_per_sec: 5.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptPreferences {
    pub preferred_languages: Vec<String>,
    pub allow_auto_generated: bool,
}

impl Default for TranscriptPreferences {
    fn default() -> Self {
        Self {
            preferred_languages: vec!["en".to_string()],
            allow_auto_generated: true,
        }
    }
}

/// Filters applied at video-stream emission time, before a video ever
/// reaches the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoFilter {
    pub skip_live: bool,
    pub skip_private: bool,
    pub published_after: Option<DateTime<Utc>>,
    pub published_before: Option<DateTime<Utc>>,
    pub max_videos: Option<u64>,
}

impl Default for VideoFilter {
    fn default() -> Self {
        Self {
            skip_live: true,
            skip_private: true,
            published_after: None,
            published_before: None,
            max_videos: None,
        }
    }
}

impl VideoFilter {
    /// Whether `video` passes every configured filter except `max_videos`,
    /// which the caller enforces as an emission-count cutoff instead.
    pub fn matches(&self, video: &Video) -> bool {
        if self.skip_live && video.is_live {
            return false;
        }
        if self.skip_private && video.is_private {
            return false;
        }
        if let Some(after) = self.published_after {
            if video.published_at < after {
                return false;
            }
        }
        if let Some(before) = self.published_before {
            if video.published_at > before {
                return false;
            }
        }
        true
    }
}

/// Request driving one batch run, built with the same fluent
/// `set_x(mut self, ...) -> Self` pattern the source crate used for its
/// client options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
    pub channels: Vec<ChannelRef>,
    pub channel_concurrency: usize,
    pub video_concurrency: usize,
    pub retry: RetryConfig,
    pub quota: QuotaConfig,
    pub rate_limit: RateLimitConfig,
    pub transcript: TranscriptPreferences,
    pub video_filter: VideoFilter,
    pub checkpoint_path: Option<String>,
    pub resume_from: Option<String>,
    pub soft_memory_ceiling_bytes: Option<u64>,
}

impl Default for BatchRequest {
    fn default() -> Self {
        Self {
            channels: Vec::new(),
            channel_concurrency: 3,
            video_concurrency: 5,
            retry: RetryConfig::default(),
            quota: QuotaConfig::default(),
            rate_limit: RateLimitConfig::default(),
            transcript: TranscriptPreferences::default(),
            video_filter: VideoFilter::default(),
            checkpoint_path: None,
            resume_from: None,
            soft_memory_ceiling_bytes: None,
        }
    }
}

impl BatchRequest {
    pub fn new(channels: Vec<ChannelRef>) -> Self {
        Self {
            channels,
            ..Self::default()
        }
    }

    pub fn set_channel_concurrency(mut self, n: usize) -> Self {
        self.channel_concurrency = n;
        self
    }

    pub fn set_video_concurrency(mut self, n: usize) -> Self {
        self.video_concurrency = n;
        self
    }

    pub fn set_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn set_quota(mut self, quota: QuotaConfig) -> Self {
        self.quota = quota;
        self
    }

    pub fn set_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn set_transcript_preferences(mut self, prefs: TranscriptPreferences) -> Self {
        self.transcript = prefs;
        self
    }

    pub fn set_video_filter(mut self, filter: VideoFilter) -> Self {
        self.video_filter = filter;
        self
    }

    pub fn set_checkpoint_path(mut self, path: impl Into<String>) -> Self {
        self.checkpoint_path = Some(path.into());
        self
    }

    pub fn set_resume_from(mut self, channel_id: impl Into<String>) -> Self {
        self.resume_from = Some(channel_id.into());
        self
    }

    pub fn set_soft_memory_ceiling_bytes(mut self, bytes: u64) -> Self {
        self.soft_memory_ceiling_bytes = Some(bytes);
        self
    }

    /// Validates concurrency bounds. An empty channel list is valid — it
    /// produces a zero-totals `BatchResult` rather than an error.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_CHANNEL_CONCURRENCY..=MAX_CHANNEL_CONCURRENCY).contains(&self.channel_concurrency)
        {
            return Err(HarvestError::ConfigurationError(format!(
                "channel_concurrency must be within {MIN_CHANNEL_CONCURRENCY}..={MAX_CHANNEL_CONCURRENCY}, got {}",
                self.channel_concurrency
            )));
        }
        if !(MIN_VIDEO_CONCURRENCY..=MAX_VIDEO_CONCURRENCY).contains(&self.video_concurrency) {
            return Err(HarvestError::ConfigurationError(format!(
                "video_concurrency must be within {MIN_VIDEO_CONCURRENCY}..={MAX_VIDEO_CONCURRENCY}, got {}",
                self.video_concurrency
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChannelRefKind;

    fn one_channel() -> Vec<ChannelRef> {
        vec![ChannelRef::new("UCabc", ChannelRefKind::Id)]
    }

    fn video(is_live: bool, is_private: bool) -> Video {
        Video {
            id: "v1".to_string(),
            channel_id: "UC1".to_string(),
            title: "title".to_string(),
            published_at: DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            duration_sec: Some(120),
            is_live,
            is_private,
        }
    }

    #[test]
    fn default_request_is_valid_with_channels() {
        let req = BatchRequest::new(one_channel());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_concurrency() {
        let req = BatchRequest::new(one_channel()).set_channel_concurrency(99);
        assert!(req.validate().is_err());
    }

    #[test]
    fn empty_channel_list_is_valid() {
        let req = BatchRequest::new(vec![]);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn builder_pattern_chains() {
        let req = BatchRequest::new(one_channel())
            .set_channel_concurrency(2)
            .set_video_concurrency(4)
            .set_checkpoint_path("/tmp/checkpoint.json");
        assert_eq!(req.channel_concurrency, 2);
        assert_eq!(req.video_concurrency, 4);
        assert_eq!(req.checkpoint_path.as_deref(), Some("/tmp/checkpoint.json"));
    }

    #[test]
    fn video_filter_defaults_skip_live_and_private() {
        let filter = VideoFilter::default();
        assert!(!filter.matches(&video(true, false)));
        assert!(!filter.matches(&video(false, true)));
        assert!(filter.matches(&video(false, false)));
    }

    #[test]
    fn video_filter_published_window() {
        let mut filter = VideoFilter::default();
        filter.skip_live = false;
        filter.skip_private = false;
        filter.published_after = Some(
            DateTime::parse_from_rfc3339("2026-02-01T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        );
        assert!(!filter.matches(&video(false, false)));
    }
}
