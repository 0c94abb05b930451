//! Resolves a [`ChannelRef`] to a [`Channel`] and exposes its uploads as a
//! lazy, page-at-a-time stream.

use std::pin::Pin;
use std::sync::Arc;

use futures_core::Stream;
use url::Url;

use crate::cancel::BatchCancellation;
use crate::config::{RetryConfig, VideoFilter};
use crate::error::{HarvestError, Result};
use crate::governor::{QuotaDecision, QuotaTracker};
use crate::model::{Channel, ChannelRef, ChannelRefKind, Video};
use crate::origins::MetadataOrigin;
use crate::retry;

pub fn parse_channel_ref(input: &str) -> ChannelRef {
    if let Ok(parsed) = Url::parse(input) {
        match parsed.host_str() {
            Some("www.youtube.com") | Some("youtube.com") | Some("m.youtube.com") => {
                let path = parsed.path();
                if let Some(handle) = path.strip_prefix("/@") {
                    return ChannelRef::new(format!("@{handle}"), ChannelRefKind::Handle);
                }
                if let Some(id) = path.strip_prefix("/channel/") {
                    return ChannelRef::new(id.to_string(), ChannelRefKind::Id);
                }
                ChannelRef::new(input.to_string(), ChannelRefKind::Url)
            }
            _ => ChannelRef::new(input.to_string(), ChannelRefKind::Url),
        }
    } else if let Some(handle) = input.strip_prefix('@') {
        ChannelRef::new(format!("@{handle}"), ChannelRefKind::Handle)
    } else if is_valid_channel_id(input) {
        ChannelRef::new(input.to_string(), ChannelRefKind::Id)
    } else {
        ChannelRef::new(input.to_string(), ChannelRefKind::Handle)
    }
}

pub fn is_valid_channel_id(id: &str) -> bool {
    id.starts_with("UC") && id.len() == 24 && id.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-')
}

pub type VideoStreamItem = Result<Video>;
pub type VideoStream = Pin<Box<dyn Stream<Item = VideoStreamItem> + Send>>;

/// Waits out quota backpressure and surfaces a terminal error once the
/// daily cap is truly exhausted. A zero-cost call never touches the
/// tracker.
async fn reserve_quota(quota: &QuotaTracker, cost: u64) -> Result<()> {
    if cost == 0 {
        return Ok(());
    }
    loop {
        match quota.try_consume(cost).await {
            QuotaDecision::Granted => return Ok(()),
            QuotaDecision::WaitUntil(instant) => tokio::time::sleep_until(instant).await,
            QuotaDecision::Exhausted => {
                return Err(HarvestError::QuotaExceeded(
                    "metadata quota exhausted".to_string(),
                ))
            }
        }
    }
}

/// Resolves channel references and exposes their uploads lazily. Every
/// origin call reserves quota before it runs and refunds it on failure,
/// so a retried call never double-charges the budget.
pub struct ChannelResolver {
    origin: Arc<dyn MetadataOrigin>,
    quota: Arc<QuotaTracker>,
    retry_config: RetryConfig,
}

impl ChannelResolver {
    pub fn new(
        origin: Arc<dyn MetadataOrigin>,
        quota: Arc<QuotaTracker>,
        retry_config: RetryConfig,
    ) -> Self {
        Self {
            origin,
            quota,
            retry_config,
        }
    }

    pub async fn resolve(&self, channel_ref: &ChannelRef, cancel: &BatchCancellation) -> Result<Channel> {
        if channel_ref.input.trim().is_empty() {
            return Err(HarvestError::InvalidChannelRef(
                "channel reference is empty".to_string(),
            ));
        }
        let cost = self.origin.resolve_channel_cost();
        let origin = self.origin.clone();
        let quota = self.quota.clone();
        let channel_ref = channel_ref.clone();
        retry::run(
            move |_attempt| {
                let origin = origin.clone();
                let quota = quota.clone();
                let channel_ref = channel_ref.clone();
                async move {
                    reserve_quota(&quota, cost).await?;
                    let result = origin.resolve_channel(&channel_ref).await;
                    if result.is_err() {
                        quota.refund(cost).await;
                    }
                    result
                }
            },
            &self.retry_config,
            cancel,
        )
        .await
    }

    /// Streams a channel's uploads one page at a time, applying `filter`
    /// at emission time so a skipped video never reaches the pipeline.
    /// Never buffers more than a single page, leaving pacing to the
    /// caller.
    pub fn video_stream(
        &self,
        channel: Channel,
        filter: VideoFilter,
        cancel: BatchCancellation,
    ) -> VideoStream {
        let origin = self.origin.clone();
        let quota = self.quota.clone();
        let retry_config = self.retry_config.clone();
        let cost = self.origin.list_videos_cost();
        Box::pin(async_stream::try_stream! {
            let mut page_token: Option<String> = None;
            let mut emitted: u64 = 0;
            loop {
                if let Some(max) = filter.max_videos {
                    if emitted >= max {
                        break;
                    }
                }

                let origin = origin.clone();
                let quota = quota.clone();
                let token = page_token.clone();
                let channel = channel.clone();
                let page = retry::run(
                    move |_attempt| {
                        let origin = origin.clone();
                        let quota = quota.clone();
                        let token = token.clone();
                        let channel = channel.clone();
                        async move {
                            reserve_quota(&quota, cost).await?;
                            let result = origin.list_videos(&channel, token.as_deref()).await;
                            if result.is_err() {
                                quota.refund(cost).await;
                            }
                            result
                        }
                    },
                    &retry_config,
                    &cancel,
                )
                .await?;

                for video in page.videos {
                    if let Some(max) = filter.max_videos {
                        if emitted >= max {
                            break;
                        }
                    }
                    if filter.matches(&video) {
                        emitted += 1;
                        yield video;
                    }
                }

                match page.next_page_token {
                    Some(token) => page_token = Some(token),
                    None => break,
                }
            }
        })
    }
}
