//! Per-channel scheduler: fetches, exports and records outcomes for one
//! channel's videos under a video-level concurrency bound.

use std::sync::Arc;
use std::time::Instant as StdInstant;

use chrono::Utc;
use futures::StreamExt;
use tokio::sync::Semaphore;
use tokio::time::Instant;

use crate::cancel::BatchCancellation;
use crate::checkpoint::CheckpointStore;
use crate::config::{BatchRequest, RetryConfig, VideoFilter};
use crate::error::{classify, HarvestError};
use crate::events::EventBus;
use crate::governor::{AdaptiveRateLimiter, MemoryGuard, QuotaDecision, QuotaTracker};
use crate::model::{Channel, ChannelProgress, ChannelState, Event, Video, VideoOutcome, VideoState};
use crate::origins::Sink;
use crate::resolver::ChannelResolver;
use crate::retry;
use crate::transcript::TranscriptFetcher;

pub struct PipelineContext {
    pub sink: Arc<dyn Sink>,
    pub transcript_fetcher: Arc<TranscriptFetcher>,
    pub quota: Arc<QuotaTracker>,
    pub rate_limiter: Arc<AdaptiveRateLimiter>,
    pub memory: Arc<MemoryGuard>,
    pub checkpoint: Arc<CheckpointStore>,
    pub events: Arc<EventBus>,
    pub retry_config: RetryConfig,
    pub video_filter: VideoFilter,
}

pub struct VideoPipeline {
    ctx: Arc<PipelineContext>,
    video_concurrency: usize,
}

impl VideoPipeline {
    pub fn new(ctx: Arc<PipelineContext>, video_concurrency: usize) -> Self {
        Self {
            ctx,
            video_concurrency,
        }
    }

    /// Runs a single channel to completion (or cancellation), returning
    /// its final progress snapshot.
    pub async fn run(
        &self,
        channel: Channel,
        transcript_languages: Vec<String>,
        allow_auto: bool,
        resolver: Arc<ChannelResolver>,
        cancel: BatchCancellation,
    ) -> (ChannelProgress, Vec<VideoOutcome>) {
        let prior = self.ctx.checkpoint.channel_progress(&channel.id).await;
        let mut progress = match prior {
            Some(mut p) if p.state != ChannelState::Done => {
                p.state = ChannelState::Running;
                p
            }
            _ => ChannelProgress::new(
                channel.id.clone(),
                channel.video_count.unwrap_or(0),
                Utc::now(),
            ),
        };
        progress.state = ChannelState::Running;
        let committed = progress.committed_video_ids.clone();
        self.ctx.events.publish(Event::ChannelStarted {
            channel_id: channel.id.clone(),
        }).await;

        let semaphore = Arc::new(Semaphore::new(self.video_concurrency.max(1)));
        let mut stream =
            resolver.video_stream(channel.clone(), self.ctx.video_filter.clone(), cancel.clone());
        let mut tasks = Vec::new();

        while let Some(next) = stream.next().await {
            if cancel.is_cancelled() {
                break;
            }
            let video = match next {
                Ok(v) => v,
                Err(_) => continue,
            };
            if committed.contains(&video.id) {
                continue;
            }

            let permit = match tokio::select! {
                p = semaphore.clone().acquire_owned() => Some(p),
                _ = cancel.cancelled() => None,
            } {
                Some(p) => p,
                None => break,
            };

            let ctx = self.ctx.clone();
            let languages = transcript_languages.clone();
            let video_cancel = cancel.child();
            tasks.push(tokio::spawn(async move {
                let _permit = permit;
                process_video(ctx, video, languages, allow_auto, video_cancel).await
            }));
        }

        let mut outcomes = Vec::new();
        for task in tasks {
            if let Ok(outcome) = task.await {
                let now = Utc::now();
                progress.record_outcome(&outcome, now);
                self.ctx
                    .events
                    .publish(Event::VideoDone {
                        channel_id: progress.channel_id.clone(),
                        outcome: outcome.clone(),
                    })
                    .await;
                self.ctx
                    .events
                    .publish(Event::ChannelProgressed {
                        progress: progress.clone(),
                    })
                    .await;
                let _ = self.ctx.checkpoint.commit(&progress, false).await;
                outcomes.push(outcome);
            }
        }

        progress.finalize(Utc::now());
        let _ = self.ctx.checkpoint.commit(&progress, true).await;
        self.ctx
            .events
            .publish(Event::ChannelDone {
                progress: progress.clone(),
            })
            .await;
        (progress, outcomes)
    }
}

async fn process_video(
    ctx: Arc<PipelineContext>,
    video: Video,
    languages: Vec<String>,
    allow_auto: bool,
    cancel: BatchCancellation,
) -> VideoOutcome {
    let start = StdInstant::now();
    let attempts = Arc::new(std::sync::atomic::AtomicU32::new(0));

    let deadline = Instant::now() + tokio::time::Duration::from_secs(30);
    if ctx.memory.admit(deadline).await.is_err() {
        return VideoOutcome {
            video_id: video.id,
            state: VideoState::Failed,
            error_category: Some(crate::error::ErrorCategory::MemoryPressure),
            attempts: 0,
            processing_sec: start.elapsed().as_secs_f64(),
            word_count: None,
        };
    }

    let transcript_cost = ctx.transcript_fetcher.cost();
    let retry_config = ctx.retry_config.clone();
    let ctx_for_op = ctx.clone();
    let video_for_op = video.clone();
    let languages_for_op = languages.clone();
    let attempts_for_op = attempts.clone();

    let result = retry::run(
        move |attempt| {
            attempts_for_op.store(attempt, std::sync::atomic::Ordering::SeqCst);
            let ctx = ctx_for_op.clone();
            let video = video_for_op.clone();
            let languages = languages_for_op.clone();
            async move {
                if transcript_cost > 0 {
                    match ctx.quota.try_consume(transcript_cost).await {
                        QuotaDecision::Granted => {}
                        QuotaDecision::WaitUntil(instant) => {
                            tokio::time::sleep_until(instant).await;
                        }
                        QuotaDecision::Exhausted => {
                            return Err(HarvestError::QuotaExceeded(
                                "daily transcript quota exhausted".to_string(),
                            ))
                        }
                    }
                }
                ctx.rate_limiter.acquire().await;

                let outcome = ctx
                    .transcript_fetcher
                    .fetch(&video, &languages, allow_auto)
                    .await;

                match outcome {
                    Ok(transcript) => {
                        ctx.rate_limiter
                            .report_outcome(crate::governor::rate_limiter::Outcome::Ok)
                            .await;
                        ctx.sink.export(&video, &transcript).await?;
                        Ok(transcript)
                    }
                    Err(category) => {
                        if transcript_cost > 0 {
                            ctx.quota.refund(transcript_cost).await;
                        }
                        let report_outcome = if category == crate::error::ErrorCategory::RateLimited
                        {
                            crate::governor::rate_limiter::Outcome::RateLimited
                        } else {
                            crate::governor::rate_limiter::Outcome::OtherError
                        };
                        ctx.rate_limiter.report_outcome(report_outcome).await;
                        Err(category_to_error(category))
                    }
                }
            }
        },
        &retry_config,
        &cancel,
    )
    .await;

    let attempts = attempts.load(std::sync::atomic::Ordering::SeqCst);

    match result {
        Ok(transcript) => VideoOutcome {
            video_id: video.id,
            state: VideoState::Success,
            error_category: None,
            attempts,
            processing_sec: start.elapsed().as_secs_f64(),
            word_count: Some(transcript.word_count()),
        },
        Err(err) => VideoOutcome {
            video_id: video.id,
            state: VideoState::Failed,
            error_category: Some(classify(&err)),
            attempts,
            processing_sec: start.elapsed().as_secs_f64(),
            word_count: None,
        },
    }
}

fn category_to_error(category: crate::error::ErrorCategory) -> HarvestError {
    use crate::error::ErrorCategory::*;
    match category {
        Network => HarvestError::Network("transcript fetch failed".to_string()),
        Timeout => HarvestError::Timeout("transcript fetch timed out".to_string()),
        RateLimited => HarvestError::RateLimited("transcript origin rate limited".to_string()),
        QuotaExceeded => HarvestError::QuotaExceeded("transcript quota exceeded".to_string()),
        TranscriptUnavailable => {
            HarvestError::TranscriptUnavailable("no transcript available".to_string())
        }
        PrivateOrRemoved => HarvestError::PrivateOrRemoved("video unavailable".to_string()),
        Permission => HarvestError::Permission("permission denied".to_string()),
        Validation => HarvestError::Validation("invalid video".to_string()),
        MemoryPressure => HarvestError::MemoryPressure,
        Unknown => HarvestError::Unknown("unclassified transcript error".to_string()),
    }
}

/// Builds per-component governors for a batch from its request, shared
/// by every channel's [`VideoPipeline`].
pub fn build_context(
    request: &BatchRequest,
    transcript_fetcher: Arc<TranscriptFetcher>,
    sink: Arc<dyn Sink>,
    checkpoint: Arc<CheckpointStore>,
    events: Arc<EventBus>,
) -> Arc<PipelineContext> {
    Arc::new(PipelineContext {
        sink,
        transcript_fetcher,
        quota: Arc::new(QuotaTracker::new(
            request.quota.daily_unit_cap,
            request.quota.reset_hour_utc,
        )),
        rate_limiter: Arc::new(AdaptiveRateLimiter::new(
            request.rate_limit.base_rate_per_sec,
            request.rate_limit.burst_capacity,
            request.rate_limit.min_rate_per_sec,
            request.rate_limit.max_rate_per_sec,
        )),
        memory: Arc::new(match request.soft_memory_ceiling_bytes {
            Some(bytes) => MemoryGuard::new(
                Some(bytes),
                Arc::new(crate::governor::memory::ProcessMemorySampler),
            ),
            None => MemoryGuard::unbounded(),
        }),
        checkpoint,
        events,
        retry_config: request.retry.clone(),
        video_filter: request.video_filter.clone(),
    })
}
