//! Outer scheduler: admits channels under a channel-level concurrency
//! bound, owns the shared governors, and drives one [`VideoPipeline`]
//! per admitted channel.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant as StdInstant;

use tokio::sync::Semaphore;

use crate::cancel::BatchCancellation;
use crate::checkpoint::CheckpointStore;
use crate::config::BatchRequest;
use crate::error::{classify, Result};
use crate::events::{EventBus, EventReceiver};
use crate::model::{BatchResult, Channel, ChannelProgress, ChannelState, Event};
use crate::origins::{MetadataOrigin, Sink, TranscriptOrigin};
use crate::pipeline::{build_context, VideoPipeline};
use crate::report::Aggregator;
use crate::resolver::ChannelResolver;
use crate::transcript::TranscriptFetcher;

pub struct BatchOrchestrator {
    metadata_origin: Arc<dyn MetadataOrigin>,
    transcript_origin: Arc<dyn TranscriptOrigin>,
    sink: Arc<dyn Sink>,
    checkpoint: Arc<CheckpointStore>,
    events: Arc<EventBus>,
    cancel: BatchCancellation,
}

impl BatchOrchestrator {
    pub fn new(
        metadata_origin: Arc<dyn MetadataOrigin>,
        transcript_origin: Arc<dyn TranscriptOrigin>,
        sink: Arc<dyn Sink>,
        checkpoint_path: impl Into<std::path::PathBuf>,
    ) -> Self {
        Self {
            metadata_origin,
            transcript_origin,
            sink,
            checkpoint: Arc::new(CheckpointStore::new(checkpoint_path)),
            events: Arc::new(EventBus::default()),
            cancel: BatchCancellation::new(),
        }
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    pub fn cancellation(&self) -> BatchCancellation {
        self.cancel.clone()
    }

    /// Runs the batch to completion. Resuming a channel that is already
    /// `DONE` in the checkpoint is a no-op for that channel; resuming
    /// the same completed batch twice simply replays its final result.
    pub async fn run(&self, request: BatchRequest) -> Result<BatchResult> {
        request.validate()?;
        let start = StdInstant::now();

        let checkpoint_doc = self.checkpoint.load().await?;
        let transcript_fetcher = Arc::new(TranscriptFetcher::new(self.transcript_origin.clone()));

        let pipeline_ctx = build_context(
            &request,
            transcript_fetcher,
            self.sink.clone(),
            self.checkpoint.clone(),
            self.events.clone(),
        );
        let resolver = Arc::new(ChannelResolver::new(
            self.metadata_origin.clone(),
            pipeline_ctx.quota.clone(),
            request.retry.clone(),
        ));
        let pipeline = Arc::new(VideoPipeline::new(pipeline_ctx.clone(), request.video_concurrency));

        self.events
            .publish(Event::BatchStarted {
                channel_count: request.channels.len(),
            })
            .await;

        let semaphore = Arc::new(Semaphore::new(request.channel_concurrency.max(1)));
        let mut seen_channel_ids = HashSet::new();
        let mut handles = Vec::new();
        let mut aggregator = Aggregator::new();

        for channel_ref in request.channels.clone() {
            let channel = match resolver.resolve(&channel_ref, &self.cancel).await {
                Ok(c) => c,
                Err(err) => {
                    let category = classify(&err);
                    let now = chrono::Utc::now();
                    let mut progress = ChannelProgress::new(channel_ref.input.clone(), 0, now);
                    progress.state = ChannelState::Failed;
                    progress.updated_at = now;
                    aggregator.record_error(category);
                    self.events
                        .publish(Event::ChannelDone {
                            progress: progress.clone(),
                        })
                        .await;
                    aggregator.record_channel(
                        Channel {
                            id: channel_ref.input.clone(),
                            title: channel_ref.input.clone(),
                            subscriber_count: None,
                            video_count: None,
                            uploads_list_token: None,
                        },
                        progress,
                    );
                    continue;
                }
            };
            if !seen_channel_ids.insert(channel.id.clone()) {
                continue;
            }

            if let Some(existing) = checkpoint_doc.channels.get(&channel.id) {
                if existing.state == ChannelState::Done {
                    continue;
                }
            }

            if self.cancel.is_cancelled() {
                break;
            }

            let permit = match tokio::select! {
                p = semaphore.clone().acquire_owned() => Some(p),
                _ = self.cancel.cancelled() => None,
            } {
                Some(p) => p,
                None => break,
            };

            let pipeline = pipeline.clone();
            let resolver = resolver.clone();
            let channel_cancel = self.cancel.child();
            let languages = request.transcript.preferred_languages.clone();
            let allow_auto = request.transcript.allow_auto_generated;

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let channel_for_summary = channel.clone();
                let (progress, outcomes) = pipeline
                    .run(channel, languages, allow_auto, resolver, channel_cancel)
                    .await;
                (channel_for_summary, progress, outcomes)
            }));
        }

        for handle in handles {
            if let Ok((channel, progress, outcomes)) = handle.await {
                for outcome in &outcomes {
                    if let Some(category) = outcome.error_category {
                        aggregator.record_error(category);
                    }
                }
                aggregator.record_channel(channel, progress);
            }
        }

        let quota_used = pipeline_ctx.quota.used_today().await;
        let result = aggregator.finalize(
            quota_used,
            start.elapsed().as_secs_f64(),
            self.cancel.is_cancelled(),
        );

        self.events
            .publish(Event::BatchDone {
                result: result.clone(),
            })
            .await;

        Ok(result)
    }
}
