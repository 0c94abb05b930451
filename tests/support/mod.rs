use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use transcript_harvester::error::{HarvestError, Result};
use transcript_harvester::model::{Channel, ChannelRef, Transcript, TranscriptSegment, Video};
use transcript_harvester::origins::{MetadataOrigin, Sink, TranscriptOrigin, VideoPage};

pub struct FakeChannel {
    pub channel: Channel,
    pub videos: Vec<Video>,
}

#[derive(Default)]
pub struct FakeMetadataOrigin {
    pub channels: HashMap<String, FakeChannel>,
    pub page_size: usize,
    pub fail_resolve: Vec<String>,
}

impl FakeMetadataOrigin {
    pub fn new() -> Self {
        Self {
            channels: HashMap::new(),
            page_size: 2,
            fail_resolve: Vec::new(),
        }
    }

    pub fn with_channel(mut self, channel: Channel, videos: Vec<Video>) -> Self {
        self.channels.insert(
            channel.id.clone(),
            FakeChannel { channel, videos },
        );
        self
    }
}

#[async_trait]
impl MetadataOrigin for FakeMetadataOrigin {
    async fn resolve_channel(&self, channel_ref: &ChannelRef) -> Result<Channel> {
        if self.fail_resolve.contains(&channel_ref.input) {
            return Err(HarvestError::ChannelNotFound(channel_ref.input.clone()));
        }
        self.channels
            .values()
            .find(|c| {
                c.channel.id == channel_ref.input || c.channel.title == channel_ref.input
            })
            .map(|c| c.channel.clone())
            .ok_or_else(|| HarvestError::ChannelNotFound(channel_ref.input.clone()))
    }

    async fn list_videos(&self, channel: &Channel, page_token: Option<&str>) -> Result<VideoPage> {
        let entry = self
            .channels
            .get(&channel.id)
            .ok_or_else(|| HarvestError::ChannelNotFound(channel.id.clone()))?;
        let start: usize = page_token.and_then(|t| t.parse().ok()).unwrap_or(0);
        let end = (start + self.page_size.max(1)).min(entry.videos.len());
        let videos = entry.videos[start..end].to_vec();
        let next_page_token = if end < entry.videos.len() {
            Some(end.to_string())
        } else {
            None
        };
        Ok(VideoPage {
            videos,
            next_page_token,
        })
    }

    async fn get_video_details(&self, video_id: &str) -> Result<Video> {
        self.channels
            .values()
            .flat_map(|c| c.videos.iter())
            .find(|v| v.id == video_id)
            .cloned()
            .ok_or_else(|| HarvestError::ChannelNotFound(video_id.to_string()))
    }
}

#[derive(Default)]
pub struct FakeTranscriptOrigin {
    pub transcripts: HashMap<String, Transcript>,
    pub unavailable: Vec<String>,
    pub fail_with: Mutex<HashMap<String, HarvestError>>,
}

impl FakeTranscriptOrigin {
    pub fn new() -> Self {
        Self {
            transcripts: HashMap::new(),
            unavailable: Vec::new(),
            fail_with: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_transcript(mut self, video_id: &str, text_segments: Vec<(&str, f64, f64)>) -> Self {
        self.transcripts.insert(
            video_id.to_string(),
            Transcript {
                video_id: video_id.to_string(),
                language: "en".to_string(),
                auto_generated: false,
                segments: text_segments
                    .into_iter()
                    .map(|(text, start, dur)| TranscriptSegment {
                        text: text.to_string(),
                        start_sec: start,
                        duration_sec: dur,
                    })
                    .collect(),
            },
        );
        self
    }

    pub fn with_unavailable(mut self, video_id: &str) -> Self {
        self.unavailable.push(video_id.to_string());
        self
    }
}

#[async_trait]
impl TranscriptOrigin for FakeTranscriptOrigin {
    async fn list_languages(&self, video_id: &str) -> Result<Vec<String>> {
        if self.unavailable.contains(&video_id.to_string()) {
            return Ok(vec![]);
        }
        if self.transcripts.contains_key(video_id) {
            Ok(vec!["en".to_string()])
        } else {
            Ok(vec![])
        }
    }

    async fn fetch_transcript(&self, video_id: &str, _language: &str) -> Result<Transcript> {
        if let Some(err) = self.fail_with.lock().unwrap().remove(video_id) {
            return Err(err);
        }
        self.transcripts
            .get(video_id)
            .cloned()
            .ok_or_else(|| HarvestError::TranscriptUnavailable(video_id.to_string()))
    }
}

#[derive(Default)]
pub struct FakeSink {
    pub exported: Mutex<Vec<(String, String)>>,
    pub fail_for: Vec<String>,
}

impl FakeSink {
    pub fn new() -> Self {
        Self {
            exported: Mutex::new(Vec::new()),
            fail_for: Vec::new(),
        }
    }
}

#[async_trait]
impl Sink for FakeSink {
    async fn export(&self, video: &Video, transcript: &Transcript) -> Result<()> {
        if self.fail_for.contains(&video.id) {
            return Err(HarvestError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "simulated sink failure",
            )));
        }
        self.exported
            .lock()
            .unwrap()
            .push((video.id.clone(), transcript.language.clone()));
        Ok(())
    }
}

pub fn make_video(id: &str, channel_id: &str) -> Video {
    Video {
        id: id.to_string(),
        channel_id: channel_id.to_string(),
        title: format!("video {id}"),
        published_at: Utc::now(),
        duration_sec: Some(120),
        is_live: false,
        is_private: false,
    }
}
