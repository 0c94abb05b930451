//! External contracts the engine consumes but does not implement: the
//! metadata/transcript origins and the export sink live outside this
//! crate. These traits are the seam.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{Channel, ChannelRef, Transcript, Video};

/// A single page of videos from a channel's uploads list.
#[derive(Debug, Clone)]
pub struct VideoPage {
    pub videos: Vec<Video>,
    pub next_page_token: Option<String>,
}

#[async_trait]
pub trait MetadataOrigin: Send + Sync {
    /// Resolves a URL/handle/ID reference to a concrete channel. Declares
    /// its own quota cost internally; callers never guess it.
    async fn resolve_channel(&self, channel_ref: &ChannelRef) -> Result<Channel>;

    /// Quota units one `resolve_channel` call costs, so the caller's
    /// governor can reserve before attempting.
    fn resolve_channel_cost(&self) -> u64 {
        1
    }

    /// Fetches one page of a channel's uploads, starting at `page_token`
    /// (`None` for the first page).
    async fn list_videos(&self, channel: &Channel, page_token: Option<&str>) -> Result<VideoPage>;

    fn list_videos_cost(&self) -> u64 {
        1
    }

    /// Fetches any per-video detail not present on the upload-list page
    /// (duration, live/private flags) when the list response omitted it.
    async fn get_video_details(&self, video_id: &str) -> Result<Video>;

    fn get_video_details_cost(&self) -> u64 {
        1
    }
}

#[async_trait]
pub trait TranscriptOrigin: Send + Sync {
    /// Languages available for a video's captions, auto-generated ones
    /// included.
    async fn list_languages(&self, video_id: &str) -> Result<Vec<String>>;

    /// Fetches the transcript in the given language. Zero quota cost
    /// unless a concrete origin overrides `cost()`.
    async fn fetch_transcript(&self, video_id: &str, language: &str) -> Result<Transcript>;

    fn cost(&self) -> u64 {
        0
    }
}

#[async_trait]
pub trait Sink: Send + Sync {
    /// Persists one transcript. Must be idempotent: exporting the same
    /// `(video_id, language)` twice does not duplicate output.
    async fn export(&self, video: &Video, transcript: &Transcript) -> Result<()>;
}
