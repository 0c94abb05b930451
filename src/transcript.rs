//! Fetches and normalizes transcripts. Zero quota cost by default,
//! exposed as an overridable hook on [`TranscriptOrigin::cost`].

use std::sync::Arc;

use crate::error::ErrorCategory;
use crate::model::{Transcript, TranscriptSegment, Video};
use crate::origins::TranscriptOrigin;

pub struct TranscriptFetcher {
    origin: Arc<dyn TranscriptOrigin>,
}

impl TranscriptFetcher {
    pub fn new(origin: Arc<dyn TranscriptOrigin>) -> Self {
        Self { origin }
    }

    /// Picks the best available language from `preferred`, falling back
    /// to any available language if none of the preferred ones are
    /// present and `allow_auto` permits auto-generated captions.
    pub async fn fetch(
        &self,
        video: &Video,
        preferred: &[String],
        allow_auto: bool,
    ) -> Result<Transcript, ErrorCategory> {
        let available = self
            .origin
            .list_languages(&video.id)
            .await
            .map_err(|e| crate::error::classify(&e))?;

        if available.is_empty() {
            return Err(ErrorCategory::TranscriptUnavailable);
        }

        let chosen = preferred
            .iter()
            .find(|lang| available.iter().any(|a| a == *lang))
            .cloned()
            .or_else(|| if allow_auto { available.first().cloned() } else { None })
            .ok_or(ErrorCategory::TranscriptUnavailable)?;

        let transcript = self
            .origin
            .fetch_transcript(&video.id, &chosen)
            .await
            .map_err(|e| crate::error::classify(&e))?;

        Ok(Transcript {
            segments: normalize_segments(transcript.segments),
            ..transcript
        })
    }

    pub fn cost(&self) -> u64 {
        self.origin.cost()
    }
}

/// Trims text, drops empty segments, and clamps any segment whose
/// `start_sec` would regress relative to the previous segment's end so
/// the monotonic-`start_sec` invariant holds regardless of what the
/// origin returned.
pub fn normalize_segments(segments: Vec<TranscriptSegment>) -> Vec<TranscriptSegment> {
    let mut out = Vec::with_capacity(segments.len());
    let mut floor = 0.0f64;
    for mut seg in segments {
        seg.text = seg.text.trim().to_string();
        if seg.text.is_empty() {
            continue;
        }
        if seg.start_sec < floor {
            seg.start_sec = floor;
        }
        floor = seg.start_sec + seg.duration_sec.max(0.0);
        out.push(seg);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(text: &str, start: f64, dur: f64) -> TranscriptSegment {
        TranscriptSegment {
            text: text.to_string(),
            start_sec: start,
            duration_sec: dur,
        }
    }

    #[test]
    fn drops_empty_segments() {
        let segments = vec![seg("hello", 0.0, 1.0), seg("   ", 1.0, 1.0), seg("world", 2.0, 1.0)];
        let out = normalize_segments(segments);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn clamps_regressing_start_times() {
        let segments = vec![seg("a", 5.0, 2.0), seg("b", 4.0, 1.0)];
        let out = normalize_segments(segments);
        assert!(out[1].start_sec >= out[0].start_sec + out[0].duration_sec);
    }

    #[test]
    fn trims_whitespace() {
        let segments = vec![seg("  padded  ", 0.0, 1.0)];
        let out = normalize_segments(segments);
        assert_eq!(out[0].text, "padded");
    }
}
