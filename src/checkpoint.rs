//! Persists per-channel progress so a batch can resume after a crash or
//! deliberate interruption. Atomic write-temp + rename, throttled to at
//! most one write per channel every 500ms.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::Result;
use crate::model::ChannelProgress;

const MIN_COMMIT_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CheckpointDocument {
    pub channels: HashMap<String, ChannelProgress>,
}

struct State {
    doc: CheckpointDocument,
    last_write: HashMap<String, Instant>,
}

pub struct CheckpointStore {
    path: PathBuf,
    state: Mutex<State>,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: Mutex::new(State {
                doc: CheckpointDocument::default(),
                last_write: HashMap::new(),
            }),
        }
    }

    /// Loads an existing checkpoint file if present; a missing file is
    /// treated as an empty checkpoint, not an error.
    pub async fn load(&self) -> Result<CheckpointDocument> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                let doc: CheckpointDocument = serde_json::from_slice(&bytes)?;
                let mut state = self.state.lock().await;
                state.doc = doc.clone();
                Ok(doc)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Ok(CheckpointDocument::default())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Records progress for a channel and writes the checkpoint file if
    /// at least [`MIN_COMMIT_INTERVAL`] has passed since the last write
    /// for that channel, or if `force` is set (used on channel
    /// completion, so the final state is never lost to throttling).
    pub async fn commit(&self, progress: &ChannelProgress, force: bool) -> Result<()> {
        let mut state = self.state.lock().await;
        state
            .doc
            .channels
            .insert(progress.channel_id.clone(), progress.clone());

        let should_write = force
            || state
                .last_write
                .get(&progress.channel_id)
                .map(|t| t.elapsed() >= MIN_COMMIT_INTERVAL)
                .unwrap_or(true);

        if !should_write {
            return Ok(());
        }

        write_atomic(&self.path, &state.doc).await?;
        state
            .last_write
            .insert(progress.channel_id.clone(), Instant::now());
        Ok(())
    }

    pub async fn channel_progress(&self, channel_id: &str) -> Option<ChannelProgress> {
        self.state.lock().await.doc.channels.get(channel_id).cloned()
    }
}

async fn write_atomic(path: &Path, doc: &CheckpointDocument) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    let bytes = serde_json::to_vec_pretty(doc)?;
    tokio::fs::write(&tmp_path, bytes).await?;
    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}
