//! Transcript Harvester
//!
//! A hierarchical, rate-limited, quota-aware concurrent scheduler that
//! batch-harvests transcripts for one or many YouTube channels. This
//! crate owns discovery, fetching, retrying, progress reporting and
//! resumption; it does not implement HTTP access to YouTube itself —
//! that lives behind the [`origins`] traits.

pub mod cancel;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod events;
pub mod governor;
pub mod model;
pub mod orchestrator;
pub mod origins;
pub mod pipeline;
pub mod report;
pub mod resolver;
pub mod retry;
pub mod transcript;

pub use cancel::BatchCancellation;
pub use checkpoint::CheckpointStore;
pub use config::BatchRequest;
pub use error::{ErrorCategory, HarvestError, Result};
pub use events::EventBus;
pub use model::{exit_code, BatchResult, Channel, ChannelRef, Event, Video, VideoOutcome};
pub use orchestrator::BatchOrchestrator;
pub use origins::{MetadataOrigin, Sink, TranscriptOrigin};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
