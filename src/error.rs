use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("channel could not be resolved: {0}")]
    ChannelNotFound(String),

    #[error("channel reference is malformed: {0}")]
    InvalidChannelRef(String),

    #[error("configuration error: {0}")]
    ConfigurationError(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("rate limited by origin: {0}")]
    RateLimited(String),

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("transcript unavailable: {0}")]
    TranscriptUnavailable(String),

    #[error("video is private or removed: {0}")]
    PrivateOrRemoved(String),

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("sink name conflict: {0}")]
    NameConflict(String),

    #[error("memory pressure, admission deferred")]
    MemoryPressure,

    #[error("operation cancelled")]
    Cancelled,

    #[error("unknown error: {0}")]
    Unknown(String),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("checkpoint I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HarvestError>;

/// Closed set of error categories every [`HarvestError`] maps onto. Pure
/// and total: every variant of `HarvestError` belongs to exactly one
/// category, and classification never performs I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    Network,
    Timeout,
    RateLimited,
    QuotaExceeded,
    TranscriptUnavailable,
    PrivateOrRemoved,
    Permission,
    Validation,
    MemoryPressure,
    Unknown,
}

/// What a category tells the scheduler to do with the failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recovery {
    pub retryable: bool,
    pub terminal: bool,
    pub backs_off_quota: bool,
}

impl ErrorCategory {
    pub fn recovery(self) -> Recovery {
        use ErrorCategory::*;
        match self {
            Network | Timeout => Recovery {
                retryable: true,
                terminal: false,
                backs_off_quota: false,
            },
            RateLimited => Recovery {
                retryable: true,
                terminal: false,
                backs_off_quota: true,
            },
            QuotaExceeded => Recovery {
                retryable: false,
                terminal: true,
                backs_off_quota: true,
            },
            TranscriptUnavailable | PrivateOrRemoved | Validation => Recovery {
                retryable: false,
                terminal: true,
                backs_off_quota: false,
            },
            Permission => Recovery {
                retryable: false,
                terminal: true,
                backs_off_quota: false,
            },
            MemoryPressure => Recovery {
                retryable: true,
                terminal: false,
                backs_off_quota: false,
            },
            Unknown => Recovery {
                retryable: true,
                terminal: false,
                backs_off_quota: false,
            },
        }
    }
}

/// Pure classification: maps an error to its category with no I/O.
pub fn classify(err: &HarvestError) -> ErrorCategory {
    match err {
        HarvestError::Network(_) | HarvestError::Io(_) => ErrorCategory::Network,
        HarvestError::Timeout(_) => ErrorCategory::Timeout,
        HarvestError::RateLimited(_) => ErrorCategory::RateLimited,
        HarvestError::QuotaExceeded(_) => ErrorCategory::QuotaExceeded,
        HarvestError::TranscriptUnavailable(_) => ErrorCategory::TranscriptUnavailable,
        HarvestError::PrivateOrRemoved(_) => ErrorCategory::PrivateOrRemoved,
        HarvestError::Permission(_) => ErrorCategory::Permission,
        HarvestError::Validation(_)
        | HarvestError::InvalidChannelRef(_)
        | HarvestError::ConfigurationError(_)
        | HarvestError::NameConflict(_)
        | HarvestError::UrlParse(_)
        | HarvestError::JsonParse(_) => ErrorCategory::Validation,
        HarvestError::MemoryPressure => ErrorCategory::MemoryPressure,
        HarvestError::ChannelNotFound(_) => ErrorCategory::PrivateOrRemoved,
        HarvestError::Cancelled | HarvestError::Unknown(_) => ErrorCategory::Unknown,
    }
}
