pub mod memory;
pub mod quota;
pub mod rate_limiter;

pub use memory::{MemoryGuard, MemorySampler};
pub use quota::{QuotaDecision, QuotaTracker};
pub use rate_limiter::AdaptiveRateLimiter;
