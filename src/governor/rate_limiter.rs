use std::collections::VecDeque;

use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

const ERROR_WINDOW_SIZE: usize = 50;
const ERROR_RATIO_HIGH: f64 = 0.2;
const ERROR_RATIO_LOW: f64 = 0.02;

/// Outcome fed back into the limiter after an attempt completes, used to
/// widen or narrow the rolling error-ratio window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    RateLimited,
    OtherError,
}

struct BucketState {
    tokens: f64,
    capacity: f64,
    last_refill: Instant,
    rate_per_sec: f64,
    min_rate_per_sec: f64,
    max_rate_per_sec: f64,
    recent_outcomes: VecDeque<Outcome>,
    /// Outcomes observed since the rate last changed; gates adjustment to
    /// at most once per window.
    outcomes_since_adjustment: usize,
}

/// Token-bucket limiter whose refill rate adapts to a rolling window of
/// recent outcomes: a burst of rate-limited/errored attempts throttles
/// the rate down; a clean run lets it climb back toward the base rate.
pub struct AdaptiveRateLimiter {
    state: Mutex<BucketState>,
}

impl AdaptiveRateLimiter {
    pub fn new(
        base_rate_per_sec: f64,
        capacity: f64,
        min_rate_per_sec: f64,
        max_rate_per_sec: f64,
    ) -> Self {
        Self {
            state: Mutex::new(BucketState {
                tokens: capacity,
                capacity,
                last_refill: Instant::now(),
                rate_per_sec: base_rate_per_sec,
                min_rate_per_sec,
                max_rate_per_sec,
                recent_outcomes: VecDeque::with_capacity(ERROR_WINDOW_SIZE),
                outcomes_since_adjustment: 0,
            }),
        }
    }

    fn refill(state: &mut BucketState, now: Instant) {
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * state.rate_per_sec).min(state.capacity);
        state.last_refill = now;
    }

    /// Suspends the caller until one token is available, then consumes
    /// it. Never polls: the wait duration is computed once and slept.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                Self::refill(&mut state, now);
                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    None
                } else {
                    let deficit = 1.0 - state.tokens;
                    Some(Duration::from_secs_f64(deficit / state.rate_per_sec.max(0.01)))
                }
            };
            match wait {
                None => return,
                Some(d) => tokio::time::sleep(d).await,
            }
        }
    }

    /// Feeds the result of the operation the last `acquire` gated into
    /// the rolling window. The rate changes at most once per
    /// `ERROR_WINDOW_SIZE` outcomes: a trailing `RateLimited` outcome or
    /// an error ratio above `ERROR_RATIO_HIGH` halves the rate; a ratio
    /// below `ERROR_RATIO_LOW` over a full window grows it by 10%.
    pub async fn report_outcome(&self, outcome: Outcome) {
        let mut state = self.state.lock().await;
        if state.recent_outcomes.len() == ERROR_WINDOW_SIZE {
            state.recent_outcomes.pop_front();
        }
        state.recent_outcomes.push_back(outcome);
        state.outcomes_since_adjustment += 1;

        if state.outcomes_since_adjustment < ERROR_WINDOW_SIZE {
            return;
        }

        let errors = state
            .recent_outcomes
            .iter()
            .filter(|o| !matches!(o, Outcome::Ok))
            .count();
        let ratio = errors as f64 / state.recent_outcomes.len().max(1) as f64;

        if ratio > ERROR_RATIO_HIGH || outcome == Outcome::RateLimited {
            state.rate_per_sec = (state.rate_per_sec * 0.5).max(state.min_rate_per_sec);
            state.outcomes_since_adjustment = 0;
        } else if ratio < ERROR_RATIO_LOW && state.recent_outcomes.len() == ERROR_WINDOW_SIZE {
            state.rate_per_sec = (state.rate_per_sec * 1.1).min(state.max_rate_per_sec);
            state.outcomes_since_adjustment = 0;
        }
    }

    pub async fn current_rate_per_sec(&self) -> f64 {
        self.state.lock().await.rate_per_sec
    }
}
