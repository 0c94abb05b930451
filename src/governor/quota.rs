use chrono::{DateTime, Datelike, Duration as ChronoDuration, TimeZone, Timelike, Utc};
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Outcome of a quota reservation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    /// Units were reserved; proceed immediately.
    Granted,
    /// Not enough budget right now, but the day's window hasn't reset
    /// yet — caller should wait until this instant and retry.
    WaitUntil(Instant),
    /// The daily cap was already hit for today; no amount of waiting
    /// within today helps.
    Exhausted,
}

struct QuotaState {
    used_today: u64,
    day_start: DateTime<Utc>,
}

/// Single-writer quota tracker guarding a daily unit budget.
pub struct QuotaTracker {
    cap: u64,
    reset_hour_utc: u32,
    state: Mutex<QuotaState>,
}

impl QuotaTracker {
    pub fn new(cap: u64, reset_hour_utc: u32) -> Self {
        let now = Utc::now();
        Self {
            cap,
            reset_hour_utc,
            state: Mutex::new(QuotaState {
                used_today: 0,
                day_start: Self::window_start(now, reset_hour_utc),
            }),
        }
    }

    fn window_start(now: DateTime<Utc>, reset_hour: u32) -> DateTime<Utc> {
        let today_reset = Utc
            .with_ymd_and_hms(now.year(), now.month(), now.day(), reset_hour, 0, 0)
            .single()
            .unwrap_or(now);
        if now >= today_reset {
            today_reset
        } else {
            today_reset - ChronoDuration::days(1)
        }
    }

    /// Attempts to reserve `units` from today's budget. On
    /// [`QuotaDecision::WaitUntil`] or [`QuotaDecision::Exhausted`] no
    /// units are reserved.
    pub async fn try_consume(&self, units: u64) -> QuotaDecision {
        if units > self.cap {
            return QuotaDecision::Exhausted;
        }

        let now = Utc::now();
        let mut state = self.state.lock().await;
        self.roll_window_if_needed(&mut state, now);

        if state.used_today + units <= self.cap {
            state.used_today += units;
            QuotaDecision::Granted
        } else {
            let next_reset = state.day_start + ChronoDuration::days(1);
            let wait = next_reset - now;
            match wait.to_std() {
                Ok(std_wait) if !std_wait.is_zero() => {
                    QuotaDecision::WaitUntil(Instant::now() + std_wait)
                }
                // The window already rolled over, or rolled over in the
                // past relative to a clock adjustment: retry now.
                _ => QuotaDecision::WaitUntil(Instant::now()),
            }
        }
    }

    fn roll_window_if_needed(&self, state: &mut QuotaState, now: DateTime<Utc>) {
        let current_window = Self::window_start(now, self.reset_hour_utc);
        if current_window > state.day_start {
            state.day_start = current_window;
            state.used_today = 0;
        }
    }

    /// Returns reserved units on a failed operation: a video that failed
    /// before it consumed the origin's quota should not count against
    /// the budget.
    pub async fn refund(&self, units: u64) {
        let mut state = self.state.lock().await;
        state.used_today = state.used_today.saturating_sub(units);
    }

    pub async fn used_today(&self) -> u64 {
        self.state.lock().await.used_today
    }
}
