use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Notify;
use tokio::time::{self, Duration, Instant};

use crate::error::{HarvestError, Result};

/// Source of resident-set-size samples. Injected so tests can simulate
/// memory pressure without reading real process memory instead of
/// hardcoding a transport.
pub trait MemorySampler: Send + Sync {
    fn sample_bytes(&self) -> u64;
}

/// Reads `/proc/self/status` `VmRSS` on Linux; falls back to 0 elsewhere
/// (admission then always succeeds, matching "no ceiling configured").
pub struct ProcessMemorySampler;

impl MemorySampler for ProcessMemorySampler {
    #[cfg(target_os = "linux")]
    fn sample_bytes(&self) -> u64 {
        std::fs::read_to_string("/proc/self/status")
            .ok()
            .and_then(|contents| {
                contents.lines().find_map(|line| {
                    line.strip_prefix("VmRSS:")
                        .map(str::trim)
                        .and_then(|rest| rest.split_whitespace().next())
                        .and_then(|kb| kb.parse::<u64>().ok())
                        .map(|kb| kb * 1024)
                })
            })
            .unwrap_or(0)
    }

    #[cfg(not(target_os = "linux"))]
    fn sample_bytes(&self) -> u64 {
        0
    }
}

const SAMPLE_INTERVAL: Duration = Duration::from_millis(250);

/// Gates admission of new work on current memory pressure. Spawns a
/// background sampler task; callers never read memory themselves.
pub struct MemoryGuard {
    ceiling_bytes: Option<u64>,
    current_bytes: Arc<AtomicU64>,
    notify: Arc<Notify>,
    _sampler_task: Option<tokio::task::JoinHandle<()>>,
}

impl MemoryGuard {
    pub fn new(ceiling_bytes: Option<u64>, sampler: Arc<dyn MemorySampler>) -> Self {
        let current_bytes = Arc::new(AtomicU64::new(0));
        let notify = Arc::new(Notify::new());

        let task = ceiling_bytes.map(|_| {
            let current = current_bytes.clone();
            let notify = notify.clone();
            tokio::spawn(async move {
                let mut interval = time::interval(SAMPLE_INTERVAL);
                loop {
                    interval.tick().await;
                    current.store(sampler.sample_bytes(), Ordering::Relaxed);
                    notify.notify_waiters();
                }
            })
        });

        Self {
            ceiling_bytes,
            current_bytes,
            notify,
            _sampler_task: task,
        }
    }

    pub fn unbounded() -> Self {
        Self {
            ceiling_bytes: None,
            current_bytes: Arc::new(AtomicU64::new(0)),
            notify: Arc::new(Notify::new()),
            _sampler_task: None,
        }
    }

    fn under_ceiling(&self) -> bool {
        match self.ceiling_bytes {
            None => true,
            Some(ceiling) => self.current_bytes.load(Ordering::Relaxed) < ceiling,
        }
    }

    /// Admits new work immediately if under the ceiling; otherwise waits
    /// for a sample below the ceiling or for `deadline` to pass, whichever
    /// comes first.
    pub async fn admit(&self, deadline: Instant) -> Result<()> {
        if self.ceiling_bytes.is_none() {
            return Ok(());
        }
        loop {
            if self.under_ceiling() {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(HarvestError::MemoryPressure);
            }
            tokio::select! {
                _ = self.notify.notified() => continue,
                _ = time::sleep_until(deadline) => return Err(HarvestError::MemoryPressure),
            }
        }
    }
}
