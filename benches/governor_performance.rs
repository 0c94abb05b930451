use criterion::{criterion_group, criterion_main, Criterion};
use tokio::runtime::Runtime;

use transcript_harvester::governor::{AdaptiveRateLimiter, QuotaTracker};

fn quota_tracker_contention(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let tracker = QuotaTracker::new(1_000_000, 0);

    c.bench_function("quota_tracker_try_consume", |b| {
        b.iter(|| {
            rt.block_on(async {
                let _ = tracker.try_consume(1).await;
            })
        })
    });
}

fn rate_limiter_acquire(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let limiter = AdaptiveRateLimiter::new(10_000.0, 10_000.0, 1_000.0, 10_000.0);

    c.bench_function("adaptive_rate_limiter_acquire", |b| {
        b.iter(|| {
            rt.block_on(async {
                limiter.acquire().await;
            })
        })
    });
}

criterion_group!(benches, quota_tracker_contention, rate_limiter_acquire);
criterion_main!(benches);
