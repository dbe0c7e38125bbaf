use std::time::{Duration, Instant};

/// Awaits one storage call. Calls slower than `max` log a warning under the
/// `performance` target, inside whatever operation span is current.
pub async fn warn_if_slow<F, T>(call: &'static str, max: Duration, fut: F) -> T
where
    F: std::future::Future<Output = T>,
{
    let started = Instant::now();
    let out = fut.await;
    let elapsed = started.elapsed();

    if elapsed > max {
        tracing::warn!(
            target: "performance",
            call,
            elapsed_ms = millis(elapsed),
            threshold_ms = millis(max),
            "slow storage call"
        );
    } else {
        tracing::trace!(target: "performance", call, elapsed_ms = millis(elapsed), "storage call");
    }
    out
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
