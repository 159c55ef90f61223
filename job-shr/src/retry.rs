//! Bounded retry for calls across the controller/worker HTTP boundary.
//!
//! Every call across that boundary can fail transiently (a worker that
//! hasn't finished booting yet, a dropped connection); rather than failing
//! the whole job on the first hiccup, callers retry a handful of times with
//! a fixed backoff before giving up.

use std::future::Future;
use std::time::Duration;

use log::warn;

/// Calls `attempt` up to `max_attempts` times (at least 1), sleeping
/// `backoff` between failures, and returns the first `Ok` or the last
/// `Err`.
pub async fn with_retry<T, E, F, Fut>(max_attempts: u32, backoff: Duration, mut attempt: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = max_attempts.max(1);
    let mut last_err = None;

    for n in 1..=max_attempts {
        match attempt().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                warn!("attempt {n}/{max_attempts} failed: {e}");
                last_err = Some(e);
                if n < max_attempts { tokio::time::sleep(backoff).await; }
            }
        }
    }

    Err(last_err.expect("loop runs at least once"))
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test]
    async fn succeeds_without_retry_when_first_attempt_works() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = with_retry(3, Duration::from_millis(1), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(42)
        }).await;
        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_up_to_the_bound_then_gives_up() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = with_retry(3, Duration::from_millis(1), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("nope")
        }).await;
        assert_eq!(result, Err("nope"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = with_retry(5, Duration::from_millis(1), || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 { Err("transient") } else { Ok(7) }
        }).await;
        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
