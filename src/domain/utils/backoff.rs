use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep, timeout};

use crate::error::{Error, Result};

/// Growth of the pause between two polls of an external condition.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
    pub multiplier: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self { initial: Duration::from_secs(1), max: Duration::from_secs(10), multiplier: 1.5 }
    }
}

impl Backoff {
    /// Fixed pause between polls.
    pub fn constant(interval: Duration) -> Self {
        Self { initial: interval, max: interval, multiplier: 1.0 }
    }

    fn next_delay(&self, current: Duration) -> Duration {
        current.mul_f64(self.multiplier.max(1.0)).min(self.max)
    }
}

/// Polls `probe` until it yields `Some(value)` or `deadline` elapses.
///
/// `Ok(None)` from the probe means "not yet". Errors from the probe are returned as is;
/// nothing is retried on error. On timeout `on_timeout` builds the error. Each attempt only
/// gets the time left before the deadline and the last pause is clipped to it, so a timeout
/// is reported at `deadline` even when an attempt never completes.
pub async fn poll_until<T, F, Fut, E>(deadline: Duration, backoff: Backoff, mut probe: F, on_timeout: E) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
    E: FnOnce() -> Error,
{
    let started = Instant::now();
    let mut delay = backoff.initial;

    loop {
        let remaining = deadline.saturating_sub(started.elapsed());
        match timeout(remaining, probe()).await {
            Ok(Ok(Some(value))) => return Ok(value),
            Ok(Ok(None)) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                log::debug!("Attempt still running at the {:?} deadline, giving up", deadline);
                return Err(on_timeout());
            }
        }

        let elapsed = started.elapsed();
        if elapsed >= deadline {
            return Err(on_timeout());
        }

        sleep(delay.min(deadline - elapsed)).await;
        delay = backoff.next_delay(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_up_to_max() {
        let backoff = Backoff { initial: Duration::from_secs(1), max: Duration::from_secs(3), multiplier: 2.0 };
        assert_eq!(backoff.next_delay(Duration::from_secs(1)), Duration::from_secs(2));
        assert_eq!(backoff.next_delay(Duration::from_secs(2)), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn returns_value_once_probe_succeeds() {
        let mut calls = 0;
        let value = poll_until(
            Duration::from_secs(30),
            Backoff::constant(Duration::from_secs(1)),
            || {
                calls += 1;
                let current = calls;
                async move { Ok(if current >= 3 { Some(current) } else { None }) }
            },
            || Error::EmptySweep,
        )
        .await
        .unwrap();
        assert_eq!(value, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_at_deadline() {
        let started = Instant::now();
        let result: Result<()> =
            poll_until(Duration::from_secs(5), Backoff::default(), || async { Ok(None) }, || Error::EmptySweep).await;
        assert!(matches!(result, Err(Error::EmptySweep)));
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(5) && waited < Duration::from_secs(6), "waited {:?}", waited);
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_attempt_is_cut_at_deadline() {
        let started = Instant::now();
        let result: Result<()> = poll_until(
            Duration::from_secs(5),
            Backoff::constant(Duration::from_secs(1)),
            || std::future::pending::<Result<Option<()>>>(),
            || Error::EmptySweep,
        )
        .await;
        assert!(matches!(result, Err(Error::EmptySweep)));
        assert_eq!(started.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_attempt_after_a_miss_is_cut_at_deadline() {
        let mut calls = 0;
        let started = Instant::now();
        let result: Result<()> = poll_until(
            Duration::from_secs(10),
            Backoff::constant(Duration::from_secs(2)),
            || {
                calls += 1;
                let first = calls == 1;
                async move {
                    if !first {
                        sleep(Duration::from_secs(3600)).await;
                    }
                    Ok(None)
                }
            },
            || Error::EmptySweep,
        )
        .await;
        assert!(matches!(result, Err(Error::EmptySweep)));
        assert_eq!(started.elapsed(), Duration::from_secs(10));
        assert_eq!(calls, 2);
    }
}
