//! Bounded retries and deadlines over an async delay source.

use core::future::Future;

use embassy_futures::select::{Either, select};
use embedded_hal_async::delay::DelayNs;
use log::debug;

/// Fixed-backoff retry policy.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u8,
    pub backoff_ms: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            backoff_ms: 10_000,
        }
    }
}

impl RetryPolicy {
    pub const fn new(max_attempts: u8, backoff_ms: u32) -> Self {
        Self {
            max_attempts,
            backoff_ms,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RetryOutcome<T, E> {
    Succeeded { value: T, attempts: u8 },
    Exhausted { last_error: E, attempts: u8 },
}

/// Runs `attempt(n, delay)` for `n = 1..=max_attempts` until it succeeds,
/// sleeping `backoff_ms` between failures. A zero ceiling still runs once.
///
/// The attempt borrows the delay source for its own deadlines.
pub async fn retry<T, E, D, F>(
    policy: RetryPolicy,
    delay: &mut D,
    mut attempt: F,
) -> RetryOutcome<T, E>
where
    D: DelayNs,
    F: AsyncFnMut(u8, &mut D) -> Result<T, E>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut number = 1u8;

    loop {
        match attempt(number, &mut *delay).await {
            Ok(value) => {
                return RetryOutcome::Succeeded {
                    value,
                    attempts: number,
                };
            }
            Err(last_error) if number >= max_attempts => {
                return RetryOutcome::Exhausted {
                    last_error,
                    attempts: number,
                };
            }
            Err(_) => {
                debug!(
                    "retry: attempt {}/{} failed, backing off {}ms",
                    number, max_attempts, policy.backoff_ms
                );
                delay.delay_ms(policy.backoff_ms).await;
                number += 1;
            }
        }
    }
}

/// Resolves to `None` if `future` is still pending after `timeout_ms`.
pub async fn with_deadline<D, F>(delay: &mut D, timeout_ms: u32, future: F) -> Option<F::Output>
where
    D: DelayNs,
    F: Future,
{
    match select(future, delay.delay_ms(timeout_ms)).await {
        Either::First(output) => Some(output),
        Either::Second(()) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingDelay;
    use embassy_futures::block_on;

    #[test]
    fn success_on_first_attempt_never_sleeps() {
        let mut delay = RecordingDelay::default();
        let outcome = block_on(retry(RetryPolicy::default(), &mut delay, async |_, _| {
            Ok::<_, ()>(7)
        }));
        assert_eq!(
            outcome,
            RetryOutcome::Succeeded {
                value: 7,
                attempts: 1
            }
        );
        assert!(delay.sleeps_ms.is_empty());
    }

    #[test]
    fn success_on_last_attempt_sleeps_between_each() {
        let mut delay = RecordingDelay::default();
        let mut seen = Vec::new();
        let outcome = block_on(retry(RetryPolicy::new(10, 10_000), &mut delay, async |n, _| {
            seen.push(n);
            if n == 10 { Ok(n) } else { Err(n) }
        }));
        assert_eq!(
            outcome,
            RetryOutcome::Succeeded {
                value: 10,
                attempts: 10
            }
        );
        assert_eq!(seen, (1..=10).collect::<Vec<u8>>());
        assert_eq!(delay.sleeps_ms, vec![10_000; 9]);
    }

    #[test]
    fn exhaustion_reports_last_error() {
        let mut delay = RecordingDelay::default();
        let outcome = block_on(retry(RetryPolicy::new(3, 5), &mut delay, async |n, _| {
            Err::<(), _>(n * 10)
        }));
        assert_eq!(
            outcome,
            RetryOutcome::Exhausted {
                last_error: 30,
                attempts: 3
            }
        );
        assert_eq!(delay.sleeps_ms, vec![5, 5]);
    }

    #[test]
    fn zero_ceiling_still_runs_once() {
        let mut delay = RecordingDelay::default();
        let outcome = block_on(retry(RetryPolicy::new(0, 5), &mut delay, async |_, _| {
            Err::<(), _>("down")
        }));
        assert_eq!(
            outcome,
            RetryOutcome::Exhausted {
                last_error: "down",
                attempts: 1
            }
        );
    }

    #[test]
    fn deadline_passes_through_ready_futures() {
        let mut delay = RecordingDelay::default();
        let output = block_on(with_deadline(&mut delay, 10_000, async { 42 }));
        assert_eq!(output, Some(42));
    }

    #[test]
    fn deadline_expires_on_pending_futures() {
        let mut delay = RecordingDelay::default();
        let output = block_on(with_deadline(
            &mut delay,
            10_000,
            core::future::pending::<u8>(),
        ));
        assert_eq!(output, None);
        assert_eq!(delay.sleeps_ms, vec![10_000]);
    }
}
