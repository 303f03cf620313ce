// This file is part of AAWallet.
//
// AAWallet is free software: you can redistribute it and/or modify it under the
// terms of the GNU Lesser General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version.
//
// AAWallet is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with AAWallet.
// If not, see https://www.gnu.org/licenses/.

//! Utilities for retrying operations.

use std::{future::Future, time::Duration};

use rand::Rng;
use tokio::time;
use tracing::{debug, warn};

/// Options for retrying an operation using exponential backoff
/// with jitter.
#[derive(Clone, Copy, Debug)]
pub struct RetryOpts {
    /// Maximum number of attempts to make.
    pub max_attempts: u64,
    /// The first retry is immediately after the first failure (plus jitter).
    /// The next retry after that will wait this long.
    pub min_nonzero_wait: Duration,
    /// The maximum amount of time to wait between retries.
    pub max_wait: Duration,
    /// The maximum amount of jitter to add to the wait time.
    pub max_jitter: Duration,
}

impl Default for RetryOpts {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            min_nonzero_wait: Duration::from_secs(1),
            max_wait: Duration::from_secs(10),
            max_jitter: Duration::from_secs(1),
        }
    }
}

/// Retry a function using exponential backoff with jitter.
///
/// Returns the last error once `max_attempts` is exhausted.
pub async fn with_retries<Func, Fut, Out, Err>(
    description: &str,
    func: Func,
    opts: RetryOpts,
) -> Result<Out, Err>
where
    Func: Fn() -> Fut,
    Fut: Future<Output = Result<Out, Err>>,
{
    let mut next_wait = Duration::ZERO;
    let mut attempt_number = 1;
    loop {
        match func().await {
            Ok(out) => return Ok(out),
            Err(error) => {
                warn!("Failed to {description} (attempt {attempt_number})");
                if attempt_number >= opts.max_attempts {
                    return Err(error);
                }
            }
        }
        // Grab a new rng each iteration because we can't hold it across awaits.
        let jitter = if opts.max_jitter.is_zero() {
            Duration::ZERO
        } else {
            rand::thread_rng().gen_range(Duration::ZERO..opts.max_jitter)
        };
        time::sleep(next_wait + jitter).await;
        next_wait = (2 * next_wait).clamp(opts.min_nonzero_wait, opts.max_wait);
        attempt_number += 1;
    }
}

/// Options for polling a readiness check a fixed number of times.
#[derive(Clone, Copy, Debug)]
pub struct PollOpts {
    /// Number of checks to make before giving up.
    pub max_attempts: u64,
    /// Fixed delay between checks.
    pub delay: Duration,
}

impl Default for PollOpts {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_millis(500),
        }
    }
}

/// Poll `func` until it reports ready.
///
/// `Ok(Some(_))` is ready, `Ok(None)` is not ready yet and is retried after
/// `opts.delay`, and `Err(_)` stops polling immediately. Returns `Ok(None)` once
/// attempts run out.
pub async fn poll_until_ready<Func, Fut, Out, Err>(
    description: &str,
    func: Func,
    opts: PollOpts,
) -> Result<Option<Out>, Err>
where
    Func: Fn() -> Fut,
    Fut: Future<Output = Result<Option<Out>, Err>>,
{
    for attempt_number in 1..=opts.max_attempts {
        if let Some(out) = func().await? {
            return Ok(Some(out));
        }
        debug!("{description} not ready (attempt {attempt_number})");
        if attempt_number < opts.max_attempts {
            time::sleep(opts.delay).await;
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;

    fn no_wait() -> RetryOpts {
        RetryOpts {
            max_attempts: 3,
            min_nonzero_wait: Duration::ZERO,
            max_wait: Duration::ZERO,
            max_jitter: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_with_retries_returns_last_error() {
        let calls = AtomicU64::new(0);
        let res: Result<(), u64> = with_retries(
            "fail",
            || async { Err(calls.fetch_add(1, Ordering::SeqCst)) },
            no_wait(),
        )
        .await;
        assert_eq!(res, Err(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retries_succeeds_after_failure() {
        let calls = AtomicU64::new(0);
        let res: Result<u64, ()> = with_retries(
            "flaky",
            || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    Err(())
                } else {
                    Ok(n)
                }
            },
            no_wait(),
        )
        .await;
        assert_eq!(res, Ok(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_gives_up_after_max_attempts() {
        let calls = AtomicU64::new(0);
        let res: Result<Option<()>, ()> = poll_until_ready(
            "never ready",
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(None)
            },
            PollOpts {
                max_attempts: 4,
                delay: Duration::from_millis(100),
            },
        )
        .await;
        assert_eq!(res, Ok(None));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_stops_on_error() {
        let calls = AtomicU64::new(0);
        let res: Result<Option<()>, &str> = poll_until_ready(
            "broken",
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("boom")
            },
            PollOpts::default(),
        )
        .await;
        assert_eq!(res, Err("boom"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_ready_on_third_attempt() {
        let calls = AtomicU64::new(0);
        let res: Result<Option<u64>, ()> = poll_until_ready(
            "eventually",
            || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Ok((n == 2).then_some(n))
            },
            PollOpts::default(),
        )
        .await;
        assert_eq!(res, Ok(Some(2)));
    }
}
