use std::time::Duration;

pub const BACKOFF_SECONDS: &[u64] = &[1, 2, 4];

/// Retry a fetch expression with backoff on `Error::Fetch`.
///
/// Usage: `retry_fetch!(source.fetch_page(idx, size), max_retries)`
///
/// The expression is re-evaluated on each attempt. This is a macro because
/// async closures that return borrowed futures can't satisfy `Fn`. Retries
/// happen only at the fetch boundary; other error variants break immediately.
macro_rules! retry_fetch {
    ($expr:expr, $max_retries:expr) => {{
        let mut _attempt: u32 = 0;
        loop {
            match $expr.await {
                Ok(val) => break Ok::<_, $crate::error::Error>(val),
                Err(e @ $crate::error::Error::Fetch(_)) if _attempt < $max_retries => {
                    $crate::tracker::retry::backoff_sleep(_attempt, $max_retries, &e).await;
                    _attempt += 1;
                }
                Err(e) => break Err(e),
            }
        }
    }};
}

pub(crate) use retry_fetch;

/// Sleep for the backoff duration before retry number `attempt + 1`.
pub async fn backoff_sleep(attempt: u32, max_retries: u32, cause: &crate::error::Error) {
    let wait = BACKOFF_SECONDS
        .get(attempt as usize)
        .copied()
        .unwrap_or_else(|| *BACKOFF_SECONDS.last().unwrap_or(&4));
    log::warn!(
        "Fetch failed ({cause}). Waiting {wait}s before retry {}/{max_retries}",
        attempt + 1
    );
    tokio::time::sleep(Duration::from_secs(wait)).await;
}

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Flaky {
        failures: u32,
        calls: AtomicU32,
    }

    impl Flaky {
        async fn fetch(&self) -> crate::error::Result<u32> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(Error::Fetch("transient".into()))
            } else {
                Ok(n)
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_from_transient_failures() {
        let flaky = Flaky {
            failures: 2,
            calls: AtomicU32::new(0),
        };
        let result = retry_fetch!(flaky.fetch(), 3);
        assert_eq!(result.unwrap(), 2);
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up_after_max_retries() {
        let flaky = Flaky {
            failures: 10,
            calls: AtomicU32::new(0),
        };
        let result = retry_fetch!(flaky.fetch(), 2);
        assert!(matches!(result, Err(Error::Fetch(_))));
        // 1 initial attempt + 2 retries
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_zero_retries_fails_immediately() {
        let flaky = Flaky {
            failures: 1,
            calls: AtomicU32::new(0),
        };
        let result = retry_fetch!(flaky.fetch(), 0);
        assert!(result.is_err());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
    }
}
