use std::time::Duration;

use crate::prelude::*;

/// Retry policy for calls to external services.
#[derive(Copy, Clone, Debug)]
pub struct Backoff {
    pub attempts: u32,

    /// Delay before the second attempt, doubled before each next one.
    pub initial_delay: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self { attempts: 3, initial_delay: Duration::from_secs(5) }
    }
}

impl Backoff {
    pub async fn retry<T, F, Fut>(self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut delay = self.initial_delay;
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(error) if attempt < self.attempts => {
                    warn!(operation, attempt, ?delay, "failed, retrying: {error:#}");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(error) => {
                    return Err(error.context(format!("{operation} failed after {attempt} attempts")));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    const INSTANT: Backoff = Backoff { attempts: 3, initial_delay: Duration::ZERO };

    #[tokio::test]
    async fn test_recovers() {
        let calls = &AtomicU32::new(0);
        let value = INSTANT
            .retry("test", move || async move {
                if calls.fetch_add(1, Ordering::Relaxed) < 2 { bail!("flaky") } else { Ok(42) }
            })
            .await
            .unwrap();
        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_gives_up() {
        let calls = &AtomicU32::new(0);
        let result: Result<()> = INSTANT
            .retry("test", move || async move {
                calls.fetch_add(1, Ordering::Relaxed);
                bail!("down")
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }
}
