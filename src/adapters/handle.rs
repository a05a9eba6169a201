//! Restart supervision for long-running adapter loops

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Exponential backoff between restarts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    pub initial: Duration,
    pub max: Duration,
}

impl RetryConfig {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { initial, max }
    }

    /// Delay following `current`
    pub fn next(&self, current: Duration) -> Duration {
        (current * 2).min(self.max)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(60))
    }
}

/// Run `attempt` until it returns `Ok` or `shutdown` fires.
///
/// An `Err` (lost core, closed channel) schedules a restart after the
/// current backoff delay. The delay doubles up to `config.max` and starts
/// over once a run has stayed up for longer than that.
pub async fn run_with_retry<F, Fut>(
    name: &'static str,
    config: RetryConfig,
    shutdown: CancellationToken,
    mut attempt: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut delay = config.initial;

    loop {
        info!("Starting {}", name);
        let started = tokio::time::Instant::now();

        let result = tokio::select! {
            _ = shutdown.cancelled() => break,
            result = attempt() => result,
        };

        match result {
            Ok(()) => {
                info!("{} completed normally", name);
                break;
            }
            Err(e) => error!("{} error: {}", name, e),
        }

        // A run that stayed up longer than the max delay was healthy
        if started.elapsed() > config.max {
            delay = config.initial;
        }

        warn!("Restarting {} in {:?}", name, delay);
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
        delay = config.next(delay);
    }

    info!("{} stopped", name);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_backoff_is_capped() {
        let config = RetryConfig::default();
        assert_eq!(config.next(Duration::from_secs(1)), Duration::from_secs(2));
        assert_eq!(config.next(Duration::from_secs(40)), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();

        run_with_retry(
            "test loop",
            RetryConfig::new(Duration::from_millis(10), Duration::from_millis(40)),
            CancellationToken::new(),
            move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        anyhow::bail!("core lost");
                    }
                    Ok(())
                }
            },
        )
        .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_shutdown_stops_waiting() {
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        run_with_retry(
            "test loop",
            RetryConfig::default(),
            shutdown,
            || async { std::future::pending::<Result<()>>().await },
        )
        .await;
    }
}
