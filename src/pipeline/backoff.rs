//! Batch pacing and exponential backoff.

use std::time::Duration;

use tokio::time::{Instant, sleep};

use crate::models::CrawlerConfig;

/// Running delay shared by all batches of a crawl.
#[derive(Debug, Clone)]
pub struct Backoff {
    delay: Duration,
    max_delay: Duration,
    pacing_interval: Duration,
    last_batch_start: Option<Instant>,
}

impl Backoff {
    pub fn new(initial: Duration, max_delay: Duration, pacing_interval: Duration) -> Self {
        Self {
            delay: initial,
            max_delay,
            pacing_interval,
            last_batch_start: None,
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(
            config.initial_backoff(),
            config.max_backoff(),
            config.pacing_interval(),
        )
    }

    /// The delay the next pause will use.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Double the running delay (up to the cap) and return it.
    pub fn escalate(&mut self) -> Duration {
        self.delay = (self.delay * 2).min(self.max_delay);
        self.delay
    }

    /// Mark the start of a batch, first sleeping the current delay when the
    /// previous batch started less than one pacing interval ago.
    ///
    /// Returns the time slept.
    pub async fn pace(&mut self) -> Duration {
        let mut slept = Duration::ZERO;
        if let Some(last) = self.last_batch_start {
            if last.elapsed() < self.pacing_interval {
                sleep(self.delay).await;
                slept = self.delay;
            }
        }
        self.last_batch_start = Some(Instant::now());
        slept
    }

    /// Sleep after a rate-limited batch: escalate, then wait.
    pub async fn back_off(&mut self) -> Duration {
        let delay = self.escalate();
        sleep(delay).await;
        delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backoff() -> Backoff {
        Backoff::new(
            Duration::from_millis(400),
            Duration::from_secs(60),
            Duration::from_secs(1),
        )
    }

    #[test]
    fn test_escalate_strictly_increases() {
        let mut b = backoff();
        let mut previous = b.delay();
        for _ in 0..5 {
            let next = b.escalate();
            assert!(next > previous);
            previous = next;
        }
        assert_eq!(previous, Duration::from_millis(400 * 32));
    }

    #[test]
    fn test_escalate_is_capped() {
        let mut b = Backoff::new(
            Duration::from_millis(400),
            Duration::from_millis(1000),
            Duration::from_secs(1),
        );
        assert_eq!(b.escalate(), Duration::from_millis(800));
        assert_eq!(b.escalate(), Duration::from_millis(1000));
        assert_eq!(b.escalate(), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_batch_is_not_paced() {
        let mut b = backoff();
        assert_eq!(b.pace().await, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_back_to_back_batches_are_paced() {
        let mut b = backoff();
        b.pace().await;
        let start = Instant::now();
        assert_eq!(b.pace().await, Duration::from_millis(400));
        assert!(start.elapsed() >= Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_batches_are_not_paced() {
        let mut b = backoff();
        b.pace().await;
        sleep(Duration::from_millis(1500)).await;
        assert_eq!(b.pace().await, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_back_off_sleeps_escalated_delay() {
        let mut b = backoff();
        let start = Instant::now();
        assert_eq!(b.back_off().await, Duration::from_millis(800));
        assert!(start.elapsed() >= Duration::from_millis(800));
        assert_eq!(b.delay(), Duration::from_millis(800));
    }
}
