use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

/// Fixed-delay pacing for outbound requests.
///
/// Consecutive calls are spaced by at least `min_delay`. After every
/// `batch_size` calls the next one waits `batch_pause` instead (whichever is
/// longer). The first call goes out immediately.
#[derive(Debug)]
pub struct RateLimiter {
    min_delay: Duration,
    batch_size: u32,
    batch_pause: Duration,
    last_call: Option<Instant>,
    calls: u64,
}

impl RateLimiter {
    pub fn new(min_delay: Duration, batch_size: u32, batch_pause: Duration) -> Self {
        Self {
            min_delay,
            batch_size,
            batch_pause,
            last_call: None,
            calls: 0,
        }
    }

    /// Limiter that never waits
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO, 0, Duration::ZERO)
    }

    /// Wait until the next call may go out, then record it
    pub async fn acquire(&mut self) {
        if let Some(last) = self.last_call {
            let wait = self.next_delay();
            let target = last + wait;
            if target > Instant::now() {
                debug!(
                    delay_ms = wait.as_millis() as u64,
                    calls = self.calls,
                    "Rate limiting before next request"
                );
                sleep_until(target).await;
            }
        }

        self.last_call = Some(Instant::now());
        self.calls += 1;
    }

    /// Number of calls let through so far
    pub fn calls(&self) -> u64 {
        self.calls
    }

    fn next_delay(&self) -> Duration {
        let batch_boundary =
            self.batch_size > 0 && self.calls > 0 && self.calls % self.batch_size as u64 == 0;
        if batch_boundary {
            self.min_delay.max(self.batch_pause)
        } else {
            self.min_delay
        }
    }
}
