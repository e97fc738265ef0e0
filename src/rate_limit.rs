use tokio::time::{sleep_until, Duration, Instant};
use tracing::debug;

/// Fixed-interval limiter for single-flight request loops.
///
/// Callers `acquire` before a request and `finish` once it has completed.
/// The next permit is granted no sooner than `interval` after the previous
/// request finished, or later if the remote asked us to back off via
/// [`Throttle::defer`]. The first permit is immediate.
pub struct Throttle {
    interval: Duration,
    next_allowed: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_allowed: None,
        }
    }

    pub async fn acquire(&mut self) {
        if let Some(at) = self.next_allowed {
            if at > Instant::now() {
                sleep_until(at).await;
            }
        }
    }

    /// Marks the current request as done; the interval starts now.
    pub fn finish(&mut self) {
        self.push_out(Instant::now() + self.interval);
    }

    /// Pushes the next permit out to at least `wait` from now.
    pub fn defer(&mut self, wait: Duration) {
        debug!("Throttle: deferring next request by {:?}", wait);
        self.push_out(Instant::now() + wait);
    }

    fn push_out(&mut self, candidate: Instant) {
        self.next_allowed = Some(match self.next_allowed {
            Some(at) if at > candidate => at,
            _ => candidate,
        });
    }
}
