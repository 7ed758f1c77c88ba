use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Requests per minute allowed by the reference API.
pub const DEFAULT_MAX_REQUESTS: usize = 60;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Admits at most `max_requests` acquisitions in any rolling `window`.
///
/// Shared through an `Arc`; every outbound request calls [`RateLimiter::acquire`] first.
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    budget: Mutex<Budget>,
}

#[derive(Default)]
struct Budget {
    admitted: VecDeque<Instant>,
    server: Option<ServerBudget>,
}

/// Remaining budget as last reported by the server, when lower than our own count.
struct ServerBudget {
    remaining: u32,
    resets_at: Instant,
}

impl Budget {
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(oldest) = self.admitted.front() {
            if now.saturating_duration_since(*oldest) >= window {
                self.admitted.pop_front();
            } else {
                break;
            }
        }
        if self.server.as_ref().is_some_and(|s| now >= s.resets_at) {
            self.server = None;
        }
    }

    /// Admit now, or return the instant at which to try again.
    fn try_admit(&mut self, now: Instant, max: usize, window: Duration) -> Result<(), Instant> {
        self.prune(now, window);

        if let Some(server) = &self.server
            && server.remaining == 0
        {
            return Err(server.resets_at);
        }
        if self.admitted.len() >= max
            && let Some(oldest) = self.admitted.front()
        {
            return Err(*oldest + window);
        }

        self.admitted.push_back(now);
        if let Some(server) = &mut self.server {
            server.remaining -= 1;
        }
        Ok(())
    }
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
            budget: Mutex::new(Budget::default()),
        }
    }

    /// Wait until the window has room, then consume one slot.
    pub async fn acquire(&self) {
        loop {
            let retry_at = {
                let mut budget = self.budget.lock().await;
                match budget.try_admit(Instant::now(), self.max_requests, self.window) {
                    Ok(()) => return,
                    Err(at) => at,
                }
            };
            debug!(
                wait_ms = retry_at.saturating_duration_since(Instant::now()).as_millis() as u64,
                "rate budget exhausted, waiting"
            );
            tokio::time::sleep_until(retry_at).await;
        }
    }

    /// Fold in the server's own view of the budget (`RateLimit-Remaining` / `RateLimit-Reset`).
    ///
    /// Only ever tightens the budget: the lower of the two counts wins until `reset_after`
    /// has elapsed.
    pub async fn observe(&self, remaining: u32, reset_after: Duration) {
        let now = Instant::now();
        let mut budget = self.budget.lock().await;
        budget.prune(now, self.window);

        let local = self.max_requests.saturating_sub(budget.admitted.len());
        if (remaining as usize) < local {
            debug!(remaining, local, "server reports a tighter rate budget");
            budget.server = Some(ServerBudget {
                remaining,
                resets_at: now + reset_after,
            });
        }
    }

    /// Slots that could be admitted right now.
    pub async fn available(&self) -> usize {
        let now = Instant::now();
        let mut budget = self.budget.lock().await;
        budget.prune(now, self.window);
        let local = self.max_requests.saturating_sub(budget.admitted.len());
        match &budget.server {
            Some(server) => local.min(server.remaining as usize),
            None => local,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn admits_up_to_budget_without_waiting() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(limiter.available().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_oldest_admission_to_leave_window() {
        let limiter = RateLimiter::new(2, Duration::from_secs(10));
        let start = Instant::now();
        limiter.acquire().await;
        tokio::time::sleep(Duration::from_secs(4)).await;
        limiter.acquire().await;

        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::from_secs(10));
        assert_eq!(limiter.available().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_never_exceed_window() {
        let limiter = Arc::new(RateLimiter::new(5, Duration::from_secs(1)));
        let start = Instant::now();

        let handles: Vec<_> = (0..17)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    limiter.acquire().await;
                    Instant::now()
                })
            })
            .collect();

        let mut admitted = Vec::new();
        for handle in handles {
            admitted.push(handle.await.unwrap());
        }
        admitted.sort();

        for (i, at) in admitted.iter().enumerate() {
            let in_window = admitted[i..]
                .iter()
                .take_while(|later| later.duration_since(*at) < Duration::from_secs(1))
                .count();
            assert!(in_window <= 5, "{in_window} admissions within one window");
        }
        assert_eq!(
            admitted.last().unwrap().duration_since(start),
            Duration::from_secs(3)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn server_reported_exhaustion_blocks_until_reset() {
        let limiter = RateLimiter::new(60, Duration::from_secs(60));
        limiter.observe(0, Duration::from_secs(7)).await;
        assert_eq!(limiter.available().await, 0);

        let start = Instant::now();
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::from_secs(7));
        assert_eq!(limiter.available().await, 59);
    }

    #[tokio::test(start_paused = true)]
    async fn looser_server_budget_is_ignored() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        limiter.acquire().await;
        limiter.observe(50, Duration::from_secs(60)).await;
        assert_eq!(limiter.available().await, 1);
    }
}
