use parking_lot::Mutex;
use reqwest::Response;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::time::sleep;

/// Requests per minute the monitor allows itself regardless of quota, so
/// background refreshes stay polite.
const SOFT_LIMIT_PER_MINUTE: u32 = 60;
const WINDOW: Duration = Duration::from_secs(60);
const LOW_QUOTA_WARNING: u32 = 100;

/// Tracks GitHub's reported quota and a local per-minute budget. The lock
/// is never held across a sleep.
pub struct RateLimiter {
    state: Mutex<Budget>,
}

#[derive(Debug)]
struct Budget {
    remaining: u32,
    reset_at: Option<Instant>,
    used_in_window: u32,
    window_start: Instant,
}

impl Budget {
    fn new(now: Instant) -> Self {
        Self {
            remaining: 5000,
            reset_at: None,
            used_in_window: 0,
            window_start: now,
        }
    }

    /// Claims one request slot, returning how long to sleep first.
    fn claim(&mut self, now: Instant) -> Option<Duration> {
        let mut delay = None;

        if self.remaining == 0 {
            // The next response reports the refreshed quota.
            if let Some(reset_at) = self.reset_at.take().filter(|r| *r > now) {
                delay = Some(reset_at - now);
            }
        }

        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed >= WINDOW {
            self.window_start = now;
            self.used_in_window = 0;
        } else if self.used_in_window >= SOFT_LIMIT_PER_MINUTE {
            let budget_wait = WINDOW - elapsed;
            delay = Some(delay.map_or(budget_wait, |d| d.max(budget_wait)));
            self.window_start = now + budget_wait;
            self.used_in_window = 0;
        }

        self.used_in_window += 1;
        self.remaining = self.remaining.saturating_sub(1);
        delay
    }

    fn observe(&mut self, remaining: u32, reset_epoch: Option<u64>, now: Instant) {
        self.remaining = remaining;
        let epoch_now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        if let Some(reset) = reset_epoch.filter(|r| *r > epoch_now) {
            self.reset_at = Some(now + Duration::from_secs(reset - epoch_now));
        }
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(Budget::new(Instant::now())),
        }
    }

    pub async fn wait(&self) {
        let delay = self.state.lock().claim(Instant::now());
        if let Some(delay) = delay {
            tracing::info!("Pausing GitHub requests for {:?}", delay);
            sleep(delay).await;
        }
    }

    pub fn remaining(&self) -> u32 {
        self.state.lock().remaining
    }

    pub fn update_from_response(&self, response: &Response) {
        let Some(remaining) = header_number::<u32>(response, "x-ratelimit-remaining") else {
            return;
        };
        let reset = header_number::<u64>(response, "x-ratelimit-reset");

        self.state.lock().observe(remaining, reset, Instant::now());
        if remaining < LOW_QUOTA_WARNING {
            tracing::warn!("GitHub rate limit low: {} requests remaining", remaining);
        }
    }
}

fn header_number<N: std::str::FromStr>(response: &Response, name: &str) -> Option<N> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
