//! Per-domain politeness gate and retry backoff.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

/// Maximum backoff delay between retries (seconds).
const MAX_BACKOFF_SECS: u64 = 60;

/// Enforces minimum inter-request spacing per target domain.
///
/// `acquire` reserves the next free slot for the domain inside a single
/// critical section (reserve = max(now, last + delay)), then sleeps until the
/// reserved instant outside the lock. Because slot computation and timer bump
/// are atomic, no two granted acquisitions for one domain can be closer than
/// the configured delay, regardless of how many callers race. Timers only
/// move forward.
pub struct PolitenessGate {
    timers: Mutex<HashMap<String, Instant>>,
    delays: HashMap<String, Duration>,
    default_delay: Duration,
}

impl PolitenessGate {
    pub fn new(delays: HashMap<String, Duration>, default_delay: Duration) -> Self {
        Self {
            timers: Mutex::new(HashMap::new()),
            delays,
            default_delay,
        }
    }

    /// Spacing enforced for a domain.
    pub fn delay_for(&self, domain: &str) -> Duration {
        self.delays
            .get(domain)
            .copied()
            .unwrap_or(self.default_delay)
    }

    /// Block until a request to `domain` is polite, recording the grant.
    ///
    /// Always eventually succeeds; the wait is bounded by the queue of
    /// callers ahead of this one times the configured delay.
    pub async fn acquire(&self, domain: &str) {
        let granted_at = self.reserve(domain).await;
        let now = Instant::now();
        if granted_at > now {
            debug!(
                "rate limiting {}: waiting {:?}",
                domain,
                granted_at.duration_since(now)
            );
        }
        sleep_until(granted_at).await;
    }

    /// Reserve the next slot for `domain`. Read and bump happen under one
    /// lock acquisition so concurrent callers cannot observe a stale timer.
    async fn reserve(&self, domain: &str) -> Instant {
        let delay = self.delay_for(domain);
        let mut timers = self.timers.lock().await;
        let now = Instant::now();
        let granted_at = match timers.get(domain) {
            Some(last) => (*last + delay).max(now),
            None => now,
        };
        timers.insert(domain.to_string(), granted_at);
        granted_at
    }
}

/// Exponential backoff delay for a retry attempt, capped at one minute.
pub fn backoff_delay(attempt: u32, base: Duration, multiplier: u32) -> Duration {
    let factor = u64::from(multiplier).saturating_pow(attempt);
    let delay_ms = (base.as_millis() as u64).saturating_mul(factor);
    Duration::from_millis(delay_ms.min(MAX_BACKOFF_SECS * 1000))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_backoff_delay_doubles_and_caps() {
        let base = Duration::from_millis(1000);
        assert_eq!(backoff_delay(0, base, 2), Duration::from_millis(1000));
        assert_eq!(backoff_delay(1, base, 2), Duration::from_millis(2000));
        assert_eq!(backoff_delay(2, base, 2), Duration::from_millis(4000));
        assert_eq!(backoff_delay(10, base, 2), Duration::from_secs(60)); // capped
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_acquires_are_spaced_by_the_delay() {
        let delay = Duration::from_millis(2000);
        let gate = Arc::new(PolitenessGate::new(
            HashMap::from([("instagram.com".to_string(), delay)]),
            Duration::from_millis(1000),
        ));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let gate = gate.clone();
            handles.push(tokio::spawn(async move {
                gate.acquire("instagram.com").await;
                Instant::now()
            }));
        }

        let mut grants = Vec::new();
        for handle in handles {
            grants.push(handle.await.unwrap());
        }
        grants.sort();

        for pair in grants.windows(2) {
            assert!(pair[1].duration_since(pair[0]) >= delay);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_acquire_does_not_wait() {
        let gate = PolitenessGate::new(HashMap::new(), Duration::from_millis(2000));
        let before = Instant::now();
        gate.acquire("example.com").await;
        assert_eq!(Instant::now(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_domains_are_independent() {
        let gate = PolitenessGate::new(HashMap::new(), Duration::from_millis(2000));
        gate.acquire("instagram.com").await;
        let before = Instant::now();
        gate.acquire("tiktok.com").await;
        // A different domain is not held up by the first one's timer.
        assert_eq!(Instant::now(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_domain_delay_overrides_default() {
        let gate = PolitenessGate::new(
            HashMap::from([("tiktok.com".to_string(), Duration::from_millis(3000))]),
            Duration::from_millis(1000),
        );
        gate.acquire("tiktok.com").await;
        let before = Instant::now();
        gate.acquire("tiktok.com").await;
        assert!(Instant::now().duration_since(before) >= Duration::from_millis(3000));
    }
}
