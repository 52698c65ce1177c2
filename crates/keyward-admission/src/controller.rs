//! EWMA admission controller.

use crate::errors::{AdmissionError, Result};
use keyward_runtime::{FirstRun, PeriodicTask};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Cost of one request in rate units.
const COST: f64 = 1.0;

/// Lower bound on the normalized inter-arrival interval, so simultaneous
/// requests never divide by zero.
const MIN_INTERVAL: f64 = 1e-10;

/// Identities idle for longer than this many periods are evicted.
const IDLE_PERIODS: u32 = 3;

/// Bisection steps when solving for the retry interval.
const RETRY_SEARCH_STEPS: usize = 64;

/// Added to retry hints to absorb rounding to whole nanoseconds.
const RETRY_SLACK: Duration = Duration::from_micros(1);

/// Smoothed rate after a request arriving `interval` periods after the last
/// one, starting from `rate`.
fn rate_after(rate: f64, interval: f64) -> f64 {
    let interval = interval.max(MIN_INTERVAL);

    // 1 - alpha, computed without cancellation for tiny intervals
    let weight = -(-interval).exp_m1();
    let alpha = 1.0 - weight;
    let instantaneous = COST / interval;

    (weight * instantaneous + alpha * rate).max(COST)
}

/// Outcome of a single admission check
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Admission {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Wait after which the next request is admitted (denials only)
    pub retry_after: Option<Duration>,
}

impl Admission {
    fn allow() -> Self {
        Self {
            allowed: true,
            retry_after: None,
        }
    }

    fn deny(retry_after: Duration) -> Self {
        Self {
            allowed: false,
            retry_after: Some(retry_after),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ClientState {
    last_seen: Instant,
    rate: f64,
}

/// Adaptive per-identity rate limiter.
///
/// `limit` is expressed in requests per `period`. In strict mode a denied
/// request still feeds the average, so clients that keep retrying during a
/// cool-down push their own retry time further out.
pub struct AdmissionController {
    limit: f64,
    period: Duration,
    strict: bool,
    clients: Mutex<HashMap<String, ClientState>>,
}

impl AdmissionController {
    /// Create a controller admitting `limit` requests per `period`.
    pub fn new(limit: f64, period: Duration, strict: bool) -> Result<Self> {
        if !limit.is_finite() {
            return Err(AdmissionError::NonFiniteLimit(limit));
        }
        if limit < COST {
            return Err(AdmissionError::LimitBelowCost { limit, cost: COST });
        }
        if period.is_zero() {
            return Err(AdmissionError::ZeroPeriod);
        }

        Ok(Self {
            limit,
            period,
            strict,
            clients: Mutex::new(HashMap::new()),
        })
    }

    /// Configured limit in requests per period
    pub fn limit(&self) -> f64 {
        self.limit
    }

    /// Configured averaging period
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Whether denied requests update the average
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Check whether a request for `key` is admitted right now.
    pub fn check(&self, key: &str) -> Admission {
        self.check_at(key, Instant::now())
    }

    /// Check whether a request for `key` arriving at `now` is admitted.
    pub fn check_at(&self, key: &str, now: Instant) -> Admission {
        let mut clients = self.clients.lock();

        let previous = clients.get(key).copied().unwrap_or(ClientState {
            last_seen: now,
            rate: 0.0,
        });

        let new_rate = self.next_rate(previous, now);
        let next = ClientState {
            last_seen: now,
            rate: new_rate,
        };

        if new_rate > self.limit {
            // The next request is judged against whatever state is stored now
            let base = if self.strict {
                clients.insert(key.to_string(), next);
                next
            } else {
                previous
            };

            let retry_after = self.retry_after(base, now);
            debug!(
                key = %key,
                rate = new_rate,
                limit = self.limit,
                retry_after_ms = retry_after.as_millis() as u64,
                "Admission denied"
            );
            return Admission::deny(retry_after);
        }

        clients.insert(key.to_string(), next);
        Admission::allow()
    }

    fn next_rate(&self, previous: ClientState, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(previous.last_seen);
        rate_after(previous.rate, elapsed.as_secs_f64() / self.period.as_secs_f64())
    }

    /// Time from `now` until a request against `base` would be admitted.
    ///
    /// The smoothed rate a request produces falls monotonically with the
    /// interval since `base.last_seen`, so the earliest admissible interval
    /// is found by bisection.
    fn retry_after(&self, base: ClientState, now: Instant) -> Duration {
        let admitted = |interval: f64| rate_after(base.rate, interval) <= self.limit;

        let mut denied = MIN_INTERVAL;
        let mut allowed = 1.0;
        while !admitted(allowed) {
            denied = allowed;
            allowed *= 2.0;
        }
        for _ in 0..RETRY_SEARCH_STEPS {
            let mid = (denied + allowed) / 2.0;
            if admitted(mid) {
                allowed = mid;
            } else {
                denied = mid;
            }
        }

        let resume = base.last_seen + self.period.mul_f64(allowed) + RETRY_SLACK;
        resume.saturating_duration_since(now)
    }

    /// Evict identities whose last request is older than three periods.
    ///
    /// Returns the number of evicted identities.
    pub fn cleanup_at(&self, now: Instant) -> usize {
        let max_idle = self.period * IDLE_PERIODS;
        let mut clients = self.clients.lock();
        let before = clients.len();

        clients.retain(|_, state| now.saturating_duration_since(state.last_seen) <= max_idle);

        before - clients.len()
    }

    /// Run [`cleanup_at`](Self::cleanup_at) once per period in the background.
    pub fn spawn_cleanup(self: &Arc<Self>) -> PeriodicTask {
        let controller = Arc::clone(self);

        PeriodicTask::spawn("admission-cleanup", self.period, FirstRun::AfterPeriod, move || {
            let controller = Arc::clone(&controller);
            async move {
                let evicted = controller.cleanup_at(Instant::now());
                if evicted > 0 {
                    info!(evicted, remaining = controller.len(), "Evicted idle admission state");
                }
            }
        })
    }

    /// Current smoothed rate for `key`, if tracked
    pub fn rate(&self, key: &str) -> Option<f64> {
        self.clients.lock().get(key).map(|state| state.rate)
    }

    /// Time of the last counted request for `key`, if tracked
    pub fn last_seen(&self, key: &str) -> Option<Instant> {
        self.clients.lock().get(key).map(|state| state.last_seen)
    }

    /// Forget all state for `key`
    pub fn remove(&self, key: &str) -> bool {
        self.clients.lock().remove(key).is_some()
    }

    /// Number of tracked identities
    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    /// Whether no identity is tracked
    pub fn is_empty(&self) -> bool {
        self.clients.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERIOD: Duration = Duration::from_secs(10);

    fn controller(limit: f64, strict: bool) -> AdmissionController {
        AdmissionController::new(limit, PERIOD, strict).unwrap()
    }

    /// Send requests back to back until one is denied.
    fn burst_until_denied(ctl: &AdmissionController, key: &str, at: Instant) -> (usize, Admission) {
        for sent in 0..10_000 {
            let admission = ctl.check_at(key, at);
            if !admission.allowed {
                return (sent, admission);
            }
        }
        panic!("burst was never denied");
    }

    #[test]
    fn test_rejects_invalid_configuration() {
        assert!(matches!(
            AdmissionController::new(f64::NAN, PERIOD, false),
            Err(AdmissionError::NonFiniteLimit(_))
        ));
        assert!(matches!(
            AdmissionController::new(f64::INFINITY, PERIOD, false),
            Err(AdmissionError::NonFiniteLimit(_))
        ));
        assert!(matches!(
            AdmissionController::new(0.5, PERIOD, false),
            Err(AdmissionError::LimitBelowCost { .. })
        ));
        assert!(matches!(
            AdmissionController::new(10.0, Duration::ZERO, false),
            Err(AdmissionError::ZeroPeriod)
        ));
        assert!(AdmissionController::new(1.0, PERIOD, true).is_ok());
    }

    #[test]
    fn test_first_request_allowed() {
        let ctl = controller(1.0, false);
        let now = Instant::now();

        let admission = ctl.check_at("SHA256:a", now);

        assert!(admission.allowed);
        assert_eq!(admission.retry_after, None);
        assert_eq!(ctl.rate("SHA256:a"), Some(1.0));
        assert_eq!(ctl.last_seen("SHA256:a"), Some(now));
    }

    #[test]
    fn test_burst_is_bounded_by_limit() {
        let ctl = controller(5.0, false);
        let (sent, denial) = burst_until_denied(&ctl, "SHA256:a", Instant::now());

        assert_eq!(sent, 5);
        let retry_after = denial.retry_after.unwrap();
        assert!(retry_after > Duration::ZERO);
        assert!(retry_after < PERIOD);
    }

    #[test]
    fn test_identities_are_independent() {
        let ctl = controller(2.0, false);
        let now = Instant::now();

        burst_until_denied(&ctl, "SHA256:a", now);
        assert!(ctl.check_at("SHA256:b", now).allowed);
        assert_eq!(ctl.len(), 2);
    }

    #[test]
    fn test_non_strict_denial_leaves_state_untouched() {
        let ctl = controller(3.0, false);
        let now = Instant::now();
        burst_until_denied(&ctl, "SHA256:a", now);

        let rate = ctl.rate("SHA256:a").unwrap();
        let later = now + Duration::from_millis(1);
        assert!(!ctl.check_at("SHA256:a", later).allowed);

        assert_eq!(ctl.rate("SHA256:a"), Some(rate));
        assert_eq!(ctl.last_seen("SHA256:a"), Some(now));
    }

    #[test]
    fn test_strict_denial_pushes_retry_out() {
        let ctl = controller(3.0, true);
        let now = Instant::now();
        let (_, first) = burst_until_denied(&ctl, "SHA256:a", now);

        let later = now + Duration::from_millis(1);
        let second = ctl.check_at("SHA256:a", later);

        assert!(!second.allowed);
        assert!(second.retry_after.unwrap() > first.retry_after.unwrap());
        assert_eq!(ctl.last_seen("SHA256:a"), Some(later));
    }

    #[test]
    fn test_allowed_again_exactly_at_retry_after() {
        for strict in [false, true] {
            let ctl = controller(5.0, strict);
            let now = Instant::now();
            let (_, denial) = burst_until_denied(&ctl, "SHA256:a", now);

            let resume = now + denial.retry_after.unwrap();
            assert!(ctl.check_at("SHA256:a", resume).allowed, "strict = {strict}");
        }
    }

    #[test]
    fn test_retry_after_is_the_earliest_admission() {
        for strict in [false, true] {
            let ctl = controller(5.0, strict);
            let now = Instant::now();
            let (_, denial) = burst_until_denied(&ctl, "SHA256:a", now);
            let retry_after = denial.retry_after.unwrap();

            // A strict denial would move the retry time, so check early on a copy
            let early = now + retry_after.mul_f64(0.99);
            if strict {
                let copy = controller(5.0, true);
                burst_until_denied(&copy, "SHA256:a", now);
                assert!(!copy.check_at("SHA256:a", early).allowed);
            } else {
                assert!(!ctl.check_at("SHA256:a", early).allowed);
            }

            assert!(ctl.check_at("SHA256:a", now + retry_after).allowed, "strict = {strict}");
        }
    }

    #[test]
    fn test_rounded_up_retry_hint_is_honoured() {
        for strict in [false, true] {
            let ctl = controller(5.0, strict);
            let now = Instant::now();
            let (_, denial) = burst_until_denied(&ctl, "SHA256:a", now);

            let secs = denial.retry_after.unwrap().as_secs_f64().ceil() as u64;
            let resume = now + Duration::from_secs(secs.max(1));
            assert!(ctl.check_at("SHA256:a", resume).allowed, "strict = {strict}");
        }
    }

    #[test]
    fn test_strict_retry_after_later_denial() {
        let ctl = controller(3.0, true);
        let now = Instant::now();
        burst_until_denied(&ctl, "SHA256:a", now);

        let later = now + Duration::from_millis(500);
        let denial = ctl.check_at("SHA256:a", later);
        assert!(!denial.allowed);

        assert!(ctl.check_at("SHA256:a", later + denial.retry_after.unwrap()).allowed);
    }

    #[test]
    fn test_sustained_overload_is_denied() {
        let ctl = controller(10.0, false);
        let start = Instant::now();

        // 100 requests per period against a limit of 10
        let denied = (0..200u32)
            .map(|i| ctl.check_at("SHA256:a", start + Duration::from_millis(100) * i))
            .any(|admission| !admission.allowed);

        assert!(denied);
    }

    #[test]
    fn test_steady_rate_under_limit_is_allowed() {
        let ctl = controller(10.0, false);
        let start = Instant::now();

        // 2 requests per period against a limit of 10
        for i in 0..100u32 {
            let admission = ctl.check_at("SHA256:a", start + Duration::from_secs(5) * i);
            assert!(admission.allowed, "request {i} denied");
        }
    }

    #[test]
    fn test_rate_decays_while_idle() {
        let ctl = controller(100.0, false);
        let now = Instant::now();
        for _ in 0..20 {
            ctl.check_at("SHA256:a", now);
        }
        let hot = ctl.rate("SHA256:a").unwrap();

        ctl.check_at("SHA256:a", now + PERIOD * 2);
        let cooled = ctl.rate("SHA256:a").unwrap();

        assert!(cooled < hot);
    }

    #[test]
    fn test_cleanup_evicts_idle_identities() {
        let ctl = controller(10.0, false);
        let now = Instant::now();

        ctl.check_at("SHA256:old", now);
        ctl.check_at("SHA256:new", now + PERIOD * 3);

        assert_eq!(ctl.cleanup_at(now + PERIOD * 3 + Duration::from_secs(1)), 1);
        assert_eq!(ctl.rate("SHA256:old"), None);
        assert!(ctl.rate("SHA256:new").is_some());
    }

    #[test]
    fn test_remove() {
        let ctl = controller(10.0, false);
        ctl.check("SHA256:a");

        assert!(ctl.remove("SHA256:a"));
        assert!(!ctl.remove("SHA256:a"));
        assert!(ctl.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawn_cleanup_runs_each_period() {
        let ctl = Arc::new(controller(10.0, false));
        ctl.check("SHA256:a");

        let task = ctl.spawn_cleanup();
        tokio::time::sleep(PERIOD * 5).await;
        task.stop().await;

        assert!(ctl.is_empty());
    }
}
