use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::RetryConfig;

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Stop retrying; the last error is returned to the caller.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Decides, per failed attempt, whether to retry and how long to wait.
///
/// Instances hold per-call state (start time, attempt history) and must not be
/// shared between concurrent calls; use a [`RetryPolicyFactory`] to obtain a
/// fresh one for every logical operation.
pub trait RetryPolicy: Send {
    /// `failed_attempts` is 1-based and strictly increasing within one call.
    fn next_delay(&mut self, failed_attempts: u32) -> RetryDecision;

    /// Wall-clock time since the policy was created or last reset.
    fn elapsed(&self) -> Duration;

    /// Restart the elapsed-time window.
    fn reset(&mut self);
}

/// Produces one [`RetryPolicy`] per logical operation.
pub trait RetryPolicyFactory: Send + Sync {
    fn new_policy(&self) -> Box<dyn RetryPolicy>;
}

impl<F> RetryPolicyFactory for F
where
    F: Fn() -> Box<dyn RetryPolicy> + Send + Sync,
{
    fn new_policy(&self) -> Box<dyn RetryPolicy> {
        self()
    }
}

/// Source of monotonic time for elapsed-time tracking.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Exponential backoff without jitter, bounded by total elapsed time.
///
/// Attempt `n` waits `initial * multiplier^(n-1)`, capped at `max_interval`.
/// Once `elapsed + next delay` would exceed `max_elapsed`, the policy stops.
/// A `max_elapsed` of `None` never stops on time.
pub struct ExponentialBackoff {
    initial_interval: Duration,
    multiplier: f64,
    max_interval: Duration,
    max_elapsed: Option<Duration>,
    clock: Arc<dyn Clock>,
    started: Instant,
}

impl ExponentialBackoff {
    pub const DEFAULT_INITIAL_INTERVAL: Duration = Duration::from_secs(1);
    pub const DEFAULT_MULTIPLIER: f64 = 2.0;
    pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(16);

    /// Default schedule (1s, x2, capped at 16s) bounded by `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self::with_clock(
            Self::DEFAULT_INITIAL_INTERVAL,
            Self::DEFAULT_MULTIPLIER,
            Self::DEFAULT_MAX_INTERVAL,
            Some(timeout),
            Arc::new(SystemClock),
        )
    }

    pub fn with_clock(
        initial_interval: Duration,
        multiplier: f64,
        max_interval: Duration,
        max_elapsed: Option<Duration>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let started = clock.now();
        Self {
            initial_interval,
            multiplier,
            max_interval,
            max_elapsed,
            clock,
            started,
        }
    }

    fn interval_for(&self, failed_attempts: u32) -> Duration {
        let exp = failed_attempts.saturating_sub(1).min(i32::MAX as u32) as i32;
        let factor = self.multiplier.powi(exp);
        let raw = self.initial_interval.as_secs_f64() * factor;
        if !raw.is_finite() || raw >= self.max_interval.as_secs_f64() {
            return self.max_interval;
        }
        Duration::try_from_secs_f64(raw).unwrap_or(self.max_interval)
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn next_delay(&mut self, failed_attempts: u32) -> RetryDecision {
        let delay = self.interval_for(failed_attempts);
        if let Some(max) = self.max_elapsed {
            if self.elapsed().saturating_add(delay) > max {
                return RetryDecision::NoRetry;
            }
        }
        RetryDecision::RetryAfter(delay)
    }

    fn elapsed(&self) -> Duration {
        self.clock.now().saturating_duration_since(self.started)
    }

    fn reset(&mut self) {
        self.started = self.clock.now();
    }
}

impl fmt::Debug for ExponentialBackoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExponentialBackoff")
            .field("initial_interval", &self.initial_interval)
            .field("multiplier", &self.multiplier)
            .field("max_interval", &self.max_interval)
            .field("max_elapsed", &self.max_elapsed)
            .field("elapsed", &self.elapsed())
            .finish()
    }
}

/// Builds a fresh [`ExponentialBackoff`] for every call.
#[derive(Clone)]
pub struct ExponentialBackoffFactory {
    initial_interval: Duration,
    multiplier: f64,
    max_interval: Duration,
    timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl ExponentialBackoffFactory {
    pub fn new(timeout: Duration) -> Self {
        Self {
            initial_interval: ExponentialBackoff::DEFAULT_INITIAL_INTERVAL,
            multiplier: ExponentialBackoff::DEFAULT_MULTIPLIER,
            max_interval: ExponentialBackoff::DEFAULT_MAX_INTERVAL,
            timeout,
            clock: Arc::new(SystemClock),
        }
    }

    /// Build from validated config values.
    pub fn from_config(cfg: &RetryConfig) -> anyhow::Result<Self> {
        cfg.validate()?;
        Ok(Self {
            initial_interval: cfg.initial_delay()?,
            multiplier: cfg.multiplier,
            max_interval: cfg.max_delay()?,
            timeout: cfg.timeout()?,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl RetryPolicyFactory for ExponentialBackoffFactory {
    fn new_policy(&self) -> Box<dyn RetryPolicy> {
        Box::new(ExponentialBackoff::with_clock(
            self.initial_interval,
            self.multiplier,
            self.max_interval,
            Some(self.timeout),
            Arc::clone(&self.clock),
        ))
    }
}

impl fmt::Debug for ExponentialBackoffFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExponentialBackoffFactory")
            .field("initial_interval", &self.initial_interval)
            .field("multiplier", &self.multiplier)
            .field("max_interval", &self.max_interval)
            .field("timeout", &self.timeout)
            .finish()
    }
}
