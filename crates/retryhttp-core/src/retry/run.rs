//! Retry loop: run an attempt until success or the policy says stop.

use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::classify::{DefaultClassifier, ErrorClassifier};
use super::policy::{ExponentialBackoffFactory, RetryDecision, RetryPolicyFactory};
use super::wait::{ThreadSleeper, Waiter};
use crate::config::RetryConfig;

/// Classifier, policy factory and waiter shared by the retrying decorators.
///
/// A `Retrier` holds no per-call state: every [`Retrier::run`] asks the
/// factory for a new policy, so one instance can serve concurrent callers.
#[derive(Clone)]
pub struct Retrier {
    classifier: Arc<dyn ErrorClassifier>,
    policies: Arc<dyn RetryPolicyFactory>,
    waiter: Arc<dyn Waiter>,
}

impl Retrier {
    /// Default classifier and thread sleeper with the given policy factory.
    pub fn new<P>(policies: P) -> Self
    where
        P: RetryPolicyFactory + 'static,
    {
        Self {
            classifier: Arc::new(DefaultClassifier),
            policies: Arc::new(policies),
            waiter: Arc::new(ThreadSleeper),
        }
    }

    /// Default exponential backoff bounded by `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(ExponentialBackoffFactory::new(timeout))
    }

    pub fn from_config(cfg: &RetryConfig) -> anyhow::Result<Self> {
        Ok(Self::new(ExponentialBackoffFactory::from_config(cfg)?))
    }

    pub fn classifier<C>(mut self, classifier: C) -> Self
    where
        C: ErrorClassifier + 'static,
    {
        self.classifier = Arc::new(classifier);
        self
    }

    pub fn waiter<W>(mut self, waiter: W) -> Self
    where
        W: Waiter + 'static,
    {
        self.waiter = Arc::new(waiter);
        self
    }

    /// Run `attempt` until it succeeds, fails permanently, or the policy stops.
    ///
    /// `replay_unsafe` is checked after every failure; once it reports true the
    /// last error is returned without consulting the classifier or policy.
    /// Errors are returned exactly as `attempt` produced them.
    pub fn run<T, E, F, U>(&self, mut replay_unsafe: U, mut attempt: F) -> Result<T, E>
    where
        E: Error + 'static,
        F: FnMut() -> Result<T, E>,
        U: FnMut() -> bool,
    {
        let mut policy = self.policies.new_policy();
        let mut failed_attempts = 0u32;
        loop {
            let err = match attempt() {
                Ok(v) => return Ok(v),
                Err(e) => e,
            };

            if replay_unsafe() {
                tracing::debug!(error = %err, "request body already consumed; not retrying");
                return Err(err);
            }

            let kind = self.classifier.classify(&err);
            if !kind.is_retryable() {
                tracing::debug!(error = %err, "permanent failure; not retrying");
                return Err(err);
            }

            failed_attempts += 1;
            match policy.next_delay(failed_attempts) {
                RetryDecision::NoRetry => {
                    tracing::warn!(
                        total_failed_attempts = failed_attempts,
                        ran_for = ?policy.elapsed(),
                        error = %err,
                        "giving up"
                    );
                    return Err(err);
                }
                RetryDecision::RetryAfter(delay) => {
                    tracing::info!(
                        failed_attempts,
                        ran_for = ?policy.elapsed(),
                        next_attempt_in = ?delay,
                        ?kind,
                        error = %err,
                        "retrying"
                    );
                    self.waiter.wait(delay);
                }
            }
        }
    }
}

impl Default for Retrier {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
            .unwrap_or_else(|_| Self::with_timeout(RetryConfig::DEFAULT_TIMEOUT))
    }
}

impl fmt::Debug for Retrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retrier").finish_non_exhaustive()
    }
}
