//! Retry and backoff policy.
//!
//! This module encapsulates error classification (timeouts, socket failures,
//! well-known transient messages), backoff decisions and the attempt loop so
//! that both the retrying transport and the retrying hijack client share one
//! consistent policy.

mod classify;
mod policy;
pub(crate) mod run;
mod wait;

pub use classify::{DefaultClassifier, ErrorClassifier, ErrorKind};
pub use policy::{
    Clock, ExponentialBackoff, ExponentialBackoffFactory, RetryDecision, RetryPolicy,
    RetryPolicyFactory, SystemClock,
};
pub use run::Retrier;
pub use wait::{ThreadSleeper, Waiter};
