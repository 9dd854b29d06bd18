pub mod config;
pub mod logging;

pub mod body;
pub mod hijack;
pub mod retry;
pub mod transport;
mod wire;

pub use body::{Body, BodyReadFlag, ObservedBody};
pub use hijack::{
    BasicHijackableClient, HijackCloser, HijackableClient, HijackedConnection,
    RetryingHijackClient,
};
pub use retry::{
    DefaultClassifier, ErrorClassifier, ErrorKind, ExponentialBackoff, ExponentialBackoffFactory,
    Retrier, RetryDecision, RetryPolicy, RetryPolicyFactory, ThreadSleeper, Waiter,
};
pub use transport::{CurlTransport, CurlTransportError, RetryingTransport, RoundTripper};
