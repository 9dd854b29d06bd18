use http::{Request, Response};

use super::{HijackCloser, HijackableClient};
use crate::body::Body;
use crate::retry::Retrier;

/// Retries a wrapped [`HijackableClient`] on transient failures.
///
/// There is no body-read guard here: every attempt dials a fresh connection,
/// and a failed attempt never yields a handle, so nothing leaks between tries.
/// Callers that send a streaming body over a hijack request must make sure the
/// body is replayable themselves.
#[derive(Debug, Clone)]
pub struct RetryingHijackClient<C> {
    inner: C,
    retrier: Retrier,
}

impl<C: HijackableClient> RetryingHijackClient<C> {
    pub fn new(inner: C, retrier: Retrier) -> Self {
        Self { inner, retrier }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

impl<C: HijackableClient> HijackableClient for RetryingHijackClient<C> {
    type Error = C::Error;

    fn acquire(
        &self,
        request: &mut Request<Body>,
    ) -> Result<(Response<()>, Box<dyn HijackCloser>), C::Error> {
        self.retrier.run(|| false, || self.inner.acquire(request))
    }
}
