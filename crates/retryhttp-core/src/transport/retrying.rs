use http::{Request, Response};

use super::RoundTripper;
use crate::body::{Body, ObservedBody};
use crate::retry::Retrier;

/// Retries a wrapped [`RoundTripper`] on transient failures.
///
/// The request body is wrapped in an [`ObservedBody`] before the first
/// attempt. As soon as any of it has been read, failures are returned without
/// retrying, since the remaining stream cannot be replayed.
#[derive(Debug, Clone)]
pub struct RetryingTransport<T> {
    inner: T,
    retrier: Retrier,
}

impl<T: RoundTripper> RetryingTransport<T> {
    pub fn new(inner: T, retrier: Retrier) -> Self {
        Self { inner, retrier }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: RoundTripper> RoundTripper for RetryingTransport<T> {
    type Error = T::Error;

    fn send(&self, request: &mut Request<Body>) -> Result<Response<Body>, T::Error> {
        let body_read = ObservedBody::wrap(request.body_mut());
        self.retrier
            .run(|| body_read.is_read(), || self.inner.send(request))
    }
}
