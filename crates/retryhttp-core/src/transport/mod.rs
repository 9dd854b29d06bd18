//! Request/response transports and the retrying decorator around them.

mod curl;
mod retrying;

use http::{Request, Response};

use crate::body::Body;

pub use self::curl::{CurlTransport, CurlTransportError};
pub use self::retrying::RetryingTransport;

/// Sends one request and returns its response.
///
/// The request is borrowed mutably so a decorator can resend it; an
/// implementation that reads the body consumes it for every later attempt.
pub trait RoundTripper: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn send(&self, request: &mut Request<Body>) -> Result<Response<Body>, Self::Error>;
}

impl<T: RoundTripper + ?Sized> RoundTripper for &T {
    type Error = T::Error;

    fn send(&self, request: &mut Request<Body>) -> Result<Response<Body>, Self::Error> {
        (**self).send(request)
    }
}

impl<T: RoundTripper + ?Sized> RoundTripper for std::sync::Arc<T> {
    type Error = T::Error;

    fn send(&self, request: &mut Request<Body>) -> Result<Response<Body>, Self::Error> {
        (**self).send(request)
    }
}
