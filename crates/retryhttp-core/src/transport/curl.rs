//! libcurl-backed round tripper.
//!
//! Streams the request body through curl's read callback, so the retrying
//! decorator sees exactly when the upload started consuming it. The response
//! body is collected in memory.

use std::io::{self, Read};
use std::str;
use std::time::Duration;

use curl::easy::{Easy, List, ReadError};
use http::header::CONTENT_LENGTH;
use http::{Method, Request, Response};
use thiserror::Error;

use super::RoundTripper;
use crate::body::Body;
use crate::config::RetryHttpConfig;
use crate::wire;

/// Errors from [`CurlTransport`]. Causes are exposed through `source()` so the
/// retry classifier can inspect the underlying curl or I/O error.
#[derive(Debug, Error)]
pub enum CurlTransportError {
    /// Curl reported an error (timeout, connection, TLS, ...).
    #[error("curl: {0}")]
    Curl(#[from] curl::Error),
    /// Reading the request body failed mid-upload.
    #[error("reading request body: {0}")]
    Body(#[source] io::Error),
    /// The response head could not be parsed.
    #[error("malformed response: {0}")]
    MalformedResponse(#[source] io::Error),
}

/// Blocking HTTP transport built on `curl::easy`.
///
/// Each call uses a fresh handle; no connection reuse across calls.
#[derive(Debug, Clone)]
pub struct CurlTransport {
    connect_timeout: Duration,
    timeout: Option<Duration>,
    follow_redirects: bool,
}

impl Default for CurlTransport {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            timeout: None,
            follow_redirects: false,
        }
    }
}

impl CurlTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(cfg: &RetryHttpConfig) -> Self {
        Self {
            connect_timeout: cfg.connect_timeout(),
            timeout: cfg.request_timeout(),
            ..Self::default()
        }
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Hard limit on a single attempt (connect through last body byte).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = follow;
        self
    }

    fn configure(&self, easy: &mut Easy, request: &Request<Body>) -> Result<bool, curl::Error> {
        easy.url(&request.uri().to_string())?;
        easy.follow_location(self.follow_redirects)?;
        easy.connect_timeout(self.connect_timeout)?;
        if let Some(t) = self.timeout {
            easy.timeout(t)?;
        }

        let upload_len = request
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());

        let method = request.method();
        let has_body = !request.body().is_empty() && *method != Method::HEAD;
        if *method == Method::HEAD {
            if !request.body().is_empty() {
                tracing::debug!(uri = %request.uri(), "HEAD request body is not sent");
            }
            easy.nobody(true)?;
        } else if *method == Method::POST {
            easy.post(true)?;
            match (has_body, upload_len) {
                (false, _) => easy.post_field_size(0)?,
                (true, Some(n)) => easy.post_field_size(n)?,
                (true, None) => {}
            }
        } else if has_body {
            easy.upload(true)?;
            if let Some(n) = upload_len {
                easy.in_filesize(n)?;
            }
        }
        // Uploads default to PUT; name the method explicitly for anything else.
        let implied = *method == Method::HEAD
            || *method == Method::POST
            || (*method == Method::GET && !has_body);
        if !implied {
            easy.custom_request(method.as_str())?;
        }

        let mut list = List::new();
        for (name, value) in request.headers() {
            if let Ok(v) = value.to_str() {
                list.append(&format!("{}: {}", name, v.trim()))?;
            }
        }
        // Send the body right away instead of waiting for `100 Continue`.
        list.append("Expect:")?;
        if has_body && upload_len.is_none() {
            list.append("Transfer-Encoding: chunked")?;
        }
        easy.http_headers(list)?;

        Ok(has_body)
    }
}

impl RoundTripper for CurlTransport {
    type Error = CurlTransportError;

    fn send(&self, request: &mut Request<Body>) -> Result<Response<Body>, CurlTransportError> {
        let mut easy = Easy::new();
        let has_body = self.configure(&mut easy, request)?;

        let mut header_lines: Vec<String> = Vec::new();
        let mut response_body: Vec<u8> = Vec::new();
        let mut body_error: Option<io::Error> = None;
        let body = request.body_mut();

        let perform_result = {
            let mut transfer = easy.transfer();
            transfer.header_function(|data| {
                if let Ok(s) = str::from_utf8(data) {
                    header_lines.push(s.trim_end().to_string());
                }
                true
            })?;
            transfer.write_function(|data| {
                response_body.extend_from_slice(data);
                Ok(data.len())
            })?;
            if has_body {
                transfer.read_function(|buf| match body.read(buf) {
                    Ok(n) => Ok(n),
                    Err(e) => {
                        body_error = Some(e);
                        Err(ReadError::Abort)
                    }
                })?;
            }
            transfer.perform()
        };

        if let Err(e) = perform_result {
            if e.is_aborted_by_callback() {
                if let Some(io_err) = body_error.take() {
                    return Err(CurlTransportError::Body(io_err));
                }
            }
            return Err(CurlTransportError::Curl(e));
        }

        let head = wire::response_from_lines(header_lines.iter().map(String::as_str))
            .map_err(CurlTransportError::MalformedResponse)?;
        let (parts, ()) = head.into_parts();
        Ok(Response::from_parts(parts, Body::from(response_body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::DefaultClassifier;
    use crate::retry::ErrorClassifier;

    #[test]
    fn curl_errors_are_exposed_as_source() {
        let err = CurlTransportError::from(curl::Error::new(7));
        assert!(std::error::Error::source(&err).is_some());
        assert!(DefaultClassifier.is_retryable(&err));
    }

    #[test]
    fn body_errors_are_not_transient_by_default() {
        let err = CurlTransportError::Body(io::Error::new(io::ErrorKind::Other, "disk gone"));
        assert!(!DefaultClassifier.is_retryable(&err));
    }

    /// One-shot server that answers with the request method and body it received.
    fn echo_server() -> String {
        use std::io::{BufRead, BufReader, Write};
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            let mut method = String::new();
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                let line = line.trim_end();
                if line.is_empty() {
                    break;
                }
                if method.is_empty() {
                    method = line.split(' ').next().unwrap_or_default().to_string();
                }
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap();
                    }
                }
            }
            let mut body = vec![0u8; content_length];
            reader.read_exact(&mut body).unwrap();
            let reply = format!("{} {}", method, String::from_utf8_lossy(&body));
            let mut stream = reader.into_inner();
            write!(
                stream,
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                reply.len(),
                reply
            )
            .unwrap();
        });
        format!("http://127.0.0.1:{}/", port)
    }

    #[test]
    fn get_with_body_sends_the_body() {
        let mut req = Request::builder()
            .uri(echo_server())
            .header("Content-Length", "5")
            .body(Body::from("query"))
            .unwrap();
        let resp = CurlTransport::new().send(&mut req).unwrap();
        assert_eq!(resp.status(), http::StatusCode::OK);
        assert_eq!(resp.into_body().into_bytes().unwrap(), b"GET query");
    }

    #[test]
    fn put_uses_upload_with_its_own_method() {
        let mut req = Request::builder()
            .method(Method::PUT)
            .uri(echo_server())
            .header("Content-Length", "4")
            .body(Body::from("data"))
            .unwrap();
        let resp = CurlTransport::new().send(&mut req).unwrap();
        assert_eq!(resp.into_body().into_bytes().unwrap(), b"PUT data");
    }

    #[test]
    fn unreachable_port_is_a_transient_failure() {
        // Bind then drop to get a port nobody listens on.
        let port = {
            let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };
        let mut req = Request::builder()
            .uri(format!("http://127.0.0.1:{}/", port))
            .body(Body::empty())
            .unwrap();
        let err = CurlTransport::new()
            .connect_timeout(Duration::from_secs(2))
            .send(&mut req)
            .unwrap_err();
        assert!(matches!(err, CurlTransportError::Curl(_)));
        assert!(DefaultClassifier.is_retryable(&err));
    }
}
