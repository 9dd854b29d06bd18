//! Minimal HTTP/1.1 head encoding and parsing.
//!
//! Only what the hijackable client and the curl transport need: write a
//! request head plus body, parse a status line and header lines. Bodies of
//! responses are never read here.

use http::header::{HeaderName, HeaderValue, CONTENT_LENGTH, HOST};
use http::{HeaderMap, Request, Response, StatusCode, Version};
use std::io::{self, BufRead, Read, Write};

use crate::body::Body;

/// Upper bound on a response head read from a raw connection.
const MAX_HEAD_BYTES: usize = 64 * 1024;

fn invalid(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

fn invalid_input(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, msg.into())
}

/// Parse `HTTP/1.1 200 OK` into version and status.
pub(crate) fn parse_status_line(line: &str) -> io::Result<(Version, StatusCode)> {
    let mut parts = line.trim().splitn(3, ' ');
    let version = match parts.next() {
        Some("HTTP/1.0") => Version::HTTP_10,
        Some("HTTP/1.1") => Version::HTTP_11,
        Some("HTTP/2") | Some("HTTP/2.0") => Version::HTTP_2,
        Some("HTTP/3") => Version::HTTP_3,
        _ => return Err(invalid(format!("malformed status line: {:?}", line))),
    };
    let status = parts
        .next()
        .and_then(|code| StatusCode::from_bytes(code.as_bytes()).ok())
        .ok_or_else(|| invalid(format!("malformed status code: {:?}", line)))?;
    Ok((version, status))
}

/// Parse a `Name: value` header line. Returns `None` for lines without a colon.
pub(crate) fn parse_header_line(line: &str) -> io::Result<Option<(HeaderName, HeaderValue)>> {
    let Some((name, value)) = line.split_once(':') else {
        return Ok(None);
    };
    let name = HeaderName::from_bytes(name.trim().as_bytes())
        .map_err(|e| invalid(format!("bad header name {:?}: {}", name, e)))?;
    let value = HeaderValue::from_str(value.trim())
        .map_err(|e| invalid(format!("bad header value for {}: {}", name, e)))?;
    Ok(Some((name, value)))
}

/// Build a response head from the lines of the final header block.
///
/// Earlier blocks (`100 Continue`, redirects) are skipped: a new status line
/// restarts the parse.
pub(crate) fn response_from_lines<'a, I>(lines: I) -> io::Result<Response<()>>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut head: Option<(Version, StatusCode)> = None;
    let mut headers = HeaderMap::new();
    for line in lines {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        if line.starts_with("HTTP/") {
            head = Some(parse_status_line(line)?);
            headers.clear();
            continue;
        }
        if let Some((name, value)) = parse_header_line(line)? {
            headers.append(name, value);
        }
    }
    let (version, status) = head.ok_or_else(|| invalid("response has no status line"))?;
    let mut response = Response::new(());
    *response.status_mut() = status;
    *response.version_mut() = version;
    *response.headers_mut() = headers;
    Ok(response)
}

/// Read a response head (status line through the blank line) from `reader`.
/// Interim 1xx heads other than 101 are skipped; all heads together share one
/// `MAX_HEAD_BYTES` budget. Bytes after the final head stay buffered.
pub(crate) fn read_response_head<R: BufRead>(reader: &mut R) -> io::Result<Response<()>> {
    let mut total = 0usize;
    loop {
        let lines = read_head_lines(reader, &mut total)?;
        let response = response_from_lines(lines.iter().map(String::as_str))?;
        let status = response.status();
        if !status.is_informational() || status == StatusCode::SWITCHING_PROTOCOLS {
            return Ok(response);
        }
    }
}

fn read_head_lines<R: BufRead>(reader: &mut R, total: &mut usize) -> io::Result<Vec<String>> {
    let mut lines = Vec::new();
    loop {
        let mut line = String::new();
        let n = reader
            .by_ref()
            .take((MAX_HEAD_BYTES + 1 - *total) as u64)
            .read_line(&mut line)?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "unexpected EOF reading response head",
            ));
        }
        *total += n;
        if *total > MAX_HEAD_BYTES {
            return Err(invalid("response head too large"));
        }
        if line.trim_end().is_empty() {
            if lines.is_empty() {
                continue;
            }
            return Ok(lines);
        }
        lines.push(line);
    }
}

/// Write `request` as HTTP/1.1 over `w`. The body is read fully first so it
/// can be sent with a `Content-Length`.
pub(crate) fn write_request<W: Write>(w: &mut W, request: &mut Request<Body>) -> io::Result<()> {
    let mut body = Vec::new();
    request.body_mut().read_to_end(&mut body)?;
    if let Some(declared) = request.headers().get(CONTENT_LENGTH) {
        let declared = declared
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .ok_or_else(|| invalid_input(format!("malformed Content-Length: {:?}", declared)))?;
        if declared != body.len() as u64 {
            return Err(invalid_input(format!(
                "Content-Length is {} but body has {} bytes",
                declared,
                body.len()
            )));
        }
    }

    let target = request
        .uri()
        .path_and_query()
        .map(|p| p.as_str())
        .filter(|p| !p.is_empty())
        .unwrap_or("/");
    let mut head = format!("{} {} HTTP/1.1\r\n", request.method(), target);

    if !request.headers().contains_key(HOST) {
        if let Some(authority) = request.uri().authority() {
            head.push_str(&format!("Host: {}\r\n", authority.as_str()));
        }
    }
    for (name, value) in request.headers() {
        let value = value
            .to_str()
            .map_err(|_| invalid(format!("non-ASCII value for header {}", name)))?;
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    if !body.is_empty() && !request.headers().contains_key(CONTENT_LENGTH) {
        head.push_str(&format!("Content-Length: {}\r\n", body.len()));
    }
    head.push_str("\r\n");

    w.write_all(head.as_bytes())?;
    w.write_all(&body)?;
    w.flush()
}
