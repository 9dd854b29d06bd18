use std::fmt;
use std::io::{self, BufReader};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use http::{Request, Response, Uri};

use super::{Connection, HijackCloser, HijackableClient, HijackedConnection};
use crate::body::Body;
use crate::config::RetryHttpConfig;
use crate::wire;

const DEFAULT_PORT: u16 = 80;

/// Opens raw connections to `host:port` addresses.
pub trait Dialer: Send + Sync {
    fn dial(&self, addr: &str) -> io::Result<Box<dyn Connection>>;
}

impl<F> Dialer for F
where
    F: Fn(&str) -> io::Result<Box<dyn Connection>> + Send + Sync,
{
    fn dial(&self, addr: &str) -> io::Result<Box<dyn Connection>> {
        self(addr)
    }
}

/// Plain TCP dialer with a per-address connect timeout.
#[derive(Debug, Clone, Copy)]
pub struct TcpDialer {
    pub timeout: Duration,
}

impl Default for TcpDialer {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

impl Dialer for TcpDialer {
    fn dial(&self, addr: &str) -> io::Result<Box<dyn Connection>> {
        let mut last_err = None;
        for sock in addr.to_socket_addrs()? {
            match TcpStream::connect_timeout(&sock, self.timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    return Ok(Box::new(stream));
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such host: {} resolved to no addresses", addr),
            )
        }))
    }
}

/// `host:port` to dial for `uri`, adding port 80 when none is given.
pub fn canonical_addr(uri: &Uri) -> io::Result<String> {
    let authority = uri.authority().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("request URI has no host: {}", uri),
        )
    })?;
    let port = authority.port_u16().unwrap_or(DEFAULT_PORT);
    Ok(format!("{}:{}", authority.host(), port))
}

/// Request/response exchange over one dialed connection.
pub struct ClientConn {
    reader: BufReader<Box<dyn Connection>>,
}

impl ClientConn {
    pub fn new(conn: Box<dyn Connection>) -> Self {
        Self {
            reader: BufReader::new(conn),
        }
    }

    /// Write `request` and read the response head. The response body, if
    /// any, is left unread on the connection.
    pub fn send(&mut self, request: &mut Request<Body>) -> io::Result<Response<()>> {
        wire::write_request(self.reader.get_mut(), request)?;
        wire::read_response_head(&mut self.reader)
    }
}

impl HijackCloser for ClientConn {
    fn hijack(self: Box<Self>) -> HijackedConnection {
        HijackedConnection::new(self.reader)
    }

    fn close(self: Box<Self>) -> io::Result<()> {
        self.reader.get_ref().shutdown()
    }
}

impl fmt::Debug for ClientConn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConn").finish_non_exhaustive()
    }
}

/// Dials a fresh connection per request and returns it as a [`ClientConn`].
#[derive(Debug, Clone, Default)]
pub struct BasicHijackableClient<D = TcpDialer> {
    dialer: D,
}

impl BasicHijackableClient<TcpDialer> {
    pub fn from_config(cfg: &RetryHttpConfig) -> Self {
        Self::new(TcpDialer {
            timeout: cfg.dial_timeout(),
        })
    }
}

impl<D: Dialer> BasicHijackableClient<D> {
    pub fn new(dialer: D) -> Self {
        Self { dialer }
    }
}

impl<D: Dialer> HijackableClient for BasicHijackableClient<D> {
    type Error = io::Error;

    fn acquire(
        &self,
        request: &mut Request<Body>,
    ) -> io::Result<(Response<()>, Box<dyn HijackCloser>)> {
        let addr = canonical_addr(request.uri())?;
        let conn = self.dialer.dial(&addr)?;

        let mut client = Box::new(ClientConn::new(conn));
        match client.send(request) {
            Ok(response) => {
                let handle: Box<dyn HijackCloser> = client;
                Ok((response, handle))
            }
            Err(err) => {
                if let Err(close_err) = client.close() {
                    tracing::debug!(addr = %addr, error = %close_err, "closing failed connection");
                }
                Err(err)
            }
        }
    }
}
