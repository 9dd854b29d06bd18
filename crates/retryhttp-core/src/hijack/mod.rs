//! Hijackable clients: issue a request over a raw connection, then hand the
//! live connection to the caller for protocols that upgrade past HTTP.

mod basic;
mod retrying;

use std::fmt;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{Shutdown, TcpStream};

use http::{Request, Response};

use crate::body::Body;

pub use basic::{canonical_addr, BasicHijackableClient, ClientConn, Dialer, TcpDialer};
pub use retrying::RetryingHijackClient;

/// A raw bidirectional byte stream.
pub trait Connection: Read + Write + Send {
    /// Shut down both directions. Further reads and writes fail or return EOF.
    fn shutdown(&self) -> io::Result<()>;
}

impl Connection for TcpStream {
    fn shutdown(&self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }
}

/// Handle to a connection whose request already succeeded.
///
/// Exactly one of [`hijack`](HijackCloser::hijack) or
/// [`close`](HijackCloser::close) can be called; both consume the handle.
pub trait HijackCloser: Send {
    /// Take ownership of the connection and any bytes already buffered from it.
    fn hijack(self: Box<Self>) -> HijackedConnection;

    fn close(self: Box<Self>) -> io::Result<()>;
}

/// Dials a raw connection and performs one request over it.
///
/// On success the response head has been read and the connection is left
/// positioned at the first byte after it. On failure no handle is returned and
/// any connection that was opened has been closed.
pub trait HijackableClient: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn acquire(
        &self,
        request: &mut Request<Body>,
    ) -> Result<(Response<()>, Box<dyn HijackCloser>), Self::Error>;
}

impl<T: HijackableClient + ?Sized> HijackableClient for &T {
    type Error = T::Error;

    fn acquire(
        &self,
        request: &mut Request<Body>,
    ) -> Result<(Response<()>, Box<dyn HijackCloser>), Self::Error> {
        (**self).acquire(request)
    }
}

/// A connection taken over from a hijackable client.
///
/// Reads drain bytes buffered while parsing the response head before touching
/// the socket; writes go straight to the socket.
pub struct HijackedConnection {
    reader: BufReader<Box<dyn Connection>>,
}

impl HijackedConnection {
    pub(crate) fn new(reader: BufReader<Box<dyn Connection>>) -> Self {
        Self { reader }
    }

    /// Bytes received after the response head that were not yet read.
    pub fn buffered(&self) -> &[u8] {
        self.reader.buffer()
    }

    /// Split into the raw connection and the bytes already buffered from it.
    pub fn into_parts(self) -> (Box<dyn Connection>, Vec<u8>) {
        let buffered = self.reader.buffer().to_vec();
        (self.reader.into_inner(), buffered)
    }

    pub fn shutdown(&self) -> io::Result<()> {
        self.reader.get_ref().shutdown()
    }
}

impl Read for HijackedConnection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl BufRead for HijackedConnection {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.reader.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.reader.consume(amt)
    }
}

impl Write for HijackedConnection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.reader.get_mut().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.reader.get_mut().flush()
    }
}

impl fmt::Debug for HijackedConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HijackedConnection")
            .field("buffered", &self.reader.buffer().len())
            .finish_non_exhaustive()
    }
}
