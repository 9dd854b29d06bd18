//! Request/response bodies and the read observer used by the idempotency guard.

use std::fmt;
use std::io::{self, Cursor, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Owned byte stream carried by requests and responses.
///
/// A body is read at most once; transports that need to resend it must not
/// do so after any bytes were consumed (see [`ObservedBody`]).
pub struct Body {
    inner: Option<Box<dyn Read + Send>>,
}

impl Body {
    /// A body with no bytes. Reads return `Ok(0)` without touching any stream.
    pub fn empty() -> Self {
        Self { inner: None }
    }

    /// Wrap an arbitrary reader (file, pipe, socket...).
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: Read + Send + 'static,
    {
        Self {
            inner: Some(Box::new(reader)),
        }
    }

    /// True if this body was built with [`Body::empty`].
    pub fn is_empty(&self) -> bool {
        self.inner.is_none()
    }

    /// Read the remaining bytes into memory.
    pub fn into_bytes(mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

impl Read for Body {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.inner.as_mut() {
            Some(r) => r.read(buf),
            None => Ok(0),
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("Body(empty)")
        } else {
            f.write_str("Body(stream)")
        }
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from_reader(Cursor::new(bytes))
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Self::from(s.into_bytes())
    }
}

impl From<&'static [u8]> for Body {
    fn from(bytes: &'static [u8]) -> Self {
        Self::from_reader(bytes)
    }
}

impl From<&'static str> for Body {
    fn from(s: &'static str) -> Self {
        Self::from(s.as_bytes())
    }
}

/// Shared flag reporting whether an [`ObservedBody`] has been read from.
#[derive(Debug, Clone, Default)]
pub struct BodyReadFlag(Arc<AtomicBool>);

impl BodyReadFlag {
    pub fn is_read(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn mark(&self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Read decorator that flips a [`BodyReadFlag`] once bytes leave the stream.
///
/// A read returning `Ok(0)` leaves the flag untouched; a read error sets it,
/// because the inner stream position is unknown afterwards.
pub struct ObservedBody {
    inner: Body,
    flag: BodyReadFlag,
}

impl ObservedBody {
    pub fn new(inner: Body) -> (Self, BodyReadFlag) {
        let flag = BodyReadFlag::default();
        let observed = Self {
            inner,
            flag: flag.clone(),
        };
        (observed, flag)
    }

    /// Wrap `body` in place, returning the flag that observes it.
    pub fn wrap(body: &mut Body) -> BodyReadFlag {
        let original = std::mem::take(body);
        if original.is_empty() {
            // Empty bodies cannot be consumed.
            return BodyReadFlag::default();
        }
        let (observed, flag) = Self::new(original);
        *body = Body::from_reader(observed);
        flag
    }
}

impl Read for ObservedBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let res = self.inner.read(buf);
        match res {
            Ok(0) => {}
            Ok(_) | Err(_) => self.flag.mark(),
        }
        res
    }
}
