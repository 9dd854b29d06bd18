//! Classify transport errors into retry policy error kinds.

use std::error::Error;
use std::io;

/// High-level classification of an error for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operation timed out (connect/read/overall).
    Timeout,
    /// Transport flagged the failure as temporary (would block, interrupted).
    Temporary,
    /// Well-known OS-level socket failure (refused, reset, broken pipe...).
    Socket,
    /// Matched the transient message table.
    Message,
    /// Anything else; never retried.
    Permanent,
}

impl ErrorKind {
    pub fn is_retryable(self) -> bool {
        !matches!(self, ErrorKind::Permanent)
    }
}

/// Decides whether a failure is transient (worth retrying) or permanent.
pub trait ErrorClassifier: Send + Sync {
    fn classify(&self, err: &(dyn Error + 'static)) -> ErrorKind;

    fn is_retryable(&self, err: &(dyn Error + 'static)) -> bool {
        self.classify(err).is_retryable()
    }
}

impl<F> ErrorClassifier for F
where
    F: Fn(&(dyn Error + 'static)) -> ErrorKind + Send + Sync,
{
    fn classify(&self, err: &(dyn Error + 'static)) -> ErrorKind {
        self(err)
    }
}

/// Layered classification over the whole `source()` chain.
///
/// Checks run in order, first match wins: transient markers, OS-level socket
/// codes, then a case-insensitive substring match on each error's message.
/// The message fallback is platform and locale dependent; it is kept for
/// errors that carry no structured cause and should not be extended.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClassifier;

impl ErrorClassifier for DefaultClassifier {
    fn classify(&self, err: &(dyn Error + 'static)) -> ErrorKind {
        if let Some(kind) = chain(err).find_map(transient_marker) {
            return kind;
        }
        if chain(err).any(is_transient_socket_error) {
            return ErrorKind::Socket;
        }
        if chain(err).any(|e| matches_transient_message(&e.to_string())) {
            return ErrorKind::Message;
        }
        ErrorKind::Permanent
    }
}

/// Message fragments (lowercase) that mark an error as transient.
const TRANSIENT_MESSAGES: &[&str] = &[
    "i/o timeout",
    "no such host",
    "handshake failure",
    "handshake timeout",
    "timeout awaiting response headers",
    "unexpected eof",
    "connection reset by peer",
    "read on closed response body",
    "broken pipe",
    "use of closed network connection",
];

#[cfg(unix)]
const TRANSIENT_ERRNOS: &[i32] = &[
    libc::ECONNREFUSED,
    libc::ECONNRESET,
    libc::ETIMEDOUT,
    libc::EPIPE,
];

fn chain<'a>(err: &'a (dyn Error + 'static)) -> impl Iterator<Item = &'a (dyn Error + 'static)> {
    std::iter::successors(Some(err), |&e| e.source())
}

fn transient_marker(err: &(dyn Error + 'static)) -> Option<ErrorKind> {
    if let Some(e) = err.downcast_ref::<io::Error>() {
        return match e.kind() {
            io::ErrorKind::TimedOut => Some(ErrorKind::Timeout),
            io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => Some(ErrorKind::Temporary),
            _ => None,
        };
    }
    if let Some(e) = err.downcast_ref::<curl::Error>() {
        if e.is_operation_timedout() {
            return Some(ErrorKind::Timeout);
        }
    }
    None
}

fn is_transient_socket_error(err: &(dyn Error + 'static)) -> bool {
    if let Some(e) = err.downcast_ref::<io::Error>() {
        return is_transient_errno(e)
            || matches!(
                e.kind(),
                io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::BrokenPipe
            );
    }
    if let Some(e) = err.downcast_ref::<curl::Error>() {
        return e.is_couldnt_connect()
            || e.is_couldnt_resolve_host()
            || e.is_couldnt_resolve_proxy()
            || e.is_ssl_connect_error()
            || e.is_send_error()
            || e.is_recv_error()
            || e.is_got_nothing();
    }
    false
}

#[cfg(unix)]
fn is_transient_errno(e: &io::Error) -> bool {
    e.raw_os_error()
        .is_some_and(|code| TRANSIENT_ERRNOS.contains(&code))
}

#[cfg(not(unix))]
fn is_transient_errno(_e: &io::Error) -> bool {
    false
}

fn matches_transient_message(msg: &str) -> bool {
    let msg = msg.to_lowercase();
    TRANSIENT_MESSAGES.iter().any(|m| msg.contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    /// Error with a custom message and an optional cause, like a wrapped
    /// transport error.
    #[derive(Debug)]
    struct Wrapped {
        msg: &'static str,
        cause: Option<io::Error>,
    }

    impl fmt::Display for Wrapped {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.msg)
        }
    }

    impl Error for Wrapped {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            self.cause.as_ref().map(|e| e as &(dyn Error + 'static))
        }
    }

    fn classify(err: &(dyn Error + 'static)) -> ErrorKind {
        DefaultClassifier.classify(err)
    }

    fn msg(s: &'static str) -> Wrapped {
        Wrapped { msg: s, cause: None }
    }

    #[cfg(unix)]
    #[test]
    fn transient_errnos_are_socket_errors() {
        for code in [libc::ECONNREFUSED, libc::ECONNRESET, libc::EPIPE] {
            let err = io::Error::from_raw_os_error(code);
            assert_eq!(classify(&err), ErrorKind::Socket, "errno {code}");
        }
    }

    #[cfg(unix)]
    #[test]
    fn etimedout_is_a_timeout() {
        // std maps ETIMEDOUT to ErrorKind::TimedOut, which the marker check sees first.
        let err = io::Error::from_raw_os_error(libc::ETIMEDOUT);
        assert!(DefaultClassifier.is_retryable(&err));
    }

    #[cfg(unix)]
    #[test]
    fn econnreset_is_retryable() {
        let err = io::Error::from_raw_os_error(libc::ECONNRESET);
        assert!(DefaultClassifier.is_retryable(&err));
    }

    #[test]
    fn plain_message_is_permanent() {
        assert_eq!(classify(&msg("oh no")), ErrorKind::Permanent);
        assert!(!DefaultClassifier.is_retryable(&msg("oh no!")));
    }

    #[test]
    fn io_kinds_are_classified() {
        let timed_out = io::Error::new(io::ErrorKind::TimedOut, "slow");
        let would_block = io::Error::new(io::ErrorKind::WouldBlock, "later");
        let refused = io::Error::new(io::ErrorKind::ConnectionRefused, "nope");
        let denied = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(classify(&timed_out), ErrorKind::Timeout);
        assert_eq!(classify(&would_block), ErrorKind::Temporary);
        assert_eq!(classify(&refused), ErrorKind::Socket);
        assert_eq!(classify(&denied), ErrorKind::Permanent);
    }

    #[test]
    fn every_transient_message_matches() {
        for m in TRANSIENT_MESSAGES {
            let err = io::Error::new(io::ErrorKind::Other, format!("dial tcp: {m}"));
            assert_eq!(classify(&err), ErrorKind::Message, "{m}");
        }
    }

    #[test]
    fn message_match_is_case_insensitive() {
        assert_eq!(
            classify(&msg("remote error: tls: Handshake Failure")),
            ErrorKind::Message
        );
        assert_eq!(
            classify(&msg("net/http: TIMEOUT AWAITING RESPONSE HEADERS")),
            ErrorKind::Message
        );
    }

    #[test]
    fn source_chain_is_inspected() {
        let err = Wrapped {
            msg: "request failed",
            cause: Some(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
        };
        assert_eq!(classify(&err), ErrorKind::Socket);

        let err = Wrapped {
            msg: "request failed",
            cause: Some(io::Error::new(io::ErrorKind::Other, "unexpected EOF")),
        };
        assert_eq!(classify(&err), ErrorKind::Message);
    }

    #[test]
    fn markers_win_over_messages() {
        let err = io::Error::new(io::ErrorKind::TimedOut, "broken pipe");
        assert_eq!(classify(&err), ErrorKind::Timeout);
    }

    #[test]
    fn curl_errors_are_classified() {
        // CURLE_OPERATION_TIMEDOUT, CURLE_COULDNT_CONNECT, CURLE_GOT_NOTHING, CURLE_URL_MALFORMAT
        assert_eq!(classify(&curl::Error::new(28)), ErrorKind::Timeout);
        assert_eq!(classify(&curl::Error::new(7)), ErrorKind::Socket);
        assert_eq!(classify(&curl::Error::new(52)), ErrorKind::Socket);
        assert_eq!(classify(&curl::Error::new(3)), ErrorKind::Permanent);
    }

    #[test]
    fn closures_are_classifiers() {
        let always = |_: &(dyn Error + 'static)| ErrorKind::Temporary;
        assert!(always.is_retryable(&msg("oh no")));
    }
}
