//! Error types for the RTU-over-TCP transport.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The connection has been closed.
    ConnectionClosed,
    /// The request could not be interpreted.
    InvalidRequest,
    /// Writing the request failed.
    Write,
    /// Reading the response failed.
    Read,
    /// The request deadline expired.
    Timeout,
    /// Establishing the connection failed.
    Connect,
    /// Shutting the connection down failed.
    Close,
}

/// Transport error type.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// No connection is available, either because the idle timer or the
    /// owner closed it.
    #[error("connection is closed")]
    ConnectionClosed,

    /// The request does not contain a function code.
    #[error("request too short: {0} bytes, need at least 2")]
    RequestTooShort(usize),

    /// Writing the request failed.
    #[error("write failed: {0}")]
    Write(#[source] io::Error),

    /// Reading the response failed, including end of stream before the frame
    /// was complete.
    #[error("read failed: {0}")]
    Read(#[source] io::Error),

    /// The request deadline expired.
    #[error("{op} timed out after {after:?}")]
    Timeout {
        /// Operation that was running when the deadline expired.
        op: &'static str,
        /// Configured request timeout.
        after: Duration,
    },

    /// Dialing the remote address failed.
    #[error("connect failed: {0}")]
    Connect(#[source] io::Error),

    /// Shutting the stream down failed. The connection is considered closed
    /// regardless.
    #[error("close failed: {0}")]
    Close(#[source] io::Error),
}

impl Error {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ConnectionClosed => ErrorKind::ConnectionClosed,
            Error::RequestTooShort(_) => ErrorKind::InvalidRequest,
            Error::Write(_) => ErrorKind::Write,
            Error::Read(_) => ErrorKind::Read,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::Connect(_) => ErrorKind::Connect,
            Error::Close(_) => ErrorKind::Close,
        }
    }

    /// Returns true if the error was caused by an expired deadline.
    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> io::Error {
        let kind = match &err {
            Error::ConnectionClosed => io::ErrorKind::NotConnected,
            Error::RequestTooShort(_) => io::ErrorKind::InvalidInput,
            Error::Timeout { .. } => io::ErrorKind::TimedOut,
            Error::Write(e) | Error::Read(e) | Error::Connect(e) | Error::Close(e) => e.kind(),
        };
        io::Error::new(kind, err)
    }
}

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(Error::ConnectionClosed.kind(), ErrorKind::ConnectionClosed);
        assert_eq!(Error::RequestTooShort(1).kind(), ErrorKind::InvalidRequest);
        let eof = io::Error::from(io::ErrorKind::UnexpectedEof);
        assert_eq!(Error::Read(eof).kind(), ErrorKind::Read);
        let timeout = Error::Timeout {
            op: "read",
            after: Duration::from_millis(50),
        };
        assert!(timeout.is_timeout());
    }

    #[test]
    fn test_into_io_error() {
        let err: io::Error = Error::ConnectionClosed.into();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);

        let reset = io::Error::from(io::ErrorKind::ConnectionReset);
        let err: io::Error = Error::Write(reset).into();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
    }

    #[test]
    fn test_display() {
        let timeout = Error::Timeout {
            op: "write",
            after: Duration::from_secs(1),
        };
        assert_eq!(timeout.to_string(), "write timed out after 1s");
        assert_eq!(Error::ConnectionClosed.to_string(), "connection is closed");
    }
}
