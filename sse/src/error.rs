//! Error types for the `sse` crate.
//!
//! Follows the same pattern as the other layers: a root `Error` struct holding an
//! `error_kind` and an optional `source` for chaining.

use std::error::Error as StdError;
use std::fmt;

pub type Result<T> = core::result::Result<T, Error>;

/// Top-level error type for the broadcast engine.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Kinds of errors the engine can report to its callers.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ErrorKind {
    /// The server has been shut down; no new clients are accepted.
    ServerClosed,
    /// A client tried to subscribe without a channel name.
    InvalidChannel,
    /// The client's mailbox is full and the server drops slow clients.
    MailboxFull,
    /// The client has disconnected or its mailbox reader is gone.
    ClientGone,
}

impl Error {
    pub fn new(error_kind: ErrorKind) -> Self {
        Self {
            source: None,
            error_kind,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.error_kind
    }
}

impl From<ErrorKind> for Error {
    fn from(error_kind: ErrorKind) -> Self {
        Self::new(error_kind)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorKind::ServerClosed => write!(f, "server closed"),
            ErrorKind::InvalidChannel => write!(f, "invalid channel name"),
            ErrorKind::MailboxFull => write!(f, "client mailbox full"),
            ErrorKind::ClientGone => write!(f, "client gone"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "SSE Error: {}", self.error_kind)
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}
