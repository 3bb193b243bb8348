//! Failure taxonomy of one content acquisition attempt.

use alloc::string::String;
use core::fmt;

use crate::{extract::ExtractError, storage::StorageError};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FailureKind {
    Http,
    Transport,
    Extraction,
    Storage,
}

impl FailureKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Http => "HTTP_ERROR",
            Self::Transport => "CONNECTION_FAILED",
            Self::Extraction => "PROCESSING_FAILED",
            Self::Storage => "FILE_IO_ERROR",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FetchFailure {
    /// No response at all: connect, TLS or request write failed.
    TransportFailure { detail: String },
    /// The server answered with a non-success status.
    ProtocolError { status: u16 },
    ExtractionFailure(ExtractError),
    StorageFailure(StorageError),
}

impl FetchFailure {
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::TransportFailure { .. } => FailureKind::Transport,
            Self::ProtocolError { .. } => FailureKind::Http,
            Self::ExtractionFailure(_) => FailureKind::Extraction,
            Self::StorageFailure(_) => FailureKind::Storage,
        }
    }
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TransportFailure { detail } => write!(f, "Connection failed: {}", detail),
            Self::ProtocolError { status: 404 } => f.write_str("Joke source not found (404)"),
            Self::ProtocolError { status: 503 } => {
                f.write_str("Server temporarily unavailable (503)")
            }
            Self::ProtocolError { status } if *status >= 500 => {
                write!(f, "Server error ({})", status)
            }
            Self::ProtocolError { status } if *status >= 400 => {
                write!(f, "Client error ({})", status)
            }
            Self::ProtocolError { status } => write!(f, "Unexpected status ({})", status),
            Self::ExtractionFailure(err) => write!(f, "Error: {}", err),
            Self::StorageFailure(err) => write!(f, "{}", err),
        }
    }
}

/// Last HTTP status seen by an attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HttpStatus {
    Code(u16),
    TransportFailed,
}

impl HttpStatus {
    /// Short label shown next to the code in the printed diagnostic.
    pub const fn label(self) -> Option<&'static str> {
        match self {
            Self::Code(404) => Some("Not Found"),
            Self::Code(503) => Some("Unavailable"),
            Self::Code(code) if code >= 500 => Some("Server Error"),
            Self::Code(code) if code >= 400 => Some("Client Error"),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FetchAttemptError {
    pub status: HttpStatus,
    /// Probe result recorded before this attempt; attempt 1 assumes `true`.
    pub upstream_reachable: bool,
    pub failure: FetchFailure,
    pub attempt: u8,
}

impl FetchAttemptError {
    pub const fn kind(&self) -> FailureKind {
        self.failure.kind()
    }
}

impl fmt::Display for FetchAttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "attempt={} kind={} reachable={} {}",
            self.attempt,
            self.kind().as_str(),
            self.upstream_reachable,
            self.failure
        )
    }
}
