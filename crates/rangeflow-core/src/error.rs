//! Error types for HTTP fetches and whole downloads.

use crate::cancel::CancelReason;
use std::io;

/// Coarse class of a transport-level failure, used for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Connect or read timed out.
    Timeout,
    /// Connection refused/reset, DNS failure, short read from the peer.
    Connection,
    Other,
}

/// Error returned by a single HTTP request issued through a `RangeClient`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// Response had a non-2xx status.
    #[error("HTTP {0}")]
    Status(u32),
    /// The request failed below HTTP (connect, TLS, read).
    #[error("{message}")]
    Transport { kind: TransportKind, message: String },
    /// The response sink asked the client to stop the transfer.
    #[error("transfer stopped by response handler")]
    Aborted,
    /// The cancel token stopped the transfer.
    #[error(transparent)]
    Cancelled(CancelReason),
}

impl FetchError {
    pub fn transport(kind: TransportKind, message: impl Into<String>) -> Self {
        FetchError::Transport {
            kind,
            message: message.into(),
        }
    }

    /// HTTP status code, when the failure was a status response.
    pub fn status(&self) -> Option<u32> {
        match self {
            FetchError::Status(code) => Some(*code),
            _ => None,
        }
    }
}

/// Terminal error of a download, as seen by the caller of `read`/`close`.
///
/// `Clone` because the first latched error is handed to every later `read`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DownloadError {
    #[error("range start {start} is beyond resource size {size}")]
    InvalidRange { start: u64, size: u64 },
    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    /// The process-wide worker limit had no free slot.
    #[error("exceed max concurrency")]
    ExceedMaxConcurrency,
    /// The remote resource changed size under us.
    #[error("expect file size={expected} but found Content-Range total={found}")]
    SizeMismatch { expected: u64, found: u64 },
    #[error("remote did not report the resource size")]
    UnknownTotalSize,
    #[error("server did not honor the requested range: {0}")]
    RangeNotHonored(String),
    #[error("chunk {chunk} size incorrect, expected={expected}, got={received}")]
    ShortChunk {
        chunk: usize,
        expected: u64,
        received: u64,
    },
    #[error("chunk {chunk}: {source}")]
    Fetch {
        chunk: usize,
        #[source]
        source: FetchError,
    },
    #[error("download cancelled")]
    Cancelled,
    #[error("download deadline exceeded")]
    DeadlineExceeded,
    /// The reader was closed before every byte was delivered.
    #[error("download interrupted before completion")]
    Interrupted,
}

impl From<CancelReason> for DownloadError {
    fn from(reason: CancelReason) -> Self {
        match reason {
            CancelReason::Cancelled => DownloadError::Cancelled,
            CancelReason::DeadlineExceeded => DownloadError::DeadlineExceeded,
        }
    }
}

impl DownloadError {
    /// HTTP status behind this error, if any.
    pub fn status(&self) -> Option<u32> {
        match self {
            DownloadError::Fetch { source, .. } => source.status(),
            _ => None,
        }
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, DownloadError::Cancelled | DownloadError::DeadlineExceeded)
    }

    /// Wrap for `std::io::Read`. The original error stays reachable through
    /// `io::Error::get_ref` / `into_inner`.
    pub fn into_io(self) -> io::Error {
        let kind = match self {
            DownloadError::DeadlineExceeded => io::ErrorKind::TimedOut,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, self)
    }
}
