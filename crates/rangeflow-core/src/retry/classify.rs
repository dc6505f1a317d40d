//! Classify HTTP statuses and fetch errors into retry policy error kinds.

use crate::error::{FetchError, TransportKind};
use crate::retry::policy::ErrorKind;

/// Classify an HTTP status code for retry decisions.
///
/// Only 429, 502, 503 and 504 are considered transient.
pub fn classify_http_status(code: u32) -> ErrorKind {
    match code {
        429 | 503 => ErrorKind::Throttled,
        502 | 504 => ErrorKind::Gateway(code as u16),
        416 => ErrorKind::RangeNotSatisfiable,
        _ => ErrorKind::Other,
    }
}

/// Classify a fetch error raised before any response body was accepted.
pub fn classify(e: &FetchError) -> ErrorKind {
    match e {
        FetchError::Status(code) => classify_http_status(*code),
        FetchError::Transport { kind, .. } => match kind {
            TransportKind::Timeout => ErrorKind::Timeout,
            TransportKind::Connection => ErrorKind::Connection,
            TransportKind::Other => ErrorKind::Other,
        },
        FetchError::Aborted | FetchError::Cancelled(_) => ErrorKind::Other,
    }
}
