//! HTTP range client contract and its libcurl implementation.
//!
//! The engine never talks to the network directly: every sub-range request
//! goes through a `RangeClient`, which pushes the response head and body into
//! a `ResponseSink` owned by the fetch worker.

mod http;
mod parse;

pub use http::{CurlClient, CurlOptions, HeadResult};

use crate::cancel::CancelToken;
use crate::error::FetchError;
use crate::planner::HttpRange;
use std::collections::HashMap;

/// One logical request against a remote resource.
#[derive(Debug, Clone, Default)]
pub struct HttpRequestParams {
    pub url: String,
    pub range: HttpRange,
    /// Extra request headers; any `Range` entry is replaced per chunk.
    pub headers: HashMap<String, String>,
    /// Declared total size of the resource.
    pub size: u64,
}

impl HttpRequestParams {
    pub fn new(url: impl Into<String>, range: HttpRange, size: u64) -> Self {
        Self {
            url: url.into(),
            range,
            headers: HashMap::new(),
            size,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Copy of these params targeting `range`, with any caller `Range` header dropped.
    pub fn for_range(&self, range: HttpRange) -> Self {
        let mut headers = self.headers.clone();
        headers.retain(|name, _| !name.trim().eq_ignore_ascii_case("range"));
        Self {
            url: self.url.clone(),
            range,
            headers,
            size: self.size,
        }
    }
}

/// Parsed `Content-Range` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    /// Inclusive byte span, `None` for `bytes */total`.
    pub span: Option<(u64, u64)>,
    /// Total resource size, `None` for `/*`.
    pub total: Option<u64>,
}

/// Status line and the headers the engine cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u32,
    pub content_length: Option<u64>,
    pub content_range: Option<ContentRange>,
    pub accept_ranges: bool,
}

impl ResponseHead {
    pub fn new(status: u32) -> Self {
        Self {
            status,
            content_length: None,
            content_range: None,
            accept_ranges: false,
        }
    }

    /// Total size the server claims: the `Content-Range` total when present,
    /// else a non-zero `Content-Length` of a full-body response.
    pub fn total_size(&self) -> Option<u64> {
        match self.content_range {
            Some(cr) => cr.total,
            None => self.content_length.filter(|n| *n > 0),
        }
    }
}

/// Receives one response. Returning `false` stops the transfer, and the
/// client then reports `FetchError::Aborted`.
pub trait ResponseSink {
    /// Called once with the head of a 2xx response, before any body bytes.
    fn on_head(&mut self, head: &ResponseHead) -> bool;
    /// Called with each body fragment, in order.
    fn on_body(&mut self, data: &[u8]) -> bool;
}

/// Pluggable HTTP transport used by every fetch worker.
pub trait RangeClient: Send + Sync {
    /// Issue one GET for `params.range` (sent as `Range: bytes=start-end`).
    ///
    /// Non-2xx responses are reported as `FetchError::Status` without calling
    /// the sink. Implementations must stop promptly once `cancel` fires.
    fn fetch(
        &self,
        cancel: &CancelToken,
        params: &HttpRequestParams,
        sink: &mut dyn ResponseSink,
    ) -> Result<(), FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_range_drops_caller_range_header() {
        let params = HttpRequestParams::new("http://h/f", HttpRange::new(0, 10), 10)
            .with_header("RANGE", "bytes=0-1")
            .with_header("Authorization", "Bearer t");
        let sub = params.for_range(HttpRange::new(4, 2));
        assert_eq!(sub.range, HttpRange::new(4, 2));
        assert_eq!(sub.headers.len(), 1);
        assert!(sub.headers.contains_key("Authorization"));
    }

    #[test]
    fn total_size_ignores_zero_content_length() {
        let mut head = ResponseHead::new(200);
        head.content_length = Some(0);
        assert_eq!(head.total_size(), None);
    }
}
