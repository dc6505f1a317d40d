//! Concurrent HTTP range-download engine.
//!
//! `Downloader::download` turns one byte-range request into concurrent chunk
//! requests and returns a `RangeReader` that yields the bytes in order.

pub mod cancel;
pub mod client;
pub mod config;
pub mod downloader;
pub mod error;
pub mod limiter;
pub mod logging;
pub mod pipe;
pub mod planner;
pub mod retry;

pub use cancel::{CancelReason, CancelToken};
pub use client::{
    CurlClient, CurlOptions, HttpRequestParams, RangeClient, ResponseHead, ResponseSink,
};
pub use downloader::{DownloadStats, Downloader, DownloaderConfig, RangeReader};
pub use error::{DownloadError, FetchError, TransportKind};
pub use limiter::ConcurrencyLimit;
pub use planner::HttpRange;
