//! Concurrent range downloader.
//!
//! Splits one byte range of a remote resource into chunks, fetches them with a
//! pool of worker threads that ramps up one worker per good response, and
//! hands the bytes back in order through a `RangeReader`. Chunks are planned
//! lazily as the reader drains buffers, so at most `concurrency` chunk
//! buffers are alive at once. Every worker holds one unit of the shared
//! `ConcurrencyLimit`.

mod budget;
mod queue;
mod reader;
mod session;
mod worker;

pub use reader::{DownloadStats, RangeReader};

use std::sync::Arc;
use std::time::Duration;

use crate::cancel::CancelToken;
use crate::client::{CurlClient, HttpRequestParams, RangeClient};
use crate::error::DownloadError;
use crate::limiter::ConcurrencyLimit;
use crate::planner::{max_part, ChunkPlanner};
use crate::retry::RetryPolicy;

use session::{Session, SessionSettings};

/// Default target chunk size: 10 MiB.
pub const DEFAULT_PART_SIZE: u64 = 10 * 1024 * 1024;
/// Default number of workers per download.
pub const DEFAULT_CONCURRENCY: usize = 2;
/// Default retries of a failing first chunk.
pub const DEFAULT_PART_BODY_MAX_RETRIES: u32 = 3;
/// Default pause before a later chunk is retried.
pub const DEFAULT_OVERLOAD_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Tuning for a `Downloader`.
#[derive(Clone)]
pub struct DownloaderConfig {
    pub part_size: u64,
    /// Workers per download; 1 forces a single sequential request.
    pub concurrency: usize,
    /// Retries of the first chunk on throttling, gateway errors or broken bodies.
    pub part_body_max_retries: u32,
    /// First backoff step of first-chunk retries.
    pub retry_base_delay: Duration,
    /// Cap on first-chunk backoff.
    pub retry_max_delay: Duration,
    /// Pause before a later chunk is retried.
    pub overload_retry_delay: Duration,
    pub client: Arc<dyn RangeClient>,
    /// Cap on workers across every download sharing it.
    pub concurrency_limit: Arc<ConcurrencyLimit>,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            part_size: DEFAULT_PART_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            part_body_max_retries: DEFAULT_PART_BODY_MAX_RETRIES,
            retry_base_delay: retry.base_delay,
            retry_max_delay: retry.max_delay,
            overload_retry_delay: DEFAULT_OVERLOAD_RETRY_DELAY,
            client: Arc::new(CurlClient::default()),
            concurrency_limit: ConcurrencyLimit::process_default(),
        }
    }
}

impl DownloaderConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            base_delay: self.retry_base_delay,
            max_delay: self.retry_max_delay,
            ..RetryPolicy::with_retries(self.part_body_max_retries)
        }
    }
}

impl std::fmt::Debug for DownloaderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloaderConfig")
            .field("part_size", &self.part_size)
            .field("concurrency", &self.concurrency)
            .field("part_body_max_retries", &self.part_body_max_retries)
            .field("retry_base_delay", &self.retry_base_delay)
            .field("retry_max_delay", &self.retry_max_delay)
            .field("overload_retry_delay", &self.overload_retry_delay)
            .field("concurrency_limit", &self.concurrency_limit)
            .finish_non_exhaustive()
    }
}

/// Entry point for range downloads.
#[derive(Debug, Clone, Default)]
pub struct Downloader {
    cfg: DownloaderConfig,
}

impl Downloader {
    pub fn new(cfg: DownloaderConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &DownloaderConfig {
        &self.cfg
    }

    /// Start downloading `params.range` and return a reader over it.
    ///
    /// The range is clamped to `params.size`. Returns immediately; chunk 0 is
    /// already in flight. Cancelling `cancel` (or its deadline passing) stops
    /// every worker and fails the next read.
    pub fn download(
        &self,
        cancel: &CancelToken,
        params: HttpRequestParams,
    ) -> Result<RangeReader, DownloadError> {
        if let Err(e) = url::Url::parse(&params.url) {
            return Err(DownloadError::InvalidUrl {
                url: params.url.clone(),
                reason: e.to_string(),
            });
        }
        if let Some(reason) = cancel.reason() {
            return Err(reason.into());
        }
        let range = params.range.clamp(params.size)?;
        let length = range.len().unwrap_or(0);
        if length == 0 {
            tracing::debug!(url = %params.url, "empty range, nothing to fetch");
            return Ok(RangeReader::empty());
        }

        let part_size = self.cfg.part_size.max(1);
        let parts = max_part(length, part_size);
        let concurrency = self.cfg.concurrency.max(1).min(parts);
        let direct = concurrency == 1 || parts == 1;

        self.cfg.concurrency_limit.sub()?;

        // One request for the whole range, its unread window capped at a part.
        let (planner, total_chunks, window) = if direct {
            (
                ChunkPlanner::new(range.start, length, length),
                1,
                Some(usize::try_from(part_size).unwrap_or(usize::MAX)),
            )
        } else {
            (ChunkPlanner::new(range.start, length, part_size), parts, None)
        };
        tracing::info!(
            url = %params.url,
            start = range.start,
            length,
            chunks = total_chunks,
            concurrency,
            "download started"
        );

        let settings = SessionSettings {
            total_chunks,
            retry: self.cfg.retry_policy(),
            overload_retry_delay: self.cfg.overload_retry_delay,
        };
        let params = HttpRequestParams { range, ..params };
        let session = Session::new(
            params,
            Arc::clone(&self.cfg.client),
            Arc::clone(&self.cfg.concurrency_limit),
            cancel.child(),
            settings,
            planner,
            concurrency,
            window,
        );
        let first = session.start();
        Ok(RangeReader::new(session, first, length))
    }
}
