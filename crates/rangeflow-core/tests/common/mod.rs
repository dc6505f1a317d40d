#![allow(dead_code)]

pub mod range_server;
pub mod scripted;

use rangeflow_core::{ConcurrencyLimit, DownloaderConfig, RangeClient};
use std::sync::Arc;
use std::time::Duration;

/// Body whose bytes encode their own offset, so misordering shows up.
pub fn body(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Config with small parts, fast retries and a private limiter.
pub fn config(client: Arc<dyn RangeClient>, part_size: u64, concurrency: usize) -> DownloaderConfig {
    DownloaderConfig {
        part_size,
        concurrency,
        retry_base_delay: Duration::from_millis(5),
        retry_max_delay: Duration::from_millis(20),
        overload_retry_delay: Duration::from_millis(5),
        client,
        concurrency_limit: Arc::new(ConcurrencyLimit::new(16)),
        ..DownloaderConfig::default()
    }
}
