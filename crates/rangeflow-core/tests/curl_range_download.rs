//! Integration test: local HTTP server with Range support, downloaded through
//! `CurlClient` end to end.

mod common;

use common::range_server::{self, RangeServerOptions};
use rangeflow_core::{
    CancelToken, CurlClient, DownloadError, Downloader, HttpRange, HttpRequestParams,
};
use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

fn curl_downloader(part_size: u64, concurrency: usize) -> Downloader {
    Downloader::new(common::config(
        Arc::new(CurlClient::default()),
        part_size,
        concurrency,
    ))
}

#[test]
fn multi_chunk_download_matches_served_body() {
    let body = common::body(64 * 1024);
    let server = range_server::start(body.clone());

    let head = CurlClient::default()
        .probe(&server.url, &HashMap::new())
        .expect("probe");
    assert_eq!(head.content_length, Some(body.len() as u64));
    assert!(head.accept_ranges);

    let params = HttpRequestParams::new(&server.url, HttpRange::from_start(0), body.len() as u64);
    let mut reader = curl_downloader(8 * 1024, 4)
        .download(&CancelToken::new(), params)
        .expect("download");
    let mut out = Vec::new();
    reader.read_to_end(&mut out).expect("read");
    assert_eq!(out.len(), body.len(), "size must match");
    assert_eq!(out, body, "content must match");
    assert!(reader.stats().peak_workers > 1);
    reader.close().expect("close");

    let ranges = server.ranges();
    assert_eq!(ranges.len(), 8, "one GET per chunk: {ranges:?}");
    assert!(ranges.iter().all(|r| r.is_some()));
}

#[test]
fn sub_range_with_extra_headers() {
    let body = common::body(10_000);
    let server = range_server::start(body.clone());
    let params = HttpRequestParams::new(&server.url, HttpRange::new(1234, 5000), 10_000)
        .with_header("X-Test", "1")
        .with_header("Range", "bytes=0-0");
    let mut reader = curl_downloader(1024, 3)
        .download(&CancelToken::new(), params)
        .expect("download");
    let mut out = Vec::new();
    reader.read_to_end(&mut out).expect("read");
    assert_eq!(out, &body[1234..6234]);
}

#[test]
fn probe_falls_back_to_range_request_when_head_blocked() {
    let body = common::body(4096);
    let server = range_server::start_with_options(
        body,
        RangeServerOptions {
            head_allowed: false,
            ..RangeServerOptions::default()
        },
    );
    let head = CurlClient::default()
        .probe(&server.url, &HashMap::new())
        .expect("probe");
    assert_eq!(head.content_length, Some(4096));
    assert!(head.accept_ranges);
    assert_eq!(server.ranges(), vec![Some((0, 0))]);
}

#[test]
fn server_ignoring_ranges_is_rejected() {
    let body = common::body(4096);
    let server = range_server::start_with_options(
        body,
        RangeServerOptions {
            support_ranges: false,
            ..RangeServerOptions::default()
        },
    );
    let params = HttpRequestParams::new(&server.url, HttpRange::from_start(0), 4096);
    let mut reader = curl_downloader(1024, 2)
        .download(&CancelToken::new(), params)
        .expect("download");
    let mut out = Vec::new();
    let err = reader.read_to_end(&mut out).unwrap_err();
    let inner = err
        .get_ref()
        .and_then(|e| e.downcast_ref::<DownloadError>())
        .expect("download error");
    assert!(matches!(inner, DownloadError::RangeNotHonored(_)));
}

#[test]
fn changed_remote_size_is_rejected() {
    let body = common::body(4096);
    let server = range_server::start_with_options(
        body,
        RangeServerOptions {
            reported_total: Some(5000),
            ..RangeServerOptions::default()
        },
    );
    let params = HttpRequestParams::new(&server.url, HttpRange::from_start(0), 4096);
    let mut reader = curl_downloader(1024, 2)
        .download(&CancelToken::new(), params)
        .expect("download");
    let mut out = Vec::new();
    let err = reader.read_to_end(&mut out).unwrap_err();
    let inner = err
        .get_ref()
        .and_then(|e| e.downcast_ref::<DownloadError>())
        .expect("download error");
    assert!(matches!(
        inner,
        DownloadError::SizeMismatch {
            expected: 4096,
            found: 5000
        }
    ));
}
