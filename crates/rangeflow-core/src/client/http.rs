//! libcurl-backed `RangeClient` and HEAD probe.
//!
//! One `Easy` handle per request, driven on the calling worker thread.
//! Cancellation goes through the progress callback, which libcurl invokes at
//! least once a second even on a stalled connection.

use anyhow::{Context, Result};
use std::cell::RefCell;
use std::collections::HashMap;
use std::str;
use std::time::Duration;

use crate::cancel::CancelToken;
use crate::error::{FetchError, TransportKind};
use crate::planner::HttpRange;

use super::parse::parse_head;
use super::{HttpRequestParams, RangeClient, ResponseHead, ResponseSink};

/// Transfer tuning shared by every request of a client.
#[derive(Debug, Clone, Copy)]
pub struct CurlOptions {
    pub connect_timeout: Duration,
    /// Abort when throughput stays below `low_speed_limit` bytes/s for `low_speed_time`.
    pub low_speed_limit: u32,
    pub low_speed_time: Duration,
    /// Hard cap on one request; `None` leaves large chunks on slow links alone.
    pub timeout: Option<Duration>,
    /// Optional per-transfer receive cap in bytes per second.
    pub max_recv_speed: Option<u64>,
    /// Optional libcurl receive buffer size in bytes.
    pub buffer_size: Option<usize>,
}

impl Default for CurlOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            low_speed_limit: 1024,
            low_speed_time: Duration::from_secs(60),
            timeout: None,
            max_recv_speed: None,
            buffer_size: None,
        }
    }
}

/// Result of a size probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadResult {
    /// Total size in bytes, if the server reported it.
    pub content_length: Option<u64>,
    /// True if server sent `Accept-Ranges: bytes` or answered a range with 206.
    pub accept_ranges: bool,
}

/// `RangeClient` over libcurl easy handles.
#[derive(Debug, Clone, Default)]
pub struct CurlClient {
    opts: CurlOptions,
}

impl CurlClient {
    pub fn new(opts: CurlOptions) -> Self {
        Self { opts }
    }

    pub fn options(&self) -> &CurlOptions {
        &self.opts
    }

    fn configure(
        &self,
        easy: &mut curl::easy::Easy,
        url: &str,
        headers: &HashMap<String, String>,
    ) -> Result<(), curl::Error> {
        easy.url(url)?;
        easy.follow_location(true)?;
        easy.max_redirections(10)?;
        easy.connect_timeout(self.opts.connect_timeout)?;
        easy.low_speed_limit(self.opts.low_speed_limit)?;
        easy.low_speed_time(self.opts.low_speed_time)?;
        if let Some(timeout) = self.opts.timeout {
            easy.timeout(timeout)?;
        }
        if let Some(speed) = self.opts.max_recv_speed {
            easy.max_recv_speed(speed)?;
        }
        if let Some(sz) = self.opts.buffer_size {
            easy.buffer_size(sz)?;
        }
        if !headers.is_empty() {
            let mut list = curl::easy::List::new();
            for (k, v) in headers {
                list.append(&format!("{}: {}", k.trim(), v.trim()))?;
            }
            easy.http_headers(list)?;
        }
        Ok(())
    }

    /// Learn the size of `url`: HEAD first, then a one-byte range GET for
    /// servers that block HEAD or omit `Content-Length`.
    pub fn probe(&self, url: &str, headers: &HashMap<String, String>) -> Result<HeadResult> {
        match self.probe_head(url, headers) {
            Ok(head) if head.content_length.is_some() => return Ok(head),
            Ok(_) => tracing::debug!("HEAD {} reported no length, trying range probe", url),
            Err(e) => tracing::debug!("HEAD {} failed ({:#}), trying range probe", url, e),
        }
        self.probe_range(url, headers)
    }

    fn probe_head(&self, url: &str, headers: &HashMap<String, String>) -> Result<HeadResult> {
        let mut lines: Vec<String> = Vec::new();
        let mut easy = curl::easy::Easy::new();
        self.configure(&mut easy, url, headers)
            .context("configure HEAD request")?;
        easy.nobody(true)?;
        {
            let mut transfer = easy.transfer();
            transfer.header_function(|data| {
                collect_header_line(&mut lines, data);
                true
            })?;
            transfer.perform().context("HEAD request failed")?;
        }
        let code = easy.response_code().context("no response code")?;
        if !(200..300).contains(&code) {
            anyhow::bail!("HEAD {} returned HTTP {}", url, code);
        }
        let head = parse_head(&lines).context("HEAD response had no status line")?;
        Ok(HeadResult {
            content_length: head.content_length,
            accept_ranges: head.accept_ranges,
        })
    }

    fn probe_range(&self, url: &str, headers: &HashMap<String, String>) -> Result<HeadResult> {
        let mut lines: Vec<String> = Vec::new();
        let mut easy = curl::easy::Easy::new();
        self.configure(&mut easy, url, headers)
            .context("configure range probe")?;
        easy.range(&HttpRange::new(0, 1).curl_value())?;
        {
            let mut transfer = easy.transfer();
            transfer.header_function(|data| {
                collect_header_line(&mut lines, data);
                true
            })?;
            // Servers ignoring Range send the whole body; stop after the head.
            transfer.write_function(|_| Ok(0))?;
            if let Err(e) = transfer.perform() {
                if !e.is_write_error() {
                    return Err(e).context("range probe failed");
                }
            }
        }
        let head = parse_head(&lines).context("range probe response had no status line")?;
        if !(200..300).contains(&head.status) {
            anyhow::bail!("range probe {} returned HTTP {}", url, head.status);
        }
        let ranged = head.status == 206;
        let content_length = if ranged {
            head.content_range.and_then(|cr| cr.total)
        } else {
            head.content_length
        };
        Ok(HeadResult {
            content_length,
            accept_ranges: ranged || head.accept_ranges,
        })
    }
}

impl RangeClient for CurlClient {
    fn fetch(
        &self,
        cancel: &CancelToken,
        params: &HttpRequestParams,
        sink: &mut dyn ResponseSink,
    ) -> Result<(), FetchError> {
        let mut easy = curl::easy::Easy::new();
        self.configure(&mut easy, &params.url, &params.headers)
            .map_err(|e| curl_error(&e))?;
        easy.range(&params.range.curl_value())
            .map_err(|e| curl_error(&e))?;
        easy.progress(true).map_err(|e| curl_error(&e))?;

        let lines: RefCell<Vec<String>> = RefCell::new(Vec::new());
        let head_seen = RefCell::new(false);
        let failure: RefCell<Option<FetchError>> = RefCell::new(None);

        let performed = {
            let mut transfer = easy.transfer();
            transfer
                .header_function(|data| {
                    collect_header_line(&mut lines.borrow_mut(), data);
                    true
                })
                .map_err(|e| curl_error(&e))?;
            transfer
                .write_function(|data| {
                    if !*head_seen.borrow() {
                        *head_seen.borrow_mut() = true;
                        if let Err(e) = deliver_head(&lines.borrow(), &mut *sink) {
                            *failure.borrow_mut() = Some(e);
                            return Ok(0);
                        }
                    }
                    if sink.on_body(data) {
                        Ok(data.len())
                    } else {
                        *failure.borrow_mut() = Some(FetchError::Aborted);
                        Ok(0)
                    }
                })
                .map_err(|e| curl_error(&e))?;
            transfer
                .progress_function(|_, _, _, _| !cancel.is_cancelled())
                .map_err(|e| curl_error(&e))?;
            transfer.perform()
        };

        if let Some(reason) = cancel.reason() {
            return Err(FetchError::Cancelled(reason));
        }
        if let Some(e) = failure.into_inner() {
            return Err(e);
        }
        if let Err(e) = performed {
            return Err(curl_error(&e));
        }
        if !head_seen.into_inner() {
            // Empty body: the write callback never ran.
            deliver_head(&lines.into_inner(), sink)?;
        }
        Ok(())
    }
}

/// Validate the status and hand a 2xx head to the sink.
fn deliver_head(lines: &[String], sink: &mut dyn ResponseSink) -> Result<(), FetchError> {
    let head: ResponseHead = parse_head(lines).ok_or_else(|| {
        FetchError::transport(TransportKind::Other, "response had no status line")
    })?;
    if !(200..300).contains(&head.status) {
        return Err(FetchError::Status(head.status));
    }
    if !sink.on_head(&head) {
        return Err(FetchError::Aborted);
    }
    Ok(())
}

/// Accumulate header lines; a new status line (after a redirect or
/// `100 Continue`) starts over.
fn collect_header_line(lines: &mut Vec<String>, data: &[u8]) {
    if let Ok(s) = str::from_utf8(data) {
        let line = s.trim_end();
        if line.starts_with("HTTP/") {
            lines.clear();
        }
        if !line.is_empty() {
            lines.push(line.to_string());
        }
    }
}

/// Map a curl failure into a classified `FetchError`.
fn curl_error(e: &curl::Error) -> FetchError {
    let kind = if e.is_operation_timedout() {
        TransportKind::Timeout
    } else if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_partial_file()
    {
        TransportKind::Connection
    } else {
        TransportKind::Other
    };
    FetchError::transport(kind, e.to_string())
}
