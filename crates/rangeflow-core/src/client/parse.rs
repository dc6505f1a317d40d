//! Parse HTTP response header lines into a `ResponseHead`.

use super::{ContentRange, ResponseHead};

/// Parse collected header lines (status line first) into a `ResponseHead`.
/// Returns `None` when no status line was seen.
pub(crate) fn parse_head(lines: &[String]) -> Option<ResponseHead> {
    let mut status = None;
    let mut content_length = None;
    let mut content_range = None;
    let mut accept_ranges = false;

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with("HTTP/") {
            status = parse_status_line(line);
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            let value = value.trim();
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.parse::<u64>().ok();
            } else if name.eq_ignore_ascii_case("content-range") {
                content_range = parse_content_range(value);
            } else if name.eq_ignore_ascii_case("accept-ranges") {
                accept_ranges = value.eq_ignore_ascii_case("bytes");
            }
        }
    }

    Some(ResponseHead {
        status: status?,
        content_length,
        content_range,
        accept_ranges,
    })
}

/// `HTTP/1.1 206 Partial Content` -> 206.
pub(crate) fn parse_status_line(line: &str) -> Option<u32> {
    line.split_whitespace().nth(1)?.parse().ok()
}

/// Parse a `Content-Range` value: `bytes 0-99/1000`, `bytes 0-99/*` or
/// `bytes */1000`.
pub(crate) fn parse_content_range(value: &str) -> Option<ContentRange> {
    let rest = value.trim().strip_prefix("bytes")?.trim_start();
    let (span, total) = rest.split_once('/')?;
    let total = match total.trim() {
        "*" => None,
        t => Some(t.parse::<u64>().ok()?),
    };
    let span = match span.trim() {
        "*" => None,
        s => {
            let (a, b) = s.split_once('-')?;
            Some((a.trim().parse::<u64>().ok()?, b.trim().parse::<u64>().ok()?))
        }
    };
    Some(ContentRange { span, total })
}
