//! Requested byte range and HTTP Range header math.

use crate::error::DownloadError;

/// Byte range requested by the caller. `length: None` means "to the end".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HttpRange {
    /// Start offset (inclusive).
    pub start: u64,
    pub length: Option<u64>,
}

impl HttpRange {
    pub fn new(start: u64, length: u64) -> Self {
        Self {
            start,
            length: Some(length),
        }
    }

    /// From `start` to the end of the resource.
    pub fn from_start(start: u64) -> Self {
        Self {
            start,
            length: None,
        }
    }

    /// Clamp against a resource of `size` bytes. An open or overflowing length
    /// becomes `size - start`.
    pub fn clamp(self, size: u64) -> Result<HttpRange, DownloadError> {
        if self.start > size {
            return Err(DownloadError::InvalidRange {
                start: self.start,
                size,
            });
        }
        let available = size - self.start;
        let length = match self.length {
            Some(len) if len <= available => len,
            _ => available,
        };
        Ok(HttpRange::new(self.start, length))
    }

    /// Length after clamping; `None` for an open range.
    pub fn len(&self) -> Option<u64> {
        self.length
    }

    /// HTTP Range header value (inclusive end): `bytes=start-(end-1)`.
    /// An open range yields `bytes=start-`.
    pub fn header_value(&self) -> String {
        match self.length {
            None => format!("bytes={}-", self.start),
            Some(0) => format!("bytes={}-{}", self.start, self.start),
            Some(len) => format!("bytes={}-{}", self.start, self.start + len - 1),
        }
    }

    /// Range in the `start-end` form libcurl's `CURLOPT_RANGE` expects.
    pub fn curl_value(&self) -> String {
        let header = self.header_value();
        header.trim_start_matches("bytes=").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_open_range_to_end() {
        let r = HttpRange::from_start(10).clamp(100).unwrap();
        assert_eq!(r, HttpRange::new(10, 90));
    }

    #[test]
    fn clamp_overflowing_length() {
        let r = HttpRange::new(90, 50).clamp(100).unwrap();
        assert_eq!(r.len(), Some(10));
        let r = HttpRange::new(100, 5).clamp(100).unwrap();
        assert_eq!(r.len(), Some(0));
    }

    #[test]
    fn clamp_rejects_start_past_end() {
        assert!(matches!(
            HttpRange::new(101, 1).clamp(100),
            Err(DownloadError::InvalidRange { start: 101, size: 100 })
        ));
    }

    #[test]
    fn range_header_inclusive_end() {
        let r = HttpRange::new(0, 99);
        assert_eq!(r.header_value(), "bytes=0-98");
        assert_eq!(r.curl_value(), "0-98");
        assert_eq!(HttpRange::new(42, 1).header_value(), "bytes=42-42");
        assert_eq!(HttpRange::from_start(7).header_value(), "bytes=7-");
    }
}
