//! Sequential reader over the chunk buffers of one download.

use std::io;
use std::sync::Arc;

use crate::error::DownloadError;
use crate::pipe::Buf;

use super::session::Session;

/// Point-in-time counters of a download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DownloadStats {
    /// Bytes received from the network so far.
    pub bytes_written: u64,
    /// Bytes handed to the caller so far.
    pub bytes_read: u64,
    /// Chunk buffers currently alive.
    pub live_buffers: usize,
    /// Workers currently running.
    pub live_workers: usize,
    /// Most workers that ran at once.
    pub peak_workers: usize,
}

/// Byte stream of the requested range, in order.
///
/// Reading past the end of one chunk buffer releases it and lets the download
/// plan the next chunk. Dropping the reader closes it.
pub struct RangeReader {
    session: Option<Arc<Session>>,
    current: Option<Arc<Buf>>,
    current_id: usize,
    length: u64,
    delivered: u64,
    closed: Option<Result<(), DownloadError>>,
}

impl RangeReader {
    pub(crate) fn new(session: Arc<Session>, first: Arc<Buf>, length: u64) -> Self {
        Self {
            session: Some(session),
            current: Some(first),
            current_id: 0,
            length,
            delivered: 0,
            closed: None,
        }
    }

    /// Already-complete reader for a zero-length range.
    pub(crate) fn empty() -> Self {
        Self {
            session: None,
            current: None,
            current_id: 0,
            length: 0,
            delivered: 0,
            closed: None,
        }
    }

    /// Total bytes this reader yields.
    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn stats(&self) -> DownloadStats {
        let Some(session) = &self.session else {
            return DownloadStats::default();
        };
        let st = session.lock();
        DownloadStats {
            bytes_written: session.written(),
            bytes_read: self.delivered,
            live_buffers: st.bufs.len(),
            live_workers: st.budget.live(),
            peak_workers: st.budget.peak(),
        }
    }

    /// Stop the download and wait for its workers. Returns the first error
    /// the download hit, or `Interrupted` if the stream was not read to the
    /// end. Calling it again returns the same result.
    pub fn close(&mut self) -> Result<(), DownloadError> {
        if let Some(result) = &self.closed {
            return result.clone();
        }
        self.current = None;
        let result = match &self.session {
            Some(session) => {
                let incomplete = self.delivered != self.length;
                let err = session.shutdown(incomplete);
                let st = session.lock();
                tracing::info!(
                    bytes = session.written(),
                    delivered = self.delivered,
                    peak_workers = st.budget.peak(),
                    "download closed"
                );
                match err {
                    Some(e) => Err(e),
                    None => Ok(()),
                }
            }
            None => Ok(()),
        };
        self.closed = Some(result.clone());
        result
    }

    fn read_inner(&mut self, out: &mut [u8]) -> Result<usize, DownloadError> {
        if let Some(result) = &self.closed {
            return result.clone().map(|()| 0);
        }
        let Some(session) = self.session.clone() else {
            return Ok(0);
        };
        loop {
            let Some(buf) = self.current.clone() else {
                return Ok(0);
            };
            match buf.read(out) {
                Ok(0) => {
                    self.current = session.finish_buf(self.current_id)?;
                    self.current_id += 1;
                    if self.current.is_none() {
                        tracing::debug!(bytes = self.delivered, "range fully read");
                        return Ok(0);
                    }
                }
                Ok(n) => {
                    self.delivered += n as u64;
                    return Ok(n);
                }
                Err(reason) => {
                    return Err(session.error().unwrap_or_else(|| reason.into()));
                }
            }
        }
    }
}

impl io::Read for RangeReader {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        self.read_inner(out).map_err(DownloadError::into_io)
    }
}

impl Drop for RangeReader {
    fn drop(&mut self) {
        if self.closed.is_none() {
            let _ = self.close();
        }
    }
}

impl std::fmt::Debug for RangeReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangeReader")
            .field("length", &self.length)
            .field("delivered", &self.delivered)
            .field("current_id", &self.current_id)
            .finish_non_exhaustive()
    }
}
