//! Fetch worker: pulls chunks off the queue and streams each into its buffer.
//!
//! Chunk 0 retries transient failures with exponential backoff and fails the
//! download otherwise. Later chunks report overload to the worker budget and
//! retry until they succeed or the download stops. Bytes already delivered
//! stay in the buffer; a retry only asks for the rest of the chunk.

use std::sync::Arc;

use crate::client::{ResponseHead, ResponseSink};
use crate::error::DownloadError;
use crate::pipe::Buf;
use crate::planner::{Chunk, HttpRange};
use crate::retry::{classify, ErrorKind, RetryDecision};

use super::session::Session;

enum ChunkOutcome {
    Done,
    /// Chunk was requeued; this worker exits to shed load.
    Retire,
    /// Download failed or was cancelled.
    Stop,
}

/// Worker thread body.
pub(crate) fn run(session: Arc<Session>) {
    let mut retired = false;
    while let Some(chunk) = session.queue.pop(&session.cancel) {
        match fetch_chunk(&session, chunk) {
            ChunkOutcome::Done => {}
            ChunkOutcome::Retire => {
                retired = true;
                break;
            }
            ChunkOutcome::Stop => break,
        }
    }
    session.worker_exit(retired);
}

fn fetch_chunk(session: &Arc<Session>, mut chunk: Chunk) -> ChunkOutcome {
    let Some(buf) = session.buf(chunk.id) else {
        return ChunkOutcome::Stop;
    };
    let expected = buf.size();
    let mut attempt = 0u32;
    let mut ramp_pending = chunk.triggers_next_worker;

    loop {
        if session.cancel.is_cancelled() {
            return ChunkOutcome::Stop;
        }
        attempt += 1;
        tracing::debug!(
            chunk = chunk.id,
            start = chunk.start,
            size = chunk.size,
            attempt,
            "fetching chunk"
        );
        let params = session
            .params
            .for_range(HttpRange::new(chunk.start, chunk.size));
        let mut sink = ChunkSink::new(session, &chunk, &buf, ramp_pending);
        let result = session.client.fetch(&session.cancel, &params, &mut sink);
        let ChunkSink {
            received,
            head_ok,
            ramped,
            fatal,
            rejected,
            ..
        } = sink;
        if ramped {
            ramp_pending = false;
        }

        if let Some(err) = fatal {
            session.fail(err);
            return ChunkOutcome::Stop;
        }
        if session.cancel.is_cancelled() {
            return ChunkOutcome::Stop;
        }
        if received == chunk.size {
            tracing::debug!(chunk = chunk.id, bytes = expected, "chunk complete");
            return ChunkOutcome::Done;
        }

        chunk.start += received;
        chunk.size -= received;
        let (kind, err) = match (rejected, result) {
            (Some(err), _) => (ErrorKind::Body, err),
            (None, Err(e)) => {
                let kind = if head_ok { ErrorKind::Body } else { classify(&e) };
                let err = DownloadError::Fetch {
                    chunk: chunk.id,
                    source: e,
                };
                (kind, err)
            }
            (None, Ok(())) => (
                ErrorKind::Body,
                DownloadError::ShortChunk {
                    chunk: chunk.id,
                    expected,
                    received: buf.written(),
                },
            ),
        };

        if kind == ErrorKind::RangeNotSatisfiable {
            session.fail(err);
            return ChunkOutcome::Stop;
        }

        if chunk.id == 0 {
            match session.settings.retry.decide(attempt, kind) {
                RetryDecision::NoRetry => {
                    session.fail(err);
                    return ChunkOutcome::Stop;
                }
                RetryDecision::RetryAfter(delay) => {
                    tracing::warn!(
                        "chunk 0 attempt {} failed ({}), retrying in {:?}",
                        attempt,
                        err,
                        delay
                    );
                    if session.cancel.sleep(delay).is_err() {
                        return ChunkOutcome::Stop;
                    }
                }
            }
            continue;
        }

        if session.overload(&chunk) {
            tracing::debug!(chunk = chunk.id, "worker retiring after failure: {}", err);
            return ChunkOutcome::Retire;
        }
        let delay = session.settings.overload_retry_delay;
        tracing::warn!(
            "chunk {} attempt {} failed ({}), retrying in {:?}",
            chunk.id,
            attempt,
            err,
            delay
        );
        let slept = if chunk.id == session.reading_id() {
            session.cancel.sleep(delay)
        } else {
            let _gate = session
                .retry_gate
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            session.cancel.sleep(delay)
        };
        if slept.is_err() {
            return ChunkOutcome::Stop;
        }
    }
}

/// Receives one response for one chunk attempt.
struct ChunkSink<'a> {
    session: &'a Arc<Session>,
    chunk: &'a Chunk,
    buf: &'a Buf,
    ramp: bool,
    received: u64,
    head_ok: bool,
    ramped: bool,
    fatal: Option<DownloadError>,
    /// Body did not fit the chunk; nothing of the offending fragment was kept.
    rejected: Option<DownloadError>,
}

impl<'a> ChunkSink<'a> {
    fn new(session: &'a Arc<Session>, chunk: &'a Chunk, buf: &'a Buf, ramp: bool) -> Self {
        Self {
            session,
            chunk,
            buf,
            ramp,
            received: 0,
            head_ok: false,
            ramped: false,
            fatal: None,
            rejected: None,
        }
    }
}

impl ResponseSink for ChunkSink<'_> {
    fn on_head(&mut self, head: &ResponseHead) -> bool {
        if let Err(e) = check_head(head, self.chunk, self.session.params.size) {
            self.fatal = Some(e);
            return false;
        }
        self.head_ok = true;
        if self.ramp && !self.ramped {
            self.ramped = true;
            self.session.ramp_up();
        }
        true
    }

    fn on_body(&mut self, data: &[u8]) -> bool {
        if self.received + data.len() as u64 > self.chunk.size {
            self.rejected = Some(DownloadError::RangeNotHonored(format!(
                "chunk {} body exceeds the {} bytes requested",
                self.chunk.id, self.chunk.size
            )));
            return false;
        }
        match self.buf.write(data) {
            Ok(n) => {
                self.received += n as u64;
                self.session.add_written(n as u64);
                true
            }
            Err(e) => {
                tracing::debug!(chunk = self.chunk.id, "buffer write stopped: {}", e);
                false
            }
        }
    }
}

/// Validate a 2xx head against the chunk and the declared resource size.
fn check_head(head: &ResponseHead, chunk: &Chunk, size: u64) -> Result<(), DownloadError> {
    if head.status == 206 {
        if let Some(cr) = head.content_range {
            match cr.total {
                None => return Err(DownloadError::UnknownTotalSize),
                Some(total) if total != size => {
                    return Err(DownloadError::SizeMismatch {
                        expected: size,
                        found: total,
                    })
                }
                Some(_) => {}
            }
            if let Some((first, _)) = cr.span {
                if first != chunk.start {
                    return Err(DownloadError::RangeNotHonored(format!(
                        "asked for offset {}, got {}",
                        chunk.start, first
                    )));
                }
            }
        }
        return Ok(());
    }

    // Full-body response: only valid when it is exactly the bytes we asked for.
    if chunk.id == 0 {
        if let Some(total) = head.total_size() {
            if total != size {
                return Err(DownloadError::SizeMismatch {
                    expected: size,
                    found: total,
                });
            }
        }
    }
    if chunk.start != 0 || head.content_length.is_some_and(|n| n != chunk.size) {
        return Err(DownloadError::RangeNotHonored(format!(
            "HTTP {} for bytes {}-{}",
            head.status,
            chunk.start,
            chunk.end().saturating_sub(1)
        )));
    }
    Ok(())
}
