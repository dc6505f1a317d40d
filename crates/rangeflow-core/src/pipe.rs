//! Bounded single-producer/single-consumer byte pipe carrying one chunk.
//!
//! A fetch worker writes the chunk body into a `Buf`; the sequential reader
//! drains it. Reads block while the pipe is empty and fewer than `size` bytes
//! have been written. Wakeups use a single-slot flag behind a condvar, so
//! extra signals are harmless.

use crate::cancel::{CancelReason, CancelToken, CANCEL_POLL};
use std::collections::VecDeque;
use std::io;
use std::sync::{Condvar, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct BufState {
    data: VecDeque<u8>,
    /// Bytes accepted from the writer so far (forced to `size` on close).
    off: u64,
    closed: bool,
    read_pending: bool,
    signalled: bool,
}

/// Byte pipe of a declared logical size.
#[derive(Debug)]
pub struct Buf {
    size: u64,
    /// Max unread bytes before `write` waits for the reader.
    window: usize,
    cancel: CancelToken,
    state: Mutex<BufState>,
    readable: Condvar,
    writable: Condvar,
}

impl Buf {
    /// Pipe that accepts its whole `size` without waiting for the reader.
    pub fn new(cancel: CancelToken, size: u64) -> Self {
        Self::with_window(cancel, size, usize::MAX)
    }

    /// Pipe that holds at most `window` unread bytes; `write` blocks beyond that.
    pub fn with_window(cancel: CancelToken, size: u64, window: usize) -> Self {
        Self {
            size,
            window: window.max(1),
            cancel,
            state: Mutex::new(BufState::default()),
            readable: Condvar::new(),
            writable: Condvar::new(),
        }
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Bytes written so far.
    pub fn written(&self) -> u64 {
        self.lock().off
    }

    /// Bytes written but not yet read.
    pub fn buffered(&self) -> usize {
        self.lock().data.len()
    }

    /// Append `p`, waking a blocked reader. Fails once the pipe is closed, the
    /// token is cancelled, or the write would run past `size`.
    pub fn write(&self, mut p: &[u8]) -> io::Result<usize> {
        let total = p.len();
        let mut st = self.lock();
        if st.closed {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "buffer closed"));
        }
        if st.off + total as u64 > self.size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "write of {} bytes overflows buffer ({} of {} written)",
                    total, st.off, self.size
                ),
            ));
        }
        while !p.is_empty() {
            if let Some(reason) = self.cancel.reason() {
                return Err(io::Error::new(io::ErrorKind::Other, reason));
            }
            if st.closed {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "buffer closed"));
            }
            let room = self.window.saturating_sub(st.data.len());
            if room == 0 {
                st = self
                    .writable
                    .wait_timeout(st, CANCEL_POLL)
                    .unwrap_or_else(|e| e.into_inner())
                    .0;
                continue;
            }
            let n = room.min(p.len());
            st.data.extend(&p[..n]);
            st.off += n as u64;
            p = &p[n..];
            if st.read_pending {
                st.signalled = true;
                self.readable.notify_one();
            }
        }
        Ok(total)
    }

    /// Drain into `out`. Returns `Ok(0)` at end of stream, i.e. once `size`
    /// bytes were written (or the pipe was closed) and everything was read.
    pub fn read(&self, out: &mut [u8]) -> Result<usize, CancelReason> {
        if out.is_empty() {
            return Ok(0);
        }
        let mut st = self.lock();
        loop {
            if let Some(reason) = self.cancel.reason() {
                return Err(reason);
            }
            if !st.data.is_empty() {
                let n = out.len().min(st.data.len());
                for (dst, src) in out.iter_mut().zip(st.data.drain(..n)) {
                    *dst = src;
                }
                self.writable.notify_one();
                return Ok(n);
            }
            if st.off >= self.size {
                return Ok(0);
            }
            st.read_pending = true;
            st = self
                .readable
                .wait_timeout_while(st, CANCEL_POLL, |s| !s.signalled)
                .unwrap_or_else(|e| e.into_inner())
                .0;
            st.signalled = false;
            st.read_pending = false;
        }
    }

    /// Mark the pipe complete and wake both sides. Bytes already buffered can
    /// still be read; further writes fail.
    pub fn close(&self) {
        let mut st = self.lock();
        st.closed = true;
        st.off = self.size;
        st.signalled = true;
        self.readable.notify_all();
        self.writable.notify_all();
    }

    fn lock(&self) -> MutexGuard<'_, BufState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
