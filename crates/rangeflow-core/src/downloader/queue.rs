//! Blocking chunk work queue shared by the workers of one download.

use crate::cancel::{CancelToken, CANCEL_POLL};
use crate::planner::Chunk;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct QueueState {
    chunks: VecDeque<Chunk>,
    closed: bool,
}

#[derive(Debug, Default)]
pub(crate) struct ChunkQueue {
    state: Mutex<QueueState>,
    ready: Condvar,
}

impl ChunkQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, chunk: Chunk) {
        self.lock().chunks.push_back(chunk);
        self.ready.notify_one();
    }

    /// Requeue ahead of everything else (the chunk being read).
    pub(crate) fn push_front(&self, chunk: Chunk) {
        self.lock().chunks.push_front(chunk);
        self.ready.notify_one();
    }

    /// Next chunk, blocking while the queue is empty. `None` once the queue is
    /// closed or `cancel` fires.
    pub(crate) fn pop(&self, cancel: &CancelToken) -> Option<Chunk> {
        let mut st = self.lock();
        loop {
            if st.closed || cancel.is_cancelled() {
                return None;
            }
            if let Some(chunk) = st.chunks.pop_front() {
                return Some(chunk);
            }
            st = self
                .ready
                .wait_timeout(st, CANCEL_POLL)
                .unwrap_or_else(|e| e.into_inner())
                .0;
        }
    }

    /// Wake every idle worker and refuse further pops.
    pub(crate) fn close(&self) {
        let mut st = self.lock();
        st.closed = true;
        st.chunks.clear();
        self.ready.notify_all();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.lock().chunks.len()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
