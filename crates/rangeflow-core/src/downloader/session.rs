//! Shared state of one running download.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::cancel::CancelToken;
use crate::client::{HttpRequestParams, RangeClient};
use crate::error::DownloadError;
use crate::limiter::ConcurrencyLimit;
use crate::pipe::Buf;
use crate::planner::{Chunk, ChunkPlanner};
use crate::retry::RetryPolicy;

use super::budget::WorkerBudget;
use super::queue::ChunkQueue;
use super::worker;

/// Fields guarded by the session mutex.
#[derive(Debug)]
pub(crate) struct SessionState {
    pub(crate) planner: ChunkPlanner,
    /// Live buffers by chunk id; removed once fully read.
    pub(crate) bufs: HashMap<usize, Arc<Buf>>,
    pub(crate) reading_id: usize,
    pub(crate) err: Option<DownloadError>,
    pub(crate) budget: WorkerBudget,
    /// Unread-window cap for new buffers (`None` = whole chunk).
    window: Option<usize>,
}

/// Immutable settings a session runs with.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SessionSettings {
    pub(crate) total_chunks: usize,
    pub(crate) retry: RetryPolicy,
    pub(crate) overload_retry_delay: Duration,
}

pub(crate) struct Session {
    pub(crate) params: HttpRequestParams,
    pub(crate) client: Arc<dyn RangeClient>,
    pub(crate) limiter: Arc<ConcurrencyLimit>,
    pub(crate) cancel: CancelToken,
    pub(crate) settings: SessionSettings,
    pub(crate) queue: ChunkQueue,
    /// Serializes overload retries of chunks other than the one being read.
    pub(crate) retry_gate: Mutex<()>,
    written: AtomicU64,
    state: Mutex<SessionState>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Session {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        params: HttpRequestParams,
        client: Arc<dyn RangeClient>,
        limiter: Arc<ConcurrencyLimit>,
        cancel: CancelToken,
        settings: SessionSettings,
        planner: ChunkPlanner,
        concurrency: usize,
        window: Option<usize>,
    ) -> Arc<Self> {
        Arc::new(Self {
            params,
            client,
            limiter,
            cancel,
            settings,
            queue: ChunkQueue::new(),
            retry_gate: Mutex::new(()),
            written: AtomicU64::new(0),
            state: Mutex::new(SessionState {
                planner,
                bufs: HashMap::new(),
                reading_id: 0,
                err: None,
                budget: WorkerBudget::new(concurrency),
                window,
            }),
            workers: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Plan the next chunk, create its buffer and queue it. Returns false when
    /// the range is fully planned.
    fn plan_next(&self, st: &mut SessionState, triggers_next_worker: bool) -> bool {
        let Some(chunk) = st.planner.next_chunk(triggers_next_worker) else {
            return false;
        };
        let buf = match st.window {
            Some(window) => Buf::with_window(self.cancel.clone(), chunk.size, window),
            None => Buf::new(self.cancel.clone(), chunk.size),
        };
        st.bufs.insert(chunk.id, Arc::new(buf));
        tracing::debug!(
            chunk = chunk.id,
            start = chunk.start,
            size = chunk.size,
            ramp = triggers_next_worker,
            "chunk planned"
        );
        self.queue.push(chunk);
        true
    }

    /// Plan chunk 0 and start the first worker. The caller already holds
    /// one limiter unit for it.
    pub(crate) fn start(self: &Arc<Self>) -> Arc<Buf> {
        let mut st = self.lock();
        let ramp = st.budget.can_spawn() && self.settings.total_chunks > 1;
        st.budget.spawn();
        self.plan_next(&mut st, ramp);
        let first = st.bufs.get(&0).cloned();
        drop(st);
        self.spawn_worker();
        first.unwrap_or_else(|| Arc::new(Buf::new(self.cancel.clone(), 0)))
    }

    fn spawn_worker(self: &Arc<Self>) {
        let session = Arc::clone(self);
        let handle = std::thread::spawn(move || worker::run(session));
        self.workers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(handle);
    }

    /// A ramp-up chunk got a good response head: start one more worker and
    /// plan its first chunk.
    pub(crate) fn ramp_up(self: &Arc<Self>) {
        let mut st = self.lock();
        if !st.budget.can_spawn() || st.planner.is_exhausted() || self.cancel.is_cancelled() {
            return;
        }
        if let Err(e) = self.limiter.sub() {
            tracing::debug!("ramp-up stopped at {} workers: {}", st.budget.live(), e);
            st.budget.stop_ramp();
            return;
        }
        st.budget.spawn();
        tracing::debug!(workers = st.budget.live(), "ramp-up");
        self.plan_next(&mut st, true);
        drop(st);
        self.spawn_worker();
    }

    /// Register a failure on a chunk other than the first; returns true when
    /// the calling worker should requeue the chunk and exit.
    pub(crate) fn overload(&self, chunk: &Chunk) -> bool {
        let mut st = self.lock();
        let was_degraded = st.budget.is_degraded();
        let retire = st.budget.overload(chunk.triggers_next_worker);
        if !was_degraded {
            tracing::warn!(
                chunk = chunk.id,
                workers = st.budget.live(),
                "overload detected, ramp-up frozen"
            );
        }
        if retire {
            let mut chunk = *chunk;
            chunk.triggers_next_worker = false;
            if chunk.id == st.reading_id {
                self.queue.push_front(chunk);
            } else {
                self.queue.push(chunk);
            }
        }
        retire
    }

    /// Account for an exiting worker and return its limiter unit. `retired`
    /// workers were already dropped from the live count by `overload`.
    pub(crate) fn worker_exit(&self, retired: bool) {
        if !retired {
            self.lock().budget.retire();
        }
        self.limiter.add();
    }

    pub(crate) fn reading_id(&self) -> usize {
        self.lock().reading_id
    }

    pub(crate) fn buf(&self, id: usize) -> Option<Arc<Buf>> {
        self.lock().bufs.get(&id).cloned()
    }

    /// The consumer drained buffer `id`: drop it, plan one more chunk, and
    /// hand out buffer `id + 1`. `Ok(None)` means `id` was the last chunk.
    pub(crate) fn finish_buf(&self, id: usize) -> Result<Option<Arc<Buf>>, DownloadError> {
        let mut st = self.lock();
        st.bufs.remove(&id);
        let next = id + 1;
        if next >= self.settings.total_chunks {
            drop(st);
            self.queue.close();
            return Ok(None);
        }
        st.reading_id = next;
        self.plan_next(&mut st, false);
        match st.bufs.get(&next) {
            Some(buf) => Ok(Some(Arc::clone(buf))),
            None => Err(st.err.clone().unwrap_or(DownloadError::Interrupted)),
        }
    }

    /// Latch `err` unless an earlier error won, then stop the download.
    pub(crate) fn fail(&self, err: DownloadError) {
        {
            let mut st = self.lock();
            if st.err.is_none() {
                tracing::warn!("download failed: {}", err);
                st.err = Some(err);
            } else {
                tracing::debug!("discarding later error: {}", err);
            }
        }
        self.cancel.cancel();
    }

    pub(crate) fn error(&self) -> Option<DownloadError> {
        self.lock().err.clone()
    }

    pub(crate) fn add_written(&self, n: u64) {
        self.written.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    /// Stop every worker and wait for them. `incomplete` latches the caller's
    /// cancellation, or `Interrupted`, when nothing else failed first.
    pub(crate) fn shutdown(&self, incomplete: bool) -> Option<DownloadError> {
        {
            let mut st = self.lock();
            if incomplete && st.err.is_none() {
                st.err = Some(
                    self.cancel
                        .reason()
                        .map(DownloadError::from)
                        .unwrap_or(DownloadError::Interrupted),
                );
            }
        }
        self.cancel.cancel();
        self.queue.close();
        let bufs: Vec<Arc<Buf>> = self.lock().bufs.drain().map(|(_, b)| b).collect();
        for buf in bufs {
            buf.close();
        }
        // A worker mid ramp-up may register a sibling while we join.
        loop {
            let handles: Vec<JoinHandle<()>> = self
                .workers
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .drain(..)
                .collect();
            if handles.is_empty() {
                break;
            }
            for handle in handles {
                if handle.join().is_err() {
                    tracing::warn!("fetch worker panicked");
                }
            }
        }
        self.error()
    }
}
