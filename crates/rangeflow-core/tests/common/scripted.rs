//! In-memory `RangeClient` with scripted faults and delays.
//!
//! Serves ranges of a static body as 206 responses. Faults and delays are
//! keyed by the first byte of the requested range, so a test can target one
//! chunk. Every request is logged as `(start, len)`.

#![allow(dead_code)]

use rangeflow_core::client::ContentRange;
use rangeflow_core::{
    CancelToken, FetchError, HttpRequestParams, RangeClient, ResponseHead, ResponseSink,
    TransportKind,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::time::Duration;

/// One injected failure, consumed by the next request at its offset.
#[derive(Debug, Clone, Copy)]
pub enum Fault {
    /// Respond with this HTTP status.
    Status(u32),
    /// Fail before any response head.
    Connect,
    /// Send the head and `n` body bytes, then drop the connection.
    BreakAfter(usize),
    /// Send the head, then stall until cancelled.
    Stall,
    /// Send the whole body followed by `n` extra bytes.
    Overlong(usize),
}

#[derive(Default)]
struct Script {
    faults: HashMap<u64, VecDeque<Fault>>,
    body_delays: HashMap<u64, Duration>,
    barriers: HashMap<u64, Arc<Barrier>>,
}

pub struct ScriptedClient {
    body: Arc<Vec<u8>>,
    script: Mutex<Script>,
    log: Mutex<Vec<(u64, u64)>>,
    fragment: usize,
    reported_total: Option<u64>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedClient {
    pub fn new(body: Vec<u8>) -> Self {
        Self {
            body: Arc::new(body),
            script: Mutex::new(Script::default()),
            log: Mutex::new(Vec::new()),
            fragment: 3,
            reported_total: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Report this total in `Content-Range` instead of the body length.
    pub fn with_reported_total(mut self, total: u64) -> Self {
        self.reported_total = Some(total);
        self
    }

    /// Queue `fault` for the next request starting at `start`.
    pub fn fail_at(self, start: u64, fault: Fault) -> Self {
        self.script
            .lock()
            .unwrap()
            .faults
            .entry(start)
            .or_default()
            .push_back(fault);
        self
    }

    /// Delay the body of every request starting at `start`.
    pub fn delay_body_at(self, start: u64, delay: Duration) -> Self {
        self.script.lock().unwrap().body_delays.insert(start, delay);
        self
    }

    /// Hold the next request starting at `start` on `barrier` before it is
    /// answered.
    pub fn barrier_at(self, start: u64, barrier: Arc<Barrier>) -> Self {
        self.script.lock().unwrap().barriers.insert(start, barrier);
        self
    }

    pub fn requests(&self) -> Vec<(u64, u64)> {
        self.log.lock().unwrap().clone()
    }

    pub fn requests_at(&self, start: u64) -> usize {
        self.requests().iter().filter(|(s, _)| *s == start).count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn serve(
        &self,
        cancel: &CancelToken,
        start: u64,
        len: u64,
        sink: &mut dyn ResponseSink,
    ) -> Result<(), FetchError> {
        let (fault, delay, barrier) = {
            let mut script = self.script.lock().unwrap();
            let fault = script.faults.get_mut(&start).and_then(|q| q.pop_front());
            let barrier = script.barriers.remove(&start);
            (fault, script.body_delays.get(&start).copied(), barrier)
        };
        if let Some(barrier) = barrier {
            barrier.wait();
        }
        match fault {
            Some(Fault::Status(code)) => return Err(FetchError::Status(code)),
            Some(Fault::Connect) => {
                return Err(FetchError::transport(
                    TransportKind::Connection,
                    "connection refused",
                ))
            }
            _ => {}
        }

        let total = self.body.len() as u64;
        if start >= total || len == 0 {
            return Err(FetchError::Status(416));
        }
        let end = (start + len).min(total);
        let mut head = ResponseHead::new(206);
        head.content_length = Some(end - start);
        head.content_range = Some(ContentRange {
            span: Some((start, end - 1)),
            total: Some(self.reported_total.unwrap_or(total)),
        });
        head.accept_ranges = true;
        if !sink.on_head(&head) {
            return Err(FetchError::Aborted);
        }

        if let Some(delay) = delay {
            cancel.sleep(delay).map_err(FetchError::Cancelled)?;
        }
        let mut payload = self.body[start as usize..end as usize].to_vec();
        match fault {
            Some(Fault::BreakAfter(n)) => payload.truncate(n),
            Some(Fault::Stall) => payload.clear(),
            Some(Fault::Overlong(n)) => payload.extend(std::iter::repeat(0xEE).take(n)),
            _ => {}
        }
        for piece in payload.chunks(self.fragment) {
            if let Some(reason) = cancel.reason() {
                return Err(FetchError::Cancelled(reason));
            }
            if !sink.on_body(piece) {
                return Err(FetchError::Aborted);
            }
        }
        match fault {
            Some(Fault::BreakAfter(_)) => Err(FetchError::transport(
                TransportKind::Connection,
                "connection reset",
            )),
            Some(Fault::Stall) => loop {
                cancel.sleep(Duration::from_secs(3600)).map_err(FetchError::Cancelled)?;
            },
            _ => Ok(()),
        }
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RangeClient for ScriptedClient {
    fn fetch(
        &self,
        cancel: &CancelToken,
        params: &HttpRequestParams,
        sink: &mut dyn ResponseSink,
    ) -> Result<(), FetchError> {
        let start = params.range.start;
        let len = params.range.length.unwrap_or(0);
        self.log.lock().unwrap().push((start, len));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);
        self.serve(cancel, start, len, sink)
    }
}
