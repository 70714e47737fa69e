//! Serialized read request queue
//!
//! At most one batch read is in flight against the codec. Everything else
//! waits in a FIFO backlog and is started, oldest first, after the in-flight
//! read completes, fails or times out.
//!
//! The slot moves `Idle -> InFlight -> Advancing -> (InFlight | Idle)`. While
//! `Advancing`, the next request is dispatched through the session's own
//! event channel instead of recursively, and new submissions still go to the
//! back of the backlog.

use crate::connection::ConnectionStateMachine;
use crate::session::SessionEvent;
use mc_codec::Codec;
use mc_core::{ConnectionState, McError, McResult, ReadValues};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Completion handle for one submitted read
///
/// Resolves exactly once: with the codec's outcome, `ReadTimeout`,
/// `ConnectionUnavailable`, or `SessionClosed` if the session went away
/// without answering.
#[derive(Debug)]
#[must_use = "a read result is lost if the handle is dropped"]
pub struct PendingRead {
    rx: oneshot::Receiver<McResult<ReadValues>>,
}

impl PendingRead {
    pub(crate) fn channel() -> (oneshot::Sender<McResult<ReadValues>>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }

    /// A handle that is already resolved
    pub fn ready(result: McResult<ReadValues>) -> Self {
        let (tx, pending) = Self::channel();
        let _ = tx.send(result);
        pending
    }
}

impl Future for PendingRead {
    type Output = McResult<ReadValues>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(McError::SessionClosed)))
    }
}

/// One batch read owned by the queue until it completes
pub(crate) struct ReadRequest {
    seq: u64,
    addresses: Vec<String>,
    completion: oneshot::Sender<McResult<ReadValues>>,
}

impl ReadRequest {
    fn complete(self, result: McResult<ReadValues>) {
        if self.completion.send(result).is_err() {
            log::debug!("submitter of read #{} is gone, result dropped", self.seq);
        }
    }
}

struct InFlight {
    request: ReadRequest,
    timer: JoinHandle<()>,
    started: Instant,
}

enum Slot {
    Idle,
    InFlight(InFlight),
    Advancing,
}

pub(crate) struct ReadQueue {
    codec: Arc<dyn Codec>,
    timeout: Duration,
    events_tx: UnboundedSender<SessionEvent>,
    slot: Slot,
    backlog: VecDeque<ReadRequest>,
    next_seq: u64,
}

impl ReadQueue {
    pub(crate) fn new(
        codec: Arc<dyn Codec>,
        timeout: Duration,
        events_tx: UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            codec,
            timeout,
            events_tx,
            slot: Slot::Idle,
            backlog: VecDeque::new(),
            next_seq: 0,
        }
    }

    pub(crate) fn is_busy(&self) -> bool {
        !matches!(self.slot, Slot::Idle)
    }

    pub(crate) fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    /// Accept a new request: start it now if idle, otherwise queue it
    pub(crate) fn enqueue(
        &mut self,
        addresses: Vec<String>,
        completion: oneshot::Sender<McResult<ReadValues>>,
        machine: &mut ConnectionStateMachine,
    ) {
        self.next_seq += 1;
        let request = ReadRequest {
            seq: self.next_seq,
            addresses,
            completion,
        };
        if self.is_busy() {
            log::debug!(
                "read #{} queued behind {} pending",
                request.seq,
                self.backlog.len()
            );
            self.backlog.push_back(request);
        } else {
            self.run_next(request, machine);
        }
    }

    fn run_next(&mut self, request: ReadRequest, machine: &mut ConnectionStateMachine) {
        let indicator = self.codec.link_indicator();
        if !indicator.is_connected() || machine.state() == ConnectionState::Connecting {
            if !indicator.is_connected() {
                machine.observe_indicator(indicator);
            }
            log::debug!("read #{} rejected, connection not available", request.seq);
            self.slot = Slot::Advancing;
            request.complete(Err(McError::ConnectionUnavailable));
            self.advance();
            return;
        }

        if let Err(e) = self.codec.add_items(&request.addresses) {
            log::warn!("read #{} could not register items: {}", request.seq, e);
            if e.is_connection_loss() {
                machine.force_disconnected();
            }
            self.deregister(&request.addresses);
            self.slot = Slot::Advancing;
            request.complete(Err(e));
            self.advance();
            return;
        }

        let seq = request.seq;
        let timeout = self.timeout;
        let events_tx = self.events_tx.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = events_tx.send(SessionEvent::ReadTimedOut { seq });
        });

        // The read is never aborted: a timeout only stops listening to it
        let codec = Arc::clone(&self.codec);
        let events_tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = codec.read_all().await;
            let _ = events_tx.send(SessionEvent::ReadFinished { seq, result });
        });

        self.slot = Slot::InFlight(InFlight {
            request,
            timer,
            started: Instant::now(),
        });
    }

    /// The in-flight read's timer fired first
    pub(crate) fn on_timed_out(&mut self, seq: u64, machine: &mut ConnectionStateMachine) {
        let Some(in_flight) = self.take_in_flight(seq) else {
            return;
        };
        log::warn!(
            "read #{} timed out after {}ms: {:?}",
            seq,
            in_flight.started.elapsed().as_millis(),
            in_flight.request.addresses
        );
        self.deregister(&in_flight.request.addresses);
        in_flight.request.complete(Err(McError::ReadTimeout));
        machine.force_disconnected();
        self.advance();
    }

    /// The codec answered the in-flight read
    pub(crate) fn on_finished(
        &mut self,
        seq: u64,
        result: McResult<ReadValues>,
        machine: &mut ConnectionStateMachine,
    ) {
        let Some(in_flight) = self.take_in_flight(seq) else {
            log::debug!("discarding late completion of read #{}", seq);
            return;
        };
        in_flight.timer.abort();

        match &result {
            Err(e) if e.is_connection_loss() => machine.force_disconnected(),
            Ok(_) if self.codec.link_indicator().is_connected() => {
                machine.transition(ConnectionState::Connected)
            }
            _ => {}
        }

        self.deregister(&in_flight.request.addresses);
        in_flight.request.complete(result);
        self.advance();
    }

    /// Dispatch the oldest backlog entry, or go idle
    pub(crate) fn on_advance(&mut self, machine: &mut ConnectionStateMachine) {
        if !matches!(self.slot, Slot::Advancing) {
            return;
        }
        match self.backlog.pop_front() {
            Some(next) => self.run_next(next, machine),
            None => self.slot = Slot::Idle,
        }
    }

    /// Resolve everything still owned by the queue with `error`
    pub(crate) fn flush(&mut self, error: McError) {
        if let Slot::InFlight(in_flight) = std::mem::replace(&mut self.slot, Slot::Idle) {
            in_flight.timer.abort();
            in_flight.request.complete(Err(error.clone()));
        }
        let pending = self.backlog.len();
        for request in self.backlog.drain(..) {
            request.complete(Err(error.clone()));
        }
        if pending > 0 {
            log::info!("flushed {} queued reads: {}", pending, error);
        }
    }

    fn take_in_flight(&mut self, seq: u64) -> Option<InFlight> {
        match &self.slot {
            Slot::InFlight(in_flight) if in_flight.request.seq == seq => {}
            _ => return None,
        }
        match std::mem::replace(&mut self.slot, Slot::Advancing) {
            Slot::InFlight(in_flight) => Some(in_flight),
            _ => None,
        }
    }

    fn advance(&mut self) {
        self.slot = Slot::Advancing;
        let _ = self.events_tx.send(SessionEvent::Advance);
    }

    /// Best effort; a failed deregistration must not block the queue
    fn deregister(&self, addresses: &[String]) {
        if let Err(e) = self.codec.remove_items(addresses) {
            log::warn!("Error removing items {:?}: {}", addresses, e);
        }
    }
}

impl Drop for ReadQueue {
    fn drop(&mut self) {
        self.flush(McError::SessionClosed);
    }
}
