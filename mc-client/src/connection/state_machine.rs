//! Connection lifecycle state machine
//!
//! # Transitions
//! ```text
//! connect()            Disconnected/Erroring -> Connecting  (stale link closed, open spawned)
//! open Ok              Connecting -> Connected
//! open Err / fault     *          -> Erroring    (one reconnect scheduled)
//! indicator 0          *          -> Disconnected (reconnect scheduled once started)
//! reconnect due        *          -> Connecting  (skipped while Connecting)
//! ```
//!
//! Every recorded state that differs from the previous one is published to
//! the listener registry and the state watch channel. Re-entering the same
//! state is silent.

use super::events::{ConnectionChangeEvent, ListenerRegistry};
use crate::session::SessionEvent;
use mc_codec::{Codec, LinkEvents, LinkReport, LinkSignal};
use mc_core::{ConnectionParams, ConnectionState, LinkIndicator, McError, McResult};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub(crate) struct ConnectionStateMachine {
    codec: Arc<dyn Codec>,
    params: ConnectionParams,
    state: ConnectionState,
    state_tx: watch::Sender<ConnectionState>,
    listeners: Arc<ListenerRegistry>,
    events_tx: UnboundedSender<SessionEvent>,
    link_tx: UnboundedSender<LinkReport>,
    /// Bumped for every link-open; older reports are ignored
    generation: u64,
    /// A link-open future is outstanding
    opening: bool,
    /// `connect()` ran at least once
    started: bool,
    reconnect: Option<JoinHandle<()>>,
}

impl ConnectionStateMachine {
    pub(crate) fn new(
        codec: Arc<dyn Codec>,
        params: ConnectionParams,
        state_tx: watch::Sender<ConnectionState>,
        listeners: Arc<ListenerRegistry>,
        events_tx: UnboundedSender<SessionEvent>,
        link_tx: UnboundedSender<LinkReport>,
    ) -> Self {
        Self {
            codec,
            params,
            state: ConnectionState::Disconnected,
            state_tx,
            listeners,
            events_tx,
            link_tx,
            generation: 0,
            opening: false,
            started: false,
            reconnect: None,
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.state
    }

    #[cfg(test)]
    pub(crate) fn reconnect_pending(&self) -> bool {
        self.reconnect.is_some()
    }

    /// Record a state; publishes only on change
    pub(crate) fn transition(&mut self, next: ConnectionState) {
        if next == ConnectionState::Connected {
            self.cancel_reconnect();
        }
        if self.state == next {
            return;
        }
        log::info!(
            "PLC {} connection status changed: {} -> {}",
            self.params.endpoint(),
            self.state,
            next
        );
        self.state = next;
        self.state_tx.send_replace(next);
        self.listeners.emit(&ConnectionChangeEvent::new(next));
    }

    /// Explicit connect request; no-op while Connecting or Connected
    pub(crate) fn connect(&mut self) {
        if self.state.is_link_active() {
            log::debug!("connect ignored, link is {}", self.state);
            return;
        }
        self.begin_connect();
    }

    fn begin_connect(&mut self) {
        self.started = true;
        self.cancel_reconnect();
        self.codec.close();

        self.generation += 1;
        self.opening = true;
        self.transition(ConnectionState::Connecting);

        let generation = self.generation;
        let codec = Arc::clone(&self.codec);
        let params = self.params.clone();
        let events = LinkEvents::new(generation, self.link_tx.clone());
        let events_tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = match tokio::time::timeout(params.open_timeout, codec.open(&params, events)).await {
                Ok(result) => result,
                Err(_) => Err(McError::LinkOpenFailure(format!(
                    "link open timed out after {}ms",
                    params.open_timeout.as_millis()
                ))),
            };
            let _ = events_tx.send(SessionEvent::LinkOpened { generation, result });
        });
    }

    /// Outcome of the link-open spawned by `begin_connect`
    pub(crate) fn on_link_opened(&mut self, generation: u64, result: McResult<()>) {
        if generation != self.generation {
            log::debug!("ignoring link-open result of stale generation {}", generation);
            return;
        }
        self.opening = false;
        match result {
            Ok(()) => self.transition(ConnectionState::Connected),
            Err(e) => self.on_fault(e),
        }
    }

    /// Signal pushed by the codec through `LinkEvents`
    pub(crate) fn on_link_report(&mut self, report: LinkReport) {
        if report.generation != self.generation {
            log::debug!("ignoring link report of stale generation {}", report.generation);
            return;
        }
        match report.signal {
            LinkSignal::Fault(e) => self.on_fault(e),
            LinkSignal::Indicator(indicator) => self.observe_indicator(indicator),
        }
    }

    /// Transport-level failure: log, go Erroring, retry after the backoff
    fn on_fault(&mut self, error: McError) {
        log::error!("PLC connection error: {}", error);
        self.transition(ConnectionState::Erroring);
        self.schedule_reconnect();
    }

    /// Follow the codec's numeric indicator
    pub(crate) fn observe_indicator(&mut self, indicator: LinkIndicator) {
        let next = indicator.state();
        self.transition(next);
        if matches!(next, ConnectionState::Disconnected | ConnectionState::Erroring) && self.started {
            self.schedule_reconnect();
        }
    }

    /// The queue presumes the link lost (read timeout, connection-shaped error)
    ///
    /// Only a notification: the codec may still consider its link healthy, in
    /// which case the next successful read records Connected again. A
    /// reconnect is scheduled only when the codec agrees the link is down.
    pub(crate) fn force_disconnected(&mut self) {
        self.transition(ConnectionState::Disconnected);
        if self.started && !self.codec.link_indicator().is_connected() {
            self.schedule_reconnect();
        }
    }

    /// Arm exactly one reconnect timer
    pub(crate) fn schedule_reconnect(&mut self) {
        if self.reconnect.is_some() {
            return;
        }
        let delay = self.params.reconnect_delay;
        log::debug!("reconnecting in {}ms", delay.as_millis());
        let events_tx = self.events_tx.clone();
        self.reconnect = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events_tx.send(SessionEvent::ReconnectDue);
        }));
    }

    pub(crate) fn on_reconnect_due(&mut self) {
        self.reconnect = None;
        if self.state == ConnectionState::Connecting || self.opening {
            log::debug!("reconnect skipped, link open already in progress");
            return;
        }
        log::info!("attempting to reconnect to {}", self.params.endpoint());
        self.begin_connect();
    }

    fn cancel_reconnect(&mut self) {
        if let Some(timer) = self.reconnect.take() {
            timer.abort();
        }
    }

    /// Close the link and stop recovering
    pub(crate) fn shutdown(&mut self) {
        self.cancel_reconnect();
        // Any open still running belongs to a dead generation from now on
        self.generation += 1;
        self.opening = false;
        self.codec.close();
        self.transition(ConnectionState::Disconnected);
        self.listeners.clear();
    }
}

impl Drop for ConnectionStateMachine {
    fn drop(&mut self) {
        self.cancel_reconnect();
    }
}
