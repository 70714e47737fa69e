//! Periodic reader
//!
//! A [`Poller`] submits the configured addresses to a [`Session`] once per
//! cycle and turns every completion into a [`ReadMessage`]. Reads are not
//! awaited by the cycle itself: the session queue serializes them, so a slow
//! PLC makes reads queue up rather than skip. Completions are consumed by the
//! poll loop oldest first, so messages leave in read order.

use crate::config::{ErrorHandling, PollerConfig};
use crate::shape::{empty_payload, shape_payload, ReadMessage};
use crate::status::{NodeStatus, StatusBoard};
use mc_client::{PendingRead, Session, SubscriptionId};
use mc_core::{ConnectionState, McError, McResult, ReadValues};
use std::collections::VecDeque;
use std::future;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

const STOP_GRACE: Duration = Duration::from_secs(1);

type Outstanding = VecDeque<(Vec<String>, PendingRead)>;

async fn oldest(reads: &mut Outstanding) -> McResult<ReadValues> {
    match reads.front_mut() {
        Some((_, pending)) => pending.await,
        None => future::pending().await,
    }
}

struct PollContext {
    config: Arc<PollerConfig>,
    board: Arc<StatusBoard>,
    output: UnboundedSender<ReadMessage>,
}

impl PollContext {
    fn poll_once(&self, session: &Session, reads: &mut Outstanding) {
        let addresses = self.config.addresses();
        if addresses.is_empty() {
            log::warn!("No valid addresses provided for reading.");
            return;
        }

        let pending = session
            .submit(&addresses)
            .unwrap_or_else(|e| PendingRead::ready(Err(e)));
        reads.push_back((addresses, pending));
    }

    fn complete(&self, addresses: &[String], result: McResult<ReadValues>) {
        let values = match result {
            Ok(values) => values,
            Err(error) => {
                self.board.on_read_error(&error);
                self.handle_error(&error);
                return;
            }
        };

        self.board.on_read_ok();
        let payload = if values.is_empty() {
            log::warn!("Received empty or null values from PLC");
            empty_payload(self.config.output_format)
        } else {
            shape_payload(addresses, &values, self.config.output_format)
        };
        self.send(ReadMessage::new(payload));
    }

    fn handle_error(&self, error: &McError) {
        let text = format!("An error occurred while reading values from plc: {}", error);
        match self.config.error_handling {
            ErrorHandling::Msg => self.send(ReadMessage::failure(text)),
            ErrorHandling::Throw => log::error!("{}", text),
        }
    }

    fn send(&self, message: ReadMessage) {
        if self.output.send(message).is_err() {
            log::debug!("poller output receiver dropped");
        }
    }
}

/// Handle to a running poller
///
/// Dropping the handle stops the poll loop as well; [`stop`](Self::stop)
/// additionally waits for it to finish.
pub struct Poller {
    stop_tx: watch::Sender<bool>,
    join: Option<JoinHandle<()>>,
    status: watch::Receiver<NodeStatus>,
    subscription: Option<(Session, SubscriptionId)>,
}

impl Poller {
    /// Start polling `session` every cycle
    ///
    /// Without a session the poller only reports "No Connection" and never
    /// emits.
    ///
    /// # Errors
    /// `InvalidConfig` outside a tokio runtime, `TooManyListeners` if the
    /// session cannot take another connection listener.
    pub fn start(
        session: Option<Session>,
        config: PollerConfig,
    ) -> McResult<(Self, UnboundedReceiver<ReadMessage>)> {
        if Handle::try_current().is_err() {
            return Err(McError::InvalidConfig(
                "poller must be started inside a tokio runtime".to_string(),
            ));
        }

        let initial = if session.is_some() {
            NodeStatus::for_state(ConnectionState::Disconnected)
        } else {
            NodeStatus::no_connection()
        };
        let (board, status) = StatusBoard::new(initial);
        let board = Arc::new(board);

        let subscription = match &session {
            Some(session) => {
                let listener_board = Arc::clone(&board);
                let id = session.subscribe_fn(move |event| {
                    listener_board.on_connection_change(event.state)
                })?;
                Some((session.clone(), id))
            }
            None => None,
        };

        let (output, messages) = mpsc::unbounded_channel();
        let period = config.cycle_time();
        let ctx = PollContext {
            config: Arc::new(config),
            board,
            output,
        };
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let join = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut reads = Outstanding::new();
            loop {
                tokio::select! {
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                    result = oldest(&mut reads), if !reads.is_empty() => {
                        if let Some((addresses, _)) = reads.pop_front() {
                            ctx.complete(&addresses, result);
                        }
                    }
                    _ = ticker.tick() => {
                        if let Some(session) = &session {
                            ctx.poll_once(session, &mut reads);
                        }
                    }
                }
            }
            log::debug!("poll loop stopped, {} reads abandoned", reads.len());
        });

        let poller = Self {
            stop_tx,
            join: Some(join),
            status,
            subscription,
        };
        Ok((poller, messages))
    }

    pub fn status(&self) -> NodeStatus {
        self.status.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<NodeStatus> {
        self.status.clone()
    }

    /// Cancel the cycle and unsubscribe from connection events
    ///
    /// Returns `false` if the loop did not finish within a second.
    pub async fn stop(mut self) -> bool {
        self.detach();
        match self.join.take() {
            Some(join) => matches!(time::timeout(STOP_GRACE, join).await, Ok(Ok(()))),
            None => true,
        }
    }

    fn detach(&mut self) {
        let _ = self.stop_tx.send(true);
        if let Some((session, id)) = self.subscription.take() {
            session.unsubscribe(id);
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.detach();
    }
}
