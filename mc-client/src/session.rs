//! Client session: one PLC link, one coordinator task
//!
//! All mutable session state (connection state machine, in-flight slot,
//! backlog) is owned by a single spawned task. [`Session`] is a cheap,
//! cloneable handle that talks to it over a channel, so no call on the
//! handle ever blocks or waits for the PLC.
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use mc_client::Session;
//! use mc_codec::SimulatedCodec;
//! use mc_core::ConnectionParams;
//! use std::sync::Arc;
//!
//! # async fn demo() -> mc_core::McResult<()> {
//! let codec = Arc::new(SimulatedCodec::new().with_value("D100", 5));
//! let session = Session::spawn(codec, ConnectionParams::new("192.168.3.39", 5007))?;
//! let values = session.read(["D100"]).await?;
//! session.shutdown().await;
//! # let _ = values;
//! # Ok(())
//! # }
//! ```

use crate::builder::SessionBuilder;
use crate::connection::{
    CallbackEventListener, ChannelEventListener, ConnectionChangeEvent, ConnectionEventListener,
    ConnectionStateMachine, ListenerRegistry, SubscriptionId,
};
use crate::queue::{PendingRead, ReadQueue};
use mc_codec::{Codec, LinkReport};
use mc_core::{ConnectionParams, ConnectionState, McError, McResult, ReadValues};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{oneshot, watch};

/// Messages the session task sends itself from timers and spawned I/O
pub(crate) enum SessionEvent {
    LinkOpened { generation: u64, result: McResult<()> },
    ReconnectDue,
    ReadFinished { seq: u64, result: McResult<ReadValues> },
    ReadTimedOut { seq: u64 },
    Advance,
}

type Continuation = Box<dyn FnOnce(McResult<ReadValues>) + Send>;

enum Command {
    Connect,
    Submit {
        addresses: Vec<String>,
        completion: oneshot::Sender<McResult<ReadValues>>,
    },
    Shutdown(oneshot::Sender<()>),
}

/// Handle to a running PLC session
#[derive(Clone)]
pub struct Session {
    commands: UnboundedSender<Command>,
    state_rx: watch::Receiver<ConnectionState>,
    listeners: Arc<ListenerRegistry>,
    continuations: UnboundedSender<(PendingRead, Continuation)>,
}

impl Session {
    /// Spawn a session with default settings, connecting immediately
    ///
    /// # Errors
    /// `InvalidConfig` when called outside a tokio runtime
    pub fn spawn(codec: Arc<dyn Codec>, params: ConnectionParams) -> McResult<Self> {
        SessionBuilder::new().params(params).codec(codec).build()
    }

    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    pub(crate) fn start(
        codec: Arc<dyn Codec>,
        params: ConnectionParams,
        max_listeners: usize,
        auto_connect: bool,
    ) -> Self {
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (link_tx, link_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let listeners = Arc::new(ListenerRegistry::new(max_listeners));

        let queue = ReadQueue::new(Arc::clone(&codec), params.global_timeout, events_tx.clone());
        let machine = ConnectionStateMachine::new(
            codec,
            params,
            state_tx,
            Arc::clone(&listeners),
            events_tx,
            link_tx,
        );
        let driver = SessionDriver {
            machine,
            queue,
            commands: commands_rx,
            events: events_rx,
            link: link_rx,
        };
        tokio::spawn(driver.run());

        let (continuations, continuations_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_continuations(continuations_rx));

        let session = Self {
            commands,
            state_rx,
            listeners,
            continuations,
        };
        if auto_connect {
            session.connect();
        }
        session
    }

    /// Ask the session to open the link; no-op while Connecting or Connected
    pub fn connect(&self) {
        let _ = self.commands.send(Command::Connect);
    }

    /// Submit a batch read
    ///
    /// Blank addresses are dropped. The returned handle resolves once the
    /// read completes; reads complete in submission order.
    ///
    /// # Errors
    /// `InvalidRequest` if no address is left after filtering,
    /// `SessionClosed` after shutdown.
    pub fn submit<I, S>(&self, addresses: I) -> McResult<PendingRead>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let addresses: Vec<String> = addresses
            .into_iter()
            .map(|a| a.as_ref().trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();
        if addresses.is_empty() {
            return Err(McError::InvalidRequest(
                "No valid addresses provided for reading".to_string(),
            ));
        }

        let (completion, pending) = PendingRead::channel();
        self.commands
            .send(Command::Submit {
                addresses,
                completion,
            })
            .map_err(|_| McError::SessionClosed)?;
        Ok(pending)
    }

    /// Submit and wait for the result
    pub async fn read<I, S>(&self, addresses: I) -> McResult<ReadValues>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.submit(addresses)?.await
    }

    /// Submit with a completion callback
    ///
    /// The callback runs exactly once, also when the submission is rejected.
    /// Callbacks of one session run one after another on a shared task, in
    /// submission order.
    pub fn submit_with<I, S, F>(&self, addresses: I, on_complete: F)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: FnOnce(McResult<ReadValues>) + Send + 'static,
    {
        let pending = self
            .submit(addresses)
            .unwrap_or_else(|e| PendingRead::ready(Err(e)));
        if let Err(mpsc::error::SendError((pending, on_complete))) =
            self.continuations.send((pending, Box::new(on_complete)))
        {
            // Dispatcher died with a panicking callback
            log::warn!("continuation dispatcher gone, running callback detached");
            tokio::spawn(async move {
                on_complete(pending.await);
            });
        }
    }

    /// Register a connection event listener
    pub fn subscribe(&self, listener: Arc<dyn ConnectionEventListener>) -> McResult<SubscriptionId> {
        self.listeners.subscribe(listener)
    }

    /// Register a closure as listener
    pub fn subscribe_fn<F>(&self, callback: F) -> McResult<SubscriptionId>
    where
        F: Fn(&ConnectionChangeEvent) + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(CallbackEventListener::new(callback)))
    }

    /// Register a channel listener and return its receiver
    pub fn subscribe_channel(
        &self,
    ) -> McResult<(SubscriptionId, UnboundedReceiver<ConnectionChangeEvent>)> {
        let (listener, rx) = ChannelEventListener::new();
        let id = self.subscribe(Arc::new(listener))?;
        Ok((id, rx))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }

    /// Latest known state; never blocks
    pub fn current_state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Watch receiver following the state
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Close the link, fail every pending read with `ConnectionUnavailable`
    /// and drop all listeners. Safe to call repeatedly and from any state.
    pub async fn shutdown(&self) {
        let (ack, done) = oneshot::channel();
        if self.commands.send(Command::Shutdown(ack)).is_ok() {
            let _ = done.await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.current_state())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Await pending reads oldest first and run their callbacks
///
/// Ends once every session handle is gone and the backlog is drained.
async fn run_continuations(mut rx: UnboundedReceiver<(PendingRead, Continuation)>) {
    while let Some((pending, on_complete)) = rx.recv().await {
        on_complete(pending.await);
    }
}

struct SessionDriver {
    machine: ConnectionStateMachine,
    queue: ReadQueue,
    commands: UnboundedReceiver<Command>,
    events: UnboundedReceiver<SessionEvent>,
    link: UnboundedReceiver<LinkReport>,
}

impl SessionDriver {
    async fn run(mut self) {
        loop {
            tokio::select! {
                Some(event) = self.events.recv() => self.handle_event(event),
                Some(report) = self.link.recv() => self.machine.on_link_report(report),
                command = self.commands.recv() => match command {
                    Some(Command::Connect) => self.machine.connect(),
                    Some(Command::Submit { addresses, completion }) => {
                        self.queue.enqueue(addresses, completion, &mut self.machine)
                    }
                    Some(Command::Shutdown(ack)) => {
                        self.shutdown();
                        self.commands.close();
                        let _ = ack.send(());
                        break;
                    }
                    None => {
                        log::debug!("all session handles dropped");
                        self.shutdown();
                        break;
                    }
                },
            }
        }
    }

    fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::LinkOpened { generation, result } => {
                self.machine.on_link_opened(generation, result)
            }
            SessionEvent::ReconnectDue => self.machine.on_reconnect_due(),
            SessionEvent::ReadFinished { seq, result } => {
                self.queue.on_finished(seq, result, &mut self.machine)
            }
            SessionEvent::ReadTimedOut { seq } => self.queue.on_timed_out(seq, &mut self.machine),
            SessionEvent::Advance => self.queue.on_advance(&mut self.machine),
        }
    }

    fn shutdown(&mut self) {
        log::info!(
            "session shutting down, {} reads queued",
            self.queue.backlog_len()
        );
        self.machine.shutdown();
        self.queue.flush(McError::ConnectionUnavailable);
    }
}
