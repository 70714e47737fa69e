//! MC protocol PLC client
//!
//! This crate keeps one logical link to a PLC alive and serializes batch
//! reads against it.
//!
//! - [`Session`]: handle to the coordinator task (connect, submit, subscribe,
//!   shutdown)
//! - connection state machine: Disconnected / Connecting / Connected /
//!   Erroring, with a fixed-backoff reconnect that never gives up
//! - read queue: single in-flight read, FIFO backlog, per-read timeout,
//!   connection-loss classification of codec errors

pub mod builder;
pub mod connection;
mod queue;
pub mod session;

pub use builder::SessionBuilder;
pub use connection::{
    CallbackEventListener, ChannelEventListener, ConnectionChangeEvent, ConnectionEventListener,
    ListenerRegistry, SubscriptionId, DEFAULT_MAX_LISTENERS,
};
pub use queue::PendingRead;
pub use session::Session;
