//! Status indicator of a poller
//!
//! Mirrors the connection state as a `{fill, shape, text}` triple and also
//! reacts to the outcome of reads: a connection-shaped read failure shows
//! "Connection Lost" before the session itself notices, and a successful
//! read brings the indicator back to connected.

use mc_core::{ConnectionState, McError};
use serde::Serialize;
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFill {
    Green,
    Red,
    Grey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusShape {
    Dot,
    Ring,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeStatus {
    pub fill: StatusFill,
    pub shape: StatusShape,
    pub text: String,
}

impl NodeStatus {
    fn new(fill: StatusFill, shape: StatusShape, text: &str) -> Self {
        Self {
            fill,
            shape,
            text: text.to_string(),
        }
    }

    pub fn for_state(state: ConnectionState) -> Self {
        let (fill, shape) = match state {
            ConnectionState::Connected => (StatusFill::Green, StatusShape::Dot),
            ConnectionState::Disconnected => (StatusFill::Red, StatusShape::Ring),
            ConnectionState::Connecting => (StatusFill::Green, StatusShape::Ring),
            ConnectionState::Erroring => (StatusFill::Red, StatusShape::Dot),
        };
        Self::new(fill, shape, state.as_str())
    }

    pub fn connection_lost() -> Self {
        Self::new(StatusFill::Red, StatusShape::Ring, "Connection Lost")
    }

    /// Shown after a successful read while the indicator was not connected
    pub fn recovered() -> Self {
        Self::new(StatusFill::Green, StatusShape::Ring, "connected")
    }

    pub fn no_connection() -> Self {
        Self::new(StatusFill::Grey, StatusShape::Dot, "No Connection")
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{:?} {}", self.fill, self.shape, self.text)
    }
}

/// Status shared by the poll loop and the connection listener
#[derive(Debug)]
pub(crate) struct StatusBoard {
    last_seen: Mutex<ConnectionState>,
    tx: watch::Sender<NodeStatus>,
}

impl StatusBoard {
    pub(crate) fn new(initial: NodeStatus) -> (Self, watch::Receiver<NodeStatus>) {
        let (tx, rx) = watch::channel(initial);
        let board = Self {
            last_seen: Mutex::new(ConnectionState::Disconnected),
            tx,
        };
        (board, rx)
    }

    pub(crate) fn on_connection_change(&self, state: ConnectionState) {
        *self.lock() = state;
        self.tx.send_replace(NodeStatus::for_state(state));
    }

    pub(crate) fn on_read_error(&self, error: &McError) {
        if error.is_connection_loss() {
            *self.lock() = ConnectionState::Disconnected;
            self.tx.send_replace(NodeStatus::connection_lost());
        }
    }

    pub(crate) fn on_read_ok(&self) {
        let mut last_seen = self.lock();
        if *last_seen != ConnectionState::Connected {
            *last_seen = ConnectionState::Connected;
            self.tx.send_replace(NodeStatus::recovered());
        }
    }

    fn lock(&self) -> MutexGuard<'_, ConnectionState> {
        self.last_seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
