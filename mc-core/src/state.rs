//! Connection lifecycle state

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// Lifecycle state of the logical link to the PLC
///
/// # State Transitions
/// ```text
/// Disconnected -> Connecting (on connect())
/// Connecting   -> Connected  (link open succeeded)
/// Connecting   -> Disconnected (codec reports disconnected)
/// *            -> Erroring   (link open failed or transport fault; reconnect scheduled)
/// Erroring     -> Connecting (after the reconnect backoff)
/// ```
///
/// There is no terminal state: the session keeps trying to recover for as
/// long as it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No link (initial state)
    #[default]
    Disconnected,
    /// A link-open operation is in progress
    Connecting,
    /// The link is up and reads may be issued
    Connected,
    /// The link failed; a reconnect is scheduled
    #[serde(rename = "error")]
    Erroring,
}

impl ConnectionState {
    /// Check if reads may be issued
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// `connect()` is a no-op in these states
    pub fn is_link_active(&self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Connected)
    }

    /// Get human-readable state name
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Erroring => "error",
        }
    }
}

impl Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numeric connection indicator exposed by a codec
///
/// MC codecs keep an ISO-style connection state number: `0` disconnected,
/// `1` connecting, `4` connected. Every other value means the codec is in an
/// error state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkIndicator(pub u8);

impl LinkIndicator {
    pub const DISCONNECTED: LinkIndicator = LinkIndicator(0);
    pub const CONNECTING: LinkIndicator = LinkIndicator(1);
    pub const CONNECTED: LinkIndicator = LinkIndicator(4);

    pub fn is_connected(&self) -> bool {
        *self == Self::CONNECTED
    }

    /// Map the raw number onto the lifecycle state
    pub fn state(&self) -> ConnectionState {
        match self.0 {
            0 => ConnectionState::Disconnected,
            1 => ConnectionState::Connecting,
            4 => ConnectionState::Connected,
            _ => ConnectionState::Erroring,
        }
    }
}

impl From<ConnectionState> for LinkIndicator {
    fn from(state: ConnectionState) -> Self {
        match state {
            ConnectionState::Disconnected => Self::DISCONNECTED,
            ConnectionState::Connecting => Self::CONNECTING,
            ConnectionState::Connected => Self::CONNECTED,
            ConnectionState::Erroring => LinkIndicator(0xFF),
        }
    }
}
