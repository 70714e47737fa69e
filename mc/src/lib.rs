//! mc - Rust client for Mitsubishi MC protocol PLC connections
//!
//! Keeps one logical link to a PLC alive, reconnects on loss, and serializes
//! batch reads against it with a per-read timeout.
//!
//! # Architecture
//!
//! This library is organized as a workspace with multiple crates:
//!
//! - `mc-core`: error type, connection state, configuration, read values
//! - `mc-codec`: the protocol codec contract and an in-memory simulated PLC
//! - `mc-client`: session, connection state machine and read queue
//! - `mc-poller`: periodic reads shaped into JSON messages
//!
//! The MC wire protocol itself (framing, device addressing) is the codec's
//! business and is not part of this workspace.
//!
//! # Usage
//!
//! ```no_run
//! use mc::client::Session;
//! use mc::codec::SimulatedCodec;
//! use mc::ConnectionConfig;
//! use std::sync::Arc;
//!
//! # async fn demo() -> mc::McResult<()> {
//! let config = ConnectionConfig::from_json_str(r#"{"host": "192.168.3.39", "port": 5007}"#)?;
//! let session = Session::builder()
//!     .config(config)?
//!     .codec(Arc::new(SimulatedCodec::new().with_value("D100", 5)))
//!     .build()?;
//! let values = session.read(["D100"]).await?;
//! # let _ = values;
//! session.shutdown().await;
//! # Ok(())
//! # }
//! ```

// Re-export core types
pub use mc_core::{
    ConnectionConfig, ConnectionParams, ConnectionState, LinkIndicator, McError, McResult,
    PlcValue, ReadValues,
};

// Re-export client API
pub mod client {
    pub use mc_client::*;
}

// Re-export codec contract
pub mod codec {
    pub use mc_codec::*;
}

// Re-export poller
pub mod poller {
    pub use mc_poller::*;
}
