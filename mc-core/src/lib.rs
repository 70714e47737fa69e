//! Core types and utilities for MC protocol PLC connections
//!
//! This crate provides the fundamental types shared by the codec contract,
//! the client session and the poller: error handling, connection state,
//! configuration and read values.

pub mod classify;
pub mod config;
pub mod error;
pub mod state;
pub mod value;

pub use classify::{classify_error, ErrorClass, CONNECTION_LOSS_VOCABULARY};
pub use config::{
    ConnectionConfig, ConnectionParams, Encoding, Frame, NumeralBase, PlcType, TransportMode,
    DEFAULT_GLOBAL_TIMEOUT, DEFAULT_OPEN_TIMEOUT, DEFAULT_RECONNECT_DELAY,
};
pub use error::{McError, McResult};
pub use state::{ConnectionState, LinkIndicator};
pub use value::{PlcValue, ReadValues};
