//! Periodic PLC reads on top of an `mc-client` session
//!
//! A [`Poller`] reads a fixed list of variables every cycle, shapes the
//! results into JSON messages and keeps a status indicator that follows both
//! the connection state and the outcome of reads.

pub mod config;
pub mod poller;
pub mod shape;
pub mod status;

pub use config::{ErrorHandling, OutputFormat, PollerConfig, Variable, DEFAULT_CYCLE_TIME};
pub use poller::Poller;
pub use shape::{shape_payload, ReadMessage, READ_TOPIC};
pub use status::{NodeStatus, StatusFill, StatusShape};
