//! Protocol codec contract for MC protocol PLC connections
//!
//! The session never speaks the MC wire protocol itself. Framing, address
//! parsing and device semantics live behind the [`Codec`] trait; this crate
//! defines that trait, the channel a codec uses to report link changes, and
//! an in-memory codec for demos and tests.

pub mod codec;
pub mod link;
pub mod simulated;

pub use codec::Codec;
pub use link::{LinkEvents, LinkReport, LinkSignal};
pub use simulated::SimulatedCodec;
