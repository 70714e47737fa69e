//! Codec trait

use crate::link::LinkEvents;
use async_trait::async_trait;
use mc_core::{ConnectionParams, LinkIndicator, McResult, ReadValues};

/// Protocol codec interface driven by the client session
///
/// A codec owns one physical link to a PLC. The session guarantees it never
/// has more than one batch in flight: `add_items`, `read_all` and
/// `remove_items` are always used as one sequence per read, and no second
/// sequence starts before the first has completed or timed out.
///
/// # Error Handling
/// - `open` failures are reported as [`McError::LinkOpenFailure`](mc_core::McError)
/// - everything else is reported as [`McError::Codec`](mc_core::McError) with
///   human readable text; the session classifies that text to decide whether
///   the link is presumed lost
#[async_trait]
pub trait Codec: Send + Sync {
    /// Open the link
    ///
    /// `events` stays valid for the lifetime of this link; use it to report
    /// transport faults and indicator changes that happen outside of a call.
    async fn open(&self, params: &ConnectionParams, events: LinkEvents) -> McResult<()>;

    /// Drop the link, discarding any registered items. Never fails.
    fn close(&self);

    /// Register an address batch for the next `read_all`
    fn add_items(&self, addresses: &[String]) -> McResult<()>;

    /// Deregister an address batch
    fn remove_items(&self, addresses: &[String]) -> McResult<()>;

    /// Read every registered item
    async fn read_all(&self) -> McResult<ReadValues>;

    /// Current numeric connection indicator
    fn link_indicator(&self) -> LinkIndicator;
}
