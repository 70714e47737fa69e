//! Link event reporting from a codec back to the session

use mc_core::{LinkIndicator, McError};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Something a codec observed about its link
#[derive(Debug, Clone, PartialEq)]
pub enum LinkSignal {
    /// Transport-level failure (socket error, peer reset)
    Fault(McError),
    /// The numeric connection indicator changed
    Indicator(LinkIndicator),
}

/// A signal tagged with the link generation it belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct LinkReport {
    pub generation: u64,
    pub signal: LinkSignal,
}

/// Handle given to [`Codec::open`](crate::Codec::open)
///
/// Every link-open gets a fresh generation number. Reports from an older
/// generation are ignored by the session, so a codec may keep a handle after
/// `close` without confusing a newer link.
#[derive(Debug, Clone)]
pub struct LinkEvents {
    generation: u64,
    tx: UnboundedSender<LinkReport>,
}

impl LinkEvents {
    pub fn new(generation: u64, tx: UnboundedSender<LinkReport>) -> Self {
        Self { generation, tx }
    }

    /// Create a handle together with its receiving end
    pub fn channel(generation: u64) -> (Self, UnboundedReceiver<LinkReport>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(generation, tx), rx)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Report a transport fault
    pub fn fault(&self, message: impl Into<String>) {
        self.send(LinkSignal::Fault(McError::LinkOpenFailure(message.into())));
    }

    /// Report an indicator change
    pub fn indicator(&self, indicator: LinkIndicator) {
        self.send(LinkSignal::Indicator(indicator));
    }

    fn send(&self, signal: LinkSignal) {
        // The session may already be gone
        let _ = self.tx.send(LinkReport {
            generation: self.generation,
            signal,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reports_carry_generation() {
        let (events, mut rx) = LinkEvents::channel(7);
        events.indicator(LinkIndicator::CONNECTED);
        events.fault("ECONNRESET");

        let first = rx.recv().await.unwrap();
        assert_eq!(first.generation, 7);
        assert_eq!(first.signal, LinkSignal::Indicator(LinkIndicator::CONNECTED));

        let second = rx.recv().await.unwrap();
        assert!(matches!(second.signal, LinkSignal::Fault(McError::LinkOpenFailure(ref m)) if m == "ECONNRESET"));
    }

    #[test]
    fn test_send_after_receiver_dropped() {
        let (events, rx) = LinkEvents::channel(1);
        drop(rx);
        events.fault("late");
    }
}
