//! Connection change events and listener registry
//!
//! Subscribers are registered explicitly and get a [`SubscriptionId`] back;
//! the registry holds at most a fixed number of them and is cleared when the
//! session shuts down.

use mc_core::{ConnectionState, McError, McResult};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Default bound on registered listeners per session
pub const DEFAULT_MAX_LISTENERS: usize = 64;

/// Emitted whenever the connection state actually changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionChangeEvent {
    pub state: ConnectionState,
    pub timestamp: SystemTime,
}

impl ConnectionChangeEvent {
    pub fn new(state: ConnectionState) -> Self {
        Self {
            state,
            timestamp: SystemTime::now(),
        }
    }

    /// Milliseconds since the Unix epoch
    pub fn timestamp_millis(&self) -> u64 {
        self.timestamp
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Event listener for connection change events
///
/// Called on the session task; implementations must not block.
pub trait ConnectionEventListener: Send + Sync {
    fn on_event(&self, event: &ConnectionChangeEvent);
}

/// Callback-based event listener
pub struct CallbackEventListener<F>
where
    F: Fn(&ConnectionChangeEvent) + Send + Sync,
{
    callback: F,
}

impl<F> CallbackEventListener<F>
where
    F: Fn(&ConnectionChangeEvent) + Send + Sync,
{
    #[must_use]
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ConnectionEventListener for CallbackEventListener<F>
where
    F: Fn(&ConnectionChangeEvent) + Send + Sync,
{
    fn on_event(&self, event: &ConnectionChangeEvent) {
        (self.callback)(event);
    }
}

/// Listener forwarding events into a tokio mpsc channel
pub struct ChannelEventListener {
    tx: UnboundedSender<ConnectionChangeEvent>,
}

impl ChannelEventListener {
    /// Returns the listener and a receiver for events
    pub fn new() -> (Self, UnboundedReceiver<ConnectionChangeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ConnectionEventListener for ChannelEventListener {
    fn on_event(&self, event: &ConnectionChangeEvent) {
        // The receiver might be dropped
        let _ = self.tx.send(event.clone());
    }
}

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct RegistryInner {
    next_id: u64,
    listeners: Vec<(SubscriptionId, Arc<dyn ConnectionEventListener>)>,
    closed: bool,
}

/// Bounded set of connection event listeners
pub struct ListenerRegistry {
    inner: RwLock<RegistryInner>,
    limit: usize,
}

impl ListenerRegistry {
    pub fn new(limit: usize) -> Self {
        Self {
            inner: RwLock::new(RegistryInner {
                next_id: 0,
                listeners: Vec::new(),
                closed: false,
            }),
            limit,
        }
    }

    /// Register a listener
    ///
    /// # Errors
    /// `TooManyListeners` when the bound is reached, `SessionClosed` after
    /// [`clear`](Self::clear).
    pub fn subscribe(&self, listener: Arc<dyn ConnectionEventListener>) -> McResult<SubscriptionId> {
        let mut inner = self.write();
        if inner.closed {
            return Err(McError::SessionClosed);
        }
        if inner.listeners.len() >= self.limit {
            return Err(McError::TooManyListeners(self.limit));
        }
        inner.next_id += 1;
        let id = SubscriptionId(inner.next_id);
        inner.listeners.push((id, listener));
        Ok(id)
    }

    /// Remove a listener; returns false if it was not registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.write();
        let before = inner.listeners.len();
        inner.listeners.retain(|(registered, _)| *registered != id);
        inner.listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.read().listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every listener and refuse new ones
    pub fn clear(&self) {
        let mut inner = self.write();
        inner.listeners.clear();
        inner.closed = true;
    }

    /// Deliver an event to every listener
    pub fn emit(&self, event: &ConnectionChangeEvent) {
        // Snapshot first so a listener may unsubscribe from inside on_event
        let listeners: Vec<_> = self
            .read()
            .listeners
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener.on_event(event);
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryInner> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryInner> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LISTENERS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_callback_listener() {
        let registry = ListenerRegistry::default();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        assert_ok!(registry.subscribe(Arc::new(CallbackEventListener::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }))));

        registry.emit(&ConnectionChangeEvent::new(ConnectionState::Connected));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_channel_listener() {
        let registry = ListenerRegistry::default();
        let (listener, mut rx) = ChannelEventListener::new();
        let id = assert_ok!(registry.subscribe(Arc::new(listener)));

        registry.emit(&ConnectionChangeEvent::new(ConnectionState::Connecting));
        assert_eq!(rx.recv().await.unwrap().state, ConnectionState::Connecting);

        assert!(registry.unsubscribe(id));
        assert!(!registry.unsubscribe(id));
        registry.emit(&ConnectionChangeEvent::new(ConnectionState::Connected));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_bounded() {
        let registry = ListenerRegistry::new(2);
        for _ in 0..2 {
            assert_ok!(registry.subscribe(Arc::new(CallbackEventListener::new(|_| {}))));
        }
        let err = assert_err!(registry.subscribe(Arc::new(CallbackEventListener::new(|_| {}))));
        assert_eq!(err, McError::TooManyListeners(2));
    }

    #[test]
    fn test_clear_closes_registry() {
        let registry = ListenerRegistry::default();
        assert_ok!(registry.subscribe(Arc::new(CallbackEventListener::new(|_| {}))));
        registry.clear();
        assert!(registry.is_empty());
        assert_eq!(
            registry.subscribe(Arc::new(CallbackEventListener::new(|_| {}))),
            Err(McError::SessionClosed)
        );
    }

    #[test]
    fn test_timestamp_millis() {
        let event = ConnectionChangeEvent::new(ConnectionState::Erroring);
        assert!(event.timestamp_millis() > 0);
    }
}
