//! Connection management module

pub mod events;
pub(crate) mod state_machine;

pub use events::{
    CallbackEventListener, ChannelEventListener, ConnectionChangeEvent, ConnectionEventListener,
    ListenerRegistry, SubscriptionId, DEFAULT_MAX_LISTENERS,
};
pub(crate) use state_machine::ConnectionStateMachine;
