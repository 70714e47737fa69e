//! Session builder
//!
//! ```rust,no_run
//! use mc_client::SessionBuilder;
//! use mc_codec::SimulatedCodec;
//! use mc_core::ConnectionConfig;
//! use std::sync::Arc;
//!
//! # async fn demo() -> mc_core::McResult<()> {
//! let config = ConnectionConfig::from_json_str(r#"{"host": "192.168.3.39", "port": 5007}"#)?;
//! let session = SessionBuilder::new()
//!     .config(config)?
//!     .codec(Arc::new(SimulatedCodec::new()))
//!     .max_listeners(8)
//!     .build()?;
//! # let _ = session;
//! # Ok(())
//! # }
//! ```

use crate::connection::DEFAULT_MAX_LISTENERS;
use crate::session::Session;
use mc_codec::Codec;
use mc_core::{ConnectionConfig, ConnectionParams, McError, McResult};
use std::sync::Arc;

/// Builder for [`Session`]
///
/// # Default Settings
/// - connects as soon as the session is built
/// - at most 64 connection event listeners
#[derive(Clone)]
pub struct SessionBuilder {
    params: Option<ConnectionParams>,
    codec: Option<Arc<dyn Codec>>,
    max_listeners: usize,
    auto_connect: bool,
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self {
            params: None,
            codec: None,
            max_listeners: DEFAULT_MAX_LISTENERS,
            auto_connect: true,
        }
    }

    pub fn params(mut self, params: ConnectionParams) -> Self {
        self.params = Some(params);
        self
    }

    /// Validate a raw configuration and use it
    pub fn config(self, config: ConnectionConfig) -> McResult<Self> {
        Ok(self.params(config.into_params()?))
    }

    pub fn codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = Some(codec);
        self
    }

    pub fn max_listeners(mut self, limit: usize) -> Self {
        self.max_listeners = limit;
        self
    }

    /// Whether to connect right after spawning (default true)
    pub fn auto_connect(mut self, enabled: bool) -> Self {
        self.auto_connect = enabled;
        self
    }

    /// Spawn the session task
    ///
    /// # Errors
    /// `InvalidConfig` if params or codec are missing, or no tokio runtime
    /// is running.
    pub fn build(self) -> McResult<Session> {
        let params = self
            .params
            .ok_or_else(|| McError::InvalidConfig("connection parameters must be configured".to_string()))?;
        let codec = self
            .codec
            .ok_or_else(|| McError::InvalidConfig("a codec must be configured".to_string()))?;
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(McError::InvalidConfig(
                "a session must be built inside a tokio runtime".to_string(),
            ));
        }
        Ok(Session::start(
            codec,
            params,
            self.max_listeners,
            self.auto_connect,
        ))
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mc_codec::SimulatedCodec;
    use tokio_test::assert_err;

    #[test]
    fn test_requires_runtime() {
        let builder = SessionBuilder::new()
            .params(ConnectionParams::new("plc", 5007))
            .codec(Arc::new(SimulatedCodec::new()));
        let err = assert_err!(builder.build());
        assert!(matches!(err, McError::InvalidConfig(_)));
    }

    #[test]
    fn test_requires_codec_and_params() {
        assert_err!(SessionBuilder::new().codec(Arc::new(SimulatedCodec::new())).build());
        assert_err!(SessionBuilder::new().params(ConnectionParams::new("plc", 1)).build());
    }

    #[tokio::test]
    async fn test_build_without_auto_connect_stays_disconnected() {
        let session = SessionBuilder::new()
            .params(ConnectionParams::new("plc", 5007))
            .codec(Arc::new(SimulatedCodec::new()))
            .auto_connect(false)
            .build()
            .unwrap();
        tokio::task::yield_now().await;
        assert_eq!(session.current_state(), mc_core::ConnectionState::Disconnected);
        session.shutdown().await;
    }
}
