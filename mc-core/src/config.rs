//! Connection configuration
//!
//! `ConnectionConfig` is the raw, serde-facing shape (the keys a flow editor
//! or a config file would carry). It is lenient: numbers may arrive as
//! strings, and unknown or missing values fall back to defaults.
//! `ConnectionParams` is the validated form handed to the session and codec.
//!
//! # Usage Example
//!
//! ```rust
//! use mc_core::{ConnectionConfig, Frame};
//!
//! let config = ConnectionConfig::from_json_str(
//!     r#"{"host": "192.168.1.10", "port": "5007", "frame": "3E", "timeout": "2000"}"#,
//! ).unwrap();
//! let params = config.into_params().unwrap();
//! assert_eq!(params.port, 5007);
//! assert_eq!(params.frame, Frame::E3);
//! ```

use crate::error::{McError, McResult};
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

/// Global read timeout used when none (or a non-numeric one) is configured
pub const DEFAULT_GLOBAL_TIMEOUT: Duration = Duration::from_millis(4500);
/// Link-open timeout used when no timeout is configured
pub const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_millis(1000);
/// Fixed reconnect backoff
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(1000);

/// Transport carrying the MC frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransportMode {
    #[default]
    #[serde(rename = "TCP", alias = "tcp")]
    Tcp,
    #[serde(rename = "UDP", alias = "udp")]
    Udp,
}

/// PLC family, which selects device codes and limits inside the codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlcType {
    A,
    QnA,
    #[default]
    Q,
    L,
    R,
}

/// MC frame variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Frame {
    #[default]
    #[serde(rename = "1E")]
    E1,
    #[serde(rename = "3E")]
    E3,
    #[serde(rename = "4E")]
    E4,
}

/// Frame payload encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    #[default]
    Ascii,
    Binary,
}

/// Numbering of X/Y device addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumeralBase {
    #[default]
    Octal,
    Decimal,
}

/// Raw connection configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub port: Option<u64>,
    #[serde(default, alias = "transport")]
    pub protocol: TransportMode,
    #[serde(default)]
    pub plc_type: PlcType,
    #[serde(default)]
    pub frame: Frame,
    /// `"binary"` selects binary frames, anything else ASCII
    #[serde(default)]
    pub communication: Option<String>,
    /// `"decimal"` selects decimal X/Y numbering, anything else octal
    #[serde(default)]
    pub octal_input_output: Option<String>,
    /// Global read timeout in milliseconds
    #[serde(default, deserialize_with = "lenient_number")]
    pub timeout: Option<u64>,
    /// Link-open timeout in milliseconds; falls back to `timeout`, then 1000
    #[serde(default, deserialize_with = "lenient_number")]
    pub open_timeout: Option<u64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub reconnect_delay: Option<u64>,
}

impl ConnectionConfig {
    /// Parse a JSON document
    pub fn from_json_str(input: &str) -> McResult<Self> {
        serde_json::from_str(input).map_err(|e| McError::InvalidConfig(e.to_string()))
    }

    /// Parse a TOML document
    pub fn from_toml_str(input: &str) -> McResult<Self> {
        toml::from_str(input).map_err(|e| McError::InvalidConfig(e.to_string()))
    }

    pub fn encoding(&self) -> Encoding {
        match self.communication.as_deref() {
            Some(value) if value.eq_ignore_ascii_case("binary") => Encoding::Binary,
            _ => Encoding::Ascii,
        }
    }

    pub fn numeral_base(&self) -> NumeralBase {
        match self.octal_input_output.as_deref() {
            Some(value) if value.eq_ignore_ascii_case("decimal") => NumeralBase::Decimal,
            _ => NumeralBase::Octal,
        }
    }

    pub fn global_timeout(&self) -> Duration {
        self.timeout
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_GLOBAL_TIMEOUT)
    }

    /// Validate and convert into connection parameters
    ///
    /// # Errors
    /// Returns `InvalidConfig` if the host is missing or blank, or the port is
    /// missing or outside `1..=65535`.
    pub fn into_params(self) -> McResult<ConnectionParams> {
        let host = self
            .host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| McError::InvalidConfig("host is required".to_string()))?
            .to_string();
        let port = self
            .port
            .and_then(|p| u16::try_from(p).ok())
            .ok_or_else(|| McError::InvalidConfig("port must be within 1..=65535".to_string()))?;

        Ok(ConnectionParams {
            host,
            port,
            transport: self.protocol,
            plc_type: self.plc_type,
            frame: self.frame,
            encoding: self.encoding(),
            numeral_base: self.numeral_base(),
            global_timeout: self.global_timeout(),
            open_timeout: self
                .open_timeout
                .or(self.timeout)
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_OPEN_TIMEOUT),
            reconnect_delay: self
                .reconnect_delay
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_RECONNECT_DELAY),
        })
    }
}

/// Validated connection parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub transport: TransportMode,
    pub plc_type: PlcType,
    pub frame: Frame,
    pub encoding: Encoding,
    pub numeral_base: NumeralBase,
    /// Upper bound for one batch read
    pub global_timeout: Duration,
    /// Upper bound the codec should apply to a link-open
    pub open_timeout: Duration,
    /// Delay before a scheduled reconnect
    pub reconnect_delay: Duration,
}

impl ConnectionParams {
    /// Create parameters with the defaults of a Q series PLC over TCP/1E/ASCII
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            transport: TransportMode::default(),
            plc_type: PlcType::default(),
            frame: Frame::default(),
            encoding: Encoding::default(),
            numeral_base: NumeralBase::default(),
            global_timeout: DEFAULT_GLOBAL_TIMEOUT,
            open_timeout: DEFAULT_OPEN_TIMEOUT,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }

    pub fn with_global_timeout(mut self, timeout: Duration) -> Self {
        self.global_timeout = timeout;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_frame(mut self, frame: Frame) -> Self {
        self.frame = frame;
        self
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// `host:port`, for logging
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawNumber {
    Int(u64),
    Float(f64),
    Text(String),
    Other(serde::de::IgnoredAny),
}

/// Serde helper: accept `4500`, `4500.0` or `"4500"`; anything else, and zero, reads as absent
pub fn lenient_number<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawNumber>::deserialize(deserializer)?;
    let value = match raw {
        Some(RawNumber::Int(n)) => Some(n),
        Some(RawNumber::Float(f)) if f.is_finite() && f >= 1.0 => Some(f as u64),
        Some(RawNumber::Text(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    Ok(value.filter(|n| *n > 0))
}
