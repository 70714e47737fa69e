//! Poller configuration

use mc_core::config::lenient_number;
use mc_core::{McError, McResult};
use serde::{Deserialize, Deserializer};
use std::time::Duration;

/// Default period between two reads
pub const DEFAULT_CYCLE_TIME: Duration = Duration::from_millis(1000);

/// One configured PLC variable
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct Variable {
    #[serde(default)]
    pub name: String,
}

impl Variable {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Payload layout of emitted messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One object keyed by address
    #[default]
    Json,
    /// A list of single-key objects, one per address
    Array,
}

/// What to do with a failed read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorHandling {
    /// Log the error, emit nothing
    #[default]
    Throw,
    /// Emit a message carrying the error text and a null payload
    Msg,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollerConfig {
    /// Either a list or a JSON string holding the list
    #[serde(default, deserialize_with = "variables")]
    pub variables: Vec<Variable>,
    /// Milliseconds between reads
    #[serde(default, deserialize_with = "lenient_number")]
    pub cycle_time: Option<u64>,
    #[serde(default)]
    pub output_format: OutputFormat,
    #[serde(default)]
    pub error_handling: ErrorHandling,
}

impl PollerConfig {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            variables: names.into_iter().map(Variable::new).collect(),
            ..Self::default()
        }
    }

    pub fn from_json_str(input: &str) -> McResult<Self> {
        serde_json::from_str(input).map_err(|e| McError::InvalidConfig(e.to_string()))
    }

    pub fn from_toml_str(input: &str) -> McResult<Self> {
        toml::from_str(input).map_err(|e| McError::InvalidConfig(e.to_string()))
    }

    pub fn with_cycle_time(mut self, cycle: Duration) -> Self {
        self.cycle_time = u64::try_from(cycle.as_millis()).ok().filter(|ms| *ms > 0);
        self
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    pub fn with_error_handling(mut self, handling: ErrorHandling) -> Self {
        self.error_handling = handling;
        self
    }

    pub fn cycle_time(&self) -> Duration {
        self.cycle_time
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_CYCLE_TIME)
    }

    /// Variable names with blanks removed, in configured order
    pub fn addresses(&self) -> Vec<String> {
        self.variables
            .iter()
            .map(|v| v.name.trim())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawVariables {
    List(Vec<Variable>),
    Encoded(String),
}

// An unparsable encoded list is logged and treated as empty
fn variables<'de, D>(deserializer: D) -> Result<Vec<Variable>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<RawVariables>::deserialize(deserializer)? {
        Some(RawVariables::List(list)) => Ok(list),
        Some(RawVariables::Encoded(text)) => match serde_json::from_str(&text) {
            Ok(list) => Ok(list),
            Err(e) => {
                log::error!("Failed to parse variables configuration: {}", e);
                Ok(Vec::new())
            }
        },
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_defaults() {
        let config = assert_ok!(PollerConfig::from_json_str("{}"));
        assert!(config.variables.is_empty());
        assert_eq!(config.cycle_time(), DEFAULT_CYCLE_TIME);
        assert_eq!(config.output_format, OutputFormat::Json);
        assert_eq!(config.error_handling, ErrorHandling::Throw);
    }

    #[test]
    fn test_full_document() {
        let config = assert_ok!(PollerConfig::from_json_str(
            r#"{
                "variables": [{"name": "D100"}, {"name": "  "}, {"name": " M0 "}],
                "cycleTime": "250",
                "outputFormat": "array",
                "errorHandling": "msg"
            }"#
        ));
        assert_eq!(config.addresses(), vec!["D100", "M0"]);
        assert_eq!(config.cycle_time(), Duration::from_millis(250));
        assert_eq!(config.output_format, OutputFormat::Array);
        assert_eq!(config.error_handling, ErrorHandling::Msg);
    }

    #[test]
    fn test_encoded_variables() {
        let config = assert_ok!(PollerConfig::from_json_str(
            r#"{"variables": "[{\"name\": \"D1\"}, {}]"}"#
        ));
        assert_eq!(config.addresses(), vec!["D1"]);

        let broken = assert_ok!(PollerConfig::from_json_str(r#"{"variables": "[{"}"#));
        assert!(broken.variables.is_empty());
    }

    #[test]
    fn test_zero_cycle_uses_default() {
        let config = assert_ok!(PollerConfig::from_json_str(r#"{"cycleTime": 0}"#));
        assert_eq!(config.cycle_time(), DEFAULT_CYCLE_TIME);
        let config = PollerConfig::new(["D0"]).with_cycle_time(Duration::ZERO);
        assert_eq!(config.cycle_time(), DEFAULT_CYCLE_TIME);
    }

    #[test]
    fn test_toml_document() {
        let config = assert_ok!(PollerConfig::from_toml_str(
            r#"
            cycleTime = 500
            outputFormat = "json"

            [[variables]]
            name = "D100"

            [[variables]]
            name = "D101"
            "#
        ));
        assert_eq!(config.addresses(), vec!["D100", "D101"]);
        assert_eq!(config.cycle_time(), Duration::from_millis(500));
    }

    #[test]
    fn test_unknown_format_rejected() {
        assert_err!(PollerConfig::from_json_str(r#"{"outputFormat": "csv"}"#));
    }
}
