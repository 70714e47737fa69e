//! Connection-loss classification for codec error text
//!
//! Codecs report failures as free text. Only failures that look like a lost
//! link should perturb the connection state machine; data-shaped failures
//! (a malformed address, a rejected device code) are passed to the submitter
//! and nothing else. The vocabulary below is a heuristic, not something the
//! MC protocol guarantees. Swap this module out once a codec reports
//! structured error kinds.

/// Substrings (lower case) that mark an error as connection-shaped
pub const CONNECTION_LOSS_VOCABULARY: &[&str] =
    &["not connected", "connection", "disconnected", "timeout"];

/// Category of a codec failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The link is presumed lost
    ConnectionLoss,
    /// The request itself was bad; the link is fine
    Data,
}

impl ErrorClass {
    pub fn is_connection_loss(&self) -> bool {
        matches!(self, ErrorClass::ConnectionLoss)
    }
}

/// Classify error text by case-insensitive substring match
pub fn classify_error(text: &str) -> ErrorClass {
    let lowered = text.to_lowercase();
    if CONNECTION_LOSS_VOCABULARY
        .iter()
        .any(|needle| lowered.contains(needle))
    {
        ErrorClass::ConnectionLoss
    } else {
        ErrorClass::Data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_matches() {
        assert_eq!(classify_error("PLC NOT CONNECTED"), ErrorClass::ConnectionLoss);
        assert_eq!(classify_error("Connection reset by peer"), ErrorClass::ConnectionLoss);
        assert_eq!(classify_error("socket disconnected"), ErrorClass::ConnectionLoss);
        assert_eq!(classify_error("Response Timeout"), ErrorClass::ConnectionLoss);
    }

    #[test]
    fn test_data_errors() {
        assert_eq!(classify_error("Invalid address D99999999"), ErrorClass::Data);
        assert_eq!(classify_error(""), ErrorClass::Data);
        assert!(!classify_error("end code 0xC059").is_connection_loss());
    }
}
