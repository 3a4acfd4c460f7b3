use crate::host::NodeId;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ToneError {
    /// No usable audio subsystem: missing device, or the host was shut down.
    UnsupportedEnvironment(String),
    /// The host refused to resume, e.g. no user activation yet.
    HostPolicyDenied(String),
    InvalidFrequency(f64),
    InvalidNoteName(String),
    InvalidParameter { value: f64 },
    UnknownNode(NodeId),
    InvalidState(String),
    Config(String),
}

impl ToneError {
    /// Errors that leave nothing usable behind and must reach the caller.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ToneError::UnsupportedEnvironment(_))
    }
}

impl fmt::Display for ToneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToneError::UnsupportedEnvironment(why) => write!(f, "Audio is not supported: {why}"),
            ToneError::HostPolicyDenied(why) => write!(f, "Audio resume denied by host: {why}"),
            ToneError::InvalidFrequency(freq) => write!(f, "Invalid frequency {freq} Hz"),
            ToneError::InvalidNoteName(name) => write!(f, "Invalid note name '{name}'"),
            ToneError::InvalidParameter { value } => write!(f, "Invalid parameter value {value}"),
            ToneError::UnknownNode(id) => write!(f, "Unknown audio node {id}"),
            ToneError::InvalidState(why) => write!(f, "Invalid state: {why}"),
            ToneError::Config(why) => write!(f, "Config error: {why}"),
        }
    }
}

impl std::error::Error for ToneError {}

impl From<serde_json::Error> for ToneError {
    fn from(e: serde_json::Error) -> Self {
        ToneError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_mentions_cause() {
        let e = ToneError::InvalidNoteName("H4".to_string());
        assert_eq!(e.to_string(), "Invalid note name 'H4'");
        let e = ToneError::HostPolicyDenied("no user gesture".to_string());
        assert!(e.to_string().contains("no user gesture"));
    }

    #[test]
    fn only_unsupported_environment_is_fatal() {
        assert!(ToneError::UnsupportedEnvironment("closed".into()).is_fatal());
        assert!(!ToneError::HostPolicyDenied("later".into()).is_fatal());
        assert!(!ToneError::InvalidState("stopped".into()).is_fatal());
    }
}
