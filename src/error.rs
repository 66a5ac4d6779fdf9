//! Unified error type for the capture, classification and reporting layers.
//!
//! `MonitorError` separates failures that must abort startup (interface,
//! capture, config) from sink failures that the reporter logs and survives.

/// Library-level error returned by fallible netband operations.
///
/// Each variant maps to a distinct failure domain. Use [`MonitorError::kind`]
/// for a stable tag in structured log fields.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// Interface lookup or local identity resolution failed.
    #[error("{0}")]
    Interface(String),

    /// Errors from the pcap capture session (open, filter, read).
    #[error("{0}")]
    Capture(String),

    /// Invalid configuration: malformed subnet specifier, zero interval.
    #[error("{0}")]
    Config(String),

    /// Report sink failures (log directory creation, file writes, stdout).
    #[error("{0}")]
    Sink(String),
}

impl MonitorError {
    /// Returns the error kind as a string matching the variant name.
    pub fn kind(&self) -> &'static str {
        match self {
            MonitorError::Interface(_) => "Interface",
            MonitorError::Capture(_) => "Capture",
            MonitorError::Config(_) => "Config",
            MonitorError::Sink(_) => "Sink",
        }
    }

    /// Whether the reporting loop may continue after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, MonitorError::Sink(_))
    }
}

pub type Result<T> = std::result::Result<T, MonitorError>;

// ---- From implementations for ergonomic error conversion ----

impl From<std::io::Error> for MonitorError {
    fn from(err: std::io::Error) -> Self {
        MonitorError::Sink(err.to_string())
    }
}

impl From<pcap::Error> for MonitorError {
    fn from(err: pcap::Error) -> Self {
        MonitorError::Capture(err.to_string())
    }
}

impl From<serde_json::Error> for MonitorError {
    fn from(err: serde_json::Error) -> Self {
        MonitorError::Sink(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_returns_correct_variant_name() {
        assert_eq!(MonitorError::Interface("no eth9".into()).kind(), "Interface");
        assert_eq!(MonitorError::Capture("cap fail".into()).kind(), "Capture");
        assert_eq!(MonitorError::Config("bad cidr".into()).kind(), "Config");
        assert_eq!(MonitorError::Sink("disk full".into()).kind(), "Sink");
    }

    #[test]
    fn test_error_display_shows_message() {
        let err = MonitorError::Config("missing prefix in '10.0.0.0'".into());
        assert_eq!(err.to_string(), "missing prefix in '10.0.0.0'");
    }

    #[test]
    fn test_only_sink_errors_are_recoverable() {
        assert!(MonitorError::Sink("x".into()).is_recoverable());
        assert!(!MonitorError::Capture("x".into()).is_recoverable());
        assert!(!MonitorError::Interface("x".into()).is_recoverable());
        assert!(!MonitorError::Config("x".into()).is_recoverable());
    }

    #[test]
    fn test_from_io_error_produces_sink_variant() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "log dir missing");
        let err: MonitorError = io_err.into();
        assert_eq!(err.kind(), "Sink");
        assert!(err.to_string().contains("log dir missing"));
    }

    #[test]
    fn test_from_pcap_error_produces_capture_variant() {
        let err: MonitorError = pcap::Error::TimeoutExpired.into();
        assert_eq!(err.kind(), "Capture");
    }
}
