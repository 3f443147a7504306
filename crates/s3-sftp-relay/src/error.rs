//! Error types for the relay library.

use thiserror::Error;

/// Main error type for relay operations.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Configuration error (invalid YAML, malformed secret, missing fields).
    /// Always fatal; surfaces before any transfer starts.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failed to establish an SFTP session. Fatal during the setup probe,
    /// otherwise a per-candidate transient failure eligible for reconnect.
    #[error("Connection error: {message}")]
    Connect { message: String },

    /// Remote-side failure while transferring a specific object.
    #[error("Transfer failed for {key}: {message}")]
    Transfer {
        key: String,
        message: String,
        transient: bool,
    },

    /// Object store failure. Scoped to one key for fetches; `key: None`
    /// means the listing itself failed, which aborts the run.
    #[error("Object store error: {message}")]
    Store {
        key: Option<String>,
        message: String,
        transient: bool,
    },

    /// IO error (ledger file operations).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl RelayError {
    /// Create a Connect error.
    pub fn connect(message: impl Into<String>) -> Self {
        RelayError::Connect {
            message: message.into(),
        }
    }

    /// Create a Transfer error for a specific key.
    pub fn transfer(key: impl Into<String>, message: impl Into<String>, transient: bool) -> Self {
        RelayError::Transfer {
            key: key.into(),
            message: message.into(),
            transient,
        }
    }

    /// Create a Store error scoped to a single object fetch.
    pub fn store_fetch(key: impl Into<String>, message: impl Into<String>, transient: bool) -> Self {
        RelayError::Store {
            key: Some(key.into()),
            message: message.into(),
            transient,
        }
    }

    /// Create a Store error scoped to the listing enumeration (fatal).
    pub fn store_listing(message: impl Into<String>) -> Self {
        RelayError::Store {
            key: None,
            message: message.into(),
            transient: false,
        }
    }

    /// Whether a retry is expected to succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            RelayError::Connect { .. } => true,
            RelayError::Transfer { transient, .. } => *transient,
            RelayError::Store { key, transient, .. } => key.is_some() && *transient,
            _ => false,
        }
    }

    /// Whether the error indicates a dead session that needs a reconnect.
    pub fn is_connection(&self) -> bool {
        matches!(self, RelayError::Connect { .. })
    }

    /// Format error with full details including error chain.
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }

    /// Process exit code for a run aborted by this error.
    ///
    /// Setup-phase aborts (config, credentials, listing) exit with 2 so the
    /// caller can tell them apart from "completed with failures" (1).
    pub fn exit_code(&self) -> u8 {
        match self {
            RelayError::Config(_) | RelayError::Yaml(_) | RelayError::Io(_) => 2,
            RelayError::Store { key: None, .. } => 2,
            RelayError::Connect { .. } => 2,
            _ => 1,
        }
    }
}

/// Result type alias for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_is_transient() {
        assert!(RelayError::connect("reset by peer").is_transient());
        assert!(RelayError::connect("reset by peer").is_connection());
        assert_eq!(RelayError::connect("reset by peer").exit_code(), 2);
    }

    #[test]
    fn test_transfer_transient_flag() {
        assert!(RelayError::transfer("a.txt", "timeout", true).is_transient());
        assert!(!RelayError::transfer("a.txt", "permission denied", false).is_transient());
    }

    #[test]
    fn test_listing_error_never_transient() {
        // Enumeration failures abort the run regardless of cause.
        assert!(!RelayError::store_listing("slow down").is_transient());
        assert_eq!(RelayError::store_listing("boom").exit_code(), 2);
    }

    #[test]
    fn test_fetch_error_scoped_to_key() {
        let err = RelayError::store_fetch("a.txt", "throttled", true);
        assert!(err.is_transient());
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_config_error_exit_code() {
        assert_eq!(RelayError::Config("bad".into()).exit_code(), 2);
    }

    #[test]
    fn test_format_detailed_includes_message() {
        let err = RelayError::Config("missing field".into());
        assert!(err.format_detailed().contains("missing field"));
    }
}
