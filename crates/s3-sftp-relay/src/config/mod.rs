//! Configuration loading and validation.

use crate::error::{RelayError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source bucket name.
    pub bucket: String,

    /// Key prefix filter (default: transfer everything in the bucket).
    #[serde(default)]
    pub prefix: String,

    /// AWS region. Falls back to the ambient environment when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Name of the managed secret holding the SFTP credentials.
    pub secret_name: String,

    /// Remote destination root (default: "/uploads").
    #[serde(default = "default_remote_base")]
    pub remote_base: String,

    /// Transfer behavior configuration.
    #[serde(default)]
    pub transfer: TransferConfig,

    /// SFTP endpoint policy configuration.
    #[serde(default)]
    pub sftp: SftpConfig,
}

/// Transfer behavior configuration.
/// Fields use Option<T> to distinguish "not set" (use default) from
/// "explicitly set".
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TransferConfig {
    /// Number of concurrent transfer workers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,

    /// Maximum attempts per candidate, including the first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,

    /// Base delay between retry attempts, doubled each attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_base_delay_ms: Option<u64>,

    /// Bypass the resumption ledger and re-transfer everything.
    #[serde(default)]
    pub force_retry: bool,
}

impl TransferConfig {
    pub fn get_concurrency(&self) -> usize {
        self.concurrency.unwrap_or(4)
    }

    pub fn get_max_attempts(&self) -> u32 {
        self.max_attempts.unwrap_or(3)
    }

    pub fn get_retry_base_delay_ms(&self) -> u64 {
        self.retry_base_delay_ms.unwrap_or(500)
    }
}

/// SFTP endpoint policy. Host and credentials come from the secret blob,
/// not from this file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SftpConfig {
    /// Pinned SHA256 fingerprint of the server host key
    /// (with or without the "SHA256:" prefix).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_fingerprint: Option<String>,

    /// Accept any host key. Explicit opt-in; a run with neither this nor a
    /// fingerprint configured is rejected at startup.
    #[serde(default)]
    pub insecure_skip_host_verification: bool,

    /// Connect timeout in seconds (default: 30).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout_secs: Option<u64>,
}

impl SftpConfig {
    pub fn get_connect_timeout_secs(&self) -> u64 {
        self.connect_timeout_secs.unwrap_or(30)
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.bucket.trim().is_empty() {
            return Err(RelayError::Config("bucket must not be empty".into()));
        }
        if self.secret_name.trim().is_empty() {
            return Err(RelayError::Config("secret_name must not be empty".into()));
        }
        if !self.remote_base.starts_with('/') {
            return Err(RelayError::Config(format!(
                "remote_base must be an absolute path, got {:?}",
                self.remote_base
            )));
        }
        if self.transfer.get_concurrency() == 0 {
            return Err(RelayError::Config("transfer.concurrency must be >= 1".into()));
        }
        if self.transfer.get_max_attempts() == 0 {
            return Err(RelayError::Config("transfer.max_attempts must be >= 1".into()));
        }
        if self.sftp.host_fingerprint.is_none() && !self.sftp.insecure_skip_host_verification {
            return Err(RelayError::Config(
                "host verification is not configured: set sftp.host_fingerprint, \
                 or opt in to sftp.insecure_skip_host_verification"
                    .into(),
            ));
        }
        if self.sftp.host_fingerprint.is_some() && self.sftp.insecure_skip_host_verification {
            return Err(RelayError::Config(
                "sftp.host_fingerprint and sftp.insecure_skip_host_verification are mutually exclusive"
                    .into(),
            ));
        }
        Ok(())
    }
}

fn default_remote_base() -> String {
    "/uploads".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
bucket: test-bucket
secret_name: sftp-relay
sftp:
  host_fingerprint: "SHA256:abc123"
"#;

    #[test]
    fn test_minimal_config_defaults() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.bucket, "test-bucket");
        assert_eq!(config.prefix, "");
        assert_eq!(config.remote_base, "/uploads");
        assert_eq!(config.transfer.get_concurrency(), 4);
        assert_eq!(config.transfer.get_max_attempts(), 3);
        assert_eq!(config.transfer.get_retry_base_delay_ms(), 500);
        assert!(!config.transfer.force_retry);
    }

    #[test]
    fn test_explicit_transfer_settings() {
        let yaml = r#"
bucket: b
secret_name: s
transfer:
  concurrency: 8
  max_attempts: 5
  retry_base_delay_ms: 100
  force_retry: true
sftp:
  insecure_skip_host_verification: true
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.transfer.get_concurrency(), 8);
        assert_eq!(config.transfer.get_max_attempts(), 5);
        assert_eq!(config.transfer.get_retry_base_delay_ms(), 100);
        assert!(config.transfer.force_retry);
    }

    #[test]
    fn test_empty_bucket_rejected() {
        let yaml = r#"
bucket: ""
secret_name: s
sftp:
  insecure_skip_host_verification: true
"#;
        assert!(matches!(
            Config::from_yaml(yaml),
            Err(RelayError::Config(_))
        ));
    }

    #[test]
    fn test_relative_remote_base_rejected() {
        let yaml = r#"
bucket: b
secret_name: s
remote_base: uploads
sftp:
  insecure_skip_host_verification: true
"#;
        assert!(matches!(
            Config::from_yaml(yaml),
            Err(RelayError::Config(_))
        ));
    }

    #[test]
    fn test_missing_host_verification_rejected() {
        let yaml = r#"
bucket: b
secret_name: s
"#;
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("host verification"));
    }

    #[test]
    fn test_conflicting_host_verification_rejected() {
        let yaml = r#"
bucket: b
secret_name: s
sftp:
  host_fingerprint: "SHA256:abc"
  insecure_skip_host_verification: true
"#;
        assert!(Config::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let yaml = r#"
bucket: b
secret_name: s
transfer:
  concurrency: 0
sftp:
  insecure_skip_host_verification: true
"#;
        assert!(Config::from_yaml(yaml).is_err());
    }
}
