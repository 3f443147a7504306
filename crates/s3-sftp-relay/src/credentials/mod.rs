//! SFTP credential resolution from a managed secret blob.

mod aws;

pub use aws::SecretsManagerStore;

use crate::error::{RelayError, Result};
use async_trait::async_trait;
use serde::Deserialize;

/// Connection parameters for the remote SFTP endpoint.
///
/// Parsed once from the secret blob at startup and immutable for the process
/// lifetime; a secret rotated mid-run is picked up on the next run.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

/// Capability interface for the secret store collaborator.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch the raw secret value by name.
    async fn get_secret(&self, name: &str) -> Result<Vec<u8>>;
}

/// Raw secret blob layout, matching the managed secret's JSON fields.
#[derive(Debug, Deserialize)]
struct SecretBlob {
    #[serde(rename = "sftpHost")]
    host: Option<String>,
    #[serde(rename = "sftpPort")]
    port: Option<String>,
    #[serde(rename = "sftpUsername")]
    username: Option<String>,
    #[serde(rename = "sftpPassword")]
    password: Option<String>,
}

/// Parse SFTP credentials from an opaque secret blob.
///
/// Fails with a ConfigError naming the first missing or malformed field, so
/// a broken secret is diagnosable without dumping its contents.
pub fn resolve(blob: &[u8]) -> Result<Credentials> {
    let parsed: SecretBlob = serde_json::from_slice(blob)
        .map_err(|e| RelayError::Config(format!("secret blob is not valid JSON: {}", e)))?;

    let host = require(parsed.host, "sftpHost")?;
    let port_str = require(parsed.port, "sftpPort")?;
    let username = require(parsed.username, "sftpUsername")?;
    let password = require(parsed.password, "sftpPassword")?;

    let port: u16 = port_str
        .parse()
        .map_err(|_| RelayError::Config(format!("secret field sftpPort is not a port: {:?}", port_str)))?;

    Ok(Credentials {
        host,
        port,
        username,
        password,
    })
}

fn require(field: Option<String>, name: &str) -> Result<String> {
    match field {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(RelayError::Config(format!("secret blob is missing field {}", name))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_complete_blob() {
        let blob = br#"{
            "sftpHost": "sftp.example.com",
            "sftpPort": "2022",
            "sftpUsername": "relay",
            "sftpPassword": "hunter2"
        }"#;
        let creds = resolve(blob).unwrap();
        assert_eq!(creds.host, "sftp.example.com");
        assert_eq!(creds.port, 2022);
        assert_eq!(creds.username, "relay");
        assert_eq!(creds.password, "hunter2");
    }

    #[test]
    fn test_missing_username_is_config_error() {
        let blob = br#"{"sftpHost": "h", "sftpPort": "22", "sftpPassword": "p"}"#;
        let err = resolve(blob).unwrap_err();
        assert!(matches!(err, RelayError::Config(_)));
        assert!(err.to_string().contains("sftpUsername"));
    }

    #[test]
    fn test_empty_field_counts_as_missing() {
        let blob = br#"{"sftpHost": "", "sftpPort": "22", "sftpUsername": "u", "sftpPassword": "p"}"#;
        let err = resolve(blob).unwrap_err();
        assert!(err.to_string().contains("sftpHost"));
    }

    #[test]
    fn test_non_numeric_port_rejected() {
        let blob = br#"{"sftpHost": "h", "sftpPort": "ssh", "sftpUsername": "u", "sftpPassword": "p"}"#;
        let err = resolve(blob).unwrap_err();
        assert!(err.to_string().contains("sftpPort"));
    }

    #[test]
    fn test_garbage_blob_rejected() {
        let err = resolve(b"not json at all").unwrap_err();
        assert!(matches!(err, RelayError::Config(_)));
    }
}
