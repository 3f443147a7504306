//! Remote transfer session collaborator.

mod sftp;

pub use sftp::SftpSessionFactory;

use crate::config::SftpConfig;
use crate::error::{RelayError, Result};
use crate::store::ObjectBody;
use async_trait::async_trait;

/// One authenticated connection to the remote transfer endpoint.
///
/// Sessions are owned by a single worker; data transfer on a session is
/// never interleaved with another worker's transfer.
#[async_trait]
pub trait TransferSession: Send {
    /// Create one remote directory whose parent already exists. Idempotent:
    /// an already-existing directory is not an error.
    async fn ensure_dir(&mut self, path: &str) -> Result<()>;

    /// Create a directory and any missing ancestors, root-most first.
    async fn ensure_dir_all(&mut self, path: &str) -> Result<()> {
        for dir in ancestor_paths(path) {
            self.ensure_dir(&dir).await?;
        }
        Ok(())
    }

    /// Create/truncate the remote file and stream the body into it.
    ///
    /// Retries always recreate the destination rather than append, so a
    /// partial write left by a failed attempt is simply overwritten.
    async fn write_file(&mut self, path: &str, body: ObjectBody) -> Result<u64>;

    /// Tear down the connection.
    async fn close(&mut self) -> Result<()>;
}

/// Builds sessions; workers connect lazily and reconnect after a dead
/// session is detected.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn TransferSession>>;
}

/// Host identity verification strategy, injected at factory construction.
///
/// The safe default pins the server host key fingerprint; accepting any key
/// requires explicit opt-in in the configuration.
#[derive(Debug, Clone)]
pub enum HostVerifier {
    /// Require a matching SHA256 host key fingerprint.
    Fingerprint(String),
    /// Accept any host key (insecure, explicit opt-in).
    AcceptAny,
}

impl HostVerifier {
    /// Build the verifier from the validated SFTP config section.
    pub fn from_config(config: &SftpConfig) -> Result<Self> {
        if let Some(ref pinned) = config.host_fingerprint {
            return Ok(HostVerifier::Fingerprint(
                normalize_fingerprint(pinned).to_string(),
            ));
        }
        if config.insecure_skip_host_verification {
            return Ok(HostVerifier::AcceptAny);
        }
        Err(RelayError::Config(
            "host verification is not configured".into(),
        ))
    }

    /// Check a server key fingerprint against the policy.
    pub fn matches(&self, fingerprint: &str) -> bool {
        match self {
            HostVerifier::AcceptAny => true,
            HostVerifier::Fingerprint(pinned) => normalize_fingerprint(fingerprint) == pinned,
        }
    }
}

fn normalize_fingerprint(fp: &str) -> &str {
    fp.strip_prefix("SHA256:").unwrap_or(fp).trim_end_matches('=')
}

/// Every absolute path from the first component down to `path` itself.
fn ancestor_paths(path: &str) -> Vec<String> {
    let mut dirs = Vec::new();
    let mut current = String::new();
    for part in path.split('/').filter(|p| !p.is_empty()) {
        current.push('/');
        current.push_str(part);
        dirs.push(current.clone());
    }
    dirs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_match_with_prefix() {
        let v = HostVerifier::Fingerprint(normalize_fingerprint("SHA256:abcDEF123").into());
        assert!(v.matches("abcDEF123"));
        assert!(v.matches("SHA256:abcDEF123"));
        assert!(!v.matches("SHA256:other"));
    }

    #[test]
    fn test_base64_padding_ignored() {
        let v = HostVerifier::Fingerprint(normalize_fingerprint("abc123=").into());
        assert!(v.matches("abc123"));
    }

    #[test]
    fn test_accept_any() {
        assert!(HostVerifier::AcceptAny.matches("anything"));
    }

    #[test]
    fn test_ancestor_paths_root_most_first() {
        assert_eq!(
            ancestor_paths("/data/incoming/reports"),
            vec!["/data", "/data/incoming", "/data/incoming/reports"]
        );
        assert_eq!(ancestor_paths("/uploads"), vec!["/uploads"]);
        assert!(ancestor_paths("/").is_empty());
    }

    #[test]
    fn test_from_config_requires_policy() {
        let config = SftpConfig::default();
        assert!(HostVerifier::from_config(&config).is_err());

        let config = SftpConfig {
            insecure_skip_host_verification: true,
            ..Default::default()
        };
        assert!(matches!(
            HostVerifier::from_config(&config),
            Ok(HostVerifier::AcceptAny)
        ));
    }
}
