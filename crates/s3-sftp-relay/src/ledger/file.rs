//! File-backed ledger for cross-run resumption.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::info;

use crate::error::{RelayError, Result};

use super::ResumptionLedger;

/// Ledger persisted as a sorted JSON array of keys.
///
/// The full set is rewritten on every record via temp-file-then-rename, so a
/// crash mid-write never leaves a truncated ledger behind. At the scale of
/// one key per transferred object this stays cheap. The async mutex is held
/// across the persist so concurrent records never write stale snapshots out
/// of order.
pub struct FileLedger {
    path: PathBuf,
    keys: Mutex<BTreeSet<String>>,
}

impl FileLedger {
    /// Open a ledger file, loading any keys recorded by prior runs.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let keys: BTreeSet<String> = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str::<Vec<String>>(&content)?
                .into_iter()
                .collect()
        } else {
            BTreeSet::new()
        };

        if !keys.is_empty() {
            info!("ledger {:?}: {} keys from prior runs", path, keys.len());
        }

        Ok(Self {
            path,
            keys: Mutex::new(keys),
        })
    }
}

/// Atomic write: temp file in the same directory, then rename.
fn persist(path: &Path, keys: &[String]) -> Result<()> {
    let content = serde_json::to_string_pretty(keys)?;
    let temp_path = path.with_extension("tmp");
    std::fs::write(&temp_path, content)?;
    std::fs::rename(&temp_path, path)?;
    Ok(())
}

#[async_trait]
impl ResumptionLedger for FileLedger {
    async fn contains(&self, key: &str) -> bool {
        self.keys.lock().await.contains(key)
    }

    async fn record(&self, key: &str) -> Result<()> {
        let mut keys = self.keys.lock().await;
        if keys.insert(key.to_string()) {
            let snapshot: Vec<String> = keys.iter().cloned().collect();
            let path = self.path.clone();
            // File IO on the blocking pool; worker threads keep polling.
            tokio::task::spawn_blocking(move || persist(&path, &snapshot))
                .await
                .map_err(|e| {
                    RelayError::Io(std::io::Error::new(std::io::ErrorKind::Other, e))
                })??;
        }
        Ok(())
    }

    async fn len(&self) -> usize {
        self.keys.lock().await.len()
    }
}
