//! Resumption ledger: keys already confirmed transferred.

mod file;

pub use file::FileLedger;

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;

use crate::error::Result;

/// Record of keys already successfully transferred.
///
/// Consulted before every transfer and updated after each success. A key in
/// the ledger is never re-transferred unless the run sets force-retry. The
/// storage strategy is swappable; the scheduler only needs contains/record.
#[async_trait]
pub trait ResumptionLedger: Send + Sync {
    /// Whether the key has already been transferred.
    async fn contains(&self, key: &str) -> bool;

    /// Record a confirmed transfer.
    async fn record(&self, key: &str) -> Result<()>;

    /// Number of recorded keys.
    async fn len(&self) -> usize;
}

/// In-memory ledger, sufficient for resumption within a single run.
#[derive(Default)]
pub struct MemoryLedger {
    keys: Mutex<HashSet<String>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResumptionLedger for MemoryLedger {
    async fn contains(&self, key: &str) -> bool {
        self.keys.lock().unwrap().contains(key)
    }

    async fn record(&self, key: &str) -> Result<()> {
        self.keys.lock().unwrap().insert(key.to_string());
        Ok(())
    }

    async fn len(&self) -> usize {
        self.keys.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_ledger_round_trip() {
        let ledger = MemoryLedger::new();
        assert!(!ledger.contains("a.txt").await);
        assert_eq!(ledger.len().await, 0);

        ledger.record("a.txt").await.unwrap();
        assert!(ledger.contains("a.txt").await);
        assert_eq!(ledger.len().await, 1);

        // Recording twice is idempotent.
        ledger.record("a.txt").await.unwrap();
        assert_eq!(ledger.len().await, 1);
    }
}
