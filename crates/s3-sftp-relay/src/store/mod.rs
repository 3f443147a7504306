//! Object store collaborator: candidate listing and body streaming.

mod s3;

pub use s3::S3Store;

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use tokio::sync::mpsc;

/// One object-store entry eligible for transfer.
///
/// Produced once per listing entry; immutable; discarded after its outcome is
/// recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferCandidate {
    /// Object key, unique within a run.
    pub key: String,

    /// Object size in bytes, when the store reports one.
    pub size_hint: Option<i64>,

    /// Whether the key denotes a directory marker (trailing separator).
    pub is_directory_marker: bool,
}

impl TransferCandidate {
    /// Build a candidate from a listed key, flagging directory markers.
    pub fn from_entry(key: impl Into<String>, size_hint: Option<i64>) -> Self {
        let key = key.into();
        let is_directory_marker = key.ends_with('/');
        Self {
            key,
            size_hint,
            is_directory_marker,
        }
    }

    /// Last path segment of the key.
    pub fn basename(&self) -> &str {
        self.key
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(&self.key)
    }
}

/// Streaming object body. Chunks arrive lazily; transferring a large object
/// never requires memory proportional to its size.
pub type ObjectBody = BoxStream<'static, Result<Bytes>>;

/// Capability interface for the object store collaborator.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Start listing candidates under a prefix.
    ///
    /// Returns a channel receiver that yields candidates lazily, one store
    /// page at a time; the bounded channel provides backpressure against the
    /// paginator. The sequence terminates when pagination ends. An
    /// enumeration failure is forwarded on the channel as a listing-scoped
    /// Store error and aborts the run.
    fn list(&self, prefix: &str) -> mpsc::Receiver<Result<TransferCandidate>>;

    /// Fetch the streaming body of one object.
    async fn fetch(&self, key: &str) -> Result<ObjectBody>;
}
