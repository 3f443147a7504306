//! # s3-sftp-relay
//!
//! Bulk S3-to-SFTP object relay library.
//!
//! This library provides the core functionality for moving every object
//! under an S3 prefix to a remote SFTP destination with support for:
//!
//! - **Bounded parallelism** with a configurable worker pool
//! - **Per-object failure isolation** and bounded retry with backoff
//! - **Resume capability** via a JSON resumption ledger
//! - **Credential resolution** from a managed secret
//! - **Host key pinning** for the SFTP endpoint
//!
//! ## Example
//!
//! ```rust,no_run
//! use s3_sftp_relay::{Config, Relay};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> s3_sftp_relay::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let relay = Relay::new(config);
//!     let report = relay.run(CancellationToken::new()).await?;
//!     println!("Transferred {} objects", report.succeeded);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod credentials;
pub mod error;
pub mod ledger;
pub mod orchestrator;
pub mod report;
pub mod scheduler;
pub mod session;
pub mod store;

// Re-exports for convenient access
pub use config::{Config, SftpConfig, TransferConfig};
pub use credentials::{Credentials, SecretStore, SecretsManagerStore};
pub use error::{RelayError, Result};
pub use ledger::{FileLedger, MemoryLedger, ResumptionLedger};
pub use orchestrator::Relay;
pub use report::{RunReport, RunStatus, TransferOutcome, TransferStatus};
pub use scheduler::{SchedulerConfig, TransferScheduler};
pub use session::{HostVerifier, SessionFactory, SftpSessionFactory, TransferSession};
pub use store::{ObjectBody, ObjectStore, S3Store, TransferCandidate};
