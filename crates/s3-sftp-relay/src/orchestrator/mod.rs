//! Run orchestration: wires AWS clients, credentials, and the scheduler.

use crate::config::Config;
use crate::credentials::{self, Credentials, SecretStore, SecretsManagerStore};
use crate::error::Result;
use crate::ledger::{FileLedger, MemoryLedger, ResumptionLedger};
use crate::report::RunReport;
use crate::scheduler::{SchedulerConfig, TransferScheduler};
use crate::session::{HostVerifier, SessionFactory, SftpSessionFactory};
use crate::store::{ObjectStore, S3Store};
use aws_config::BehaviorVersion;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Top-level entry point. Owns the validated configuration and builds the
/// concrete collaborators for a run.
pub struct Relay {
    config: Config,
    ledger_path: Option<PathBuf>,
}

impl Relay {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            ledger_path: None,
        }
    }

    /// Persist the resumption ledger at `path` instead of keeping it
    /// in memory only.
    pub fn with_ledger_file(mut self, path: PathBuf) -> Self {
        self.ledger_path = Some(path);
        self
    }

    /// Override the configured key prefix.
    pub fn with_prefix(mut self, prefix: String) -> Self {
        self.config.prefix = prefix;
        self
    }

    /// Override the configured worker count.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.config.transfer.concurrency = Some(concurrency);
        self
    }

    /// Bypass the resumption ledger for this run.
    pub fn with_force_retry(mut self) -> Self {
        self.config.transfer.force_retry = true;
        self
    }

    /// Execute a full transfer run.
    pub async fn run(&self, cancel: CancellationToken) -> Result<RunReport> {
        let sdk_config = self.load_sdk_config().await;

        let credentials = self.resolve_credentials(&sdk_config).await?;
        info!(
            "transferring s3://{}/{} to sftp://{}@{}:{}{}",
            self.config.bucket,
            self.config.prefix,
            credentials.username,
            credentials.host,
            credentials.port,
            self.config.remote_base
        );

        let store: Arc<dyn ObjectStore> = Arc::new(S3Store::new(
            aws_sdk_s3::Client::new(&sdk_config),
            &self.config.bucket,
        ));
        let sessions = self.session_factory(credentials)?;
        let ledger = self.open_ledger()?;

        let scheduler = TransferScheduler::new(
            store,
            sessions,
            ledger,
            SchedulerConfig {
                concurrency: self.config.transfer.get_concurrency(),
                max_attempts: self.config.transfer.get_max_attempts(),
                retry_base_delay: Duration::from_millis(
                    self.config.transfer.get_retry_base_delay_ms(),
                ),
                force_retry: self.config.transfer.force_retry,
                remote_base: self.config.remote_base.clone(),
            },
        );

        scheduler.run(&self.config.prefix, cancel).await
    }

    /// Verify the secret resolves and the SFTP endpoint accepts a session,
    /// without transferring anything.
    pub async fn health_check(&self) -> Result<()> {
        let sdk_config = self.load_sdk_config().await;
        let credentials = self.resolve_credentials(&sdk_config).await?;

        let sessions = self.session_factory(credentials)?;
        let mut session = sessions.connect().await?;
        session.close().await?;

        info!("health check passed");
        Ok(())
    }

    async fn load_sdk_config(&self) -> aws_config::SdkConfig {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &self.config.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        loader.load().await
    }

    async fn resolve_credentials(
        &self,
        sdk_config: &aws_config::SdkConfig,
    ) -> Result<Credentials> {
        let secrets = SecretsManagerStore::new(sdk_config);
        let blob = secrets.get_secret(&self.config.secret_name).await?;
        credentials::resolve(&blob)
    }

    fn session_factory(&self, credentials: Credentials) -> Result<Arc<dyn SessionFactory>> {
        let verifier = HostVerifier::from_config(&self.config.sftp)?;
        Ok(Arc::new(SftpSessionFactory::new(
            credentials,
            verifier,
            Duration::from_secs(self.config.sftp.get_connect_timeout_secs()),
        )))
    }

    fn open_ledger(&self) -> Result<Arc<dyn ResumptionLedger>> {
        match &self.ledger_path {
            Some(path) => {
                info!("resumption ledger: {}", path.display());
                Ok(Arc::new(FileLedger::open(path)?))
            }
            None => Ok(Arc::new(MemoryLedger::new())),
        }
    }
}
