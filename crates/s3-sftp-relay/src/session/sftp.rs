//! SFTP implementation of the transfer session, over russh.

use crate::credentials::Credentials;
use crate::error::{RelayError, Result};
use crate::store::ObjectBody;
use async_trait::async_trait;
use futures::TryStreamExt;
use russh::client;
use russh_keys::key::PublicKey;
use russh_sftp::client::error::Error as SftpError;
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::{OpenFlags, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::{HostVerifier, SessionFactory, TransferSession};

/// Builds authenticated SFTP sessions for the workers.
pub struct SftpSessionFactory {
    credentials: Credentials,
    verifier: HostVerifier,
    connect_timeout: Duration,
}

impl SftpSessionFactory {
    pub fn new(credentials: Credentials, verifier: HostVerifier, connect_timeout: Duration) -> Self {
        Self {
            credentials,
            verifier,
            connect_timeout,
        }
    }
}

struct RelayHandler {
    verifier: HostVerifier,
}

#[async_trait]
impl client::Handler for RelayHandler {
    type Error = russh::Error;

    async fn check_server_key(&mut self, server_public_key: &PublicKey) -> std::result::Result<bool, Self::Error> {
        let fingerprint = server_public_key.fingerprint();
        let accepted = self.verifier.matches(&fingerprint);
        if !accepted {
            warn!("server host key rejected (fingerprint SHA256:{})", fingerprint);
        }
        Ok(accepted)
    }
}

#[async_trait]
impl SessionFactory for SftpSessionFactory {
    async fn connect(&self) -> Result<Box<dyn TransferSession>> {
        let Credentials {
            host,
            port,
            username,
            password,
        } = &self.credentials;

        let config = Arc::new(client::Config {
            inactivity_timeout: Some(Duration::from_secs(300)),
            ..Default::default()
        });
        let handler = RelayHandler {
            verifier: self.verifier.clone(),
        };

        debug!("dialing sftp endpoint {}:{}", host, port);
        let mut handle = tokio::time::timeout(
            self.connect_timeout,
            client::connect(config, (host.as_str(), *port), handler),
        )
        .await
        .map_err(|_| RelayError::connect(format!("connecting to {}:{} timed out", host, port)))?
        .map_err(|e| RelayError::connect(format!("dialing {}:{} failed: {}", host, port, e)))?;

        let authenticated = handle
            .authenticate_password(username, password)
            .await
            .map_err(|e| RelayError::connect(format!("authentication failed: {}", e)))?;
        if !authenticated {
            return Err(RelayError::connect(format!(
                "password authentication rejected for user {:?}",
                username
            )));
        }

        let channel = handle
            .channel_open_session()
            .await
            .map_err(|e| RelayError::connect(format!("channel open failed: {}", e)))?;
        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| RelayError::connect(format!("sftp subsystem request failed: {}", e)))?;
        let sftp = SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| RelayError::connect(format!("sftp handshake failed: {}", e)))?;

        debug!("sftp session established to {}:{}", host, port);
        Ok(Box::new(SftpTransferSession { handle, sftp }))
    }
}

struct SftpTransferSession {
    handle: client::Handle<RelayHandler>,
    sftp: SftpSession,
}

#[async_trait]
impl TransferSession for SftpTransferSession {
    async fn ensure_dir(&mut self, path: &str) -> Result<()> {
        match self.sftp.create_dir(path).await {
            Ok(()) => Ok(()),
            // Already-existing directory is fine; anything the server will
            // still stat is treated as present.
            Err(e) => match self.sftp.metadata(path).await {
                Ok(_) => Ok(()),
                Err(_) => Err(map_sftp_error(path, e)),
            },
        }
    }

    async fn write_file(&mut self, path: &str, mut body: ObjectBody) -> Result<u64> {
        let mut file = self
            .sftp
            .open_with_flags(
                path,
                OpenFlags::CREATE | OpenFlags::TRUNCATE | OpenFlags::WRITE,
            )
            .await
            .map_err(|e| map_sftp_error(path, e))?;

        let mut written = 0u64;
        while let Some(chunk) = body.try_next().await? {
            file.write_all(&chunk)
                .await
                .map_err(|e| RelayError::connect(format!("write to {} failed: {}", path, e)))?;
            written += chunk.len() as u64;
        }

        file.shutdown()
            .await
            .map_err(|e| RelayError::connect(format!("flush of {} failed: {}", path, e)))?;

        Ok(written)
    }

    async fn close(&mut self) -> Result<()> {
        self.handle
            .disconnect(russh::Disconnect::ByApplication, "done", "en")
            .await
            .map_err(|e| RelayError::connect(format!("disconnect failed: {}", e)))
    }
}

/// Map an SFTP protocol error into the relay taxonomy.
///
/// Permission and missing-path responses are deterministic; lost connections
/// surface as connection errors so the worker reconnects; everything else is
/// a retryable transfer failure.
fn map_sftp_error(path: &str, e: SftpError) -> RelayError {
    match e {
        SftpError::Status(status) => match status.status_code {
            StatusCode::PermissionDenied => RelayError::transfer(
                path,
                format!("permission denied: {}", status.error_message),
                false,
            ),
            StatusCode::NoSuchFile => RelayError::transfer(
                path,
                format!("no such path: {}", status.error_message),
                false,
            ),
            StatusCode::NoConnection | StatusCode::ConnectionLost => {
                RelayError::connect(format!("sftp connection lost: {}", status.error_message))
            }
            code => RelayError::transfer(
                path,
                format!("sftp failure ({:?}): {}", code, status.error_message),
                true,
            ),
        },
        other => RelayError::connect(format!("sftp protocol error on {}: {}", path, other)),
    }
}
