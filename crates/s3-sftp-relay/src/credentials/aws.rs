//! AWS Secrets Manager implementation of [`SecretStore`].

use crate::error::{RelayError, Result};
use async_trait::async_trait;
use aws_config::SdkConfig;

use super::SecretStore;

/// Secret store backed by AWS Secrets Manager.
pub struct SecretsManagerStore {
    client: aws_sdk_secretsmanager::Client,
}

impl SecretsManagerStore {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_secretsmanager::Client::new(sdk_config),
        }
    }
}

#[async_trait]
impl SecretStore for SecretsManagerStore {
    async fn get_secret(&self, name: &str) -> Result<Vec<u8>> {
        let output = self
            .client
            .get_secret_value()
            .secret_id(name)
            .send()
            .await
            .map_err(|e| {
                RelayError::Config(format!("failed to retrieve secret {:?}: {}", name, e))
            })?;

        if let Some(s) = output.secret_string() {
            return Ok(s.as_bytes().to_vec());
        }
        if let Some(b) = output.secret_binary() {
            return Ok(b.clone().into_inner());
        }
        Err(RelayError::Config(format!(
            "secret {:?} has neither a string nor a binary value",
            name
        )))
    }
}
