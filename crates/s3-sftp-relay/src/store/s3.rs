//! S3 implementation of the object store collaborator.

use crate::error::{RelayError, Result};
use async_trait::async_trait;
use aws_sdk_s3::error::SdkError;
use aws_smithy_types::error::metadata::ProvideErrorMetadata;
use tokio::sync::mpsc;
use tracing::debug;

use super::{ObjectBody, ObjectStore, TransferCandidate};

/// How many listed candidates may be buffered ahead of the workers.
const LISTING_CHANNEL_DEPTH: usize = 64;

/// Object store backed by S3 (ListObjectsV2 + GetObject).
pub struct S3Store {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Store {
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn list(&self, prefix: &str) -> mpsc::Receiver<Result<TransferCandidate>> {
        let (tx, rx) = mpsc::channel(LISTING_CHANNEL_DEPTH);
        let client = self.client.clone();
        let bucket = self.bucket.clone();
        let prefix = prefix.to_string();

        tokio::spawn(async move {
            let mut pages = client
                .list_objects_v2()
                .bucket(&bucket)
                .prefix(&prefix)
                .into_paginator()
                .send();

            let mut listed = 0usize;
            while let Some(page) = pages.next().await {
                let page = match page {
                    Ok(page) => page,
                    Err(e) => {
                        let (code, message) = sdk_error_details(&e);
                        let _ = tx
                            .send(Err(RelayError::store_listing(format!(
                                "listing s3://{}/{} failed: {} ({})",
                                bucket, prefix, message, code
                            ))))
                            .await;
                        return;
                    }
                };

                for object in page.contents() {
                    let Some(key) = object.key() else { continue };
                    listed += 1;
                    let candidate = TransferCandidate::from_entry(key, object.size());
                    if tx.send(Ok(candidate)).await.is_err() {
                        // Scheduler stopped pulling (cancellation).
                        return;
                    }
                }
            }

            debug!("s3://{}/{}: listed {} objects", bucket, prefix, listed);
        });

        rx
    }

    async fn fetch(&self, key: &str) -> Result<ObjectBody> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let (code, message) = sdk_error_details(&e);
                RelayError::store_fetch(
                    key,
                    format!("get object failed: {} ({})", message, code),
                    is_transient_sdk_error(&e),
                )
            })?;

        let key = key.to_string();
        let stream = futures::stream::try_unfold(output.body, move |mut body| {
            let key = key.clone();
            async move {
                match body.try_next().await {
                    Ok(Some(chunk)) => Ok(Some((chunk, body))),
                    Ok(None) => Ok(None),
                    Err(e) => Err(RelayError::store_fetch(
                        &key,
                        format!("body stream failed: {}", e),
                        true,
                    )),
                }
            }
        });

        Ok(Box::pin(stream))
    }
}

/// Extract the S3 error code and message from an SDK error.
///
/// For service errors this is the S3 error code ("AccessDenied",
/// "SlowDown", ...) and its message; network-level failures report "N/A"
/// and the full error description.
fn sdk_error_details<E>(e: &SdkError<E>) -> (String, String)
where
    E: std::fmt::Display + ProvideErrorMetadata,
{
    if let Some(service_err) = e.as_service_error() {
        (
            service_err.code().unwrap_or("unknown").to_string(),
            service_err.message().unwrap_or("no message").to_string(),
        )
    } else {
        ("N/A".to_string(), e.to_string())
    }
}

/// Classify an SDK error for the retry policy.
///
/// Throttling and server-side hiccups are retryable; permission and
/// not-found responses are deterministic. Everything that never reached the
/// service (dispatch failures, timeouts) is treated as a network blip.
fn is_transient_sdk_error<E>(e: &SdkError<E>) -> bool
where
    E: std::fmt::Display + ProvideErrorMetadata,
{
    if e.as_service_error().is_some() {
        matches!(
            e.code(),
            Some(
                "SlowDown"
                    | "RequestTimeout"
                    | "InternalError"
                    | "ServiceUnavailable"
                    | "Throttling"
                    | "ThrottlingException"
            )
        )
    } else {
        !matches!(e, SdkError::ConstructionFailure(_))
    }
}
