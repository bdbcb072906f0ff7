//! S3-compatible bucket driver.

use async_trait::async_trait;
use object_store::aws::AmazonS3Builder;
use std::path::Path;
use std::sync::Arc;

use stevedore_common::{ArtifactKey, CredentialRole, Result};

use crate::credentials::ResolvedCredentials;
use crate::driver::ArtifactDriver;
use crate::location::S3Artifact;
use crate::transfer::{storage_error, ObjectTransfer};
use crate::tuning::TransferTuning;

/// Region used when the location does not name one.
const DEFAULT_REGION: &str = "us-east-1";

/// Driver for one S3-compatible bucket.
///
/// Holds the resolved credentials and tuning for its whole lifetime. The
/// underlying client is built per operation, so constructing a driver never
/// touches the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Driver {
    endpoint: Option<String>,
    bucket: String,
    region: String,
    credentials: ResolvedCredentials,
    tuning: TransferTuning,
}

impl S3Driver {
    pub fn new(
        location: &S3Artifact,
        credentials: ResolvedCredentials,
        tuning: TransferTuning,
    ) -> Self {
        Self {
            endpoint: normalize_endpoint(&location.endpoint, location.insecure.unwrap_or(false)),
            bucket: location.bucket.clone(),
            region: location
                .region
                .clone()
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
            credentials,
            tuning,
        }
    }

    /// Endpoint URL, `None` for the AWS default.
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn access_key(&self) -> Option<&str> {
        self.credentials.get(CredentialRole::AccessKey)
    }

    pub fn secret_key(&self) -> Option<&str> {
        self.credentials.get(CredentialRole::SecretKey)
    }

    pub fn session_token(&self) -> Option<&str> {
        self.credentials.get(CredentialRole::SessionToken)
    }

    pub fn credentials(&self) -> &ResolvedCredentials {
        &self.credentials
    }

    pub fn tuning(&self) -> &TransferTuning {
        &self.tuning
    }

    fn transfer(&self) -> Result<ObjectTransfer> {
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(self.bucket.as_str())
            .with_region(self.region.as_str());

        if let Some(endpoint) = &self.endpoint {
            builder = builder
                .with_endpoint(endpoint.as_str())
                .with_allow_http(endpoint.starts_with("http://"));
        }
        if let Some(access_key) = self.access_key() {
            builder = builder.with_access_key_id(access_key);
        }
        if let Some(secret_key) = self.secret_key() {
            builder = builder.with_secret_access_key(secret_key);
        }
        if let Some(token) = self.session_token() {
            builder = builder.with_token(token);
        }

        let store = builder.build().map_err(storage_error)?;
        Ok(ObjectTransfer::new(Arc::new(store), self.tuning))
    }
}

/// Add a scheme to a bare `host[:port]` endpoint. Empty means AWS default.
fn normalize_endpoint(endpoint: &str, insecure: bool) -> Option<String> {
    let endpoint = endpoint.trim().trim_end_matches('/');
    if endpoint.is_empty() {
        return None;
    }
    if endpoint.contains("://") {
        return Some(endpoint.to_string());
    }
    let scheme = if insecure { "http" } else { "https" };
    Some(format!("{}://{}", scheme, endpoint))
}

#[async_trait]
impl ArtifactDriver for S3Driver {
    fn name(&self) -> &str {
        "s3"
    }

    async fn load(&self, key: &ArtifactKey, local_path: &Path) -> Result<()> {
        self.transfer()?.load(key, local_path).await
    }

    async fn save(&self, local_path: &Path, key: &ArtifactKey) -> Result<()> {
        self.transfer()?.save(local_path, key).await
    }

    async fn delete(&self, key: &ArtifactKey) -> Result<()> {
        self.transfer()?.delete(key).await
    }

    async fn list_objects(&self, key: &ArtifactKey) -> Result<Vec<String>> {
        self.transfer()?.list_objects(key).await
    }
}
