//! Google Cloud Storage driver.

use async_trait::async_trait;
use object_store::gcp::GoogleCloudStorageBuilder;
use std::path::Path;
use std::sync::Arc;

use stevedore_common::{ArtifactKey, CredentialRole, Result};

use crate::credentials::ResolvedCredentials;
use crate::driver::ArtifactDriver;
use crate::location::GcsArtifact;
use crate::transfer::{storage_error, ObjectTransfer};
use crate::tuning::TransferTuning;

/// Driver for one GCS bucket.
///
/// Without a service account key the client falls back to application
/// default credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcsDriver {
    bucket: String,
    credentials: ResolvedCredentials,
    tuning: TransferTuning,
}

impl GcsDriver {
    pub fn new(
        location: &GcsArtifact,
        credentials: ResolvedCredentials,
        tuning: TransferTuning,
    ) -> Self {
        Self {
            bucket: location.bucket.clone(),
            credentials,
            tuning,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Service account key JSON, if one was referenced.
    pub fn service_account_key(&self) -> Option<&str> {
        self.credentials.get(CredentialRole::ServiceAccountKey)
    }

    pub fn credentials(&self) -> &ResolvedCredentials {
        &self.credentials
    }

    pub fn tuning(&self) -> &TransferTuning {
        &self.tuning
    }

    fn transfer(&self) -> Result<ObjectTransfer> {
        let mut builder = GoogleCloudStorageBuilder::new().with_bucket_name(self.bucket.as_str());
        if let Some(key) = self.service_account_key() {
            builder = builder.with_service_account_key(key);
        }
        let store = builder.build().map_err(storage_error)?;
        Ok(ObjectTransfer::new(Arc::new(store), self.tuning))
    }
}

#[async_trait]
impl ArtifactDriver for GcsDriver {
    fn name(&self) -> &str {
        "gcs"
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
