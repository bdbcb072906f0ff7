//! Azure Blob Storage driver.

use async_trait::async_trait;
use object_store::azure::MicrosoftAzureBuilder;
use std::path::Path;
use std::sync::Arc;
use url::Url;

use stevedore_common::{ArtifactKey, CredentialRole, Error, Result};

use crate::credentials::ResolvedCredentials;
use crate::driver::ArtifactDriver;
use crate::location::AzureArtifact;
use crate::transfer::{storage_error, ObjectTransfer};
use crate::tuning::TransferTuning;

/// Driver for one Azure Blob container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AzureDriver {
    endpoint: String,
    container: String,
    credentials: ResolvedCredentials,
    tuning: TransferTuning,
}

impl AzureDriver {
    pub fn new(
        location: &AzureArtifact,
        credentials: ResolvedCredentials,
        tuning: TransferTuning,
    ) -> Self {
        Self {
            endpoint: location.endpoint.clone(),
            container: location.container.clone(),
            credentials,
            tuning,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn account_key(&self) -> Option<&str> {
        self.credentials.get(CredentialRole::AccountKey)
    }

    pub fn credentials(&self) -> &ResolvedCredentials {
        &self.credentials
    }

    pub fn tuning(&self) -> &TransferTuning {
        &self.tuning
    }

    /// Storage account name: the first label of the endpoint host.
    pub fn account(&self) -> Result<String> {
        let url = Url::parse(&self.endpoint).map_err(|e| {
            Error::InvalidInput(format!("Invalid Azure endpoint '{}': {}", self.endpoint, e))
        })?;
        url.host_str()
            .and_then(|host| host.split('.').next())
            .filter(|account| !account.is_empty())
            .map(String::from)
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "Azure endpoint '{}' has no account host",
                    self.endpoint
                ))
            })
    }

    fn transfer(&self) -> Result<ObjectTransfer> {
        let mut builder = MicrosoftAzureBuilder::new()
            .with_account(self.account()?)
            .with_container_name(self.container.as_str());
        if let Some(key) = self.account_key() {
            builder = builder.with_access_key(key);
        }
        let store = builder.build().map_err(storage_error)?;
        Ok(ObjectTransfer::new(Arc::new(store), self.tuning))
    }
}

#[async_trait]
impl ArtifactDriver for AzureDriver {
    fn name(&self) -> &str {
        "azure"
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

#[cfg(test)]
mod tests {
    use super::*;

    fn driver(endpoint: &str) -> AzureDriver {
        AzureDriver::new(
            &AzureArtifact {
                endpoint: endpoint.to_string(),
                container: "artifacts".to_string(),
                account_key_secret: None,
                blob: ArtifactKey::root(),
            },
            ResolvedCredentials::default(),
            TransferTuning::default(),
        )
    }

    #[test]
    fn test_account_from_endpoint() {
        let driver = driver("https://myaccount.blob.core.windows.net");
        assert_eq!(driver.account().unwrap(), "myaccount");
        assert_eq!(driver.container(), "artifacts");
    }

    #[test]
    fn test_invalid_endpoint() {
        let driver = driver("not a url");
        assert!(matches!(driver.account(), Err(Error::InvalidInput(_))));
    }
}
