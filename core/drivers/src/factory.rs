//! Driver construction from artifact locations.
//!
//! [`resolve_driver`] picks the backend named by the location, resolves its
//! secret references and tuning, and returns a ready [`Driver`]. Both the
//! location and the driver are closed enums matched exhaustively, so a new
//! backend kind cannot be added without a construction path.

use async_trait::async_trait;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use stevedore_common::{ArtifactKey, CredentialRole, Result};

use crate::backends::{AzureDriver, GcsDriver, HttpDriver, RawDriver, S3Driver};
use crate::credentials::{resolve_credentials, ResolvedCredentials};
use crate::driver::ArtifactDriver;
use crate::location::{ArtifactLocation, BackendKind, BackendLocation};
use crate::secrets::SecretResolver;
use crate::tuning::{resolve_tuning, TransferTuning, TuningOverrides};

/// A constructed backend driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Driver {
    S3(S3Driver),
    Gcs(GcsDriver),
    Azure(AzureDriver),
    Http(HttpDriver),
    Raw(RawDriver),
}

impl Driver {
    pub fn kind(&self) -> BackendKind {
        match self {
            Driver::S3(_) => BackendKind::S3,
            Driver::Gcs(_) => BackendKind::Gcs,
            Driver::Azure(_) => BackendKind::Azure,
            Driver::Http(_) => BackendKind::Http,
            Driver::Raw(_) => BackendKind::Raw,
        }
    }

    pub fn as_s3(&self) -> Option<&S3Driver> {
        match self {
            Driver::S3(driver) => Some(driver),
            _ => None,
        }
    }

    pub fn as_gcs(&self) -> Option<&GcsDriver> {
        match self {
            Driver::Gcs(driver) => Some(driver),
            _ => None,
        }
    }

    pub fn as_azure(&self) -> Option<&AzureDriver> {
        match self {
            Driver::Azure(driver) => Some(driver),
            _ => None,
        }
    }

    pub fn as_http(&self) -> Option<&HttpDriver> {
        match self {
            Driver::Http(driver) => Some(driver),
            _ => None,
        }
    }

    pub fn as_raw(&self) -> Option<&RawDriver> {
        match self {
            Driver::Raw(driver) => Some(driver),
            _ => None,
        }
    }

    /// Resolved credentials. Raw drivers have none.
    pub fn credentials(&self) -> Option<&ResolvedCredentials> {
        match self {
            Driver::S3(driver) => Some(driver.credentials()),
            Driver::Gcs(driver) => Some(driver.credentials()),
            Driver::Azure(driver) => Some(driver.credentials()),
            Driver::Http(driver) => Some(driver.credentials()),
            Driver::Raw(_) => None,
        }
    }

    /// Transfer tuning. Only bucket-style drivers transfer in parallel.
    pub fn tuning(&self) -> Option<&TransferTuning> {
        match self {
            Driver::S3(driver) => Some(driver.tuning()),
            Driver::Gcs(driver) => Some(driver.tuning()),
            Driver::Azure(driver) => Some(driver.tuning()),
            Driver::Http(_) | Driver::Raw(_) => None,
        }
    }

    fn inner(&self) -> &dyn ArtifactDriver {
        match self {
            Driver::S3(driver) => driver,
            Driver::Gcs(driver) => driver,
            Driver::Azure(driver) => driver,
            Driver::Http(driver) => driver,
            Driver::Raw(driver) => driver,
        }
    }
}

#[async_trait]
impl ArtifactDriver for Driver {
    fn name(&self) -> &str {
        self.inner().name()
    }

    async fn load(&self, key: &ArtifactKey, local_path: &Path) -> Result<()> {
        self.inner().load(key, local_path).await
    }

    async fn save(&self, local_path: &Path, key: &ArtifactKey) -> Result<()> {
        self.inner().save(local_path, key).await
    }

    async fn delete(&self, key: &ArtifactKey) -> Result<()> {
        self.inner().delete(key).await
    }

    async fn list_objects(&self, key: &ArtifactKey) -> Result<Vec<String>> {
        self.inner().list_objects(key).await
    }
}

/// Build the driver for `location`.
///
/// # Preconditions
/// - Exactly one backend is set on `location`
///
/// # Postconditions
/// - Every credential the location references is present in the driver
/// - Tuning values are within their bounds; out-of-range overrides are clamped
///
/// # Errors
/// - `UnsupportedBackend` if no backend or several backends are set
/// - `SecretResolution` if any referenced secret cannot be resolved
/// - `Cancelled` if `cancel` fires during resolution
pub async fn resolve_driver(
    cancel: &CancellationToken,
    location: &ArtifactLocation,
    secrets: &dyn SecretResolver,
) -> Result<Driver> {
    let backend = location.backend()?;
    debug!(backend = %backend.kind(), "resolving artifact driver");

    let driver = match backend {
        BackendLocation::S3(s3) => {
            let tuning = resolve_tuning(&TuningOverrides::from_s3(s3));
            let credentials = resolve_credentials(
                cancel,
                secrets,
                &[
                    (CredentialRole::AccessKey, s3.access_key_secret.as_ref()),
                    (CredentialRole::SecretKey, s3.secret_key_secret.as_ref()),
                    (CredentialRole::SessionToken, s3.session_token_secret.as_ref()),
                ],
            )
            .await?;
            Driver::S3(S3Driver::new(s3, credentials, tuning))
        }
        BackendLocation::Gcs(gcs) => {
            let credentials = resolve_credentials(
                cancel,
                secrets,
                &[(
                    CredentialRole::ServiceAccountKey,
                    gcs.service_account_key_secret.as_ref(),
                )],
            )
            .await?;
            Driver::Gcs(GcsDriver::new(gcs, credentials, TransferTuning::default()))
        }
        BackendLocation::Azure(azure) => {
            let credentials = resolve_credentials(
                cancel,
                secrets,
                &[(CredentialRole::AccountKey, azure.account_key_secret.as_ref())],
            )
            .await?;
            Driver::Azure(AzureDriver::new(azure, credentials, TransferTuning::default()))
        }
        BackendLocation::Http(http) => {
            let basic_auth = http.basic_auth.as_ref();
            let credentials = resolve_credentials(
                cancel,
                secrets,
                &[
                    (
                        CredentialRole::Username,
                        basic_auth.and_then(|auth| auth.username_secret.as_ref()),
                    ),
                    (
                        CredentialRole::Password,
                        basic_auth.and_then(|auth| auth.password_secret.as_ref()),
                    ),
                ],
            )
            .await?;
            Driver::Http(HttpDriver::new(http, credentials))
        }
        BackendLocation::Raw(raw) => Driver::Raw(RawDriver::new(raw)),
    };

    info!(
        backend = %driver.kind(),
        credentials = driver.credentials().map_or(0, ResolvedCredentials::len),
        "artifact driver ready"
    );
    Ok(driver)
}
