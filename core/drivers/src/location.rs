//! Artifact location descriptors.
//!
//! An [`ArtifactLocation`] mirrors the workflow definition: one optional field
//! per backend kind, of which exactly one must be set. [`ArtifactLocation::backend`]
//! turns it into the closed [`BackendLocation`] sum the factory dispatches on.

use serde::{Deserialize, Serialize};
use std::fmt;

use stevedore_common::{ArtifactKey, Error, Result};

/// Reference to one key inside a named secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretKeySelector {
    /// Name of the secret store entry.
    pub name: String,
    /// Key within that entry.
    pub key: String,
}

impl SecretKeySelector {
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
        }
    }
}

/// S3-compatible bucket location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3Artifact {
    /// Endpoint host, with or without scheme.
    #[serde(default)]
    pub endpoint: String,
    pub bucket: String,
    #[serde(default)]
    pub region: Option<String>,
    /// Use plain HTTP for a scheme-less endpoint.
    #[serde(default)]
    pub insecure: Option<bool>,
    #[serde(default)]
    pub access_key_secret: Option<SecretKeySelector>,
    #[serde(default)]
    pub secret_key_secret: Option<SecretKeySelector>,
    #[serde(default)]
    pub session_token_secret: Option<SecretKeySelector>,
    #[serde(default)]
    pub parallel_transfers: Option<i32>,
    #[serde(default)]
    pub multipart_part_size: Option<i64>,
    #[serde(default)]
    pub multipart_concurrency: Option<i32>,
    #[serde(default = "ArtifactKey::root")]
    pub key: ArtifactKey,
}

/// Google Cloud Storage location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GcsArtifact {
    pub bucket: String,
    #[serde(default)]
    pub service_account_key_secret: Option<SecretKeySelector>,
    #[serde(default = "ArtifactKey::root")]
    pub key: ArtifactKey,
}

/// Azure Blob Storage location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureArtifact {
    /// Storage account endpoint, e.g. `https://myaccount.blob.core.windows.net`.
    pub endpoint: String,
    pub container: String,
    #[serde(default)]
    pub account_key_secret: Option<SecretKeySelector>,
    #[serde(default = "ArtifactKey::root")]
    pub blob: ArtifactKey,
}

/// Extra request header for HTTP artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// Basic authentication for HTTP artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicAuth {
    pub username_secret: Option<SecretKeySelector>,
    pub password_secret: Option<SecretKeySelector>,
}

/// HTTP(S) endpoint location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpArtifact {
    pub url: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub basic_auth: Option<BasicAuth>,
}

/// Inline artifact content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawArtifact {
    pub data: String,
}

/// Where an artifact lives, as written in a workflow definition.
///
/// Exactly one field must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactLocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3: Option<S3Artifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gcs: Option<GcsArtifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure: Option<AzureArtifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpArtifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<RawArtifact>,
}

/// Backend kinds a location can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    S3,
    Gcs,
    Azure,
    Http,
    Raw,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::S3 => "s3",
            BackendKind::Gcs => "gcs",
            BackendKind::Azure => "azure",
            BackendKind::Http => "http",
            BackendKind::Raw => "raw",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single populated variant of an [`ArtifactLocation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendLocation<'a> {
    S3(&'a S3Artifact),
    Gcs(&'a GcsArtifact),
    Azure(&'a AzureArtifact),
    Http(&'a HttpArtifact),
    Raw(&'a RawArtifact),
}

impl BackendLocation<'_> {
    pub fn kind(&self) -> BackendKind {
        match self {
            BackendLocation::S3(_) => BackendKind::S3,
            BackendLocation::Gcs(_) => BackendKind::Gcs,
            BackendLocation::Azure(_) => BackendKind::Azure,
            BackendLocation::Http(_) => BackendKind::Http,
            BackendLocation::Raw(_) => BackendKind::Raw,
        }
    }

    /// The object key the location points at. HTTP and raw locations have no
    /// key space and always return the root key.
    pub fn key(&self) -> ArtifactKey {
        match self {
            BackendLocation::S3(s3) => s3.key.clone(),
            BackendLocation::Gcs(gcs) => gcs.key.clone(),
            BackendLocation::Azure(azure) => azure.blob.clone(),
            BackendLocation::Http(_) | BackendLocation::Raw(_) => ArtifactKey::root(),
        }
    }
}

impl ArtifactLocation {
    /// Parse a location from its JSON form.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::InvalidInput(format!("Invalid artifact location: {}", e)))
    }

    /// Location with only the S3 variant set.
    pub fn s3(s3: S3Artifact) -> Self {
        Self {
            s3: Some(s3),
            ..Self::default()
        }
    }

    /// Location with only the GCS variant set.
    pub fn gcs(gcs: GcsArtifact) -> Self {
        Self {
            gcs: Some(gcs),
            ..Self::default()
        }
    }

    /// Location with only the Azure variant set.
    pub fn azure(azure: AzureArtifact) -> Self {
        Self {
            azure: Some(azure),
            ..Self::default()
        }
    }

    /// Location with only the HTTP variant set.
    pub fn http(http: HttpArtifact) -> Self {
        Self {
            http: Some(http),
            ..Self::default()
        }
    }

    /// Location with only the raw variant set.
    pub fn raw(raw: RawArtifact) -> Self {
        Self {
            raw: Some(raw),
            ..Self::default()
        }
    }

    /// Return the single populated backend variant.
    ///
    /// # Errors
    /// - `UnsupportedBackend` if no variant or more than one variant is set
    pub fn backend(&self) -> Result<BackendLocation<'_>> {
        // Exhaustive so that a new backend field fails to build until it is
        // handled here.
        let ArtifactLocation {
            s3,
            gcs,
            azure,
            http,
            raw,
        } = self;
        let populated: Vec<BackendLocation<'_>> = [
            s3.as_ref().map(BackendLocation::S3),
            gcs.as_ref().map(BackendLocation::Gcs),
            azure.as_ref().map(BackendLocation::Azure),
            http.as_ref().map(BackendLocation::Http),
            raw.as_ref().map(BackendLocation::Raw),
        ]
        .into_iter()
        .flatten()
        .collect();

        match populated.as_slice() {
            [single] => Ok(*single),
            [] => Err(Error::UnsupportedBackend(
                "artifact location has no backend configured".to_string(),
            )),
            many => {
                let kinds: Vec<&str> = many.iter().map(|b| b.kind().as_str()).collect();
                Err(Error::UnsupportedBackend(format!(
                    "artifact location configures multiple backends: {}",
                    kinds.join(", ")
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_s3_location() {
        let json = r#"{
            "s3": {
                "endpoint": "minio:9000",
                "bucket": "artifacts",
                "insecure": true,
                "accessKeySecret": {"name": "minio-creds", "key": "accesskey"},
                "secretKeySecret": {"name": "minio-creds", "key": "secretkey"},
                "parallelTransfers": 8,
                "key": "runs/42/output.tgz"
            }
        }"#;

        let location = ArtifactLocation::from_json(json).unwrap();
        let s3 = match location.backend().unwrap() {
            BackendLocation::S3(s3) => s3,
            other => panic!("unexpected backend {:?}", other.kind()),
        };
        assert_eq!(s3.bucket, "artifacts");
        assert_eq!(s3.insecure, Some(true));
        assert_eq!(
            s3.access_key_secret,
            Some(SecretKeySelector::new("minio-creds", "accesskey"))
        );
        assert!(s3.session_token_secret.is_none());
        assert_eq!(s3.parallel_transfers, Some(8));
        assert_eq!(s3.multipart_part_size, None);
        assert_eq!(s3.key.as_object_key(), "runs/42/output.tgz");
    }

    #[test]
    fn test_empty_location_is_unsupported() {
        let location = ArtifactLocation::default();
        assert!(matches!(
            location.backend(),
            Err(Error::UnsupportedBackend(_))
        ));
    }

    #[test]
    fn test_multiple_variants_are_unsupported() {
        let mut location = ArtifactLocation::raw(RawArtifact {
            data: "hello".to_string(),
        });
        location.http = Some(HttpArtifact {
            url: "https://example.com/a".to_string(),
            headers: Vec::new(),
            basic_auth: None,
        });

        let err = location.backend().unwrap_err();
        assert!(matches!(err, Error::UnsupportedBackend(ref msg) if msg.contains("http, raw")));
    }

    fn every_backend() -> Vec<ArtifactLocation> {
        vec![
            ArtifactLocation::s3(S3Artifact {
                bucket: "b".to_string(),
                ..S3Artifact::default()
            }),
            ArtifactLocation::gcs(GcsArtifact {
                bucket: "b".to_string(),
                service_account_key_secret: None,
                key: ArtifactKey::root(),
            }),
            ArtifactLocation::azure(AzureArtifact {
                endpoint: "https://acct.blob.core.windows.net".to_string(),
                container: "c".to_string(),
                account_key_secret: None,
                blob: ArtifactKey::root(),
            }),
            ArtifactLocation::http(HttpArtifact {
                url: "https://example.com/a".to_string(),
                headers: Vec::new(),
                basic_auth: None,
            }),
            ArtifactLocation::raw(RawArtifact {
                data: "hello".to_string(),
            }),
        ]
    }

    fn merge(a: &ArtifactLocation, b: &ArtifactLocation) -> ArtifactLocation {
        ArtifactLocation {
            s3: a.s3.clone().or_else(|| b.s3.clone()),
            gcs: a.gcs.clone().or_else(|| b.gcs.clone()),
            azure: a.azure.clone().or_else(|| b.azure.clone()),
            http: a.http.clone().or_else(|| b.http.clone()),
            raw: a.raw.clone().or_else(|| b.raw.clone()),
        }
    }

    #[test]
    fn test_every_single_variant_resolves() {
        let kinds: Vec<BackendKind> = every_backend()
            .iter()
            .map(|location| location.backend().unwrap().kind())
            .collect();
        assert_eq!(
            kinds,
            vec![
                BackendKind::S3,
                BackendKind::Gcs,
                BackendKind::Azure,
                BackendKind::Http,
                BackendKind::Raw,
            ]
        );
    }

    #[test]
    fn test_every_pair_of_variants_is_unsupported() {
        let backends = every_backend();
        for (i, a) in backends.iter().enumerate() {
            for b in &backends[i + 1..] {
                let location = merge(a, b);
                assert!(
                    matches!(location.backend(), Err(Error::UnsupportedBackend(_))),
                    "{:?} resolved to a single backend",
                    location
                );
            }
        }
    }

    #[test]
    fn test_invalid_json_is_invalid_input() {
        let err = ArtifactLocation::from_json("{\"s3\": {\"bucket\": 1}}").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_location_key() {
        let location = ArtifactLocation::azure(AzureArtifact {
            endpoint: "https://acct.blob.core.windows.net".to_string(),
            container: "c".to_string(),
            account_key_secret: None,
            blob: ArtifactKey::parse("dir/file").unwrap(),
        });
        let backend = location.backend().unwrap();
        assert_eq!(backend.kind(), BackendKind::Azure);
        assert_eq!(backend.key().as_object_key(), "dir/file");
    }
}
