//! Artifact driver trait definition.

use async_trait::async_trait;
use std::path::Path;

use stevedore_common::{ArtifactKey, Result};

/// Storage operations every backend driver provides.
///
/// A driver is constructed for one artifact location and discarded after use.
/// Keys are relative to the driver's bucket, container or base URL.
#[async_trait]
pub trait ArtifactDriver: Send + Sync {
    /// Get the backend name (e.g., "s3", "gcs", "http").
    fn name(&self) -> &str;

    /// Download the artifact at `key` to `local_path`.
    ///
    /// # Postconditions
    /// - A single object is written to `local_path`
    /// - A key naming a prefix is mirrored below `local_path` as a directory
    ///
    /// # Errors
    /// - Nothing exists at `key`
    /// - Network/I/O errors
    async fn load(&self, key: &ArtifactKey, local_path: &Path) -> Result<()>;

    /// Upload `local_path` to `key`.
    ///
    /// Directories are uploaded file by file below `key`.
    async fn save(&self, local_path: &Path, key: &ArtifactKey) -> Result<()>;

    /// Delete the object at `key`, or every object below it.
    async fn delete(&self, key: &ArtifactKey) -> Result<()>;

    /// List the object keys at or below `key`.
    ///
    /// # Errors
    /// - Not permitted for backends without a key space
    async fn list_objects(&self, key: &ArtifactKey) -> Result<Vec<String>>;
}
