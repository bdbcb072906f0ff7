//! Inline artifact driver.

use async_trait::async_trait;
use std::path::Path;
use tokio::fs;

use stevedore_common::{ArtifactKey, Error, Result};

use crate::driver::ArtifactDriver;
use crate::location::RawArtifact;

/// Driver for content written directly into the workflow definition.
///
/// Only `load` is supported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDriver {
    data: String,
}

impl RawDriver {
    pub fn new(location: &RawArtifact) -> Self {
        Self {
            data: location.data.clone(),
        }
    }

    pub fn data(&self) -> &str {
        &self.data
    }
}

#[async_trait]
impl ArtifactDriver for RawDriver {
    fn name(&self) -> &str {
        "raw"
    }

    async fn load(&self, _key: &ArtifactKey, local_path: &Path) -> Result<()> {
        if let Some(parent) = local_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(local_path, self.data.as_bytes()).await?;
        Ok(())
    }

    async fn save(&self, _local_path: &Path, _key: &ArtifactKey) -> Result<()> {
        Err(Error::NotPermitted(
            "Raw artifacts cannot be saved".to_string(),
        ))
    }

    async fn delete(&self, _key: &ArtifactKey) -> Result<()> {
        Err(Error::NotPermitted(
            "Raw artifacts cannot be deleted".to_string(),
        ))
    }

    async fn list_objects(&self, _key: &ArtifactKey) -> Result<Vec<String>> {
        Err(Error::NotPermitted(
            "Raw artifacts cannot be listed".to_string(),
        ))
    }
}
