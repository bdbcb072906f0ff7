//! Object transfer engine shared by the bucket-style backends.
//!
//! Wraps an [`ObjectStore`] and applies a [`TransferTuning`]: directories move
//! file by file with at most `parallel_transfers` files in flight, and files
//! larger than the single-request limit go up as multipart uploads with at
//! most `multipart_concurrency` parts in flight.

use futures::{stream, StreamExt, TryStreamExt};
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload, WriteMultipart};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};

use stevedore_common::{ArtifactKey, Error, Result};

use crate::tuning::TransferTuning;

/// Read buffer for multipart uploads.
const READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Largest file sent as one request, whatever the part size. Single requests
/// are read into memory before sending.
const SINGLE_PUT_LIMIT: u64 = 8 * 1024 * 1024;

/// Map an object store error into the common error type.
pub(crate) fn storage_error(err: object_store::Error) -> Error {
    match err {
        object_store::Error::NotFound { path, .. } => Error::NotFound(path),
        other => Error::Storage(other.to_string()),
    }
}

fn object_path(key: &ArtifactKey) -> ObjectPath {
    ObjectPath::from(key.as_object_key())
}

/// Transfers between the local filesystem and an object store.
pub struct ObjectTransfer {
    store: Arc<dyn ObjectStore>,
    tuning: TransferTuning,
}

impl ObjectTransfer {
    pub fn new(store: Arc<dyn ObjectStore>, tuning: TransferTuning) -> Self {
        Self { store, tuning }
    }

    /// Files up to this size are uploaded with a single request.
    fn single_put_limit(&self) -> u64 {
        self.tuning.multipart_part_size.min(SINGLE_PUT_LIMIT)
    }

    /// Whether a single object exists at `key`.
    async fn object_exists(&self, key: &ArtifactKey) -> Result<bool> {
        if key.is_root() {
            return Ok(false);
        }
        match self.store.head(&object_path(key)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(storage_error(e)),
        }
    }

    /// Keys of every object strictly below `key`.
    async fn keys_below(&self, key: &ArtifactKey) -> Result<Vec<ArtifactKey>> {
        let prefix = (!key.is_root()).then(|| object_path(key));
        let metas = self
            .store
            .list(prefix.as_ref())
            .try_collect::<Vec<_>>()
            .await
            .map_err(storage_error)?;

        metas
            .into_iter()
            .map(|meta| ArtifactKey::parse(meta.location.as_ref()))
            .collect()
    }

    /// Download `key` to `local_path`, or mirror everything below it.
    pub async fn load(&self, key: &ArtifactKey, local_path: &Path) -> Result<()> {
        if self.object_exists(key).await? {
            debug!(%key, path = %local_path.display(), "downloading object");
            return self.download_object(key, local_path).await;
        }

        let objects = self.keys_below(key).await?;
        if objects.is_empty() {
            return Err(Error::NotFound(format!("No objects at key '{}'", key)));
        }

        info!(
            %key,
            objects = objects.len(),
            parallel = self.tuning.parallel_transfers,
            "downloading directory"
        );
        fs::create_dir_all(local_path).await?;

        stream::iter(objects)
            .map(|object| async move {
                let relative = object.strip_prefix(key).ok_or_else(|| {
                    Error::Storage(format!("Listed key '{}' is outside '{}'", object, key))
                })?;
                let mut dest = local_path.to_path_buf();
                dest.extend(relative.components());
                self.download_object(&object, &dest).await
            })
            .buffer_unordered(self.tuning.parallel_transfers)
            .try_collect::<Vec<()>>()
            .await?;

        Ok(())
    }

    async fn download_object(&self, key: &ArtifactKey, dest: &Path) -> Result<()> {
        let result = self
            .store
            .get(&object_path(key))
            .await
            .map_err(storage_error)?;

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut body = result.into_stream();
        let mut file = fs::File::create(dest).await?;
        while let Some(chunk) = body.next().await {
            file.write_all(&chunk.map_err(storage_error)?).await?;
        }
        file.flush().await?;
        Ok(())
    }

    /// Upload a file or directory at `local_path` to `key`.
    pub async fn save(&self, local_path: &Path, key: &ArtifactKey) -> Result<()> {
        let meta = fs::metadata(local_path).await?;
        if !meta.is_dir() {
            if key.is_root() {
                return Err(Error::InvalidInput(
                    "Cannot upload a file to the root key".to_string(),
                ));
            }
            debug!(%key, path = %local_path.display(), "uploading object");
            return self.upload_file(local_path, key, meta.len()).await;
        }

        let files = collect_files(local_path).await?;
        info!(
            %key,
            files = files.len(),
            parallel = self.tuning.parallel_transfers,
            "uploading directory"
        );

        stream::iter(files)
            .map(|(file, relative)| async move {
                let dest = key.concat(&relative);
                let size = fs::metadata(&file).await?.len();
                self.upload_file(&file, &dest, size).await
            })
            .buffer_unordered(self.tuning.parallel_transfers)
            .try_collect::<Vec<()>>()
            .await?;

        Ok(())
    }

    async fn upload_file(&self, file: &Path, key: &ArtifactKey, size: u64) -> Result<()> {
        let path = object_path(key);

        if size <= self.single_put_limit() {
            let data = fs::read(file).await?;
            self.store
                .put(&path, PutPayload::from(data))
                .await
                .map_err(storage_error)?;
            return Ok(());
        }

        debug!(
            %key,
            size,
            part_size = self.tuning.multipart_part_size,
            concurrency = self.tuning.multipart_concurrency,
            "starting multipart upload"
        );
        let upload = self.store.put_multipart(&path).await.map_err(storage_error)?;
        let part_size = usize::try_from(self.tuning.multipart_part_size).unwrap_or(usize::MAX);
        let mut writer = WriteMultipart::new_with_chunk_size(upload, part_size);

        let mut source = fs::File::open(file).await?;
        let copied = self.copy_parts(&mut source, &mut writer).await;
        match copied {
            Ok(()) => {
                writer.finish().await.map_err(storage_error)?;
                Ok(())
            }
            Err(e) => {
                if let Err(abort_err) = writer.abort().await {
                    warn!(%key, error = %abort_err, "failed to abort multipart upload");
                }
                Err(e)
            }
        }
    }

    async fn copy_parts(&self, source: &mut fs::File, writer: &mut WriteMultipart) -> Result<()> {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        loop {
            let n = source.read(&mut buf).await?;
            if n == 0 {
                return Ok(());
            }
            writer
                .wait_for_capacity(self.tuning.multipart_concurrency)
                .await
                .map_err(storage_error)?;
            writer.write(&buf[..n]);
        }
    }

    /// Delete the object at `key` and every object below it.
    pub async fn delete(&self, key: &ArtifactKey) -> Result<()> {
        if key.is_root() {
            return Err(Error::NotPermitted(
                "Refusing to delete every object in the bucket".to_string(),
            ));
        }

        let mut targets = self.keys_below(key).await?;
        if self.object_exists(key).await? {
            targets.push(key.clone());
        }
        debug!(%key, objects = targets.len(), "deleting objects");

        stream::iter(targets)
            .map(|target| async move {
                self.store
                    .delete(&object_path(&target))
                    .await
                    .map_err(storage_error)
            })
            .buffer_unordered(self.tuning.parallel_transfers)
            .try_collect::<Vec<()>>()
            .await?;

        Ok(())
    }

    /// Keys of the object at `key` (if any) and every object below it, sorted.
    pub async fn list_objects(&self, key: &ArtifactKey) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self
            .keys_below(key)
            .await?
            .iter()
            .map(ArtifactKey::as_object_key)
            .collect();
        if self.object_exists(key).await? {
            keys.push(key.as_object_key());
        }
        keys.sort();
        Ok(keys)
    }
}

/// Every regular file below `root`, paired with its key relative to `root`.
async fn collect_files(root: &Path) -> Result<Vec<(PathBuf, ArtifactKey)>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                pending.push(path);
                continue;
            }

            let relative = path
                .strip_prefix(root)
                .map_err(|e| Error::InvalidInput(e.to_string()))?
                .iter()
                .map(|c| {
                    c.to_str().map(String::from).ok_or_else(|| {
                        Error::InvalidInput(format!("Non UTF-8 file name: {}", path.display()))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            files.push((path.clone(), ArtifactKey::from_components(relative)?));
        }
    }

    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;
    use tempfile::TempDir;

    fn transfer(tuning: TransferTuning) -> (Arc<InMemory>, ObjectTransfer) {
        let store = Arc::new(InMemory::new());
        let transfer = ObjectTransfer::new(store.clone(), tuning);
        (store, transfer)
    }

    fn key(s: &str) -> ArtifactKey {
        ArtifactKey::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_save_and_load_file() {
        let temp = TempDir::new().unwrap();
        let (_, transfer) = transfer(TransferTuning::default());
        let src = temp.path().join("report.txt");
        std::fs::write(&src, b"hello artifacts").unwrap();

        transfer.save(&src, &key("runs/1/report.txt")).await.unwrap();

        let dest = temp.path().join("out/report.txt");
        transfer.load(&key("runs/1/report.txt"), &dest).await.unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"hello artifacts");
    }

    #[tokio::test]
    async fn test_save_and_load_directory() {
        let temp = TempDir::new().unwrap();
        let tuning = TransferTuning {
            parallel_transfers: 4,
            ..TransferTuning::default()
        };
        let (_, transfer) = transfer(tuning);

        let src = temp.path().join("src");
        std::fs::create_dir_all(src.join("logs")).unwrap();
        std::fs::write(src.join("a.txt"), b"a").unwrap();
        std::fs::write(src.join("logs/main.log"), b"log").unwrap();

        transfer.save(&src, &key("outputs")).await.unwrap();
        assert_eq!(
            transfer.list_objects(&key("outputs")).await.unwrap(),
            vec!["outputs/a.txt".to_string(), "outputs/logs/main.log".to_string()]
        );

        let dest = temp.path().join("restored");
        transfer.load(&key("outputs"), &dest).await.unwrap();
        assert_eq!(std::fs::read(dest.join("a.txt")).unwrap(), b"a");
        assert_eq!(std::fs::read(dest.join("logs/main.log")).unwrap(), b"log");
    }

    #[test]
    fn test_single_put_limit_independent_of_part_size() {
        let (_, small) = transfer(TransferTuning {
            multipart_part_size: 1024,
            ..TransferTuning::default()
        });
        assert_eq!(small.single_put_limit(), 1024);

        let (_, large) = transfer(TransferTuning {
            multipart_part_size: 4 * 1024 * 1024 * 1024,
            ..TransferTuning::default()
        });
        assert_eq!(large.single_put_limit(), SINGLE_PUT_LIMIT);
    }

    #[tokio::test]
    async fn test_file_above_single_put_limit_with_large_part_size() {
        let temp = TempDir::new().unwrap();
        let tuning = TransferTuning {
            parallel_transfers: 1,
            multipart_part_size: 64 * 1024 * 1024,
            multipart_concurrency: 2,
        };
        let (store, transfer) = transfer(tuning);

        let len = SINGLE_PUT_LIMIT as usize + 4096;
        let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        let src = temp.path().join("large.bin");
        std::fs::write(&src, &data).unwrap();

        transfer.save(&src, &key("large.bin")).await.unwrap();

        let stored = store
            .get(&ObjectPath::from("large.bin"))
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap();
        assert_eq!(stored.len(), len);
        assert_eq!(stored.as_ref(), data.as_slice());
    }

    #[tokio::test]
    async fn test_multipart_upload_for_large_file() {
        let temp = TempDir::new().unwrap();
        let tuning = TransferTuning {
            parallel_transfers: 1,
            multipart_part_size: 1024,
            multipart_concurrency: 2,
        };
        let (store, transfer) = transfer(tuning);

        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let src = temp.path().join("big.bin");
        std::fs::write(&src, &data).unwrap();

        transfer.save(&src, &key("big.bin")).await.unwrap();

        let stored = store
            .get(&ObjectPath::from("big.bin"))
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap();
        assert_eq!(stored.as_ref(), data.as_slice());
    }

    #[tokio::test]
    async fn test_load_missing_is_not_found() {
        let temp = TempDir::new().unwrap();
        let (_, transfer) = transfer(TransferTuning::default());

        let err = transfer
            .load(&key("nothing/here"), &temp.path().join("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_prefix() {
        let temp = TempDir::new().unwrap();
        let (_, transfer) = transfer(TransferTuning::default());
        let src = temp.path().join("f");
        std::fs::write(&src, b"x").unwrap();

        transfer.save(&src, &key("keep/f")).await.unwrap();
        transfer.save(&src, &key("drop/f")).await.unwrap();
        transfer.save(&src, &key("drop/nested/g")).await.unwrap();

        transfer.delete(&key("drop")).await.unwrap();

        assert!(transfer.list_objects(&key("drop")).await.unwrap().is_empty());
        assert_eq!(
            transfer.list_objects(&ArtifactKey::root()).await.unwrap(),
            vec!["keep/f".to_string()]
        );
    }

    #[tokio::test]
    async fn test_delete_root_not_permitted() {
        let (_, transfer) = transfer(TransferTuning::default());
        let err = transfer.delete(&ArtifactKey::root()).await.unwrap_err();
        assert!(matches!(err, Error::NotPermitted(_)));
    }

    #[tokio::test]
    async fn test_save_file_to_root_rejected() {
        let temp = TempDir::new().unwrap();
        let (_, transfer) = transfer(TransferTuning::default());
        let src = temp.path().join("f");
        std::fs::write(&src, b"x").unwrap();

        let err = transfer.save(&src, &ArtifactKey::root()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_list_single_object() {
        let temp = TempDir::new().unwrap();
        let (_, transfer) = transfer(TransferTuning::default());
        let src = temp.path().join("f");
        std::fs::write(&src, b"x").unwrap();

        transfer.save(&src, &key("one/f")).await.unwrap();
        assert_eq!(
            transfer.list_objects(&key("one/f")).await.unwrap(),
            vec!["one/f".to_string()]
        );
    }
}
