//! Filesystem-backed object storage published under a base URL.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::{fs, io::AsyncWriteExt};
use url::Url;

use crate::application::repos::{ObjectHandle, ObjectStorage, StorageError};

#[derive(Debug)]
pub struct LocalObjectStorage {
    root: PathBuf,
    public_base: Url,
}

impl LocalObjectStorage {
    /// Initialise storage rooted at the provided directory, creating it if necessary.
    pub fn new(root: PathBuf, public_base: Url) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root, public_base })
    }

    /// Read a stored object into memory.
    pub async fn read(&self, path: &str) -> Result<Bytes, StorageError> {
        let absolute = self.resolve(path)?;
        match fs::read(&absolute).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.to_string()))
            }
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path);
        let valid = !path.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !valid {
            return Err(StorageError::InvalidPath(path.to_string()));
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStorage for LocalObjectStorage {
    async fn upload(&self, path: &str, bytes: Bytes) -> Result<ObjectHandle, StorageError> {
        if bytes.is_empty() {
            return Err(StorageError::EmptyPayload);
        }
        let absolute = self.resolve(path)?;

        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&absolute).await?;
        if let Err(err) = file.write_all(&bytes).await {
            drop(file);
            let _ = fs::remove_file(&absolute).await;
            return Err(StorageError::Io(err));
        }
        file.flush().await?;

        Ok(ObjectHandle {
            path: path.to_string(),
        })
    }

    async fn public_url(&self, handle: &ObjectHandle) -> Result<String, StorageError> {
        self.resolve(&handle.path)?;

        let mut url = self.public_base.clone();
        url.path_segments_mut()
            .map_err(|_| StorageError::PublicUrl(self.public_base.to_string()))?
            .pop_if_empty()
            .extend(handle.path.split('/'));
        Ok(url.into())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn storage() -> (TempDir, LocalObjectStorage) {
        let dir = tempfile::tempdir().expect("tempdir");
        let base = Url::parse("http://127.0.0.1:3001/media/").expect("url");
        let storage = LocalObjectStorage::new(dir.path().to_path_buf(), base).expect("storage");
        (dir, storage)
    }

    #[tokio::test]
    async fn upload_then_read_back() {
        let (_dir, storage) = storage();
        let handle = storage
            .upload("blog-main-images/1-hero.png", Bytes::from_static(b"png"))
            .await
            .expect("upload");

        let bytes = storage.read(&handle.path).await.expect("read");
        assert_eq!(&bytes[..], b"png");
    }

    #[tokio::test]
    async fn public_url_encodes_segments() {
        let (_dir, storage) = storage();
        let handle = ObjectHandle {
            path: "blog-inline-images/1-my photo#1.png".into(),
        };

        let url = storage.public_url(&handle).await.expect("url");
        assert_eq!(
            url,
            "http://127.0.0.1:3001/media/blog-inline-images/1-my%20photo%231.png"
        );
    }

    #[tokio::test]
    async fn traversal_and_empty_payloads_are_rejected() {
        let (_dir, storage) = storage();

        let err = storage
            .upload("../escape.png", Bytes::from_static(b"x"))
            .await
            .expect_err("traversal");
        assert!(matches!(err, StorageError::InvalidPath(_)));

        let err = storage
            .upload("blog-main-images/1-a.png", Bytes::new())
            .await
            .expect_err("empty");
        assert!(matches!(err, StorageError::EmptyPayload));
    }

    #[tokio::test]
    async fn missing_object_reads_as_not_found() {
        let (_dir, storage) = storage();
        let err = storage.read("blog-main-images/none.png").await.expect_err("missing");
        assert!(matches!(err, StorageError::NotFound(_)));
    }
}
