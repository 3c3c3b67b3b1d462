//! Asset uploads into object storage.

use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{error, info};

use crate::application::repos::{ObjectStorage, StorageError};
use crate::domain::uploads::{AssetFolder, asset_path};

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("upload of `{path}` failed")]
    Transfer {
        path: String,
        #[source]
        source: StorageError,
    },
    #[error("public url for `{path}` could not be resolved")]
    UrlResolution {
        path: String,
        #[source]
        source: StorageError,
    },
    #[error("`{content_type}` is not an image")]
    UnsupportedType { content_type: String },
}

/// A file received from the operator.
#[derive(Debug, Clone)]
pub struct UploadedAsset {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl UploadedAsset {
    /// Build an asset, guessing the content type from the file name when the client did
    /// not send one.
    pub fn new(file_name: impl Into<String>, content_type: Option<String>, bytes: Bytes) -> Self {
        let file_name = file_name.into();
        let content_type = content_type
            .filter(|value| !value.trim().is_empty() && value != "application/octet-stream")
            .unwrap_or_else(|| {
                mime_guess::from_path(&file_name)
                    .first_or_octet_stream()
                    .essence_str()
                    .to_string()
            });
        Self {
            file_name,
            content_type,
            bytes,
        }
    }

    fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }
}

#[derive(Clone)]
pub struct AssetUploader {
    storage: Arc<dyn ObjectStorage>,
}

impl AssetUploader {
    pub fn new(storage: Arc<dyn ObjectStorage>) -> Self {
        Self { storage }
    }

    /// Upload `asset` into `folder` and return its public URL.
    pub async fn upload(
        &self,
        asset: UploadedAsset,
        folder: AssetFolder,
    ) -> Result<String, UploadError> {
        if !asset.is_image() {
            return Err(UploadError::UnsupportedType {
                content_type: asset.content_type,
            });
        }

        let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        let path = asset_path(folder, millis, &asset.file_name);

        let handle = self
            .storage
            .upload(&path, asset.bytes)
            .await
            .map_err(|source| {
                error!(
                    target = "postdesk::assets",
                    path = %path,
                    error = %source,
                    "object upload failed"
                );
                UploadError::Transfer {
                    path: path.clone(),
                    source,
                }
            })?;

        let url = self
            .storage
            .public_url(&handle)
            .await
            .map_err(|source| UploadError::UrlResolution {
                path: handle.path.clone(),
                source,
            })?;

        info!(
            target = "postdesk::assets",
            folder = %folder,
            path = %handle.path,
            "asset uploaded"
        );
        Ok(url)
    }
}
