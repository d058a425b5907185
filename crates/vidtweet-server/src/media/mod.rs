use std::io::ErrorKind;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

mod cloudinary;

pub use cloudinary::CloudinaryStore;

/// Descriptor of a file accepted by the media host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedMedia {
    pub url: String,
    pub public_id: String,
    pub resource_type: String,
    pub bytes: u64,
    /// Seconds, for audio and video uploads.
    pub duration: Option<f64>,
}

/// Remote object storage for user media.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn upload_file(&self, path: &Path) -> anyhow::Result<UploadedMedia>;
}

/// Uploads a local temp file and removes it afterwards, whatever the outcome.
///
/// `None` in means `None` out. Upload failures are logged and reported as `None`;
/// callers decide whether a missing result is fatal.
pub async fn upload(store: &dyn MediaStore, local_path: Option<&Path>) -> Option<UploadedMedia> {
    let path = local_path?;
    let result = store.upload_file(path).await;
    discard(path).await;

    match result {
        Ok(media) => {
            tracing::debug!(url = %media.url, "uploaded {}", path.display());
            Some(media)
        }
        Err(e) => {
            tracing::warn!("Upload of {} failed: {:#}", path.display(), e);
            None
        }
    }
}

/// Best-effort removal of a local temp file.
pub async fn discard(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove temp file {}: {}", path.display(), e),
    }
}
