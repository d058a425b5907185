use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha1::{Digest, Sha1};

use super::{MediaStore, UploadedMedia};
use crate::config::CloudinaryConfig;

/// Signed uploads to the Cloudinary upload API.
pub struct CloudinaryStore {
    client: reqwest::Client,
    api_base: String,
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
    resource_type: String,
    #[serde(default)]
    bytes: u64,
    duration: Option<f64>,
}

impl CloudinaryStore {
    pub fn new(config: &CloudinaryConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            cloud_name: config.cloud_name.clone(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
        }
    }

    fn upload_url(&self) -> String {
        format!("{}/v1_1/{}/auto/upload", self.api_base, self.cloud_name)
    }

    /// SHA-1 over the sorted signed params followed by the API secret.
    fn signature(&self, timestamp: i64) -> String {
        let mut hasher = Sha1::new();
        hasher.update(format!("timestamp={timestamp}{}", self.api_secret));
        hex::encode(hasher.finalize())
    }
}

#[async_trait]
impl MediaStore for CloudinaryStore {
    async fn upload_file(&self, path: &Path) -> anyhow::Result<UploadedMedia> {
        let contents = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        let timestamp = chrono::Utc::now().timestamp();
        let form = Form::new()
            .part("file", Part::bytes(contents).file_name(file_name))
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp.to_string())
            .text("signature", self.signature(timestamp));

        let response: UploadResponse = self
            .client
            .post(self.upload_url())
            .multipart(form)
            .send()
            .await
            .context("sending upload request")?
            .error_for_status()
            .context("media host rejected upload")?
            .json()
            .await
            .context("decoding upload response")?;

        Ok(UploadedMedia {
            url: response.secure_url,
            public_id: response.public_id,
            resource_type: response.resource_type,
            bytes: response.bytes,
            duration: response.duration,
        })
    }
}
