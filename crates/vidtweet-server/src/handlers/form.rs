use std::path::Path;

use anyhow::Context;
use axum::extract::multipart::{Field, Multipart, MultipartError};
use tempfile::TempPath;
use tokio::{fs::File, io::AsyncWriteExt};
use vidtweet_shared::api::RegisterRequest;

use crate::error::AppError;

pub const AVATAR_FIELD: &str = "avatar";
pub const COVER_IMAGE_FIELD: &str = "coverImages";

/// Registration form after its files have been streamed to the temp directory.
///
/// Temp files are owned as [`TempPath`]s and removed when the form is dropped,
/// including when the request future is cancelled mid-flight.
#[derive(Debug, Default)]
pub struct RegistrationForm {
    pub fields: RegisterRequest,
    pub avatar: Option<TempPath>,
    pub cover_image: Option<TempPath>,
}

impl RegistrationForm {
    /// Form with text fields only, as sent in a JSON body.
    pub fn from_fields(fields: RegisterRequest) -> Self {
        Self {
            fields,
            ..Self::default()
        }
    }

    pub async fn from_multipart(
        mut multipart: Multipart,
        temp_dir: &Path,
    ) -> Result<Self, AppError> {
        let mut form = Self::default();
        form.read_parts(&mut multipart, temp_dir).await?;
        Ok(form)
    }

    async fn read_parts(
        &mut self,
        multipart: &mut Multipart,
        temp_dir: &Path,
    ) -> Result<(), AppError> {
        while let Some(field) = multipart.next_field().await.map_err(bad_part)? {
            let name = field.name().unwrap_or_default().to_string();
            let is_file = field.file_name().is_some();

            match (name.as_str(), is_file) {
                (AVATAR_FIELD, true) => store_single(&mut self.avatar, field, temp_dir).await?,
                (COVER_IMAGE_FIELD, true) => {
                    store_single(&mut self.cover_image, field, temp_dir).await?
                }
                (_, true) => return Err(unexpected_field(&name)),
                ("username", false) => self.fields.username = field.text().await.map_err(bad_part)?,
                ("email", false) => self.fields.email = field.text().await.map_err(bad_part)?,
                ("password", false) => self.fields.password = field.text().await.map_err(bad_part)?,
                ("fullName", false) => self.fields.full_name = field.text().await.map_err(bad_part)?,
                _ => tracing::debug!("Ignoring form field `{}`", name),
            }
        }
        Ok(())
    }
}

fn bad_part(e: MultipartError) -> AppError {
    AppError::Validation(e.body_text())
}

fn unexpected_field(name: &str) -> AppError {
    AppError::Validation(format!("Unexpected field `{name}`"))
}

/// Each file field accepts at most one file.
async fn store_single(
    slot: &mut Option<TempPath>,
    field: Field<'_>,
    temp_dir: &Path,
) -> Result<(), AppError> {
    if slot.is_some() {
        let name = field.name().unwrap_or_default().to_string();
        return Err(unexpected_field(&name));
    }
    *slot = Some(save_to_temp(field, temp_dir).await?);
    Ok(())
}

/// A failed write drops the returned guard, which removes the partial file.
async fn save_to_temp(mut field: Field<'_>, temp_dir: &Path) -> Result<TempPath, AppError> {
    let file_name = sanitize_file_name(field.file_name().unwrap_or_default());
    tokio::fs::create_dir_all(temp_dir)
        .await
        .with_context(|| format!("creating {}", temp_dir.display()))?;

    let (file, path) = tempfile::Builder::new()
        .suffix(&format!("-{file_name}"))
        .tempfile_in(temp_dir)
        .with_context(|| format!("creating temp file in {}", temp_dir.display()))?
        .into_parts();

    let mut file = File::from_std(file);
    while let Some(chunk) = field.chunk().await.map_err(bad_part)? {
        file.write_all(&chunk)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
    }
    file.flush().await.context("flushing upload")?;

    Ok(path)
}

/// Keeps the client's file name recognisable without letting it escape the temp dir.
fn sanitize_file_name(raw: &str) -> String {
    let base = Path::new(raw)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.trim_matches('.').is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}
