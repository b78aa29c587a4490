use std::{collections::HashMap, path::PathBuf};

use async_trait::async_trait;
use axum::extract::Multipart;
use tracing::debug;
use uuid::Uuid;

use crate::{
    AppResult,
    error::{CoreError, CoreResult},
};

/// A file received from a client, not yet stored.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Content types accepted for storage and the extension each is saved under.
/// Anything else, `image/svg+xml` included, is refused.
const STORED_TYPES: &[(&str, &str)] = &[
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
    ("application/pdf", "pdf"),
];

impl Upload {
    fn content_type(&self) -> String {
        self.content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
    }

    /// Raster images only.
    pub fn is_image(&self) -> bool {
        self.content_type().starts_with("image/") && self.extension().is_some()
    }

    pub fn is_pdf(&self) -> bool {
        self.content_type() == "application/pdf"
    }

    /// Derived from the content type; the client's file name is never trusted.
    fn extension(&self) -> Option<&'static str> {
        let content_type = self.content_type();
        STORED_TYPES
            .iter()
            .find(|(ty, _)| *ty == content_type)
            .map(|(_, ext)| *ext)
    }
}

#[async_trait]
pub trait DocumentStorage: Send + Sync {
    /// Persists the upload and returns the url it can be fetched from.
    async fn store(&self, upload: Upload) -> CoreResult<String>;
}

/// Writes uploads into a directory that the router serves statically.
pub struct DiskStorage {
    dir: PathBuf,
    url_prefix: String,
}

impl DiskStorage {
    pub fn new(dir: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        DiskStorage {
            dir: dir.into(),
            url_prefix: url_prefix.into(),
        }
    }
}

#[async_trait]
impl DocumentStorage for DiskStorage {
    async fn store(&self, upload: Upload) -> CoreResult<String> {
        let ext = upload
            .extension()
            .ok_or_else(|| CoreError::validation(format!("unsupported file type {}", upload.content_type)))?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let name = format!("{}.{ext}", Uuid::now_v7().simple());
        tokio::fs::write(self.dir.join(&name), &upload.bytes).await?;

        debug!(file = %name, bytes = upload.bytes.len(), "stored upload");
        Ok(format!("{}/{name}", self.url_prefix))
    }
}

/// Text fields and at most one file (`file_field`) from a multipart form.
pub(crate) async fn read_form(
    mut multipart: Multipart,
    file_field: &str,
) -> AppResult<(HashMap<String, String>, Option<Upload>)> {
    let mut fields = HashMap::new();
    let mut upload = None;

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };

        if name == file_field {
            let file_name = field.file_name().unwrap_or_default().to_owned();
            let content_type = field.content_type().unwrap_or_default().to_owned();
            let bytes = field.bytes().await?.to_vec();
            if !bytes.is_empty() {
                upload = Some(Upload {
                    file_name,
                    content_type,
                    bytes,
                });
            }
        } else {
            fields.insert(name, field.text().await?);
        }
    }

    Ok((fields, upload))
}

pub(crate) fn require_upload(upload: Option<Upload>, what: &str) -> CoreResult<Upload> {
    upload.ok_or_else(|| CoreError::validation(format!("{what} is required")))
}
