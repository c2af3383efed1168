//! Storage for user-submitted payment proofs.

use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

pub const PROOF_SUBDIR: &str = "payment-proofs";

/// Accepted proof formats and the extension each is stored under.
const ALLOWED_TYPES: &[(&str, &str)] = &[
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
    ("image/jpg", "jpg"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
    ("application/pdf", "pdf"),
];

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("{0}")]
    Rejected(String),
    #[error("failed to store proof: {0}")]
    Io(#[from] std::io::Error),
}

/// One uploaded file as received from the client.
#[derive(Debug, Clone)]
pub struct ProofUpload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl ProofUpload {
    /// Images and PDFs only, non-empty, at most `max_bytes`.
    pub fn check(&self, max_bytes: usize) -> Result<(), StorageError> {
        if self.bytes.is_empty() {
            return Err(StorageError::Rejected("No file uploaded".to_string()));
        }
        if self.bytes.len() > max_bytes {
            return Err(StorageError::Rejected(format!(
                "File too large, maximum is {} bytes",
                max_bytes
            )));
        }
        if self.extension().is_none() {
            return Err(StorageError::Rejected(
                "Only image or PDF files are allowed".to_string(),
            ));
        }
        Ok(())
    }

    /// Stored extension, keyed on the declared content type. The client's
    /// file name never reaches the disk.
    fn extension(&self) -> Option<&'static str> {
        let content_type = self.content_type.as_deref()?;
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        ALLOWED_TYPES
            .iter()
            .find(|(mime, _)| *mime == essence)
            .map(|(_, ext)| *ext)
    }
}

#[async_trait]
pub trait ProofStorage: Send + Sync {
    /// Persists the file and returns the URL it will be served from.
    async fn store(&self, upload: &ProofUpload) -> Result<String, StorageError>;

    /// Best effort; a proof that is already gone is not an error.
    async fn remove(&self, url: &str) -> Result<(), StorageError>;
}

/// Writes under `<root>/payment-proofs/` and hands out URLs below `public_base_url`.
pub struct LocalProofStorage {
    root: PathBuf,
    public_base_url: String,
}

impl LocalProofStorage {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ProofStorage for LocalProofStorage {
    async fn store(&self, upload: &ProofUpload) -> Result<String, StorageError> {
        let dir = self.root.join(PROOF_SUBDIR);
        tokio::fs::create_dir_all(&dir).await?;

        let extension = upload.extension().ok_or_else(|| {
            StorageError::Rejected("Only image or PDF files are allowed".to_string())
        })?;
        let name = format!(
            "{}-{}.{}",
            Utc::now().timestamp_millis(),
            Uuid::new_v4().simple(),
            extension
        );
        tokio::fs::write(dir.join(&name), &upload.bytes).await?;

        tracing::info!(file = %name, size = upload.bytes.len(), "Stored payment proof");
        Ok(format!(
            "{}/{}/{}",
            self.public_base_url.trim_end_matches('/'),
            PROOF_SUBDIR,
            name
        ))
    }

    async fn remove(&self, url: &str) -> Result<(), StorageError> {
        let prefix = format!(
            "{}/{}/",
            self.public_base_url.trim_end_matches('/'),
            PROOF_SUBDIR
        );
        // Only names this storage generated; anything else is left alone.
        let name = match url.strip_prefix(&prefix) {
            Some(name)
                if !name.is_empty()
                    && name
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
                    && !name.starts_with('.') =>
            {
                name
            }
            _ => {
                tracing::warn!(url = %url, "Not a stored proof URL, skipping removal");
                return Ok(());
            }
        };

        match tokio::fs::remove_file(self.root.join(PROOF_SUBDIR).join(name)).await {
            Ok(()) => {
                tracing::info!(file = %name, "Removed payment proof");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
