//! Raw response persistence.
//!
//! Each attempt's response can be archived for later inspection. The store is
//! strictly best-effort from the loop's point of view: implementations log
//! their own failures and return `None` instead of erroring.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::http::AttemptResponse;

/// How persisted artifacts are protected at rest.
///
/// An explicit sum type instead of a boolean toggle: the `Encrypted` variant
/// names the key it expects so a missing key provider is a construction-time
/// error, not a silent downgrade to plaintext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactEncryption {
    Plaintext,
    Encrypted { key_ref: String },
}

/// Errors surfaced when configuring a store.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("encryption key `{0}` requires an external key provider; none is configured")]
    MissingKeyProvider(String),
}

/// Persists one attempt's raw response. Must never fail into the loop.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn save_response(&self, response: &AttemptResponse, success: bool) -> Option<PathBuf>;
}

/// On-disk serialisation of a saved response.
#[derive(Debug, Serialize)]
struct ArtifactRecord<'a> {
    timestamp: String,
    url: &'a str,
    status_code: u16,
    headers: Vec<(String, String)>,
    content: Value,
}

/// Stores responses as timestamped JSON files in a directory.
pub struct FileArtifactStore {
    dir: PathBuf,
}

impl FileArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Construct with an explicit at-rest protection choice.
    pub fn with_encryption(
        dir: impl Into<PathBuf>,
        encryption: ArtifactEncryption,
    ) -> Result<Self, ArtifactError> {
        match encryption {
            ArtifactEncryption::Plaintext => Ok(Self::new(dir)),
            ArtifactEncryption::Encrypted { key_ref } => {
                Err(ArtifactError::MissingKeyProvider(key_ref))
            }
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(success: bool) -> String {
        let timestamp = Utc::now()
            .to_rfc3339()
            .replace(':', "-")
            .replace('.', "-");
        let status = if success { "success" } else { "failed" };
        format!("{timestamp}_{status}_response.json")
    }

    fn record(response: &AttemptResponse) -> ArtifactRecord<'_> {
        let text = response.text();
        // Inline JSON bodies as structured content, keep anything else as text.
        let content = serde_json::from_str::<Value>(&text)
            .unwrap_or_else(|_| Value::String(text.into_owned()));

        ArtifactRecord {
            timestamp: Utc::now().to_rfc3339(),
            url: response.url.as_str(),
            status_code: response.status,
            headers: response
                .headers
                .iter()
                .map(|(name, value)| {
                    (
                        name.to_string(),
                        String::from_utf8_lossy(value.as_bytes()).into_owned(),
                    )
                })
                .collect(),
            content,
        }
    }
}

#[async_trait]
impl ArtifactStore for FileArtifactStore {
    async fn save_response(&self, response: &AttemptResponse, success: bool) -> Option<PathBuf> {
        let record = Self::record(response);
        let path = self.dir.join(Self::file_name(success));

        let serialized = match serde_json::to_vec_pretty(&record) {
            Ok(bytes) => bytes,
            Err(err) => {
                log::error!("failed to serialise response artifact: {err}");
                return None;
            }
        };

        if let Err(err) = tokio::fs::create_dir_all(&self.dir).await {
            log::error!("failed to create artifact directory: {err}");
            return None;
        }

        match tokio::fs::write(&path, serialized).await {
            Ok(()) => {
                log::info!("raw response saved to {}", path.display());
                Some(path)
            }
            Err(err) => {
                log::error!("failed to save raw response: {err}");
                None
            }
        }
    }
}
