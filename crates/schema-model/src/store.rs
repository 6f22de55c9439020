//! Persistence seam for schema documents
//!
//! The model itself never touches storage; an [`EditorSession`] reads and
//! writes through a [`SchemaStore`].
//!
//! [`EditorSession`]: crate::session::EditorSession

use async_trait::async_trait;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No document at the model path
    #[error("schema not found: {0}")]
    NotFound(String),

    /// Model path escapes the store or is absolute
    #[error("invalid model path: {0}")]
    InvalidPath(String),

    /// Stored bytes are not a JSON document
    #[error("stored schema {path} is not valid JSON: {message}")]
    InvalidDocument {
        /// Model path
        path: String,
        /// Parser message
        message: String,
    },

    /// Filesystem failure
    #[error("io error at {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// Loads and saves canonical schema documents by model path
#[async_trait]
pub trait SchemaStore: Send + Sync {
    /// Read the document stored at `model_path`
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if nothing is stored there.
    async fn load(&self, model_path: &str) -> Result<Value, StoreError>;

    /// Replace the document stored at `model_path`
    ///
    /// # Errors
    /// Implementation specific.
    async fn save(&self, model_path: &str, document: &Value) -> Result<(), StoreError>;
}

/// Documents as pretty-printed JSON files under a root directory
#[derive(Debug, Clone)]
pub struct FileSchemaStore {
    root: PathBuf,
}

impl FileSchemaStore {
    /// Store rooted at `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File path for `model_path`, which must stay inside the root
    fn resolve(&self, model_path: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(model_path);
        let contained = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if model_path.is_empty() || !contained {
            return Err(StoreError::InvalidPath(model_path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl SchemaStore for FileSchemaStore {
    async fn load(&self, model_path: &str) -> Result<Value, StoreError> {
        let path = self.resolve(model_path)?;
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(model_path.to_string()))
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        let document = serde_json::from_str(&text).map_err(|e| StoreError::InvalidDocument {
            path: model_path.to_string(),
            message: e.to_string(),
        })?;
        tracing::debug!(path = %path.display(), "read schema file");
        Ok(document)
    }

    async fn save(&self, model_path: &str, document: &Value) -> Result<(), StoreError> {
        let path = self.resolve(model_path)?;
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await.map_err(|source| StoreError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        let mut text = serde_json::to_string_pretty(document).map_err(|e| StoreError::InvalidDocument {
            path: model_path.to_string(),
            message: e.to_string(),
        })?;
        text.push('\n');
        tokio::fs::write(&path, text)
            .await
            .map_err(|source| StoreError::Io { path: path.clone(), source })?;
        tracing::debug!(path = %path.display(), "wrote schema file");
        Ok(())
    }
}
