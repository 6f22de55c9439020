//! Editor session: one open model bound to its stored document

use crate::config::ModelConfig;
use crate::error::SchemaError;
use crate::model::SchemaModel;
use crate::store::{SchemaStore, StoreError};

/// Session errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Storage failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Model rejected the document or operation
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// A [`SchemaModel`] with save tracking against a [`SchemaStore`]
///
/// Saving writes the canonical document and remembers the revision it was
/// taken at; saving again at the same revision is a no-op.
#[derive(Debug)]
pub struct EditorSession<S> {
    store: S,
    model_path: String,
    model: SchemaModel,
    saved_revision: Option<u64>,
}

impl<S: SchemaStore> EditorSession<S> {
    /// Load `model_path` from `store`
    ///
    /// # Errors
    /// [`SessionError::Store`] if it cannot be read,
    /// [`SessionError::Schema`] if it cannot be represented.
    pub async fn open(store: S, model_path: impl Into<String>, config: ModelConfig) -> Result<Self, SessionError> {
        let model_path = model_path.into();
        let document = store.load(&model_path).await?;
        let model = SchemaModel::from_value(&document, config)?;
        let saved_revision = Some(model.revision()?);
        tracing::info!(model_path = %model_path, "opened schema");
        Ok(Self {
            store,
            model_path,
            model,
            saved_revision,
        })
    }

    /// Start a new, unsaved document at `model_path`
    #[must_use]
    pub fn create(store: S, model_path: impl Into<String>, config: ModelConfig) -> Self {
        Self {
            store,
            model_path: model_path.into(),
            model: SchemaModel::empty(config),
            saved_revision: None,
        }
    }

    /// Open model
    #[inline]
    #[must_use]
    pub fn model(&self) -> &SchemaModel {
        &self.model
    }

    /// Open model, for edits
    #[inline]
    pub fn model_mut(&mut self) -> &mut SchemaModel {
        &mut self.model
    }

    /// Store the session writes to
    #[inline]
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Path the document is saved under
    #[inline]
    #[must_use]
    pub fn model_path(&self) -> &str {
        &self.model_path
    }

    /// True if the model changed since it was last loaded or saved
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.model.revision().ok() != self.saved_revision
    }

    /// Write the model if it changed; returns whether anything was written
    ///
    /// # Errors
    /// [`SessionError::Schema`] if the model is unloaded,
    /// [`SessionError::Store`] if the write fails.
    pub async fn save(&mut self) -> Result<bool, SessionError> {
        let revision = self.model.revision()?;
        if self.saved_revision == Some(revision) {
            tracing::debug!(revision, "schema unchanged, skipping save");
            return Ok(false);
        }
        let document = self.model.to_canonical_schema()?;
        self.store.save(&self.model_path, &document).await?;
        self.saved_revision = Some(revision);
        tracing::info!(model_path = %self.model_path, revision, "saved schema");
        Ok(true)
    }

    /// Discard edits and load the stored document again
    ///
    /// # Errors
    /// As [`open`](Self::open).
    pub async fn reload(&mut self) -> Result<(), SessionError> {
        let document = self.store.load(&self.model_path).await?;
        self.model.load_canonical_schema(&document)?;
        self.saved_revision = Some(self.model.revision()?);
        Ok(())
    }

    /// End the session, returning the model
    #[must_use]
    pub fn into_model(self) -> SchemaModel {
        self.model
    }
}
