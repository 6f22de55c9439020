//! Model configuration
//!
//! Loaded from TOML; every field has a default so partial files work.
//!
//! ```toml
//! definitions_keyword = "definitions"
//! delete_policy = "cascade"
//! ```

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::naming::DEFAULT_FIELD_NAME;
use crate::resolver::DEFAULT_MAX_REFERENCE_DEPTH;

/// Keyword holding reusable definitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub enum DefinitionsKeyword {
    /// `$defs` (2019-09 and later)
    #[default]
    #[serde(rename = "$defs")]
    Defs,
    /// Legacy `definitions`
    #[serde(rename = "definitions")]
    Definitions,
}

impl DefinitionsKeyword {
    /// Keyword as written in documents
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Defs => "$defs",
            Self::Definitions => "definitions",
        }
    }
}

/// What deleting a still-referenced node does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeletePolicy {
    /// Refuse with `ReferencedNodeInUse`
    #[default]
    Block,
    /// Delete the referencing nodes too
    Cascade,
}

/// Schema model configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ModelConfig {
    /// Definitions keyword for new documents; loaded documents keep theirs
    pub definitions_keyword: DefinitionsKeyword,
    /// Base for generated field names
    pub default_field_name: String,
    /// Base for generated definition names
    pub default_definition_name: String,
    /// Default mode of `delete_node`
    pub delete_policy: DeletePolicy,
    /// Longest reference chain followed before giving up
    pub max_reference_depth: usize,
    /// Compile the canonical document with a JSON Schema validator during
    /// `validate`
    pub meta_validation: bool,
    /// `$schema` written into new documents
    pub schema_dialect: Option<String>,
}

impl ModelConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With definitions keyword
    #[inline]
    #[must_use]
    pub fn with_definitions_keyword(mut self, keyword: DefinitionsKeyword) -> Self {
        self.definitions_keyword = keyword;
        self
    }

    /// With delete policy
    #[inline]
    #[must_use]
    pub fn with_delete_policy(mut self, policy: DeletePolicy) -> Self {
        self.delete_policy = policy;
        self
    }

    /// With meta validation toggle
    #[inline]
    #[must_use]
    pub fn with_meta_validation(mut self, enabled: bool) -> Self {
        self.meta_validation = enabled;
        self
    }

    /// With `$schema` for new documents
    #[inline]
    #[must_use]
    pub fn with_schema_dialect(mut self, dialect: impl Into<String>) -> Self {
        self.schema_dialect = Some(dialect.into());
        self
    }

    /// Parse TOML text
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] on malformed TOML or unknown values.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Read TOML file
    ///
    /// # Errors
    /// Returns [`ConfigError::Io`] or [`ConfigError::Parse`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// JSON Schema describing the configuration file
    #[must_use]
    pub fn json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ModelConfig)
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            definitions_keyword: DefinitionsKeyword::Defs,
            default_field_name: DEFAULT_FIELD_NAME.to_string(),
            default_definition_name: DEFAULT_FIELD_NAME.to_string(),
            delete_policy: DeletePolicy::Block,
            max_reference_depth: DEFAULT_MAX_REFERENCE_DEPTH,
            meta_validation: true,
            schema_dialect: None,
        }
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config text is invalid
    #[error("invalid configuration: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ModelConfig::new();
        assert_eq!(config.definitions_keyword.keyword(), "$defs");
        assert_eq!(config.delete_policy, DeletePolicy::Block);
        assert_eq!(config.default_field_name, "name");
        assert!(config.meta_validation);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = ModelConfig::from_toml_str(
            r#"
            definitions_keyword = "definitions"
            delete_policy = "cascade"
            "#,
        )
        .unwrap();
        assert_eq!(config.definitions_keyword, DefinitionsKeyword::Definitions);
        assert_eq!(config.delete_policy, DeletePolicy::Cascade);
        assert_eq!(config.max_reference_depth, DEFAULT_MAX_REFERENCE_DEPTH);
    }

    #[test]
    fn unknown_policy_is_rejected() {
        let result = ModelConfig::from_toml_str(r#"delete_policy = "maybe""#);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = ModelConfig::from_file("/definitely/not/here.toml");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn json_schema_lists_fields() {
        let schema = serde_json::to_value(ModelConfig::json_schema()).unwrap();
        let properties = schema["properties"].as_object().unwrap();
        assert!(properties.contains_key("delete_policy"));
        assert!(properties.contains_key("definitions_keyword"));
    }

    #[test]
    fn builders_chain() {
        let config = ModelConfig::new()
            .with_delete_policy(DeletePolicy::Cascade)
            .with_meta_validation(false)
            .with_schema_dialect("https://json-schema.org/draft/2020-12/schema");
        assert_eq!(config.delete_policy, DeletePolicy::Cascade);
        assert!(!config.meta_validation);
        assert!(config.schema_dialect.is_some());
    }
}
