use thiserror::Error;

/// Custom error type for storybible operations.
#[derive(Debug, Error)]
pub enum BibleError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// Requested entity was not found.
    #[error("Not found: {entity_type} with id '{id}'")]
    NotFound { entity_type: String, id: String },

    /// Input validation failed.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration is missing or inconsistent (e.g. classifier enabled without credentials).
    #[error("Configuration error: {0}")]
    Config(String),

    /// External classifier could not be reached or returned an HTTP error.
    #[error("Classifier error: {0}")]
    Classifier(String),

    /// Registry snapshot is invalid.
    #[error("Registry error: {0}")]
    Registry(String),

    /// Document or file I/O failed.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<surrealdb::Error> for BibleError {
    fn from(err: surrealdb::Error) -> Self {
        BibleError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for BibleError {
    fn from(err: serde_json::Error) -> Self {
        BibleError::Database(format!("JSON serialization error: {}", err))
    }
}

impl From<std::io::Error> for BibleError {
    fn from(err: std::io::Error) -> Self {
        BibleError::Io(err.to_string())
    }
}

impl From<serde_yaml_ng::Error> for BibleError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        BibleError::Registry(format!("Invalid YAML: {}", err))
    }
}

impl From<toml::de::Error> for BibleError {
    fn from(err: toml::de::Error) -> Self {
        BibleError::Config(format!("Invalid TOML: {}", err))
    }
}

impl From<reqwest::Error> for BibleError {
    fn from(err: reqwest::Error) -> Self {
        BibleError::Classifier(err.to_string())
    }
}
