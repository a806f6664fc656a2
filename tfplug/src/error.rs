//! Error types for tfplug

/// Error type for tfplug operations
#[derive(Debug, thiserror::Error)]
pub enum TfplugError {
    #[error("Resource type not found: {0}")]
    ResourceNotFound(String),

    #[error("Data source type not found: {0}")]
    DataSourceNotFound(String),

    #[error("Provider not found for type: {0}")]
    ProviderNotFound(String),

    #[error("Resource type {type_name} is implemented by more than one provider server")]
    DuplicateResourceType { type_name: String },

    #[error("Data source type {type_name} is implemented by more than one provider server")]
    DuplicateDataSourceType { type_name: String },

    #[error("Provider schemas differ between muxed servers")]
    ProviderSchemaMismatch,

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Decoding error: {0}")]
    DecodingError(String),

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("Attribute {0} has an unknown value")]
    UnknownValue(String),

    #[error("Check failed: {0}")]
    CheckFailed(String),

    #[error("Test step {step} failed: {message}")]
    TestStepFailed { step: usize, message: String },

    #[error("{0}")]
    Custom(String),
}

/// Result type alias for tfplug operations
pub type Result<T> = std::result::Result<T, TfplugError>;

impl From<String> for TfplugError {
    fn from(s: String) -> Self {
        TfplugError::Custom(s)
    }
}

impl From<&str> for TfplugError {
    fn from(s: &str) -> Self {
        TfplugError::Custom(s.to_string())
    }
}

impl From<serde_json::Error> for TfplugError {
    fn from(e: serde_json::Error) -> Self {
        TfplugError::DecodingError(format!("json: {}", e))
    }
}
