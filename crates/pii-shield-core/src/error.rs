//! Error taxonomy shared by every pii-shield operation

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum PiiError {
    /// Caller-supplied input was rejected. Never retried.
    #[error("validation error: {0}")]
    Validation(String),

    /// A required setting is missing or unusable. Only the setting name is
    /// ever carried here, never its value.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The mapping store is unreachable or failed unexpectedly.
    #[error("storage error: {0}")]
    Storage(String),
}

impl PiiError {
    pub fn kind(&self) -> &'static str {
        match self {
            PiiError::Validation(_) => "validation_error",
            PiiError::Configuration(_) => "configuration_error",
            PiiError::Storage(_) => "storage_error",
        }
    }

    /// HTTP status code equivalent for the transport layer.
    pub fn status_code(&self) -> u16 {
        match self {
            PiiError::Validation(_) => 400,
            PiiError::Configuration(_) | PiiError::Storage(_) => 500,
        }
    }

    pub fn missing_setting(name: &str) -> Self {
        PiiError::Configuration(format!("required setting '{}' is not configured", name))
    }
}

impl From<rusqlite::Error> for PiiError {
    fn from(err: rusqlite::Error) -> Self {
        PiiError::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PiiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_and_status() {
        let validation = PiiError::Validation("text must not be empty".to_string());
        assert_eq!(validation.kind(), "validation_error");
        assert_eq!(validation.status_code(), 400);

        let storage = PiiError::Storage("disk I/O error".to_string());
        assert_eq!(storage.kind(), "storage_error");
        assert_eq!(storage.status_code(), 500);
    }

    #[test]
    fn test_missing_setting_names_only_the_setting() {
        let err = PiiError::missing_setting("tokenizer.secret");
        assert_eq!(err.kind(), "configuration_error");
        assert_eq!(err.status_code(), 500);
        assert!(err.to_string().contains("tokenizer.secret"));
    }

    #[test]
    fn test_rusqlite_error_maps_to_storage() {
        let err: PiiError = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(err, PiiError::Storage(_)));
    }
}
