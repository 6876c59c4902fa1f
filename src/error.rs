use crate::repository::RowDecodeError;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataErrorCode {
    InvalidKey,
    DuplicateKey,
    StorageFailure,
    Decode,
}

impl MetadataErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            MetadataErrorCode::InvalidKey => "invalid_key",
            MetadataErrorCode::DuplicateKey => "duplicate_key",
            MetadataErrorCode::StorageFailure => "storage_failure",
            MetadataErrorCode::Decode => "decode",
        }
    }
}

/// Failures surfaced by repositories and assemblers.
///
/// Absence is never an error: lookups that can miss return `Option`.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("invalid key for table '{table}': {message}")]
    InvalidKey { table: &'static str, message: String },
    #[error("duplicate primary key in table '{table}': {key}")]
    DuplicateKey { table: &'static str, key: String },
    #[error("storage failure: {message}")]
    StorageFailure { message: String, retryable: bool },
    #[error(transparent)]
    Decode(#[from] RowDecodeError),
}

impl MetadataError {
    pub fn invalid_key(table: &'static str, message: impl Into<String>) -> Self {
        MetadataError::InvalidKey {
            table,
            message: message.into(),
        }
    }

    /// Connectivity loss or timeout; the whole operation may be retried.
    pub fn unavailable(message: impl Into<String>) -> Self {
        MetadataError::StorageFailure {
            message: message.into(),
            retryable: true,
        }
    }

    /// Internal store error that will fail the same way on retry.
    pub fn storage_internal(message: impl Into<String>) -> Self {
        MetadataError::StorageFailure {
            message: message.into(),
            retryable: false,
        }
    }

    pub fn code(&self) -> MetadataErrorCode {
        match self {
            MetadataError::InvalidKey { .. } => MetadataErrorCode::InvalidKey,
            MetadataError::DuplicateKey { .. } => MetadataErrorCode::DuplicateKey,
            MetadataError::StorageFailure { .. } => MetadataErrorCode::StorageFailure,
            MetadataError::Decode(_) => MetadataErrorCode::Decode,
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code().as_str()
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MetadataError::StorageFailure {
                retryable: true,
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{MetadataError, MetadataErrorCode};
    use crate::repository::RowDecodeError;

    #[test]
    fn error_code_strings_are_stable() {
        assert_eq!(MetadataErrorCode::InvalidKey.as_str(), "invalid_key");
        assert_eq!(MetadataErrorCode::DuplicateKey.as_str(), "duplicate_key");
        assert_eq!(
            MetadataErrorCode::StorageFailure.as_str(),
            "storage_failure"
        );
    }

    #[test]
    fn only_transient_storage_failures_are_retryable() {
        assert!(MetadataError::unavailable("connection reset").is_retryable());
        assert!(!MetadataError::storage_internal("corrupt page").is_retryable());
        assert!(!MetadataError::invalid_key("hdfs_aces", "negative id").is_retryable());
        let dup = MetadataError::DuplicateKey {
            table: "hdfs_aces",
            key: "(1, 42)".into(),
        };
        assert!(!dup.is_retryable());
        assert_eq!(dup.code_str(), "duplicate_key");
    }

    #[test]
    fn decode_errors_convert_transparently() {
        let err: MetadataError = RowDecodeError::MissingColumn {
            column: "subject".into(),
            index: 2,
        }
        .into();
        assert_eq!(err.code(), MetadataErrorCode::Decode);
        assert_eq!(err.to_string(), "missing column 'subject' at index 2");
    }
}
