use super::{ErrorCode, OswError};
use std::path::Path;

/// Extension trait for convenient error conversion
pub trait ErrorExt<T> {
    /// Convert to a storage OswError carrying the original as its source
    fn to_storage_error(self, message: impl Into<String>) -> Result<T, OswError>;
}

impl<T, E> ErrorExt<T> for Result<T, E>
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    fn to_storage_error(self, message: impl Into<String>) -> Result<T, OswError> {
        self.map_err(|e| OswError::storage(message).with_source(e))
    }
}

/// Helper functions for common error scenarios
pub mod common {
    use super::*;

    /// Workflow has no file location to save to
    pub fn no_osw_path() -> OswError {
        OswError::storage_with_code(
            ErrorCode::STORAGE_NO_PATH,
            "Workflow is not associated with a file path",
            None,
        )
    }

    /// Measure directory could not be resolved against the measure paths
    pub fn measure_not_found(dir_name: &str) -> OswError {
        OswError::measure(
            ErrorCode::MEASURE_NOT_FOUND,
            format!("Cannot find measure '{}'", dir_name),
            Some(dir_name.to_string()),
        )
    }

    /// Measure directory exists but its descriptor could not be read
    pub fn measure_unloadable(dir: &Path, reason: impl Into<String>) -> OswError {
        OswError::measure(
            ErrorCode::MEASURE_UNLOADABLE,
            format!("Cannot load measure at '{}': {}", dir.display(), reason.into()),
            dir.file_name().map(|n| n.to_string_lossy().into_owned()),
        )
    }

    /// A required argument has neither a value nor a default
    pub fn missing_argument(name: &str) -> OswError {
        OswError::validation_with_code(
            ErrorCode::VALIDATION_MISSING_ARGUMENT,
            format!("No value found for argument '{}'.", name),
            Some(name.to_string()),
        )
    }

    /// Argument exists but holds the wrong kind of value
    pub fn argument_type_mismatch(name: &str, expected: &str) -> OswError {
        OswError::validation_with_code(
            ErrorCode::VALIDATION_INVALID_TYPE,
            format!("Argument '{}' is not of type {}", name, expected),
            Some(name.to_string()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_extension_trait() {
        let io_result: Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "test"));

        let osw_result = io_result.to_storage_error("Failed to open file");
        assert!(osw_result.is_err());

        let err = osw_result.unwrap_err();
        assert_eq!(err.code(), ErrorCode::STORAGE_GENERIC);
    }

    #[test]
    fn test_common_error_helpers() {
        let err = common::no_osw_path();
        assert_eq!(err.code(), ErrorCode::STORAGE_NO_PATH);

        let err = common::measure_not_found("SetWindowToWallRatio");
        assert_eq!(err.code(), ErrorCode::MEASURE_NOT_FOUND);
        assert_eq!(err.message(), "Cannot find measure 'SetWindowToWallRatio'");

        let err = common::missing_argument("r_value");
        assert_eq!(err.code(), ErrorCode::VALIDATION_MISSING_ARGUMENT);
        assert!(err.user_message().contains("'r_value'"));
    }
}
