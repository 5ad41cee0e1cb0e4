use thiserror::Error;

/// Top-level error type shared by the Parlor crates.
///
/// Subsystem crates define their own error enums and implement
/// `From<ParlorError>` so the `?` operator works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ParlorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for ParlorError {
    fn from(err: toml::de::Error) -> Self {
        ParlorError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for ParlorError {
    fn from(err: toml::ser::Error) -> Self {
        ParlorError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for ParlorError {
    fn from(err: serde_json::Error) -> Self {
        ParlorError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Parlor operations.
pub type Result<T> = std::result::Result<T, ParlorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let cases: Vec<(ParlorError, &str)> = vec![
            (
                ParlorError::Config("bad key".to_string()),
                "Configuration error: bad key",
            ),
            (
                ParlorError::Serialization("invalid json".to_string()),
                "Serialization error: invalid json",
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ParlorError = io_err.into();
        match &err {
            ParlorError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            _ => panic!("Expected Io variant"),
        }
        assert!(err.to_string().starts_with("I/O error:"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let err: std::result::Result<toml::Value, _> = toml::from_str("invalid = [[[");
        let parlor_err: ParlorError = err.unwrap_err().into();
        assert!(matches!(parlor_err, ParlorError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let err: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ nope }");
        let parlor_err: ParlorError = err.unwrap_err().into();
        assert!(matches!(parlor_err, ParlorError::Serialization(_)));
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let io_result: std::result::Result<i32, std::io::Error> = Ok(42);
            let value = io_result?;
            Ok(value.to_string())
        }

        assert_eq!(inner().unwrap(), "42");
    }
}
