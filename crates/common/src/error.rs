//! Common error types for CarMatch

use thiserror::Error;

/// Common error type used across CarMatch crates
#[derive(Error, Debug)]
pub enum Error {
    /// A string did not name any variant of a vocabulary enum
    #[error("Unknown {kind}: '{value}'")]
    UnknownVariant { kind: &'static str, value: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using the common Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn unknown_variant(kind: &'static str, value: impl Into<String>) -> Self {
        Self::UnknownVariant {
            kind,
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_variant_message() {
        let err = Error::unknown_variant("vehicle type", "truck");
        assert_eq!(err.to_string(), "Unknown vehicle type: 'truck'");
    }

    #[test]
    fn test_serde_json_conversion() {
        let err: Error = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
