use crate::units::UnitError;
use thiserror::Error;

/// Error type for invalid model, dataset and configuration operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TLMError {
    #[error(transparent)]
    Unit(#[from] UnitError),
    #[error("No World data available for driver_var `{driver_var}`")]
    MissingDriver { driver_var: String },
    #[error("drivers have not been set, call `set_drivers` first")]
    DriversNotSet,
    #[error("every driver timestep has already been consumed")]
    RunComplete,
    #[error("Invalid time axis: {0}")]
    InvalidTimeAxis(String),
    #[error("Non-finite driver value at index {index}")]
    NonFiniteDriver { index: usize },
    #[error("`{field}` is not unique, found: {values:?}")]
    MetadataNotUnique { field: String, values: Vec<String> },
    #[error("Missing required metadata `{field}`")]
    MissingMetadata { field: String },
    #[error("Shape mismatch in {context}. Expected {expected}, got {actual}")]
    ShapeMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },
    #[error("Duplicate metadata: {0}")]
    DuplicateMetadata(String),
    #[error("Unknown parameter `{0}`")]
    UnknownParameter(String),
    #[error("Invalid value for `{name}`: {reason}")]
    InvalidParameter { name: String, reason: String },
    #[error("Configuration error: {0}")]
    Config(String),
}

impl TLMError {
    /// True if the error originates from a unit parse or conversion failure.
    pub fn is_unit_error(&self) -> bool {
        matches!(self, Self::Unit(_))
    }
}

/// Convenience type for `Result<T, TLMError>`.
pub type TLMResult<T> = Result<T, TLMError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_driver_message() {
        let err = TLMError::MissingDriver {
            driver_var: "Effective Radiative Forcing".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "No World data available for driver_var `Effective Radiative Forcing`"
        );
        assert!(!err.is_unit_error());
    }

    #[test]
    fn test_unit_error_is_transparent() {
        let err: TLMError = UnitError::UnknownUnit("furlong".to_string()).into();
        assert!(err.is_unit_error());
        assert_eq!(err.to_string(), "unknown unit: 'furlong'");
    }
}
