use thiserror::Error;

use crate::domain::record::FieldViolation;

/// Failures raised by the pure domain layer.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("unrecognized material `{0}` (expected brochures|samples|clinical_data|presentation)")]
    UnknownMaterial(String),
    #[error("unrecognized sentiment `{0}` (expected Positive|Neutral|Negative)")]
    UnknownSentiment(String),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

/// Failures scoped to one turn or one save attempt. Nothing here is fatal to
/// the process; the session's record is always left in its last known-good
/// state.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("record validation failed ({} violation(s))", .0.len())]
    Validation(Vec<FieldViolation>),
    #[error("extraction failed: {0}")]
    Extraction(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

/// Shape surfaced at the HTTP boundary: a user-safe message plus a
/// correlation id for log lookup.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("unprocessable record")]
    UnprocessableRecord { violations: Vec<FieldViolation>, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::UnprocessableRecord { .. } => {
                "The record is missing required fields and cannot be saved yet."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::UnprocessableRecord { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        match self {
            ApplicationError::Domain(error) => {
                InterfaceError::BadRequest { message: error.to_string(), correlation_id }
            }
            ApplicationError::Validation(violations) => {
                InterfaceError::UnprocessableRecord { violations, correlation_id }
            }
            ApplicationError::Extraction(message) | ApplicationError::Persistence(message) => {
                InterfaceError::ServiceUnavailable { message, correlation_id }
            }
            ApplicationError::Configuration(message) => {
                InterfaceError::Internal { message, correlation_id }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::record::{Field, FieldViolation};

    use super::{ApplicationError, DomainError, InterfaceError};

    #[test]
    fn domain_error_maps_to_bad_request() {
        let interface = ApplicationError::from(DomainError::UnknownMaterial("pens".to_owned()))
            .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest { ref correlation_id, .. } if correlation_id == "req-1"
        ));
        assert_eq!(
            interface.user_message(),
            "The request could not be processed. Check inputs and try again."
        );
    }

    #[test]
    fn validation_error_carries_violations_through() {
        let violations = vec![FieldViolation {
            field: Field::HcpName,
            message: "HCP name is required before saving".to_owned(),
        }];
        let interface = ApplicationError::Validation(violations.clone()).into_interface("req-2");

        match interface {
            InterfaceError::UnprocessableRecord { violations: surfaced, correlation_id } => {
                assert_eq!(surfaced, violations);
                assert_eq!(correlation_id, "req-2");
            }
            other => panic!("expected UnprocessableRecord, got {other:?}"),
        }
    }

    #[test]
    fn extraction_failure_is_recoverable_unavailability() {
        let interface =
            ApplicationError::Extraction("oracle timed out".to_owned()).into_interface("req-3");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(
            interface.user_message(),
            "The service is temporarily unavailable. Please retry shortly."
        );
    }

    #[test]
    fn configuration_failure_maps_to_internal() {
        let interface =
            ApplicationError::Configuration("missing api key".to_owned()).into_interface("req-4");
        assert!(matches!(interface, InterfaceError::Internal { .. }));
    }
}
