use thiserror::Error;

/// Errors raised while validating or parsing call detail records.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CdrError {
    #[error("Unknown service type: {0}")]
    UnknownServiceType(String),

    #[error("Unknown lookup field: {0}")]
    UnknownField(String),

    #[error("Originating number (anum) must not be blank")]
    BlankAnum,

    #[error("Usage must be a non-negative finite number, got {0}")]
    InvalidUsage(f64),

    #[error("Invalid start date time '{0}': expected YYYY-MM-DDTHH:MM:SS")]
    InvalidStartDateTime(String),
}
