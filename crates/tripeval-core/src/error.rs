//! Error types for tripeval-core.
//!
//! Mismatching fields are never errors: they are reported as data in
//! [`ComparisonResult`](crate::compare::ComparisonResult). The variants here
//! cover contract violations (malformed input shape, alignment size limit),
//! invalid configuration, and I/O while loading evaluation runs.

use thiserror::Error;

/// Errors raised by the comparison engine and its loaders.
#[derive(Debug, Error)]
pub enum EvalError {
    /// A record or trip did not have the expected JSON shape
    #[error("Malformed record '{id}': {reason}")]
    MalformedRecord { id: String, reason: String },
    /// Too many predicted trips for exact alignment under a reject policy
    #[error(
        "Alignment too large: {predicted} predicted trips exceeds exact limit of {limit}"
    )]
    AlignmentTooLarge { predicted: usize, limit: usize },
    /// No JSON object could be recovered from raw extractor output
    #[error("Unparsable extractor output: {0}")]
    UnparsableOutput(String),
    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    /// I/O failure while reading runs or labels
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// JSON syntax error in an input file
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl EvalError {
    pub(crate) fn malformed(id: impl Into<String>, reason: impl ToString) -> Self {
        EvalError::MalformedRecord {
            id: id.into(),
            reason: reason.to_string(),
        }
    }
}

/// Errors an [`Extractor`](crate::evaluation::datasets::Extractor) may report.
///
/// These are upstream failures. They never abort an evaluation run; the
/// affected document is scored as a failed extraction.
#[derive(Debug, Clone, Error)]
pub enum ExtractionError {
    /// The model or OCR call itself failed
    #[error("Extractor call failed: {0}")]
    CallFailed(String),
    /// The call succeeded but its output could not be parsed
    #[error("Extractor output could not be parsed: {0}")]
    ParseFailed(String),
    /// The source document could not be found or read
    #[error("Document unavailable: {0}")]
    DocumentUnavailable(String),
}

impl From<EvalError> for ExtractionError {
    fn from(err: EvalError) -> Self {
        ExtractionError::ParseFailed(err.to_string())
    }
}
