//! Fatal error types.
//!
//! Only malformed rule or template text produces an error. Missing data in
//! an event is never an error: extraction resolves it to a sentinel value.

use thiserror::Error;

/// Errors raised while parsing field references, compiling templates,
/// building comparisons or loading configuration.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("When parsing filtercheck {raw}: {field} requires an index but none provided")]
    RequiresIndex { raw: String, field: String },

    #[error("When parsing filtercheck {raw}: {field} forbids an index but one provided")]
    ForbidsIndex { raw: String, field: String },

    #[error("When parsing filtercheck {raw}: {field} requires a numeric index")]
    NonNumericIndex { raw: String, field: String },

    #[error("When parsing filtercheck {raw}: {field} has an unterminated index")]
    UnterminatedIndex { raw: String, field: String },

    #[error("When parsing filtercheck {raw}: invalid glob pattern ({reason})")]
    InvalidGlob { raw: String, reason: String },

    #[error("Could not parse filtercheck field \"{0}\". Did not have expected format with 'jevt.value[<json pointer>]'")]
    InvalidJevtValue(String),

    #[error("Could not parse filtercheck field \"{raw}\". Invalid json selector ({reason})")]
    InvalidSelector { raw: String, reason: String },

    #[error("Unknown filtercheck field {0}")]
    UnknownField(String),

    #[error("Filtercheck field {field} followed by unexpected text \"{rest}\"")]
    TrailingFieldText { field: String, rest: String },

    #[error("Could not parse format string \"{format}\": unknown filtercheck field {rest}")]
    UnknownFormatField { format: String, rest: String },

    #[error("Could not parse format string \"{0}\": empty filtercheck field")]
    EmptyFormatField(String),

    #[error("filter error: unsupported comparison operator {0}")]
    UnsupportedOperator(String),

    #[error("filter error: operator {0} requires a value")]
    MissingOperand(String),

    #[error("Invalid output configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, EngineError>;
