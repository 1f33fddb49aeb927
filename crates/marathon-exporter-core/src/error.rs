//! Shared error type across the exporter crates.

use thiserror::Error;

/// Shared result type.
pub type Result<T> = std::result::Result<T, ExporterError>;

/// Unified error type used by core and server.
#[derive(Debug, Error)]
pub enum ExporterError {
    /// Fetch failed: network, TLS, timeout, or non-success status.
    #[error("transport: {0}")]
    Transport(String),
    /// Response body is not a valid metrics document.
    #[error("parse: {0}")]
    Parse(String),
    /// The source answered with a `message` instead of metrics.
    #[error("source reported: {0}")]
    SourceReported(String),
    /// One metric's required field is missing or has the wrong type.
    #[error("metric {metric}: field `{field}` {reason}")]
    FieldDecode {
        metric: String,
        field: &'static str,
        reason: String,
    },
    #[error("series {series}: labels {got:?} do not match schema {expected:?}")]
    LabelMismatch {
        series: String,
        expected: Vec<String>,
        got: Vec<String>,
    },
    #[error("config: {0}")]
    Config(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl ExporterError {
    /// Stable short code, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            ExporterError::Transport(_) => "TRANSPORT",
            ExporterError::Parse(_) => "PARSE",
            ExporterError::SourceReported(_) => "SOURCE_REPORTED",
            ExporterError::FieldDecode { .. } => "FIELD_DECODE",
            ExporterError::LabelMismatch { .. } => "LABEL_MISMATCH",
            ExporterError::Config(_) => "CONFIG",
            ExporterError::Internal(_) => "INTERNAL",
        }
    }

    /// Whether this error only affects a single metric and the scrape goes on.
    pub fn is_local(&self) -> bool {
        matches!(self, ExporterError::FieldDecode { .. })
    }

    pub(crate) fn missing(metric: &str, field: &'static str) -> Self {
        ExporterError::FieldDecode {
            metric: metric.to_string(),
            field,
            reason: "is missing".into(),
        }
    }

    pub(crate) fn wrong_type(metric: &str, field: &'static str, found: &serde_json::Value) -> Self {
        ExporterError::FieldDecode {
            metric: metric.to_string(),
            field,
            reason: format!("has unexpected value {found}"),
        }
    }
}
