//! Error types for strata.
//!
//! All fallible operations in the crate return [`Result`]. The policy follows
//! a strict split:
//!
//! - **System errors bubble up unchanged**: `StrataError::Io` wraps
//!   `std::io::Error` and is never re-wrapped or suppressed. A missing file or
//!   a permission problem must surface as exactly that.
//! - **Application errors are wrapped with context**: parsing failures carry
//!   the message of the underlying format library, validation failures carry
//!   the offending value.
//! - **Pipeline findings are not errors.** Anything the extraction pipeline
//!   can continue past (a duplicate depth, a suspicious gap) is an
//!   [`ExtractionIssue`](crate::classify::ExtractionIssue) inside an
//!   [`ExtractionResult`](crate::types::ExtractionResult), not a `StrataError`.
//!   The error type is reserved for conditions that abort a single parse
//!   attempt or the whole call.

use thiserror::Error;

use crate::classify::ExtractionIssue;

/// Result type alias using `StrataError`.
pub type Result<T> = std::result::Result<T, StrataError>;

/// Main error type for all strata operations.
#[derive(Debug, Error)]
pub enum StrataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parsing error: {message}")]
    Parsing {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A parsed document failed the readability check. Carries the tagged
    /// issue so the classifier never has to re-derive severity from text.
    #[error("{issue}")]
    Unreadable { issue: ExtractionIssue },

    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("{0}")]
    Other(String),
}

impl StrataError {
    /// Create a Parsing error.
    pub fn parsing<S: Into<String>>(message: S) -> Self {
        Self::Parsing {
            message: message.into(),
            source: None,
        }
    }

    /// Create a Parsing error with source.
    pub fn parsing_with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Parsing {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a Validation error.
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
            source: None,
        }
    }

    /// Create a Validation error with source.
    pub fn validation_with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Validation {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a Serialization error.
    pub fn serialization<S: Into<String>>(message: S) -> Self {
        Self::Serialization {
            message: message.into(),
            source: None,
        }
    }

    /// Create an Unreadable error from a tagged issue.
    pub fn unreadable(issue: ExtractionIssue) -> Self {
        Self::Unreadable { issue }
    }

    /// The tagged issue behind this error, when one exists.
    pub fn issue(&self) -> Option<&ExtractionIssue> {
        match self {
            Self::Unreadable { issue } => Some(issue),
            _ => None,
        }
    }
}

#[cfg(feature = "excel")]
impl From<calamine::Error> for StrataError {
    fn from(err: calamine::Error) -> Self {
        StrataError::Parsing {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(feature = "pdf")]
impl From<lopdf::Error> for StrataError {
    fn from(err: lopdf::Error) -> Self {
        StrataError::Parsing {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<serde_json::Error> for StrataError {
    fn from(err: serde_json::Error) -> Self {
        StrataError::Serialization {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: StrataError = io_err.into();
        assert!(matches!(err, StrataError::Io(_)));
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn test_parsing_error() {
        let err = StrataError::parsing("invalid chart");
        assert_eq!(err.to_string(), "Parsing error: invalid chart");
    }

    #[test]
    fn test_parsing_error_with_source() {
        let source = std::io::Error::new(std::io::ErrorKind::InvalidData, "bad data");
        let err = StrataError::parsing_with_source("invalid chart", source);
        assert_eq!(err.to_string(), "Parsing error: invalid chart");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_validation_error() {
        let err = StrataError::validation("depth out of range");
        assert_eq!(err.to_string(), "Validation error: depth out of range");
    }

    #[test]
    fn test_unreadable_carries_issue() {
        let err = StrataError::unreadable(ExtractionIssue::NoDepthsFound);
        assert!(err.issue().is_some());
        assert_eq!(err.issue(), Some(&ExtractionIssue::NoDepthsFound));
    }

    #[test]
    fn test_unsupported_format_error() {
        let err = StrataError::UnsupportedFormat(".docx".to_string());
        assert_eq!(err.to_string(), "Unsupported file type: .docx");
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: StrataError = json_err.into();
        assert!(matches!(err, StrataError::Serialization { .. }));
    }

    #[test]
    fn test_io_error_bubbles_unchanged() {
        fn read_file() -> Result<String> {
            let content = std::fs::read_to_string("/nonexistent/chart.xlsx")?;
            Ok(content)
        }

        let result = read_file();
        assert!(matches!(result.unwrap_err(), StrataError::Io(_)));
    }
}
