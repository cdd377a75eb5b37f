//! Error types for stack synthesis.

use thiserror::Error;

use crate::schema::{Diagnostic, DiagnosticSeverity};

/// Errors that can occur while configuring or synthesizing a stack.
#[derive(Debug, Error)]
pub enum StackError {
    /// The stack configuration is invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// One or more declarations failed validation.
    #[error("Validation failed with {} error(s)", count_errors(.0))]
    Validation(Vec<Diagnostic>),

    /// A construct id was declared twice in the same stack.
    #[error("Duplicate construct: {0}")]
    DuplicateConstruct(String),

    /// A construct id cannot be turned into a logical id.
    #[error("Invalid construct id: {0}")]
    InvalidConstructId(String),

    /// A reference points at a resource the stack does not declare.
    #[error("Unresolved reference: {0}")]
    UnresolvedReference(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The configuration file could not be parsed.
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Reading or writing a file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StackError {
    /// Get the error message as a string.
    ///
    /// Returns a reference to the error message for variants that carry one.
    pub fn message(&self) -> &str {
        match self {
            Self::Configuration(msg) => msg,
            Self::Validation(_) => "validation failed (see diagnostics)",
            Self::DuplicateConstruct(msg) => msg,
            Self::InvalidConstructId(msg) => msg,
            Self::UnresolvedReference(msg) => msg,
            Self::Serialization(_err) => "serialization error (see Debug output)",
            Self::ConfigParse(_err) => "config parse error (see Debug output)",
            Self::Io(_err) => "I/O error (see Debug output)",
        }
    }

    /// Diagnostics attached to a validation failure, empty for other variants.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Self::Validation(diagnostics) => diagnostics,
            _ => &[],
        }
    }
}

fn count_errors(diagnostics: &[Diagnostic]) -> usize {
    diagnostics
        .iter()
        .filter(|d| d.severity == DiagnosticSeverity::Error)
        .count()
}
