//! Fatal compile errors.

use std::path::PathBuf;

use zw_cmdtool_diagnostics::{Diagnostic, codes};

/// Conditions that abort a run. No table is written when one occurs.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    // -- Specification structure --
    /// A `param` declares a `type` with no descriptor rule.
    #[error("unsupported parameter type {kind:?} for parameter \"{name}\" (at {location})")]
    UnsupportedParameterType {
        /// Parameter name.
        name: String,
        /// The `type` attribute text.
        kind: String,
        /// Node path.
        location: String,
    },

    /// Two distinct nodes resolve to the same identifier or index key.
    #[error("duplicate identifier `{symbol}` (at {location})")]
    DuplicateIdentifier {
        /// The symbol both nodes would be emitted as.
        symbol: String,
        /// Node path of the second node.
        location: String,
    },

    /// A node lacks an attribute or child element its kind requires.
    #[error("missing required attribute `{attribute}` (at {location})")]
    MissingRequiredAttribute {
        /// Attribute name, or `<tag>` for a child element.
        attribute: String,
        /// Node path.
        location: String,
    },

    /// An attribute does not parse or does not fit its field.
    #[error("invalid value {value:?} for attribute `{attribute}`: {reason} (at {location})")]
    InvalidAttributeValue {
        /// Attribute name.
        attribute: String,
        /// Raw text.
        value: String,
        /// What was expected.
        reason: &'static str,
        /// Node path.
        location: String,
    },

    /// Strict mode: ambiguous references were recorded.
    #[error("strict mode: {} ambiguous reference(s)", .diagnostics.len())]
    StrictReferences {
        /// The offending warnings.
        diagnostics: Vec<Diagnostic>,
    },

    // -- Loading --
    /// A specification file could not be read.
    #[error("reading specification {}", .path.display())]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A specification file is not a valid node tree.
    #[error("parsing specification {}", .path.display())]
    Json {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// A specification directory could not be walked.
    #[error("walking specification directory")]
    Walk(#[from] walkdir::Error),
}

impl CompileError {
    /// Catalog code for structural errors; `None` for load failures.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            CompileError::UnsupportedParameterType { .. } => Some(codes::UNSUPPORTED_PARAMETER_TYPE),
            CompileError::DuplicateIdentifier { .. } => Some(codes::DUPLICATE_IDENTIFIER),
            CompileError::MissingRequiredAttribute { .. } => Some(codes::MISSING_REQUIRED_ATTRIBUTE),
            CompileError::InvalidAttributeValue { .. } => Some(codes::INVALID_ATTRIBUTE_VALUE),
            CompileError::StrictReferences { .. } => Some(codes::AMBIGUOUS_REFERENCE),
            CompileError::Io { .. } | CompileError::Json { .. } | CompileError::Walk(_) => None,
        }
    }

    /// Node path the error points at, if any.
    pub fn location(&self) -> Option<&str> {
        match self {
            CompileError::UnsupportedParameterType { location, .. }
            | CompileError::DuplicateIdentifier { location, .. }
            | CompileError::MissingRequiredAttribute { location, .. }
            | CompileError::InvalidAttributeValue { location, .. } => Some(location),
            _ => None,
        }
    }

    /// Render as an error diagnostic for JSON summaries.
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(
            self.code().unwrap_or("ZWC0000"),
            self.to_string(),
            self.location().map(str::to_string),
        )
    }
}
