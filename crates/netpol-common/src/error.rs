//! Error types for policy conversion

use thiserror::Error;

/// Conversion error type
///
/// Variants carry rendered messages, never source errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    /// Malformed CIDR or IP literal
    #[error("failed to parse {input}: {reason}")]
    ParseError {
        /// Offending literal
        input: String,
        /// Parser message
        reason: String,
    },

    /// Malformed numeric or named port
    #[error("invalid port {0}")]
    InvalidPortSpec(String),

    /// Profile name lacks the namespace profile prefix
    #[error("Profile {0} not backed by a Namespace")]
    NotBackedByNamespace(String),

    /// Profile name lacks the service account profile prefix
    #[error("Profile {0} not backed by a ServiceAccount")]
    NotBackedByServiceAccount(String),

    /// Service account profile name does not have three segments
    #[error("Profile {0} is not formatted correctly")]
    MalformedProfileName(String),

    /// Combined revision does not split into exactly two parts
    #[error("ResourceVersion is not valid: {0}")]
    InvalidRevision(String),

    /// Workload endpoint name rejected by the identifier parser
    #[error("unparseable workload endpoint name {name}: {reason}")]
    UnparseableIdentifier {
        /// Name handed to the parser
        name: String,
        /// Parser message
        reason: String,
    },

    /// Configuration error
    #[error("config error: {0}")]
    ConfigError(String),
}

impl ConversionError {
    /// Build a parse error for a literal
    pub fn parse(input: impl Into<String>, reason: impl ToString) -> Self {
        Self::ParseError {
            input: input.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for conversion
pub type Result<T> = std::result::Result<T, ConversionError>;
