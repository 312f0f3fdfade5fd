use std::path::PathBuf;

use thiserror::Error;

use crate::config::InstanceId;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a supafleet-related operation.
pub type SupafleetResult<T> = Result<T, SupafleetError>;

/// An error that occurred while managing supafleet instances.
#[derive(pretty_error_debug::Debug, Error)]
pub enum SupafleetError {
    /// An argument was rejected before any side effect was attempted.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The instance is already present in the registry.
    #[error("instance {0} already exists")]
    AlreadyExists(InstanceId),

    /// The instance is not present in the registry.
    #[error("instance {0} not found")]
    NotFound(InstanceId),

    /// Reading or writing the registry file failed.
    #[error("registry persistence failed: {0}")]
    Persistence(String),

    /// A freshly generated token did not verify against its own signing key.
    #[error("secret validation failed: {0}")]
    SecretValidation(String),

    /// A registered instance path failed the containment checks.
    #[error("refusing to use {path}: {reason}")]
    SafetyViolation {
        /// The refused path.
        path: PathBuf,

        /// Why the path was refused.
        reason: String,
    },

    /// The container runtime or the template fetch failed.
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// The deployment template is missing on disk.
    #[error("template not found: {0}")]
    TemplateMissing(PathBuf),

    /// An I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON (de)serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A YAML serialization error.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// An invalid regular expression.
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    /// A token signing or decoding error.
    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl SupafleetError {
    /// Creates a new `SafetyViolation` error.
    pub fn safety_violation(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        SupafleetError::SafetyViolation {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
