use std::process::ExitCode;

use supafleet_core::SupafleetError;
use thiserror::Error;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a supafleet CLI operation.
pub type SupafleetCliResult<T> = Result<T, SupafleetCliError>;

/// An error that occurred while running a supafleet command.
#[derive(pretty_error_debug::Debug, Error)]
pub enum SupafleetCliError {
    /// An error from the supafleet library.
    #[error(transparent)]
    Supafleet(#[from] SupafleetError),

    /// An I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An argument parsing error.
    #[error(transparent)]
    Clap(#[from] clap::Error),

    /// A JSON serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A YAML serialization error.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The command ran but reported at least one failure.
    #[error("{0}")]
    Failed(String),

    /// Any other error.
    #[error(transparent)]
    Custom(#[from] anyhow::Error),
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl SupafleetCliError {
    /// The process exit code for this error.
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::FAILURE
    }
}
