use std::{path::Path, process::Stdio};

use tokio::process::Command;

use crate::{SupafleetError, SupafleetResult};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Locates `program` on the `PATH`.
pub(crate) fn locate(program: &str) -> SupafleetResult<std::path::PathBuf> {
    which::which(program).map_err(|e| {
        SupafleetError::ExternalTool(format!("{} not found in PATH: {}", program, e))
    })
}

/// Runs a command to completion and returns its stdout. A non-zero exit is an error carrying
/// stderr.
pub(crate) async fn run(
    program: &str,
    args: &[&str],
    current_dir: Option<&Path>,
) -> SupafleetResult<String> {
    let binary = locate(program)?;
    let command_line = format!("{} {}", program, args.join(" "));
    tracing::debug!("running: {}", command_line);

    let mut command = Command::new(&binary);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    if let Some(dir) = current_dir {
        command.current_dir(dir);
    }

    let output = command.output().await.map_err(|e| {
        SupafleetError::ExternalTool(format!("failed to execute `{}`: {}", command_line, e))
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SupafleetError::ExternalTool(format!(
            "`{}` failed with {}: {}",
            command_line,
            output.status,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
