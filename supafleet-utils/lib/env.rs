//! Utility functions for working with environment variables.

use std::path::PathBuf;

use crate::{DEFAULT_BASE_FOLDER, DEFAULT_TEMPLATE_BRANCH, DEFAULT_TEMPLATE_REPO};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Environment variable for the supafleet base folder
pub const SUPAFLEET_HOME_ENV_VAR: &str = "SUPAFLEET_HOME";

/// Environment variable for the template repository URL
pub const TEMPLATE_REPO_ENV_VAR: &str = "SUPAFLEET_TEMPLATE_REPO";

/// Environment variable for the template repository branch
pub const TEMPLATE_BRANCH_ENV_VAR: &str = "SUPAFLEET_TEMPLATE_BRANCH";

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Returns the base folder to manage.
///
/// An explicit folder (usually from `--base-folder`) wins, then the `SUPAFLEET_HOME`
/// environment variable, then the default `~/projects/database`.
pub fn resolve_base_folder(explicit: Option<PathBuf>) -> PathBuf {
    if let Some(folder) = explicit {
        return folder;
    }

    match std::env::var(SUPAFLEET_HOME_ENV_VAR) {
        Ok(home) if !home.is_empty() => PathBuf::from(home),
        _ => DEFAULT_BASE_FOLDER.to_owned(),
    }
}

/// Returns the template repository URL.
pub fn get_template_repo() -> String {
    std::env::var(TEMPLATE_REPO_ENV_VAR).unwrap_or_else(|_| DEFAULT_TEMPLATE_REPO.to_string())
}

/// Returns the template repository branch.
pub fn get_template_branch() -> String {
    std::env::var(TEMPLATE_BRANCH_ENV_VAR).unwrap_or_else(|_| DEFAULT_TEMPLATE_BRANCH.to_string())
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_base_folder_wins() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = resolve_base_folder(Some(dir.path().to_path_buf()));
        assert_eq!(resolved, dir.path());
    }

    #[test]
    fn test_default_base_folder_is_under_home() {
        assert!(DEFAULT_BASE_FOLDER.ends_with("projects/database"));
    }
}
