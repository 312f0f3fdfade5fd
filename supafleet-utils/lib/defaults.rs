//! Default values shared across the supafleet crates.

use std::{path::PathBuf, sync::LazyLock};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Default base folder, relative to the user's home directory.
pub const DEFAULT_BASE_FOLDER_SUBPATH: &str = "projects/database";

/// Default base folder under which the registry and every instance directory live.
pub static DEFAULT_BASE_FOLDER: LazyLock<PathBuf> = LazyLock::new(|| {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_BASE_FOLDER_SUBPATH)
});

/// Upstream repository holding the vendored docker deployment.
pub const DEFAULT_TEMPLATE_REPO: &str = "https://github.com/supabase/supabase.git";

/// Branch checked out from the template repository.
pub const DEFAULT_TEMPLATE_BRANCH: &str = "master";

/// Seconds the runtime waits for a container to stop before killing it.
pub const DEFAULT_STOP_TIMEOUT_SECS: u64 = 10;
