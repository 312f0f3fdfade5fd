use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use getset::Getters;
use supafleet_utils::{
    env, COMPOSE_FILENAME, COMPOSE_SUBDIR, DEFAULT_STOP_TIMEOUT_SECS, ENV_FILENAME,
    ENV_TEMPLATE_FILENAME, REGISTRY_FILENAME, TEMPLATE_CHECKOUT_SUBDIR,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Settings of an [`InstanceManager`](crate::management::InstanceManager).
#[derive(Debug, Clone, Getters)]
#[getset(get = "pub with_prefix")]
pub struct ManagerConfig {
    /// Directory holding the registry and every instance directory.
    base_dir: PathBuf,

    /// Repository the deployment templates are fetched from.
    template_repo: String,

    /// Branch of the template repository.
    template_branch: String,

    /// How long a container may take to stop during teardown.
    stop_timeout: Duration,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ManagerConfig {
    /// Creates a configuration, resolving the base folder and template repository from the
    /// environment when not given. A relative base folder is made absolute.
    pub fn new(base_dir: Option<PathBuf>) -> Self {
        let base_dir = env::resolve_base_folder(base_dir);
        let base_dir = std::path::absolute(&base_dir).unwrap_or(base_dir);

        Self {
            base_dir,
            template_repo: env::get_template_repo(),
            template_branch: env::get_template_branch(),
            stop_timeout: Duration::from_secs(DEFAULT_STOP_TIMEOUT_SECS),
        }
    }

    /// Overrides the template repository and branch.
    pub fn with_template(mut self, repo: impl Into<String>, branch: impl Into<String>) -> Self {
        self.template_repo = repo.into();
        self.template_branch = branch.into();
        self
    }

    /// Overrides the stop timeout.
    pub fn with_stop_timeout(mut self, stop_timeout: Duration) -> Self {
        self.stop_timeout = stop_timeout;
        self
    }

    /// Path of the registry file.
    pub fn registry_path(&self) -> PathBuf {
        self.base_dir.join(REGISTRY_FILENAME)
    }

    /// Path of an instance directory.
    pub fn instance_dir(&self, folder_name: &str) -> PathBuf {
        self.base_dir.join(folder_name)
    }
}

/// Paths inside an instance directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceLayout {
    /// Where the template repository is checked out.
    pub checkout_dir: PathBuf,

    /// The compose deployment directory.
    pub compose_dir: PathBuf,

    /// `.env.example` shipped by the template.
    pub env_template: PathBuf,

    /// Materialized `.env`.
    pub env_file: PathBuf,

    /// `docker-compose.yml`.
    pub compose_file: PathBuf,
}

impl InstanceLayout {
    /// Lays out the files of the instance directory at `instance_dir`.
    pub fn new(instance_dir: &Path) -> Self {
        let checkout_dir = instance_dir.join(TEMPLATE_CHECKOUT_SUBDIR);
        let compose_dir = checkout_dir.join(COMPOSE_SUBDIR);

        Self {
            env_template: compose_dir.join(ENV_TEMPLATE_FILENAME),
            env_file: compose_dir.join(ENV_FILENAME),
            compose_file: compose_dir.join(COMPOSE_FILENAME),
            checkout_dir,
            compose_dir,
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
