use std::path::Path;

use async_trait::async_trait;
use supafleet_utils::COMPOSE_SUBDIR;
use tokio::fs;

use super::{process, TemplateSource};
use crate::{config::ManagerConfig, SupafleetResult};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const GIT_PROGRAM: &str = "git";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Fetches the deployment templates from a git repository with a sparse, blobless clone.
///
/// A clone that fails part way is deleted so the next attempt clones again instead of pulling
/// into an incomplete checkout.
#[derive(Debug, Clone)]
pub struct GitTemplateSource {
    program: String,
    repo: String,
    branch: String,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl GitTemplateSource {
    /// Creates a source for `branch` of `repo`.
    pub fn new(repo: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            program: GIT_PROGRAM.to_string(),
            repo: repo.into(),
            branch: branch.into(),
        }
    }

    /// Uses another `git` binary.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Creates a source for the repository named in a manager configuration.
    pub fn from_config(config: &ManagerConfig) -> Self {
        Self::new(config.get_template_repo(), config.get_template_branch())
    }

    async fn clone_into(&self, target_dir: &Path) -> SupafleetResult<()> {
        let parent = target_dir.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(parent).await?;

        let target = target_dir.to_string_lossy();
        tracing::info!("cloning {} into {}", self.repo, target);

        process::run(
            &self.program,
            &[
                "clone",
                "--filter=blob:none",
                "--no-checkout",
                self.repo.as_str(),
                target.as_ref(),
            ],
            Some(parent),
        )
        .await?;

        process::run(
            &self.program,
            &["sparse-checkout", "set", COMPOSE_SUBDIR],
            Some(target_dir),
        )
        .await?;

        process::run(
            &self.program,
            &["checkout", self.branch.as_str()],
            Some(target_dir),
        )
        .await?;

        Ok(())
    }

    async fn update(&self, target_dir: &Path) {
        tracing::info!("updating template checkout at {}", target_dir.display());

        if let Err(e) = process::run(
            &self.program,
            &["pull", "origin", self.branch.as_str()],
            Some(target_dir),
        )
        .await
        {
            tracing::warn!(
                "could not update {}, using the existing checkout: {}",
                target_dir.display(),
                e
            );
        }
    }

    async fn discard(&self, target_dir: &Path) {
        if !fs::try_exists(target_dir).await.unwrap_or(false) {
            return;
        }

        match fs::remove_dir_all(target_dir).await {
            Ok(()) => tracing::info!("removed incomplete checkout at {}", target_dir.display()),
            Err(e) => tracing::warn!(
                "could not remove incomplete checkout at {}: {}",
                target_dir.display(),
                e
            ),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl TemplateSource for GitTemplateSource {
    async fn ensure_present(&self, target_dir: &Path) -> SupafleetResult<()> {
        let has_git = fs::try_exists(target_dir.join(".git"))
            .await
            .unwrap_or(false);
        let has_templates = fs::try_exists(target_dir.join(COMPOSE_SUBDIR))
            .await
            .unwrap_or(false);

        if has_git && has_templates {
            self.update(target_dir).await;
            return Ok(());
        }

        self.discard(target_dir).await;
        if let Err(e) = self.clone_into(target_dir).await {
            self.discard(target_dir).await;
            return Err(e);
        }

        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(all(test, unix))]
mod tests {
    use std::os::unix::fs::PermissionsExt;

    use tempfile::TempDir;

    use super::*;

    /// Writes a stand-in for `git` that logs its subcommands, creates `.git` on clone and
    /// fails the sparse checkout.
    fn failing_git(dir: &Path) -> (String, std::path::PathBuf) {
        let log = dir.join("git.log");
        let script = dir.join("git");
        std::fs::write(
            &script,
            format!(
                "#!/bin/sh\n\
                 echo \"$1\" >> '{}'\n\
                 case \"$1\" in\n\
                 clone) mkdir -p \"$5/.git\" ;;\n\
                 sparse-checkout) echo 'sparse checkout failed' >&2; exit 1 ;;\n\
                 esac\n",
                log.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        (script.to_string_lossy().into_owned(), log)
    }

    #[test_log::test(tokio::test)]
    async fn test_failed_clone_leaves_no_checkout() {
        let tools = TempDir::new().unwrap();
        let instance = TempDir::new().unwrap();
        let (git, log) = failing_git(tools.path());
        let source = GitTemplateSource::new("https://example.invalid/supabase", "master")
            .with_program(git);
        let target = instance.path().join("supabase");

        assert!(source.ensure_present(&target).await.is_err());
        assert!(!target.exists());

        assert!(source.ensure_present(&target).await.is_err());
        assert!(!target.exists());

        let calls = std::fs::read_to_string(&log).unwrap();
        let calls: Vec<&str> = calls.lines().collect();
        assert_eq!(
            calls,
            vec!["clone", "sparse-checkout", "clone", "sparse-checkout"]
        );
    }

    #[test_log::test(tokio::test)]
    async fn test_incomplete_checkout_is_cloned_again() {
        let tools = TempDir::new().unwrap();
        let instance = TempDir::new().unwrap();
        let (git, log) = failing_git(tools.path());
        let source = GitTemplateSource::new("https://example.invalid/supabase", "master")
            .with_program(git);
        let target = instance.path().join("supabase");
        std::fs::create_dir_all(target.join(".git")).unwrap();

        assert!(source.ensure_present(&target).await.is_err());
        assert!(!target.exists());
        assert!(!std::fs::read_to_string(&log).unwrap().contains("pull"));
    }
}
