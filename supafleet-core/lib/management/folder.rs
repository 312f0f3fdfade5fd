//! Instance directory naming and the checks that guard every use of a registered path.

use std::path::{Path, PathBuf};

use regex::Regex;
use supafleet_utils::INSTANCE_PREFIX;
use tokio::fs;

use crate::{
    config::InstanceId,
    utils::{has_parent_component, is_direct_child},
    SupafleetError, SupafleetResult,
};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Builds the directory name of an instance.
///
/// Without a name the folder is `instance<id>`. With one, the name is lower-cased, every run of
/// characters outside `[\w-]` becomes a single dash and the result is suffixed with
/// `-instance<id>`.
pub fn folder_name(id: InstanceId, name: Option<&str>) -> SupafleetResult<String> {
    let key = id.registry_key();

    let Some(name) = name else {
        return Ok(key);
    };

    let invalid_re = Regex::new(r"[^\w-]")?;
    let dashes_re = Regex::new(r"-+")?;

    let lowered = name.to_lowercase();
    let replaced = invalid_re.replace_all(&lowered, "-");
    let collapsed = dashes_re.replace_all(&replaced, "-");
    let slug = collapsed.trim_matches('-');

    if slug.is_empty() {
        Ok(key)
    } else {
        Ok(format!("{}-{}", slug, key))
    }
}

/// Checks that `path` is an instance directory of `id` inside `base_dir`.
///
/// The path must be absolute, free of `..`, a direct child of `base_dir` and named
/// `[<slug>-]instance<id>`. When it exists, the containment check is repeated on the resolved
/// paths so a symlink cannot point elsewhere. Registered paths pass this check before compose is
/// run in them, their configuration is rewritten or they are deleted. Returns the path to use.
pub fn ensure_contained(base_dir: &Path, path: &Path, id: InstanceId) -> SupafleetResult<PathBuf> {
    if !path.is_absolute() {
        return Err(SupafleetError::safety_violation(path, "path is not absolute"));
    }

    if has_parent_component(path) {
        return Err(SupafleetError::safety_violation(path, "path contains `..`"));
    }

    let base = std::path::absolute(base_dir).map_err(|e| {
        SupafleetError::safety_violation(path, format!("base folder cannot be resolved: {}", e))
    })?;

    if !is_direct_child(&base, path) {
        return Err(SupafleetError::safety_violation(
            path,
            format!("path is not directly inside {}", base.display()),
        ));
    }

    let folder = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| SupafleetError::safety_violation(path, "path has no folder name"))?;

    let folder_re = Regex::new(&format!(r"^([\w-]+-)?{}{}$", INSTANCE_PREFIX, id))?;
    if !folder_re.is_match(folder) {
        return Err(SupafleetError::safety_violation(
            path,
            format!("folder {:?} does not belong to instance {}", folder, id),
        ));
    }

    if !path.exists() {
        return Ok(path.to_path_buf());
    }

    let canonical_base = base.canonicalize().map_err(|e| {
        SupafleetError::safety_violation(path, format!("base folder cannot be resolved: {}", e))
    })?;
    let canonical = path.canonicalize().map_err(|e| {
        SupafleetError::safety_violation(path, format!("path cannot be resolved: {}", e))
    })?;

    if !is_direct_child(&canonical_base, &canonical) {
        return Err(SupafleetError::safety_violation(
            path,
            format!(
                "path resolves to {}, outside {}",
                canonical.display(),
                canonical_base.display()
            ),
        ));
    }

    Ok(canonical)
}

/// Deletes a directory that passed [`ensure_contained`]. Returns whether anything was deleted.
pub async fn remove_instance_dir(path: &Path) -> SupafleetResult<bool> {
    if !fs::try_exists(path).await.unwrap_or(false) {
        tracing::info!("instance directory {} is already gone", path.display());
        return Ok(false);
    }

    fs::remove_dir_all(path).await?;
    tracing::info!("removed instance directory {}", path.display());
    Ok(true)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
