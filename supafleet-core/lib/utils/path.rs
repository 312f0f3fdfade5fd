//! Utility functions for working with paths.

use std::path::{Component, Path};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Checks if a path contains a `..` component.
pub fn has_parent_component(path: &Path) -> bool {
    path.components()
        .any(|component| matches!(component, Component::ParentDir))
}

/// Checks if `child` sits directly inside `parent`, comparing whole components so that
/// `/data-evil/x` is not considered to be inside `/data`.
pub fn is_direct_child(parent: &Path, child: &Path) -> bool {
    let parent = strip_cur_dir(parent);
    let child = strip_cur_dir(child);

    match child.strip_prefix(&parent) {
        Ok(rest) => {
            let mut components = rest.components();
            matches!(
                (components.next(), components.next()),
                (Some(Component::Normal(_)), None)
            )
        }
        Err(_) => false,
    }
}

fn strip_cur_dir(path: &Path) -> std::path::PathBuf {
    path.components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect()
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_direct_child() {
        assert!(is_direct_child(Path::new("/data"), Path::new("/data/app")));
        assert!(is_direct_child(Path::new("/data/"), Path::new("/data/./app")));

        assert!(!is_direct_child(Path::new("/data"), Path::new("/data")));
        assert!(!is_direct_child(Path::new("/data"), Path::new("/data/app/logs")));
        assert!(!is_direct_child(Path::new("/data"), Path::new("/database/app")));
        assert!(!is_direct_child(Path::new("/data"), Path::new("/data-evil")));
        assert!(!is_direct_child(Path::new("/data"), Path::new("/etc")));
        assert!(!is_direct_child(Path::new("/data"), Path::new("/data/..")));
    }

    #[test]
    fn test_has_parent_component() {
        assert!(has_parent_component(Path::new("/data/../etc")));
        assert!(has_parent_component(Path::new("../data")));
        assert!(!has_parent_component(Path::new("/data/app..x")));
        assert!(!has_parent_component(Path::new("/data/app")));
    }
}
