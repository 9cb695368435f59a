//! Lexical path helpers.
//!
//! Resource paths are compared after lexical normalization only; the file
//! system is never consulted, so symlinks are not resolved.

use std::path::{Component, Path, PathBuf};

/// Removes `.` components and folds `..` into the preceding normal component.
///
/// A `..` that cannot be folded is kept for relative paths and dropped at a
/// filesystem root, matching `std::filesystem::path::lexically_normal`.
#[must_use]
pub fn lexically_normal(path: &Path) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        return PathBuf::from(".");
    }
    parts.iter().collect()
}

/// True if `path` is already in lexically normal form, spelled exactly.
///
/// `Path` equality ignores interior `.` components, so the raw spellings are compared.
#[must_use]
pub fn is_lexically_normal(path: &Path) -> bool {
    lexically_normal(path).as_os_str() == path.as_os_str()
}

/// True if `path` contains a `..` component anywhere.
#[must_use]
pub fn has_parent_component(path: &Path) -> bool {
    path.components().any(|c| matches!(c, Component::ParentDir))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_dot_and_dotdot() {
        assert_eq!(lexically_normal(Path::new("a/./b.obj")), PathBuf::from("a/b.obj"));
        assert_eq!(lexically_normal(Path::new("a/c/../b.obj")), PathBuf::from("a/b.obj"));
        assert_eq!(lexically_normal(Path::new("../x")), PathBuf::from("../x"));
        assert_eq!(lexically_normal(Path::new("./")), PathBuf::from("."));
    }

    #[test]
    fn dotdot_at_root_is_dropped() {
        assert_eq!(lexically_normal(Path::new("/../tmp/a")), PathBuf::from("/tmp/a"));
    }

    #[test]
    fn detects_parent_components() {
        assert!(has_parent_component(Path::new("meshes/../x.obj")));
        assert!(!has_parent_component(Path::new("meshes/x.obj")));
        assert!(is_lexically_normal(Path::new("meshes/x.obj")));
        assert!(!is_lexically_normal(Path::new("meshes/./x.obj")));
    }
}
