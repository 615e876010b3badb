//! Lexical path handling
//!
//! Nothing here touches the disk. Sandboxing decisions must be made before
//! any file is opened, so symlinks are deliberately not resolved.

use std::path::{Component, Path, PathBuf};

/// Lexically normalize a path: drop `.` segments and fold `name/..` pairs.
///
/// Leading `..` segments of a relative path are kept, and `..` directly below
/// the root is dropped (`/..` is `/`).
pub fn normalize(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }

    out.iter().collect()
}

/// Whether a normalized relative path still climbs upward.
pub fn has_parent_segment(path: &Path) -> bool {
    path.components()
        .any(|component| matches!(component, Component::ParentDir))
}

/// Whether `path` equals `root` or lies below it. Both are normalized first.
pub fn is_within(path: &Path, root: &Path) -> bool {
    let path = normalize(path);
    let root = normalize(root);

    match path.strip_prefix(&root) {
        Ok(rest) => !has_parent_segment(rest),
        Err(_) => false,
    }
}

/// Join normalized components with `/`, the separator used inside archives.
pub fn to_archive_name(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(name) => Some(name.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Lowercase extension of a path, without the dot.
pub fn extension_lowercase(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}
