//! Path canonicalization and normalization utilities

use crate::error::IsoenvError;
use std::path::{Component, Path, PathBuf};

/// Canonicalize an existing path (resolves symlinks, `..`, `.`)
///
/// Uses dunce so Windows paths do not come back in verbatim `\\?\` form.
pub fn canonicalize_path(path: &Path) -> Result<PathBuf, IsoenvError> {
    dunce::canonicalize(path).map_err(|source| IsoenvError::Canonicalize {
        path: path.to_path_buf(),
        source,
    })
}

/// Normalize a path without touching the filesystem
///
/// Collapses `.` components and duplicate separators, and folds `..` into the
/// preceding normal component. Leading `..` on relative paths is kept; `..`
/// directly under the root is dropped. An empty result becomes `.`.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
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

/// Number of normal segments in a path; used to order directories deepest-first.
pub fn depth(path: &Path) -> usize {
    path.components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .count()
}
