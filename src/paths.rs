//! Path resolution against an explicit base directory
//!
//! Nothing in the library reads the process working directory. Callers pass
//! the base directory once at run start and every relative path is resolved
//! through these helpers.

use std::path::{Component, Path, PathBuf};

/// Resolve `path` against `base` unless it is already absolute
pub fn absolutize(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize(path)
    } else {
        normalize(&base.join(path))
    }
}

/// Join a path read from a document onto a base directory.
///
/// Backslashes are treated as separators and leading separators are dropped,
/// so the result always lives below `base`.
pub fn join(base: &Path, relative: &str) -> PathBuf {
    let unified = relative.replace('\\', "/");
    let trimmed = unified.trim_start_matches('/');
    normalize(&base.join(trimmed))
}

/// Lexically fold `.` and `..` components and duplicate separators
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Render `path` relative to `base` with forward slashes.
///
/// Climbs out of `base` with `..` where needed, so the result joined back
/// onto `base` names `path` again. Paths on different roots are returned
/// unchanged.
pub fn relative_to(path: &Path, base: &Path) -> String {
    let path = normalize(path);
    let base = normalize(base);

    fn root(p: &Path) -> Option<Component<'_>> {
        p.components()
            .next()
            .filter(|c| matches!(c, Component::Prefix(_) | Component::RootDir))
    }
    if root(&path) != root(&base) {
        return path.to_string_lossy().replace('\\', "/");
    }

    let common = path
        .components()
        .zip(base.components())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = base
        .components()
        .skip(common)
        .map(|_| "..".to_string())
        .collect();
    parts.extend(
        path.components()
            .skip(common)
            .map(|c| c.as_os_str().to_string_lossy().to_string()),
    );

    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}
