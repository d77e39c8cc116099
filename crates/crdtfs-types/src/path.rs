//! Path strings as flat keys.
//!
//! The path map is keyed by absolute path strings. Hierarchy is never stored:
//! parent, child and descendant relations are all derived here from prefix
//! relationships between normalized path strings.
//!
//! Normalized form: starts with `/`, no trailing `/` (except the root itself),
//! no empty components, no `.` or `..` components.

/// Path component separator.
pub const SEPARATOR: char = '/';

/// The root path.
pub const ROOT: &str = "/";

/// Error normalizing a path string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("path is not absolute: '{0}'")]
    NotAbsolute(String),
    #[error("path contains a '.' or '..' component: '{0}'")]
    DotComponent(String),
}

/// Normalize an absolute path: collapse repeated separators and drop trailing ones.
///
/// `.` and `..` are rejected rather than resolved; resolving them is the
/// dispatch adapter's job.
pub fn normalize(path: &str) -> Result<String, PathError> {
    if !path.starts_with(SEPARATOR) {
        return Err(PathError::NotAbsolute(path.to_string()));
    }

    let mut out = String::with_capacity(path.len());
    for component in path.split(SEPARATOR).filter(|c| !c.is_empty()) {
        if component == "." || component == ".." {
            return Err(PathError::DotComponent(path.to_string()));
        }
        out.push(SEPARATOR);
        out.push_str(component);
    }

    if out.is_empty() {
        out.push(SEPARATOR);
    }
    Ok(out)
}

/// Returns true if `path` is the root.
pub fn is_root(path: &str) -> bool {
    path == ROOT
}

/// Parent of a path. The root is its own parent.
///
/// Pure string manipulation: trailing separators are stripped, then the path
/// is cut at the last separator.
pub fn parent_of(path: &str) -> &str {
    let trimmed = path.trim_end_matches(SEPARATOR);
    match trimmed.rfind(SEPARATOR) {
        Some(0) | None => ROOT,
        Some(i) => &trimmed[..i],
    }
}

/// Last component of a path. Empty for the root.
pub fn name_of(path: &str) -> &str {
    let trimmed = path.trim_end_matches(SEPARATOR);
    match trimmed.rfind(SEPARATOR) {
        Some(i) => &trimmed[i + 1..],
        None => trimmed,
    }
}

/// The prefix every strict descendant of `dir` starts with.
pub fn child_prefix(dir: &str) -> String {
    if is_root(dir) {
        ROOT.to_string()
    } else {
        format!("{}{}", dir, SEPARATOR)
    }
}

/// Join a directory path and a relative suffix.
pub fn join(dir: &str, suffix: &str) -> String {
    let mut joined = child_prefix(dir);
    joined.push_str(suffix.trim_start_matches(SEPARATOR));
    joined
}

/// The part of `path` below `ancestor`, if `path` is a strict descendant.
///
/// `strip_ancestor("/a", "/a/b/c") == Some("b/c")`, while `/ab` is not a
/// descendant of `/a`.
pub fn strip_ancestor<'a>(ancestor: &str, path: &'a str) -> Option<&'a str> {
    let rest = if is_root(ancestor) {
        path.strip_prefix(SEPARATOR)?
    } else {
        path.strip_prefix(ancestor)?.strip_prefix(SEPARATOR)?
    };
    if rest.is_empty() { None } else { Some(rest) }
}

/// Returns true if `path` lies strictly below `ancestor`.
pub fn is_descendant(ancestor: &str, path: &str) -> bool {
    strip_ancestor(ancestor, path).is_some()
}

/// Returns true if `path` is an immediate child of `parent`.
pub fn is_child(parent: &str, path: &str) -> bool {
    strip_ancestor(parent, path).is_some_and(|rest| !rest.contains(SEPARATOR))
}
