//! Slash-delimited path handling.
//!
//! Normalized paths always start with `/`, never end with one (except the
//! root itself), and contain no empty, `.` or `..` segments. `..` never
//! climbs above the root.

/// Normalize a path.
pub fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    format!("/{}", parts.join("/"))
}

/// Iterate the segments of a normalized path.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// True if the path names the root.
pub fn is_root(path: &str) -> bool {
    segments(path).next().is_none()
}

/// Split into `(parent, name)`. Returns `None` for the root.
pub fn split_parent(path: &str) -> Option<(String, String)> {
    let normalized = normalize(path);
    let (parent, name) = normalized.rsplit_once('/')?;
    if name.is_empty() {
        return None;
    }
    let parent = if parent.is_empty() { "/" } else { parent };
    Some((parent.to_string(), name.to_string()))
}

/// Parent of a path; the root is its own parent.
pub fn parent(path: &str) -> String {
    split_parent(path)
        .map(|(parent, _)| parent)
        .unwrap_or_else(|| "/".to_string())
}

/// Join a child path onto a base.
pub fn join(base: &str, child: &str) -> String {
    normalize(&format!("{base}/{child}"))
}

/// Strip `prefix` from `path`, returning the remainder as a rooted path.
///
/// `strip_prefix("/a/b/c", "/a")` is `Some("/b/c")`; a path equal to the
/// prefix yields `Some("/")`; a path outside the prefix yields `None`.
pub fn strip_prefix(path: &str, prefix: &str) -> Option<String> {
    let path = normalize(path);
    let prefix = normalize(prefix);
    if prefix == "/" {
        return Some(path);
    }
    if path == prefix {
        return Some("/".to_string());
    }
    let rest = path.strip_prefix(&prefix)?.strip_prefix('/')?;
    Some(format!("/{rest}"))
}

/// True if `path` is `ancestor` or lies beneath it.
pub fn is_within(path: &str, ancestor: &str) -> bool {
    strip_prefix(path, ancestor).is_some()
}
