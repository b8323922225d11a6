/// Join a remote directory path and an entry name with a single '/'.
/// The root "/" stays rooted ("/" + "x" -> "/x").
pub fn remote_join(base: &str, name: &str) -> String {
    if base.is_empty() {
        return name.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), name)
}

/// Final component of a remote path, ignoring trailing slashes.
/// Returns None for "/" or an empty path.
pub fn remote_basename(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches('/');
    let name = match trimmed.rfind('/') {
        Some(pos) => &trimmed[pos + 1..],
        None => trimmed,
    };
    if name.is_empty() || name == "." || name == ".." { None } else { Some(name) }
}

// Lightweight path display wrapper that renders with forward slashes.
// Avoids allocating strings until actually formatted for logs.
pub(crate) struct DisplayPath<'a>(pub(crate) &'a std::path::Path);

impl<'a> std::fmt::Display for DisplayPath<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = self.0.to_string_lossy().to_string();
        let out = normalize_path(&s, true);
        f.write_str(&out)
    }
}

pub(crate) fn display_path(p: &std::path::Path) -> DisplayPath<'_> {
    DisplayPath(p)
}

/// Normalize a path-like string for internal use:
/// - converts backslashes to forward slashes
/// - collapses repeated slashes
/// - optionally preserves a trailing slash
pub fn normalize_path(p: &str, preserve_trailing_slash: bool) -> String {
    if p.is_empty() {
        return String::new();
    }
    let mut s = p.replace('\\', "/");
    while s.contains("//") {
        s = s.replace("//", "/");
    }
    if !preserve_trailing_slash {
        // Strip trailing slashes, but keep root "/"
        while s.len() > 1 && s.ends_with('/') {
            s.pop();
        }
    }
    s
}
