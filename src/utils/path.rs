/// Collapses duplicate slashes and resolves `.` / `..` segments.
///
/// Absolute paths never climb above `/`; relative paths keep leading `..`
/// segments they cannot resolve. A trailing slash is not preserved.
pub fn normalize_path(path: &str) -> String {
    let is_absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if matches!(parts.last(), Some(last) if *last != "..") {
                    parts.pop();
                } else if !is_absolute {
                    parts.push("..");
                }
            }
            _ => parts.push(part),
        }
    }

    let joined = parts.join("/");
    if is_absolute {
        format!("/{}", joined)
    } else {
        joined
    }
}

/// Joins `rel` onto `base` with exactly one separator, then normalizes.
pub fn join_paths(base: &str, rel: &str) -> String {
    if base.is_empty() {
        return normalize_path(rel);
    }
    if rel.is_empty() {
        return normalize_path(base);
    }

    let mut joined = String::with_capacity(base.len() + rel.len() + 1);
    joined.push_str(base.trim_end_matches('/'));
    joined.push('/');
    joined.push_str(rel.trim_start_matches('/'));
    normalize_path(&joined)
}

/// True when `path` is `root` itself or lies underneath it, compared
/// segment by segment on normalized forms.
pub fn is_within(root: &str, path: &str) -> bool {
    let root = normalize_path(root);
    let path = normalize_path(path);

    if root.is_empty() || root == "/" {
        // "" is the process cwd: anything not climbing out of it qualifies.
        return root == "/" || !(path == ".." || path.starts_with("../") || path.starts_with('/'));
    }

    path == root || path.strip_prefix(&root).is_some_and(|rest| rest.starts_with('/'))
}
