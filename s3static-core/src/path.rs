//! Lexical path cleaning

/// Return the shortest path equivalent to `path` by purely lexical processing.
///
/// Repeated separators collapse to one, `.` segments are dropped and each
/// `..` removes the segment before it. A `..` at the root of a rooted path is
/// dropped; in a relative path it is kept. The result never ends in `/`
/// unless it is the root itself, and an empty result becomes `.`.
///
/// No filesystem is consulted: object keys are opaque strings, so this only
/// tidies the shape of a request path and is not a sandbox.
pub fn clean(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }

    let rooted = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    let mut parents = 0usize;

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() && !rooted {
                    parents += 1;
                }
            }
            other => segments.push(other),
        }
    }

    let mut parts: Vec<&str> = std::iter::repeat("..").take(parents).collect();
    parts.extend(segments);
    let joined = parts.join("/");

    if rooted {
        format!("/{}", joined)
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}
