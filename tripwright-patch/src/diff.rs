//! Structural diff: fine-grained for maps, coarse for sequences.

use serde_json::Value;

/// Root path reported when the whole value differs.
pub const ROOT_PATH: &str = "$";

/// Dotted paths at which `before` and `after` differ.
///
/// Maps are descended to the most specific differing key. Sequences and
/// scalars report their own path. A value whose JSON type changed reports
/// its own path.
pub fn changed_paths(before: &Value, after: &Value) -> Vec<String> {
    let mut out = Vec::new();
    collect(before, after, "", &mut out);
    out
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

fn here(prefix: &str) -> String {
    if prefix.is_empty() {
        ROOT_PATH.to_string()
    } else {
        prefix.to_string()
    }
}

fn collect(before: &Value, after: &Value, prefix: &str, out: &mut Vec<String>) {
    match (before, after) {
        (Value::Object(a), Value::Object(b)) => {
            for (key, left) in a {
                match b.get(key) {
                    Some(right) => collect(left, right, &join(prefix, key), out),
                    None => out.push(join(prefix, key)),
                }
            }
            for key in b.keys() {
                if !a.contains_key(key) {
                    out.push(join(prefix, key));
                }
            }
        }
        _ => {
            if before != after {
                out.push(here(prefix));
            }
        }
    }
}

/// Whether `path` is `prefix` or lies under it.
///
/// Matching is per path segment: `policy` covers `policy.rules` but not
/// `policy_version`.
pub fn path_has_prefix(path: &str, prefix: &str) -> bool {
    path == prefix
        || (path.len() > prefix.len()
            && path.starts_with(prefix)
            && path.as_bytes()[prefix.len()] == b'.')
}
