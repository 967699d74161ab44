//! Recursive structural merge.

use serde_json::{Map, Value};

/// How one patch key combines with the document value under it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStep {
    /// Both sides are maps: merge key by key.
    Recurse,
    /// Anything else, including a shape change: the patch value wins.
    Replace,
}

/// Decide between recursing and replacing for one key.
pub fn merge_step(existing: Option<&Value>, incoming: &Value) -> MergeStep {
    match (existing, incoming) {
        (Some(Value::Object(_)), Value::Object(_)) => MergeStep::Recurse,
        _ => MergeStep::Replace,
    }
}

/// Merge `patch` into `target` in place. Sequences are replaced whole.
pub fn deep_merge(target: &mut Map<String, Value>, patch: &Map<String, Value>) {
    for (key, incoming) in patch {
        match merge_step(target.get(key), incoming) {
            MergeStep::Recurse => {
                if let (Some(Value::Object(dst)), Value::Object(src)) = (target.get_mut(key), incoming)
                {
                    deep_merge(dst, src);
                }
            }
            MergeStep::Replace => {
                target.insert(key.clone(), incoming.clone());
            }
        }
    }
}
