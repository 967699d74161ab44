//! Quote option normalization.

use serde_json::Value;
use tripwright_core::{QuoteOption, ValidationError};

fn malformed(operation: &str, reason: String) -> ValidationError {
    ValidationError::MalformedResult {
        operation: operation.to_string(),
        reason,
    }
}

/// Read an id-like field as a non-empty string.
fn id_field(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Turn a JSON list of options into [`QuoteOption`]s with stable ids.
///
/// Options without `option_id` fall back to `id`, then to a synthesized
/// `{prefix}_{position}`. `null` or an absent list yields no options.
pub fn normalize_options(
    operation: &str,
    field: &str,
    raw: Option<&Value>,
    prefix: &str,
) -> Result<Vec<QuoteOption>, ValidationError> {
    let items = match raw {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(malformed(
                operation,
                format!("{} must be a list, got {}", field, type_name(other)),
            ))
        }
    };

    items
        .iter()
        .enumerate()
        .map(|(pos, item)| {
            let Value::Object(map) = item else {
                return Err(malformed(
                    operation,
                    format!("{}[{}] is not an object", field, pos),
                ));
            };
            let mut details = map.clone();
            let option_id = id_field(details.remove("option_id").as_ref())
                .or_else(|| id_field(details.get("id")))
                .unwrap_or_else(|| format!("{}_{}", prefix, pos));
            Ok(QuoteOption { option_id, details })
        })
        .collect()
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_synthesizes_missing_ids() {
        let raw = json!([{"price": 100}, {"option_id": "AA1", "price": 120}, {"id": 77}]);
        let options = normalize_options("flight_quote_search", "options", Some(&raw), "flt_seg2").unwrap();
        let ids: Vec<_> = options.iter().map(|o| o.option_id.as_str()).collect();
        assert_eq!(ids, vec!["flt_seg2_0", "AA1", "77"]);
        assert!(!options[1].details.contains_key("option_id"));
        assert_eq!(options[0].details["price"], json!(100));
    }

    #[test]
    fn test_synthesized_ids_are_deterministic() {
        let raw = json!([{"price": 1}, {"price": 2}]);
        let a = normalize_options("x", "options", Some(&raw), "htl_stay0").unwrap();
        let b = normalize_options("x", "options", Some(&raw), "htl_stay0").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_blank_option_id_is_replaced() {
        let raw = json!([{"option_id": "  "}]);
        let options = normalize_options("x", "options", Some(&raw), "flt_seg0").unwrap();
        assert_eq!(options[0].option_id, "flt_seg0_0");
    }

    #[test]
    fn test_non_object_option_is_malformed() {
        let raw = json!([{"price": 1}, "cheap one"]);
        let err = normalize_options("flight_quote_search", "options", Some(&raw), "flt_seg0").unwrap_err();
        assert!(err.to_string().contains("options[1] is not an object"));
    }

    #[test]
    fn test_absent_list_is_empty() {
        assert!(normalize_options("x", "options", None, "p").unwrap().is_empty());
        assert!(normalize_options("x", "options", Some(&Value::Null), "p").unwrap().is_empty());
        assert!(normalize_options("x", "options", Some(&json!({})), "p").is_err());
    }
}
