//! Key spelling compatibility.
//!
//! The remote service hands out documents with camelCase keys, but older
//! files (and some nested structures) still carry the kebab-case spelling.
//! Every lookup in this crate goes through [`lookup`] so the two spellings
//! are reconciled in one place.

use serde_json::{Map, Value};

/// Converts a camelCase key to its kebab-case spelling.
///
/// `parentId` becomes `parent-id`, `fillColorRefId` becomes
/// `fill-color-ref-id`. Keys that are already lowercase are returned as-is.
#[must_use]
pub fn to_kebab_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    let mut prev_lower_or_digit = false;

    for ch in key.chars() {
        if ch.is_ascii_uppercase() {
            if prev_lower_or_digit {
                out.push('-');
            }
            out.push(ch.to_ascii_lowercase());
            prev_lower_or_digit = false;
        } else {
            prev_lower_or_digit = ch.is_ascii_lowercase() || ch.is_ascii_digit();
            out.push(ch);
        }
    }

    out
}

/// Looks up a camelCase key, falling back to its kebab-case spelling.
#[must_use]
pub fn lookup<'a>(map: &'a Map<String, Value>, camel: &str) -> Option<&'a Value> {
    match map.get(camel) {
        Some(value) if !value.is_null() => Some(value),
        _ => map.get(&to_kebab_case(camel)).filter(|v| !v.is_null()),
    }
}

/// Looks up a string under either key spelling. Empty strings count as absent.
#[must_use]
pub fn lookup_str<'a>(map: &'a Map<String, Value>, camel: &str) -> Option<&'a str> {
    lookup(map, camel)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Removes both spellings of a key.
pub fn remove_both(map: &mut Map<String, Value>, camel: &str) {
    map.remove(camel);
    map.remove(&to_kebab_case(camel));
}

/// Recursively rewrites every object key to kebab-case.
///
/// Values are left untouched; only keys change. Used when serialising
/// request bodies for the remote RPC API.
#[must_use]
pub fn kebab_case_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (to_kebab_case(&k), kebab_case_keys(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(kebab_case_keys).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kebab_conversion() {
        assert_eq!(to_kebab_case("parentId"), "parent-id");
        assert_eq!(to_kebab_case("fillColorRefId"), "fill-color-ref-id");
        assert_eq!(to_kebab_case("r1"), "r1");
        assert_eq!(to_kebab_case("frame-id"), "frame-id");
        assert_eq!(to_kebab_case("x1Offset"), "x1-offset");
    }

    #[test]
    fn lookup_prefers_camel_then_kebab() {
        let map = json!({"parent-id": "legacy"});
        let map = map.as_object().unwrap();
        assert_eq!(lookup_str(map, "parentId"), Some("legacy"));

        let both = json!({"parentId": "new", "parent-id": "legacy"});
        assert_eq!(lookup_str(both.as_object().unwrap(), "parentId"), Some("new"));
    }

    #[test]
    fn null_camel_falls_through() {
        let map = json!({"frameId": null, "frame-id": "f1"});
        assert_eq!(lookup_str(map.as_object().unwrap(), "frameId"), Some("f1"));
    }

    #[test]
    fn nested_keys_rewritten() {
        let body = json!({
            "sessionId": "s",
            "changes": [{"type": "add-obj", "pageId": "p", "obj": {"fillColor": "#fff"}}]
        });
        let converted = kebab_case_keys(body);
        assert_eq!(converted["session-id"], "s");
        assert_eq!(converted["changes"][0]["page-id"], "p");
        assert_eq!(converted["changes"][0]["obj"]["fill-color"], "#fff");
        // Values are not rewritten
        assert_eq!(converted["changes"][0]["type"], "add-obj");
    }
}
