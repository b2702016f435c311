//! Argument extraction helper for meta-tool handlers (§4.H step 1):
//! "tolerate missing / non-object; default to empty."

use serde_json::Value;

use crate::server::error::{ServerError, ServerResult};

/// Extension trait over the raw `arguments` value an inbound meta-tool
/// call carries.
pub trait ArgsExt {
    fn require_str(&self, key: &str) -> ServerResult<String>;
    fn optional_str(&self, key: &str) -> Option<String>;
    fn optional_bool(&self, key: &str, default: bool) -> bool;
    fn require_object(&self, key: &str) -> ServerResult<serde_json::Map<String, Value>>;
    fn optional_string_map(&self, key: &str) -> std::collections::HashMap<String, String>;
}

/// Tolerates a missing or non-object `arguments` value by treating it as
/// an empty object, per the forward pipeline's first step.
pub fn normalize_arguments(arguments: Option<Value>) -> Value {
    match arguments {
        Some(Value::Object(map)) => Value::Object(map),
        _ => Value::Object(serde_json::Map::new()),
    }
}

impl ArgsExt for Value {
    fn require_str(&self, key: &str) -> ServerResult<String> {
        self.get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ServerError::MissingArgument(key.to_string()))
    }

    fn optional_str(&self, key: &str) -> Option<String> {
        self.get(key).and_then(Value::as_str).map(str::to_string)
    }

    fn optional_bool(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    fn require_object(&self, key: &str) -> ServerResult<serde_json::Map<String, Value>> {
        self.get(key)
            .and_then(Value::as_object)
            .cloned()
            .ok_or_else(|| ServerError::MissingArgument(key.to_string()))
    }

    fn optional_string_map(&self, key: &str) -> std::collections::HashMap<String, String> {
        self.get(key)
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_arguments_normalizes_to_empty_object() {
        assert_eq!(normalize_arguments(None), json!({}));
        assert_eq!(normalize_arguments(Some(json!("not an object"))), json!({}));
    }

    #[test]
    fn require_str_reports_missing_key() {
        let args = json!({});
        assert!(matches!(
            args.require_str("name"),
            Err(ServerError::MissingArgument(ref k)) if k == "name"
        ));
    }
}
