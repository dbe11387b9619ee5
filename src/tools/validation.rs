//! Validate tool call arguments against a JSON Schema subset before execution.
//!
//! Supported keywords: `type`, `required`, `properties`, `items`, `enum`.
//! Unknown keywords are ignored.

/// Validate tool arguments against a JSON Schema.
///
/// Returns `Err(message)` describing the first violation found, with a
/// dotted path to the offending field.
pub fn validate_arguments(
    args: &serde_json::Value,
    schema: &serde_json::Value,
) -> Result<(), String> {
    validate_at("", args, schema)
}

fn validate_at(path: &str, value: &serde_json::Value, schema: &serde_json::Value) -> Result<(), String> {
    if let Some(expected) = schema.get("type").and_then(|v| v.as_str()) {
        if !value_matches_type(value, expected) {
            return Err(if path.is_empty() {
                format!("expected {expected} arguments, got {}", json_type_name(value))
            } else {
                format!(
                    "field '{path}' expected type '{expected}', got {}",
                    json_type_name(value)
                )
            });
        }
    }

    if let Some(allowed) = schema.get("enum").and_then(|v| v.as_array()) {
        if !allowed.contains(value) {
            return Err(format!("field '{path}' must be one of {}", serde_json::Value::from(allowed.clone())));
        }
    }

    if let Some(obj) = value.as_object() {
        if let Some(required) = schema.get("required").and_then(|v| v.as_array()) {
            for name in required.iter().filter_map(|f| f.as_str()) {
                if !obj.contains_key(name) {
                    return Err(format!("missing required field '{}'", join(path, name)));
                }
            }
        }
        if let Some(properties) = schema.get("properties").and_then(|v| v.as_object()) {
            for (key, field) in obj {
                if let Some(prop_schema) = properties.get(key) {
                    validate_at(&join(path, key), field, prop_schema)?;
                }
            }
        }
    }

    if let (Some(items), Some(elements)) = (schema.get("items"), value.as_array()) {
        for (index, element) in elements.iter().enumerate() {
            validate_at(&format!("{path}[{index}]"), element, items)?;
        }
    }

    Ok(())
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn value_matches_type(value: &serde_json::Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn add_schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "a": { "type": "number" },
                "b": { "type": "number" },
            },
            "required": ["a", "b"],
        })
    }

    #[test]
    fn accepts_matching_arguments() {
        assert!(validate_arguments(&json!({ "a": 2, "b": 2 }), &add_schema()).is_ok());
    }

    #[test]
    fn rejects_non_object_arguments() {
        let err = validate_arguments(&json!("2+2"), &add_schema()).unwrap_err();
        assert!(err.contains("expected object arguments"));
    }

    #[test]
    fn reports_first_missing_required_field() {
        let err = validate_arguments(&json!({ "a": 1 }), &add_schema()).unwrap_err();
        assert_eq!(err, "missing required field 'b'");
    }

    #[test]
    fn rejects_wrong_property_type() {
        let err = validate_arguments(&json!({ "a": "two", "b": 2 }), &add_schema()).unwrap_err();
        assert!(err.contains("field 'a' expected type 'number', got string"));
    }

    #[test]
    fn integer_rejects_fractional_numbers() {
        let schema = json!({ "type": "object", "properties": { "n": { "type": "integer" } } });
        assert!(validate_arguments(&json!({ "n": 3 }), &schema).is_ok());
        assert!(validate_arguments(&json!({ "n": 3.5 }), &schema).is_err());
    }

    #[test]
    fn nested_paths_are_reported() {
        let schema = json!({
            "type": "object",
            "properties": {
                "filter": {
                    "type": "object",
                    "properties": { "tags": { "type": "array", "items": { "type": "string" } } },
                    "required": ["tags"],
                },
            },
        });

        let missing = validate_arguments(&json!({ "filter": {} }), &schema).unwrap_err();
        assert_eq!(missing, "missing required field 'filter.tags'");

        let bad_item = validate_arguments(&json!({ "filter": { "tags": ["a", 1] } }), &schema).unwrap_err();
        assert!(bad_item.contains("field 'filter.tags[1]'"));
    }

    #[test]
    fn enum_values_are_enforced() {
        let schema = json!({
            "type": "object",
            "properties": { "unit": { "type": "string", "enum": ["c", "f"] } },
        });
        assert!(validate_arguments(&json!({ "unit": "c" }), &schema).is_ok());
        assert!(validate_arguments(&json!({ "unit": "k" }), &schema)
            .unwrap_err()
            .contains("must be one of"));
    }

    #[test]
    fn empty_schema_accepts_anything() {
        assert!(validate_arguments(&json!(null), &json!({})).is_ok());
        assert!(validate_arguments(&json!({ "x": [1, 2] }), &json!({})).is_ok());
    }
}
