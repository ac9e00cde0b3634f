//! Validate tool input against its JSON Schema before the handler runs.

use serde_json::Value;

/// Validate tool arguments against a JSON Schema.
///
/// Covers the subset of JSON Schema that tool declarations use: the top-level
/// object type, required fields, per-property primitive types, string enums,
/// and the item type of arrays. Returns the first violation found.
pub fn validate_arguments(args: &Value, schema: &Value) -> Result<(), String> {
    if schema.get("type").and_then(Value::as_str) == Some("object") && !args.is_object() {
        return Err(format!(
            "expected object arguments, got {}",
            json_type_name(args)
        ));
    }

    let Some(obj) = args.as_object() else {
        return Ok(());
    };

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for name in required.iter().filter_map(Value::as_str) {
            if !obj.contains_key(name) {
                return Err(format!("missing required field '{name}'"));
            }
        }
    }

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(());
    };

    for (key, value) in obj {
        if let Some(prop_schema) = properties.get(key) {
            check_property(key, value, prop_schema)?;
        }
    }

    Ok(())
}

fn check_property(key: &str, value: &Value, prop_schema: &Value) -> Result<(), String> {
    if let Some(expected) = prop_schema.get("type").and_then(Value::as_str) {
        if !value_matches_type(value, expected) {
            return Err(format!(
                "field '{key}' expected type '{expected}', got {}",
                json_type_name(value)
            ));
        }
    }

    if let Some(allowed) = prop_schema.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            return Err(format!("field '{key}' must be one of {}", Value::Array(allowed.clone())));
        }
    }

    if let (Some(items), Some(item_type)) = (
        value.as_array(),
        prop_schema
            .get("items")
            .and_then(|items| items.get("type"))
            .and_then(Value::as_str),
    ) {
        for (index, item) in items.iter().enumerate() {
            if !value_matches_type(item, item_type) {
                return Err(format!(
                    "field '{key}[{index}]' expected type '{item_type}', got {}",
                    json_type_name(item)
                ));
            }
        }
    }

    Ok(())
}

fn value_matches_type(value: &Value, expected: &str) -> bool {
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

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
