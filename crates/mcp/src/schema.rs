//! Conversion of a remote tool's native input schema into the JSON-Schema
//! object shape the catalog and the model expect.

use serde_json::{Map, Value, json};

/// Normalize a remote `inputSchema`.
///
/// - missing / null → `{type: object, properties: {}}`
/// - object without `type` → `type: object` injected
/// - object of a non-object type, or any non-object value → wrapped as
///   `{type: object, properties: {input: <schema>}}`
/// - `properties` defaulted to `{}`
pub fn normalize_schema(schema: &Value) -> Value {
    let mut object = match schema {
        Value::Null => Map::new(),
        Value::Object(map) => match map.get("type") {
            None => map.clone(),
            Some(Value::String(t)) if t == "object" => map.clone(),
            Some(_) => return wrap(schema.clone()),
        },
        other => return wrap(other.clone()),
    };

    object.insert("type".into(), Value::String("object".into()));
    if !matches!(object.get("properties"), Some(Value::Object(_))) {
        object.insert("properties".into(), Value::Object(Map::new()));
    }
    Value::Object(object)
}

/// Whether [`normalize_schema`] wraps this schema under an `input` property.
pub fn wraps_input(schema: &Value) -> bool {
    match schema {
        Value::Null => false,
        Value::Object(map) => match map.get("type") {
            None => false,
            Some(Value::String(t)) => t != "object",
            Some(_) => true,
        },
        _ => true,
    }
}

fn wrap(inner: Value) -> Value {
    json!({
        "type": "object",
        "properties": { "input": inner },
        "required": ["input"]
    })
}

/// Description shown for a remote tool, with a fallback when the source sends none.
pub fn describe(description: Option<&str>, tool_name: &str, source_id: &str) -> String {
    match description.map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => format!("Remote tool {tool_name} from {source_id}"),
    }
}
