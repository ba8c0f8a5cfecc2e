use arena_domain::repositories::payload::PayloadLocation;
use serde_json::{json, Map, Value};

/// A CSV file passed as the whole argument becomes a `series_csv` reference.
pub fn csv_reference(location: &PayloadLocation) -> Option<Value> {
    match location {
        PayloadLocation::File(path) if location.is_csv_file() => {
            Some(json!({ "series_csv": path.display().to_string() }))
        }
        _ => None,
    }
}

/// Parses raw payload text. Blank text is the empty object.
pub fn parse_payload(text: &str) -> Result<Value, String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    let value: Value = serde_json::from_str(trimmed)
        .map_err(|err| format!("failed to parse JSON arguments: {err}"))?;
    match value {
        Value::Object(_) => Ok(value),
        Value::Null => Ok(Value::Object(Map::new())),
        other => Err(format!(
            "JSON arguments must be an object, got {}",
            type_name(&other)
        )),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
