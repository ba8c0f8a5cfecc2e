use serde_json::{json, Value};

pub fn success(command: &str, data: Value) -> Value {
    json!({
        "success": true,
        "command": command,
        "data": data,
    })
}

/// `command` is `None` when the failure happened before a command was resolved.
pub fn failure(command: Option<&str>, error: &str) -> Value {
    json!({
        "success": false,
        "command": command,
        "error": error,
    })
}
