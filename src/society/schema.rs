//! Tool schema sanitization.
//!
//! Optional tool parameters are commonly described as
//! `{"anyOf": [{"type": "string"}, {"type": "null"}]}`. Several
//! OpenAI-compatible endpoints reject such unions, so the non-null member
//! becomes the property type and the property is no longer required.

use serde_json::Value;

/// Collapse nullable `anyOf` unions in a function tool schema, in place.
///
/// Accepts either the full `{"type": "function", "function": {...}}` shape
/// or the bare `{"name", "parameters"}` function object. Returns the names of
/// the properties that were rewritten.
pub fn sanitize_tool_schema(schema: &mut Value) -> Vec<String> {
    let function = if schema.get("function").is_some() {
        &mut schema["function"]
    } else {
        schema
    };

    let Some(parameters) = function.get_mut("parameters") else {
        return Vec::new();
    };

    let mut amended = Vec::new();
    if let Some(properties) = parameters.get_mut("properties").and_then(Value::as_object_mut) {
        for (name, prop) in properties.iter_mut() {
            let Some(variants) = prop.get("anyOf").and_then(Value::as_array) else {
                continue;
            };
            let non_null = variants
                .iter()
                .filter_map(|v| v.get("type").and_then(Value::as_str))
                .filter(|t| *t != "null")
                .last()
                .map(str::to_string);

            if let Some(obj) = prop.as_object_mut() {
                obj.remove("anyOf");
                if let Some(ty) = non_null {
                    obj.insert("type".to_string(), Value::String(ty));
                }
            }
            amended.push(name.clone());
        }
    }

    if let Some(required) = parameters.get_mut("required").and_then(Value::as_array_mut) {
        required.retain(|r| r.as_str().map(|s| !amended.iter().any(|a| a == s)).unwrap_or(true));
    }

    amended
}
