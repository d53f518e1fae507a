//! Local tools available to the role-playing assistant.
//!
//! Only file writing is provided: enough for the assistant to honor the
//! answer-file contract of a query. Browsing, code execution and the other
//! toolkits belong to external agent frameworks (see `CommandSociety`).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

/// A tool call extracted from an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Value,
}

/// Find the first JSON object in `response` shaped like
/// `{"tool": "...", "arguments": {...}}` (or `name`/`parameters`).
///
/// Each `{` is tried as the start of a JSON value, so braces inside string
/// arguments do not cut a call short.
pub fn parse_tool_call(response: &str) -> Option<ToolCall> {
    response
        .char_indices()
        .filter(|&(_, c)| c == '{')
        .find_map(|(i, _)| {
            let value = serde_json::Deserializer::from_str(&response[i..])
                .into_iter::<Value>()
                .next()?
                .ok()?;
            tool_call_from_value(&value)
        })
}

fn tool_call_from_value(value: &Value) -> Option<ToolCall> {
    let name = value
        .get("tool")
        .or_else(|| value.get("name"))
        .and_then(Value::as_str)?
        .to_string();
    let arguments = value
        .get("arguments")
        .or_else(|| value.get("parameters"))
        .cloned()
        .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
    Some(ToolCall { name, arguments })
}

#[derive(Debug, Deserialize)]
struct WriteFileParams {
    path: String,
    content: String,
}

/// Creates or overwrites a file on the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct WriteFileTool;

impl WriteFileTool {
    pub const NAME: &'static str = "write_file";

    pub fn new() -> Self {
        Self
    }

    /// Function schema advertised to the model.
    pub fn schema(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": Self::NAME,
                "description": "Create or overwrite a text file with the given content. Parent directories are created as needed.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "path": {"type": "string", "description": "Absolute path of the file to write."},
                        "content": {"type": "string", "description": "Full content of the file."}
                    },
                    "required": ["path", "content"]
                }
            }
        })
    }

    /// Execute the tool. Errors are returned as text for the model to read.
    pub fn execute(&self, arguments: &Value) -> Result<String, String> {
        let params: WriteFileParams = serde_json::from_value(arguments.clone())
            .map_err(|e| format!("Invalid parameters for {}: {}", Self::NAME, e))?;

        if params.path.trim().is_empty() || params.path.contains('\0') {
            return Err("Path must be a non-empty file path".to_string());
        }

        let path = PathBuf::from(&params.path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create {}: {}", parent.display(), e))?;
        }
        std::fs::write(&path, params.content.as_bytes())
            .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;

        info!(path = %path.display(), bytes = params.content.len(), "Assistant wrote file");
        debug!(content = %params.content, "Written content");
        Ok(format!("Wrote {} bytes to {}", params.content.len(), path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tool_call_formats() {
        let call = parse_tool_call(
            r#"I'll save it: {"tool": "write_file", "arguments": {"path": "/tmp/a.txt", "content": "x"}}"#,
        )
        .unwrap();
        assert_eq!(call.name, "write_file");
        assert_eq!(call.arguments["path"], "/tmp/a.txt");

        let call = parse_tool_call(
            "```json\n{\"name\": \"write_file\", \"parameters\": {\"path\": \"p\"}}\n```",
        )
        .unwrap();
        assert_eq!(call.arguments["path"], "p");
    }

    #[test]
    fn test_parse_tool_call_skips_unrelated_json() {
        let response = r#"Data: {"rows": 3} then {"tool": "write_file", "arguments": {}}"#;
        let call = parse_tool_call(response).unwrap();
        assert_eq!(call.name, "write_file");

        assert!(parse_tool_call("The answer is 42. Next request.").is_none());
        assert!(parse_tool_call("unbalanced } braces {").is_none());
    }

    #[test]
    fn test_parse_tool_call_braces_inside_strings() {
        let call = parse_tool_call(
            r#"{"tool": "write_file", "arguments": {"path": "/tmp/x.txt", "content": "a } b"}}"#,
        )
        .unwrap();
        assert_eq!(call.arguments["content"], "a } b");

        let call = parse_tool_call(
            r#"Saving: {"tool": "write_file", "arguments": {"path": "p", "content": "{\"k\": 1"}} done"#,
        )
        .unwrap();
        assert_eq!(call.arguments["content"], "{\"k\": 1");
    }

    #[test]
    fn test_write_file_creates_parents() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("nested/dir/out.txt");
        let tool = WriteFileTool::new();

        let message = tool
            .execute(&json!({"path": path.to_str().unwrap(), "content": "FINAL ANSWER: 3"}))
            .unwrap();
        assert!(message.starts_with("Wrote 15 bytes"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "FINAL ANSWER: 3");
    }

    #[test]
    fn test_write_file_rejects_bad_params() {
        let tool = WriteFileTool::new();
        assert!(tool.execute(&json!({"path": "x"})).is_err());
        assert!(tool.execute(&json!({"path": "  ", "content": "c"})).is_err());
    }
}
