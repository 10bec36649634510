//! Render a registry call result into tool-result text.

use serde_json::Value;

/// Turn a raw tool output into the text stored in a tool result.
///
/// Objects carrying a `content` array of typed items (the MCP result shape)
/// are flattened item by item and joined with newlines. Strings pass through
/// verbatim; anything else is serialized as JSON.
pub fn render_tool_output(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Object(obj) => match obj.get("content").and_then(Value::as_array) {
            Some(items) => items.iter().map(render_item).collect::<Vec<_>>().join("\n"),
            None => value.to_string(),
        },
        other => other.to_string(),
    }
}

fn render_item(item: &Value) -> String {
    let field = |key: &str| item.get(key).and_then(Value::as_str);
    match field("type") {
        Some("text") => field("text").unwrap_or_default().to_string(),
        Some("image") => {
            let mime = field("mimeType")
                .or_else(|| field("mime_type"))
                .unwrap_or("unknown");
            format!("[image: {mime}]")
        }
        Some("resource") => {
            let resource = item.get("resource");
            let text = resource.and_then(|r| r.get("text")).and_then(Value::as_str);
            match text {
                Some(text) => text.to_string(),
                None => {
                    let uri = resource
                        .and_then(|r| r.get("uri"))
                        .and_then(Value::as_str)
                        .unwrap_or("unknown");
                    format!("[resource: {uri}]")
                }
            }
        }
        _ => item.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn flattens_typed_content_items() {
        let output = json!({
            "content": [
                {"type": "text", "text": "closed window w-1"},
                {"type": "image", "data": "AAAA", "mimeType": "image/png"},
                {"type": "resource", "resource": {"uri": "file:///tmp/log.txt", "text": "log body"}},
                {"type": "resource", "resource": {"uri": "file:///tmp/blob.bin", "blob": "AAAA"}},
            ]
        });
        assert_eq!(
            render_tool_output(&output),
            "closed window w-1\n[image: image/png]\nlog body\n[resource: file:///tmp/blob.bin]"
        );
    }

    #[test]
    fn strings_pass_through_and_other_values_are_json() {
        assert_eq!(render_tool_output(&json!("plain")), "plain");
        assert_eq!(render_tool_output(&json!({"ok": true})), r#"{"ok":true}"#);
        assert_eq!(render_tool_output(&json!(42)), "42");
    }
}
