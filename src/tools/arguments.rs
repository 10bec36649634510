//! Typed access to tool call arguments.

use serde_json::{Map, Value};

use crate::error::{Result, TurnstileError};

/// Argument object of one tool call with typed extraction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArguments {
    value: Map<String, Value>,
}

impl ToolArguments {
    pub fn new(value: Map<String, Value>) -> Self {
        Self { value }
    }

    /// Get the raw argument object.
    pub fn raw(&self) -> &Map<String, Value> {
        &self.value
    }

    /// Get a string argument by key.
    pub fn get_str(&self, key: &str) -> Result<&str> {
        self.value
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| TurnstileError::InvalidArgument(format!("Missing string argument: {key}")))
    }

    /// Get an optional string argument.
    pub fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.value.get(key).and_then(Value::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Result<i64> {
        self.value
            .get(key)
            .and_then(Value::as_i64)
            .ok_or_else(|| TurnstileError::InvalidArgument(format!("Missing integer argument: {key}")))
    }

    pub fn get_bool(&self, key: &str) -> Result<bool> {
        self.value
            .get(key)
            .and_then(Value::as_bool)
            .ok_or_else(|| TurnstileError::InvalidArgument(format!("Missing boolean argument: {key}")))
    }

    /// Deserialize the whole argument object into a typed struct.
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.value.clone()))
            .map_err(|e| TurnstileError::InvalidArgument(format!("Failed to deserialize arguments: {e}")))
    }
}

impl From<Map<String, Value>> for ToolArguments {
    fn from(value: Map<String, Value>) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn args(value: Value) -> ToolArguments {
        match value {
            Value::Object(map) => ToolArguments::new(map),
            _ => panic!("test arguments must be an object"),
        }
    }

    #[test]
    fn typed_getters_report_missing_keys() {
        let a = args(json!({"window_id": "w-1", "count": 3, "force": true}));
        assert_eq!(a.get_str("window_id").unwrap(), "w-1");
        assert_eq!(a.get_i64("count").unwrap(), 3);
        assert!(a.get_bool("force").unwrap());
        assert_eq!(a.get_str_opt("missing"), None);
        let err = a.get_str("count").unwrap_err();
        assert_eq!(err.to_string(), "Invalid argument: Missing string argument: count");
    }

    #[test]
    fn deserializes_into_struct() {
        #[derive(Deserialize)]
        struct CloseArgs {
            window_id: String,
            #[serde(default)]
            force: bool,
        }
        let parsed: CloseArgs = args(json!({"window_id": "w-9"})).deserialize().unwrap();
        assert_eq!(parsed.window_id, "w-9");
        assert!(!parsed.force);
    }
}
