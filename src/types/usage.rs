//! Token usage reported by the provider stream.

use serde::{Deserialize, Serialize};

/// Token usage for a generation.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_read_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_creation_tokens: Option<u32>,
}

impl Usage {
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens.saturating_add(self.output_tokens)
    }

    /// Overlay counts reported by a later event; absent fields keep their value.
    pub(crate) fn update_from(&mut self, value: &serde_json::Value) {
        let read = |key: &str| {
            value
                .get(key)
                .and_then(|v| v.as_u64())
                .map(|v| u32::try_from(v).unwrap_or(u32::MAX))
        };
        if let Some(v) = read("input_tokens") {
            self.input_tokens = v;
        }
        if let Some(v) = read("output_tokens") {
            self.output_tokens = v;
        }
        if let Some(v) = read("cache_read_input_tokens") {
            self.cache_read_tokens = Some(v);
        }
        if let Some(v) = read("cache_creation_input_tokens") {
            self.cache_creation_tokens = Some(v);
        }
    }
}
