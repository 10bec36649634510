//! Generation settings and related enums.

use bon::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Settings controlling text generation.
///
/// ```
/// use turnstile::types::GenerationSettings;
///
/// let settings = GenerationSettings::builder()
///     .max_tokens(2048)
///     .thinking_budget(4096)
///     .build();
/// assert_eq!(settings.effective_max_tokens(), 8192);
/// ```
#[derive(Debug, Clone, Builder, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct GenerationSettings {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub top_k: Option<u32>,
    pub stop_sequences: Option<Vec<String>>,
    /// Extended thinking budget; enables reasoning output when set.
    pub thinking_budget: Option<u32>,
}

const DEFAULT_MAX_TOKENS: u32 = 4096;

impl GenerationSettings {
    /// Output budget sent to the provider.
    ///
    /// With thinking enabled the budget must exceed the thinking allowance.
    pub fn effective_max_tokens(&self) -> u32 {
        let requested = self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);
        match self.thinking_budget {
            Some(budget) => requested.max(budget.saturating_add(DEFAULT_MAX_TOKENS)),
            None => requested,
        }
    }
}

/// Why generation finished.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    StopSequence,
    ToolUse,
}
