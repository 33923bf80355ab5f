//! Token Budget Management
//!
//! Per-family token ceilings and the tuning knobs of the compression cascade.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::provider::ModelFamily;

/// Reserved for the instruction/response portion of the prompt
pub const DEFAULT_RESERVED_TOKENS: u32 = 600;
/// Minimum importance for a line to count as a key change
pub const DEFAULT_IMPORTANCE_THRESHOLD: u8 = 3;
/// Key changes kept per fragment
pub const DEFAULT_MAX_KEY_CHANGES: usize = 5;
/// Ceiling for families missing from the limits table
pub const DEFAULT_MAX_TOKENS: u32 = 8_192;

/// Cascade tuning knobs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CascadeSettings {
    pub reserved_tokens: u32,
    pub importance_threshold: u8,
    pub max_key_changes: usize,
}

impl Default for CascadeSettings {
    fn default() -> Self {
        Self {
            reserved_tokens: DEFAULT_RESERVED_TOKENS,
            importance_threshold: DEFAULT_IMPORTANCE_THRESHOLD,
            max_key_changes: DEFAULT_MAX_KEY_CHANGES,
        }
    }
}

/// Tokens left for the diff once the reserved portion is taken out.
///
/// Negative when the reservation exceeds the ceiling; only `Extreme` can be
/// selected then.
pub fn available_tokens(max_tokens: u32, reserved_tokens: u32) -> i64 {
    max_tokens as i64 - reserved_tokens as i64
}

/// Whether a measured candidate fits what is available
pub fn fits(token_count: u32, available: i64) -> bool {
    (token_count as i64) <= available
}

/// Maximum prompt tokens per model family
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderLimits {
    /// Keyed by family identifier (`openai`, `anthropic`, ...)
    pub max_tokens: BTreeMap<String, u32>,
    /// Used for families missing from `max_tokens`
    pub fallback: u32,
}

impl Default for ProviderLimits {
    fn default() -> Self {
        let max_tokens = [
            (ModelFamily::OpenAi, 128_000),
            (ModelFamily::Anthropic, 200_000),
            (ModelFamily::Google, 1_000_000),
            (ModelFamily::DeepSeek, 64_000),
            (ModelFamily::Qwen, 32_000),
            (ModelFamily::Ollama, 8_192),
        ]
        .into_iter()
        .map(|(family, limit)| (family.as_str().to_string(), limit))
        .collect();

        Self {
            max_tokens,
            fallback: DEFAULT_MAX_TOKENS,
        }
    }
}

impl ProviderLimits {
    pub fn max_tokens_for(&self, family: &ModelFamily) -> u32 {
        self.max_tokens
            .get(family.as_str())
            .copied()
            .unwrap_or(self.fallback)
    }

    pub fn set(&mut self, family: &ModelFamily, max_tokens: u32) {
        self.max_tokens.insert(family.as_str().to_string(), max_tokens);
    }
}
