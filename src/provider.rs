//! Model families the compressed diff can be budgeted for.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Target model family (provider)
///
/// Parsing never fails: unrecognised identifiers become `Other`, which resolves
/// to the default tokenizer and the default token ceiling.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ModelFamily {
    OpenAi,
    Anthropic,
    Google,
    DeepSeek,
    Qwen,
    Ollama,
    Other(String),
}

impl ModelFamily {
    /// The closed set of supported families
    pub const SUPPORTED: [ModelFamily; 6] = [
        ModelFamily::OpenAi,
        ModelFamily::Anthropic,
        ModelFamily::Google,
        ModelFamily::DeepSeek,
        ModelFamily::Qwen,
        ModelFamily::Ollama,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            ModelFamily::OpenAi => "openai",
            ModelFamily::Anthropic => "anthropic",
            ModelFamily::Google => "google",
            ModelFamily::DeepSeek => "deepseek",
            ModelFamily::Qwen => "qwen",
            ModelFamily::Ollama => "ollama",
            ModelFamily::Other(name) => name,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            ModelFamily::OpenAi => "OpenAI",
            ModelFamily::Anthropic => "Anthropic (Claude)",
            ModelFamily::Google => "Google (Gemini)",
            ModelFamily::DeepSeek => "DeepSeek",
            ModelFamily::Qwen => "Qwen",
            ModelFamily::Ollama => "Ollama (Local)",
            ModelFamily::Other(name) => name,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, ModelFamily::Other(_))
    }
}

impl From<&str> for ModelFamily {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => ModelFamily::OpenAi,
            "anthropic" | "claude" => ModelFamily::Anthropic,
            "google" | "gemini" => ModelFamily::Google,
            "deepseek" => ModelFamily::DeepSeek,
            "qwen" => ModelFamily::Qwen,
            "ollama" => ModelFamily::Ollama,
            _ => ModelFamily::Other(value.to_string()),
        }
    }
}

impl From<String> for ModelFamily {
    fn from(value: String) -> Self {
        ModelFamily::from(value.as_str())
    }
}

impl From<ModelFamily> for String {
    fn from(family: ModelFamily) -> Self {
        family.as_str().to_string()
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
