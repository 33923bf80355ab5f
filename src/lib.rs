// Diffsqueeze Library
// Exports core modules for use by the CLI binary and embedding hosts

pub mod config;
pub mod context;
pub mod fragment;
pub mod provider;

// Re-export commonly used types for CLI
pub use context::budget::{
    CascadeSettings, ProviderLimits,
    DEFAULT_RESERVED_TOKENS, DEFAULT_IMPORTANCE_THRESHOLD, DEFAULT_MAX_KEY_CHANGES, DEFAULT_MAX_TOKENS,
};
pub use context::classification::{FileCategory, CategoryCounts, categorize};
pub use context::compression::{CompressionCascade, CompressionLevel, ProcessedResult};
pub use context::importance::{KeyChange, KeyChangeExtractor, score_line};
pub use context::tokens::{
    TokenCount, TokenEstimator, TokenizerCache, TokenEncoder, TokenizerLoader, TokenError,
    DEFAULT_TOKENIZER_ID, estimate_tokens_quick, resolve_tokenizer_id,
};

pub use fragment::{ChangeFragment, ChangeKind, LineStats, split_unified_diff};
pub use provider::ModelFamily;

pub use config::{
    Settings, ConfigError, get_config_path_cli, init_settings_cli, load_settings_cli,
};
