//! Diff Context Compression
//!
//! Turns a set of change fragments into text that fits a model's token budget,
//! degrading from the verbatim diff down to bare totals as the budget shrinks.

pub mod budget;
pub mod classification;
pub mod compression;
pub mod importance;
pub mod strategies;
pub mod tokens;

// Re-export public types for external use
pub use budget::{CascadeSettings, ProviderLimits, available_tokens};
pub use budget::{DEFAULT_IMPORTANCE_THRESHOLD, DEFAULT_MAX_KEY_CHANGES, DEFAULT_MAX_TOKENS, DEFAULT_RESERVED_TOKENS};
pub use classification::{CategoryCounts, FileCategory, categorize};
pub use compression::{CompressionCascade, CompressionLevel, ProcessedResult};
pub use importance::{KeyChange, KeyChangeExtractor, score_line};
pub use strategies::{render_extreme, render_full, render_minimal, render_smart};
pub use tokens::{TokenCount, TokenEncoder, TokenError, TokenEstimator, TokenizerCache, TokenizerLoader};
pub use tokens::{TiktokenLoader, DEFAULT_TOKENIZER_ID, estimate_tokens_quick, resolve_tokenizer_id};
