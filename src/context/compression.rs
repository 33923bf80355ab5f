//! Compression levels and the budget-driven cascade between them.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use tracing::{debug, info};

use super::budget::{available_tokens, fits, CascadeSettings, ProviderLimits};
use super::importance::KeyChangeExtractor;
use super::strategies::{render_extreme, render_full, render_minimal, render_smart};
use super::tokens::{resolve_tokenizer_id, TokenEstimator};
use crate::fragment::ChangeFragment;
use crate::provider::ModelFamily;

/// Fidelity tier of a rendered change set.
///
/// Ordered by fidelity: `Full > Smart > Minimal > Extreme`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionLevel {
    /// Every fragment verbatim
    Full,
    /// Per-file stats plus key changes
    Smart,
    /// File counts per category plus line totals
    Minimal,
    /// Fragment count plus line totals. Always accepted.
    Extreme,
}

impl CompressionLevel {
    /// Levels in the order the cascade tries them
    pub const CASCADE: [CompressionLevel; 4] = [
        CompressionLevel::Full,
        CompressionLevel::Smart,
        CompressionLevel::Minimal,
        CompressionLevel::Extreme,
    ];

    /// Higher is more faithful to the input
    pub fn fidelity(&self) -> u8 {
        match self {
            CompressionLevel::Full => 3,
            CompressionLevel::Smart => 2,
            CompressionLevel::Minimal => 1,
            CompressionLevel::Extreme => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionLevel::Full => "full",
            CompressionLevel::Smart => "smart",
            CompressionLevel::Minimal => "minimal",
            CompressionLevel::Extreme => "extreme",
        }
    }

    /// Next level down; `Extreme` is its own successor
    pub fn lower(&self) -> CompressionLevel {
        match self {
            CompressionLevel::Full => CompressionLevel::Smart,
            CompressionLevel::Smart => CompressionLevel::Minimal,
            CompressionLevel::Minimal | CompressionLevel::Extreme => CompressionLevel::Extreme,
        }
    }

    /// Whether the cascade stops here regardless of budget
    pub fn is_floor(&self) -> bool {
        matches!(self, CompressionLevel::Extreme)
    }
}

impl PartialOrd for CompressionLevel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CompressionLevel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.fidelity().cmp(&other.fidelity())
    }
}

impl fmt::Display for CompressionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of the cascade
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedResult {
    pub content: String,
    pub level: CompressionLevel,
    /// Measured by the same call that accepted this level
    pub token_count: u32,
    /// False when `token_count` is the length-based approximation
    pub exact_count: bool,
    /// Tokenizer that measured `token_count`. When a substitute measured it this
    /// is the substitute; for approximated counts it is the id the family resolves to.
    pub tokenizer: String,
    pub files_processed: usize,
    pub files_skipped: usize,
}

/// Renders change fragments at the highest fidelity that fits a token budget
#[derive(Clone)]
pub struct CompressionCascade {
    estimator: TokenEstimator,
    settings: CascadeSettings,
}

impl CompressionCascade {
    pub fn new(estimator: TokenEstimator) -> Self {
        Self::with_settings(estimator, CascadeSettings::default())
    }

    pub fn with_settings(estimator: TokenEstimator, settings: CascadeSettings) -> Self {
        Self { estimator, settings }
    }

    pub fn settings(&self) -> &CascadeSettings {
        &self.settings
    }

    pub fn estimator(&self) -> &TokenEstimator {
        &self.estimator
    }

    /// Render `fragments` at one level
    pub fn render(&self, level: CompressionLevel, fragments: &[ChangeFragment]) -> String {
        match level {
            CompressionLevel::Full => render_full(fragments),
            CompressionLevel::Smart => {
                render_smart(fragments, &KeyChangeExtractor::from_settings(&self.settings))
            }
            CompressionLevel::Minimal => render_minimal(fragments),
            CompressionLevel::Extreme => render_extreme(fragments),
        }
    }

    /// Pick the most faithful rendering that fits `max_tokens - reserved_tokens`.
    ///
    /// `reserved_tokens` defaults to the configured reservation. Levels are tried
    /// in order and `Extreme` is accepted unconditionally, so this always
    /// returns a result.
    pub async fn process(
        &self,
        fragments: &[ChangeFragment],
        family: &ModelFamily,
        max_tokens: u32,
        reserved_tokens: Option<u32>,
    ) -> ProcessedResult {
        let reserved = reserved_tokens.unwrap_or(self.settings.reserved_tokens);
        let available = available_tokens(max_tokens, reserved);
        let tokenizer = resolve_tokenizer_id(family);

        // Nothing to render: only the totals sentence describes an empty set
        let mut level = if fragments.is_empty() {
            CompressionLevel::Extreme
        } else {
            CompressionLevel::Full
        };

        loop {
            let content = self.render(level, fragments);
            let measured = self.estimator.count_tokens(&content, family).await;

            debug!(
                level = %level,
                tokens = measured.count,
                exact = measured.exact,
                available,
                "Evaluated compression level"
            );

            if level.is_floor() || fits(measured.count, available) {
                info!(
                    level = %level,
                    tokens = measured.count,
                    files = fragments.len(),
                    "Selected compression level"
                );
                return ProcessedResult {
                    content,
                    level,
                    token_count: measured.count,
                    exact_count: measured.exact,
                    tokenizer: measured.tokenizer.unwrap_or(tokenizer).to_string(),
                    files_processed: fragments.len(),
                    files_skipped: 0,
                };
            }

            level = level.lower();
        }
    }

    /// Like [`process`](Self::process), with the ceiling taken from `limits`
    pub async fn process_for_family(
        &self,
        fragments: &[ChangeFragment],
        family: &ModelFamily,
        limits: &ProviderLimits,
    ) -> ProcessedResult {
        let max_tokens = limits.max_tokens_for(family);
        self.process(fragments, family, max_tokens, None).await
    }
}
