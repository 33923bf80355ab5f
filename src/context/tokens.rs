//! Token counting per model family, backed by tiktoken-rs.
//!
//! Tokenizers are loaded lazily, once per tokenizer id, into a caller-owned
//! [`TokenizerCache`]. A tokenizer that fails to load is replaced by the default
//! one and the substitution is cached under the failed id. When no tokenizer
//! can be loaded or a text cannot be encoded the estimator falls back to
//! `ceil(chars / 4)` and marks the count as approximate. Counting never fails.

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tiktoken_rs::CoreBPE;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::provider::ModelFamily;

/// Tokenizer used for families without a dedicated entry
pub const DEFAULT_TOKENIZER_ID: &str = "o200k_base";
/// Default bound on first-time tokenizer initialization
pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(30);
/// Exact counts memoized per cache
const COUNT_MEMO_CAPACITY: usize = 10_000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Tokenizer {tokenizer} unavailable: {reason}")]
    Unavailable { tokenizer: String, reason: String },
    #[error("Tokenizer {tokenizer} failed to encode text: {reason}")]
    Encode { tokenizer: String, reason: String },
    #[error("Tokenizer {tokenizer} did not initialize within {secs}s")]
    InitTimeout { tokenizer: String, secs: u64 },
}

impl Serialize for TokenError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// A loaded tokenizer
pub trait TokenEncoder: Send + Sync {
    /// Number of tokens `text` encodes to
    fn encode_len(&self, text: &str) -> Result<usize, TokenError>;
}

/// Loads tokenizers by id. Called at most once per id per cache.
pub trait TokenizerLoader: Send + Sync {
    fn load(&self, tokenizer_id: &str) -> Result<Arc<dyn TokenEncoder>, TokenError>;
}
/// tiktoken BPE encoder
pub struct TiktokenEncoder {
    bpe: CoreBPE,
}

impl TokenEncoder for TiktokenEncoder {
    fn encode_len(&self, text: &str) -> Result<usize, TokenError> {
        Ok(self.bpe.encode_with_special_tokens(text).len())
    }
}

/// Loads the BPE encodings bundled with tiktoken-rs
#[derive(Debug, Clone, Copy, Default)]
pub struct TiktokenLoader;

impl TokenizerLoader for TiktokenLoader {
    fn load(&self, tokenizer_id: &str) -> Result<Arc<dyn TokenEncoder>, TokenError> {
        let bpe = match tokenizer_id {
            "o200k_base" => tiktoken_rs::o200k_base(),
            "cl100k_base" => tiktoken_rs::cl100k_base(),
            "p50k_base" => tiktoken_rs::p50k_base(),
            "r50k_base" => tiktoken_rs::r50k_base(),
            other => {
                return Err(TokenError::Unavailable {
                    tokenizer: other.to_string(),
                    reason: "unknown encoding".to_string(),
                })
            }
        }
        .map_err(|e| TokenError::Unavailable {
            tokenizer: tokenizer_id.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Arc::new(TiktokenEncoder { bpe }))
    }
}

/// Map a model family to the tokenizer used to measure it.
///
/// Families without a dedicated tokenizer share [`DEFAULT_TOKENIZER_ID`].
pub fn resolve_tokenizer_id(family: &ModelFamily) -> &'static str {
    match family {
        ModelFamily::Anthropic => "cl100k_base",
        ModelFamily::OpenAi
        | ModelFamily::Google
        | ModelFamily::DeepSeek
        | ModelFamily::Qwen
        | ModelFamily::Ollama
        | ModelFamily::Other(_) => DEFAULT_TOKENIZER_ID,
    }
}

/// Length-based approximation: ~4 characters per token
pub fn estimate_tokens_quick(text: &str) -> u32 {
    text.chars().count().div_ceil(4) as u32
}

/// A token count, tagged with the tokenizer that measured it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TokenCount {
    pub count: u32,
    pub exact: bool,
    /// Tokenizer id that produced an exact count; `None` when approximated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokenizer: Option<&'static str>,
}

impl TokenCount {
    pub fn exact(count: u32, tokenizer: &'static str) -> Self {
        Self {
            count,
            exact: true,
            tokenizer: Some(tokenizer),
        }
    }

    pub fn approximate(text: &str) -> Self {
        Self {
            count: estimate_tokens_quick(text),
            exact: false,
            tokenizer: None,
        }
    }
}

/// What a requested tokenizer id settled on
#[derive(Clone)]
enum Resolution {
    /// `tokenizer_id` is the default when it stands in for a failed tokenizer
    Ready {
        tokenizer_id: &'static str,
        encoder: Arc<dyn TokenEncoder>,
    },
    /// Neither the tokenizer nor the default could be loaded
    Unavailable(TokenError),
}

type ResolutionSlot = Arc<OnceCell<Resolution>>;
type PendingLoad = JoinHandle<Result<Arc<dyn TokenEncoder>, TokenError>>;

/// Cache for exact token counts, keyed by tokenizer and content hash
struct CountMemo {
    counts: HashMap<(String, u64), u32>,
    max_size: usize,
}

impl CountMemo {
    fn new(max_size: usize) -> Self {
        Self {
            counts: HashMap::new(),
            max_size,
        }
    }

    fn get(&self, tokenizer_id: &str, hash: u64) -> Option<u32> {
        self.counts.get(&(tokenizer_id.to_string(), hash)).copied()
    }

    fn insert(&mut self, tokenizer_id: &str, hash: u64, count: u32) {
        // At capacity: drop half the entries
        if self.counts.len() >= self.max_size {
            let keys_to_remove: Vec<_> = self.counts.keys().take(self.max_size / 2).cloned().collect();
            for key in keys_to_remove {
                self.counts.remove(&key);
            }
        }
        self.counts.insert((tokenizer_id.to_string(), hash), count);
    }
}

/// Loaded tokenizers and memoized counts.
///
/// Owned by the caller (one per CLI invocation or service instance) and shared
/// with estimators through an `Arc`.
pub struct TokenizerCache {
    resolutions: Mutex<HashMap<String, ResolutionSlot>>,
    /// Loads that outlived the init timeout, resumed by the next attempt
    pending: Mutex<HashMap<String, PendingLoad>>,
    memo: RwLock<CountMemo>,
}

impl Default for TokenizerCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenizerCache {
    pub fn new() -> Self {
        Self::with_memo_capacity(COUNT_MEMO_CAPACITY)
    }

    pub fn with_memo_capacity(max_size: usize) -> Self {
        Self {
            resolutions: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            memo: RwLock::new(CountMemo::new(max_size)),
        }
    }

    /// Per-id slot; the `OnceCell` serializes concurrent first loads.
    fn slot(&self, tokenizer_id: &str) -> ResolutionSlot {
        self.resolutions
            .lock()
            .entry(tokenizer_id.to_string())
            .or_default()
            .clone()
    }

    fn take_pending(&self, tokenizer_id: &str) -> Option<PendingLoad> {
        self.pending.lock().remove(tokenizer_id)
    }

    fn park_pending(&self, tokenizer_id: &str, task: PendingLoad) {
        self.pending.lock().insert(tokenizer_id.to_string(), task);
    }

    /// Whether `tokenizer_id` resolves to a loaded tokenizer (its own or the default)
    pub fn is_loaded(&self, tokenizer_id: &str) -> bool {
        self.resolutions
            .lock()
            .get(tokenizer_id)
            .and_then(|slot| slot.get().map(|r| matches!(r, Resolution::Ready { .. })))
            .unwrap_or(false)
    }

    /// Tokenizer id that counts for `tokenizer_id` are measured with, once resolved
    pub fn loaded_id(&self, tokenizer_id: &str) -> Option<&'static str> {
        let slot = self.resolutions.lock().get(tokenizer_id).cloned()?;
        match slot.get()? {
            Resolution::Ready { tokenizer_id, .. } => Some(*tokenizer_id),
            Resolution::Unavailable(_) => None,
        }
    }

    /// (tokenizer ids resolved to a tokenizer, memoized counts)
    pub fn stats(&self) -> (usize, usize) {
        let loaded = self
            .resolutions
            .lock()
            .values()
            .filter(|slot| matches!(slot.get(), Some(Resolution::Ready { .. })))
            .count();
        (loaded, self.memo.read().counts.len())
    }

    /// Drop every loaded tokenizer and memoized count
    pub fn reset(&self) {
        self.resolutions.lock().clear();
        self.pending.lock().clear();
        self.memo.write().counts.clear();
    }
}

/// Hash content for memo lookup
fn hash_content(content: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    hasher.finish()
}

/// Counts tokens for a model family
#[derive(Clone)]
pub struct TokenEstimator {
    cache: Arc<TokenizerCache>,
    loader: Arc<dyn TokenizerLoader>,
    init_timeout: Duration,
}

impl TokenEstimator {
    /// Estimator backed by the bundled tiktoken encodings
    pub fn new(cache: Arc<TokenizerCache>) -> Self {
        Self::with_loader(cache, Arc::new(TiktokenLoader))
    }

    pub fn with_loader(cache: Arc<TokenizerCache>, loader: Arc<dyn TokenizerLoader>) -> Self {
        Self {
            cache,
            loader,
            init_timeout: DEFAULT_INIT_TIMEOUT,
        }
    }

    pub fn with_init_timeout(mut self, init_timeout: Duration) -> Self {
        self.init_timeout = init_timeout;
        self
    }

    pub fn cache(&self) -> &Arc<TokenizerCache> {
        &self.cache
    }

    /// Run the loader off the runtime, bounded by the init timeout.
    ///
    /// A load that times out keeps running; the next attempt awaits it instead of
    /// starting another.
    async fn spawn_load(&self, tokenizer_id: &'static str) -> Result<Arc<dyn TokenEncoder>, TokenError> {
        let mut task = match self.cache.take_pending(tokenizer_id) {
            Some(task) => {
                debug!(tokenizer = %tokenizer_id, "Resuming pending tokenizer load");
                task
            }
            None => {
                info!(tokenizer = %tokenizer_id, "Loading tokenizer");
                let loader = self.loader.clone();
                tokio::task::spawn_blocking(move || loader.load(tokenizer_id))
            }
        };

        match tokio::time::timeout(self.init_timeout, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(TokenError::Unavailable {
                tokenizer: tokenizer_id.to_string(),
                reason: join_err.to_string(),
            }),
            Err(_) => {
                self.cache.park_pending(tokenizer_id, task);
                Err(TokenError::InitTimeout {
                    tokenizer: tokenizer_id.to_string(),
                    secs: self.init_timeout.as_secs(),
                })
            }
        }
    }

    /// Load one tokenizer. Timeouts are `Err` so the slot stays open for a retry;
    /// any other failure is a settled `Unavailable`.
    async fn load_outcome(&self, tokenizer_id: &'static str) -> Result<Resolution, TokenError> {
        match self.spawn_load(tokenizer_id).await {
            Ok(encoder) => Ok(Resolution::Ready { tokenizer_id, encoder }),
            Err(e @ TokenError::InitTimeout { .. }) => {
                warn!(tokenizer = %tokenizer_id, error = %e, "Tokenizer initialization timed out");
                Err(e)
            }
            Err(e) => {
                warn!(tokenizer = %tokenizer_id, error = %e, "Failed to load tokenizer");
                Ok(Resolution::Unavailable(e))
            }
        }
    }

    /// Resolve `tokenizer_id`, substituting the default tokenizer when it fails.
    ///
    /// The outcome is cached under `tokenizer_id`, so later calls cost no loads.
    async fn resolve(&self, tokenizer_id: &'static str) -> Resolution {
        let slot = self.cache.slot(tokenizer_id);
        if let Some(resolution) = slot.get() {
            debug!(tokenizer = %tokenizer_id, "Tokenizer cache hit");
            return resolution.clone();
        }

        let resolved = slot
            .get_or_try_init(|| async move {
                let outcome = self.load_outcome(tokenizer_id).await;
                if tokenizer_id == DEFAULT_TOKENIZER_ID {
                    return outcome;
                }
                match outcome {
                    Ok(Resolution::Unavailable(_)) | Err(_) => {}
                    ready => return ready,
                }

                info!(tokenizer = %tokenizer_id, fallback = DEFAULT_TOKENIZER_ID, "Substituting default tokenizer");
                self.cache
                    .slot(DEFAULT_TOKENIZER_ID)
                    .get_or_try_init(|| self.load_outcome(DEFAULT_TOKENIZER_ID))
                    .await
                    .cloned()
            })
            .await;

        match resolved {
            Ok(resolution) => resolution.clone(),
            Err(e) => Resolution::Unavailable(e),
        }
    }

    /// Count tokens in `text` for `family`.
    ///
    /// Falls back to [`estimate_tokens_quick`] when no tokenizer is available or
    /// encoding fails.
    pub async fn count_tokens(&self, text: &str, family: &ModelFamily) -> TokenCount {
        let requested = resolve_tokenizer_id(family);
        match self.resolve(requested).await {
            Resolution::Ready { tokenizer_id, encoder } => {
                self.measure(text, tokenizer_id, &*encoder)
            }
            Resolution::Unavailable(e) => {
                debug!(tokenizer = %requested, error = %e, "Tokenizer unavailable, using approximation");
                TokenCount::approximate(text)
            }
        }
    }

    /// Exact count with `encoder`, memoized under the id that measured it
    fn measure(&self, text: &str, tokenizer_id: &'static str, encoder: &dyn TokenEncoder) -> TokenCount {
        let content_hash = hash_content(text);
        let memoized = self.cache.memo.read().get(tokenizer_id, content_hash);
        if let Some(count) = memoized {
            debug!(tokenizer = %tokenizer_id, count, "Token count memo hit");
            return TokenCount::exact(count, tokenizer_id);
        }

        match encoder.encode_len(text) {
            Ok(len) => {
                let count = len as u32;
                self.cache.memo.write().insert(tokenizer_id, content_hash, count);
                TokenCount::exact(count, tokenizer_id)
            }
            Err(e) => {
                warn!(tokenizer = %tokenizer_id, error = %e, "Token counting failed, using approximation");
                TokenCount::approximate(text)
            }
        }
    }

    /// Count tokens for several texts. A failure on one text only affects that text.
    pub async fn count_tokens_batch(&self, texts: &[&str], family: &ModelFamily) -> Vec<TokenCount> {
        match self.resolve(resolve_tokenizer_id(family)).await {
            Resolution::Ready { tokenizer_id, encoder } => texts
                .iter()
                .map(|text| self.measure(text, tokenizer_id, &*encoder))
                .collect(),
            Resolution::Unavailable(e) => {
                warn!(error = %e, count = texts.len(), "Tokenizer unavailable, approximating batch");
                texts.iter().map(|text| TokenCount::approximate(text)).collect()
            }
        }
    }

    /// Count the texts as one newline-joined document
    pub async fn estimate_tokens(&self, texts: &[&str], family: &ModelFamily) -> TokenCount {
        self.count_tokens(&texts.join("\n"), family).await
    }
}
