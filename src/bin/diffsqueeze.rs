//! Diffsqueeze CLI
//!
//! Compresses a unified diff to fit a model's token budget, counts tokens and
//! classifies paths. Output is JSON on stdout; logs go to stderr.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use diffsqueeze_lib::{
    // Settings
    Settings, get_config_path_cli, init_settings_cli, load_settings_cli,
    // Compression
    CompressionCascade, ProcessedResult, categorize, split_unified_diff,
    // Tokens
    ModelFamily, TokenEstimator, TokenizerCache, resolve_tokenizer_id,
};

#[derive(Parser)]
#[command(name = "diffsqueeze")]
#[command(about = "Diffsqueeze CLI - fit source diffs into LLM token budgets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a unified diff to fit a token budget
    Compress {
        /// Diff file to read (or - for stdin)
        #[arg(default_value = "-")]
        input: String,
        /// Target model family (openai, anthropic, google, deepseek, qwen, ollama)
        #[arg(short, long, default_value = "openai")]
        provider: String,
        /// Token ceiling (default: from the limits table)
        #[arg(short, long)]
        max_tokens: Option<u32>,
        /// Tokens reserved for instructions and response (default: from settings)
        #[arg(short, long)]
        reserved: Option<u32>,
        /// Print only the compressed content
        #[arg(long)]
        raw: bool,
    },
    /// Token counting commands
    Tokens {
        #[command(subcommand)]
        action: TokensAction,
    },
    /// Classify file paths
    Categorize {
        /// Paths to classify
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Settings commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum TokensAction {
    /// Count tokens in text
    Count {
        /// Text to count (or - to read from stdin)
        text: String,
        /// Target model family
        #[arg(short, long, default_value = "openai")]
        provider: String,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective settings
    Show,
    /// Print the settings file location
    Path,
    /// Write the effective settings to the settings file
    Init {
        /// Replace an existing settings file
        #[arg(long)]
        force: bool,
    },
}

// ============ Output Types ============

#[derive(Serialize)]
struct TokenCountOutput {
    tokens: u32,
    exact: bool,
    tokenizer: String,
}

#[derive(Serialize)]
struct CategoryOutput {
    path: String,
    category: String,
}

#[derive(Serialize)]
struct PathOutput {
    path: String,
}

#[derive(Serialize)]
struct ErrorOutput {
    error: String,
}

// ============ Main ============

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let settings = match load_settings_cli() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load settings, using defaults: {}", e);
            Settings::default()
        }
    };
    init_logging(&settings);

    let result = match cli.command {
        Commands::Compress { input, provider, max_tokens, reserved, raw } => {
            handle_compress(&settings, &input, &provider, max_tokens, reserved, raw).await
        }
        Commands::Tokens { action } => handle_tokens(&settings, action).await,
        Commands::Categorize { paths } => handle_categorize(paths),
        Commands::Config { action } => handle_config(&settings, action),
    };

    match result {
        Ok(output) => println!("{}", output),
        Err(e) => {
            let error = ErrorOutput { error: format!("{:#}", e) };
            match serde_json::to_string(&error) {
                Ok(json) => println!("{}", json),
                Err(_) => println!("{{\"error\": \"{}\"}}", error.error.escape_default()),
            }
            std::process::exit(1);
        }
    }
}

fn init_logging(settings: &Settings) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_input(input: &str) -> anyhow::Result<String> {
    if input == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read stdin")?;
        Ok(buffer)
    } else {
        let path = PathBuf::from(input);
        std::fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))
    }
}

fn estimator(settings: &Settings) -> TokenEstimator {
    TokenEstimator::new(Arc::new(TokenizerCache::new()))
        .with_init_timeout(settings.tokenizer_init_timeout())
}

// ============ Handlers ============

async fn handle_compress(
    settings: &Settings,
    input: &str,
    provider: &str,
    max_tokens: Option<u32>,
    reserved: Option<u32>,
    raw: bool,
) -> anyhow::Result<String> {
    let diff = read_input(input)?;
    let fragments = split_unified_diff(&diff);
    if fragments.is_empty() {
        tracing::warn!("No file changes found in input");
    }

    let family = ModelFamily::from(provider);
    let max_tokens = max_tokens.unwrap_or_else(|| settings.limits.max_tokens_for(&family));
    let cascade = CompressionCascade::with_settings(estimator(settings), settings.cascade.clone());

    let result: ProcessedResult = cascade.process(&fragments, &family, max_tokens, reserved).await;

    if raw {
        Ok(result.content)
    } else {
        Ok(serde_json::to_string(&result)?)
    }
}

async fn handle_tokens(settings: &Settings, action: TokensAction) -> anyhow::Result<String> {
    match action {
        TokensAction::Count { text, provider } => {
            let input = if text == "-" { read_input(&text)? } else { text };
            let family = ModelFamily::from(provider.as_str());

            let count = estimator(settings).count_tokens(&input, &family).await;
            let output = TokenCountOutput {
                tokens: count.count,
                exact: count.exact,
                tokenizer: count
                    .tokenizer
                    .unwrap_or_else(|| resolve_tokenizer_id(&family))
                    .to_string(),
            };

            Ok(serde_json::to_string(&output)?)
        }
    }
}

fn handle_categorize(paths: Vec<String>) -> anyhow::Result<String> {
    let items: Vec<CategoryOutput> = paths
        .into_iter()
        .map(|path| CategoryOutput {
            category: categorize(&path).to_string(),
            path,
        })
        .collect();

    Ok(serde_json::to_string(&items)?)
}

fn handle_config(settings: &Settings, action: ConfigAction) -> anyhow::Result<String> {
    match action {
        ConfigAction::Show => Ok(serde_json::to_string_pretty(settings)?),
        ConfigAction::Path => {
            let path = get_config_path_cli()?;
            Ok(serde_json::to_string(&PathOutput {
                path: path.display().to_string(),
            })?)
        }
        ConfigAction::Init { force } => {
            let path = init_settings_cli(settings, force)?;
            Ok(serde_json::to_string(&PathOutput {
                path: path.display().to_string(),
            })?)
        }
    }
}
