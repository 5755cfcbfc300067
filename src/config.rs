//! Configuration loading and validation.
//!
//! Forge Vault is configured from a single TOML file (default
//! `./config/forge.toml`). The chunking, ranking and context sections
//! deserialize straight into the core parameter types so every tunable
//! weight can be overridden without code changes.
//!
//! ```toml
//! [db]
//! path = "./data/forge.sqlite"
//!
//! [vault]
//! root = "./vault"
//!
//! [embedding]
//! provider = "ollama"
//! model = "nomic-embed-text"
//! ```

use anyhow::{Context, Result};
use forge_vault_core::chunk::ChunkingParams;
use forge_vault_core::context::ContextParams;
use forge_vault_core::rank::RankingParams;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "./config/forge.toml";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub vault: VaultConfig,
    #[serde(default)]
    pub chunking: ChunkingParams,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub ranking: RankingParams,
    #[serde(default)]
    pub context: ContextParams,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VaultConfig {
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.md".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_final_limit")]
    pub final_limit: usize,
    #[serde(default = "default_boost_inventory")]
    pub boost_inventory: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            final_limit: default_final_limit(),
            boost_inventory: default_boost_inventory(),
        }
    }
}

fn default_final_limit() -> usize {
    5
}
fn default_boost_inventory() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for HTTP providers; each provider has its own default.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    32
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        anyhow::bail!("chunking.chunk_overlap must be < chunking.chunk_size");
    }

    // Validate retrieval
    if config.retrieval.final_limit < 1 {
        anyhow::bail!("retrieval.final_limit must be >= 1");
    }
    if config.ranking.candidate_multiplier < 1 {
        anyhow::bail!("ranking.candidate_multiplier must be >= 1");
    }

    // Validate embedding
    let provider = config.embedding.provider.as_str();
    match provider {
        "disabled" | "ollama" | "openai" | "hash" | "local" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, ollama, openai, hash, or local.",
            other
        ),
    }
    if matches!(provider, "ollama" | "openai") && config.embedding.model.is_none() {
        anyhow::bail!(
            "embedding.model must be specified when provider is '{}'",
            provider
        );
    }
    if provider == "hash" && matches!(config.embedding.dims, None | Some(0)) {
        anyhow::bail!("embedding.dims must be > 0 when provider is 'hash'");
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_text: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_text)?;
        validate(&config)?;
        Ok(config)
    }

    const MINIMAL: &str = r#"
[db]
path = "./data/forge.sqlite"

[vault]
root = "./vault"
"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse(MINIMAL).unwrap();
        assert_eq!(config.vault.include_globs, vec!["**/*.md"]);
        assert!(!config.vault.follow_symlinks);
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.retrieval.final_limit, 5);
        assert!(config.retrieval.boost_inventory);
        assert_eq!(config.ranking.candidate_multiplier, 10);
        assert_eq!(config.context.max_chars, 6000);
        assert_eq!(config.embedding.provider, "disabled");
        assert!(!config.embedding.is_enabled());
    }

    #[test]
    fn test_ranking_override_keeps_other_defaults() {
        let text = format!(
            "{MINIMAL}\n[ranking]\nfilename_bonus = 0.25\n\n[ranking.temporal.recency]\nmax_bonus = 0.6\nhalf_life_days = 1.0\n"
        );
        let config = parse(&text).unwrap();
        assert_eq!(config.ranking.filename_bonus, 0.25);
        assert_eq!(config.ranking.term_bonus, 0.1);
        assert_eq!(config.ranking.temporal.recency.max_bonus, 0.6);
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        let text = format!("{MINIMAL}\n[chunking]\nchunk_size = 100\nchunk_overlap = 100\n");
        let err = parse(&text).unwrap_err().to_string();
        assert!(err.contains("chunk_overlap"), "{err}");
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let text = format!("{MINIMAL}\n[embedding]\nprovider = \"bogus\"\n");
        let err = parse(&text).unwrap_err().to_string();
        assert!(err.contains("Unknown embedding provider"), "{err}");
    }

    #[test]
    fn test_ollama_requires_model() {
        let text = format!("{MINIMAL}\n[embedding]\nprovider = \"ollama\"\n");
        assert!(parse(&text).is_err());
        let text = format!(
            "{MINIMAL}\n[embedding]\nprovider = \"ollama\"\nmodel = \"nomic-embed-text\"\n"
        );
        assert!(parse(&text).is_ok());
    }

    #[test]
    fn test_hash_requires_dims() {
        let text = format!("{MINIMAL}\n[embedding]\nprovider = \"hash\"\n");
        assert!(parse(&text).is_err());
        let text = format!("{MINIMAL}\n[embedding]\nprovider = \"hash\"\ndims = 64\n");
        assert_eq!(parse(&text).unwrap().embedding.dims, Some(64));
    }

    #[test]
    fn test_load_config_reports_missing_file() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
