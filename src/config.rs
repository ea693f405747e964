/// Configuration module.
///
/// Handles loading, validating, and providing default configuration values.
/// Configuration lives in a JSON file; every field has a default so partial
/// files are accepted.
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "config.json";

const EMBEDDER_PROVIDERS: &[&str] = &["onnx", "hashing"];

// ── Default value functions ──────────────────────────────────────────

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}

fn default_index_path() -> String {
    "./vector_store".to_string()
}

fn default_top_k() -> usize {
    4
}

fn default_provider() -> String {
    "onnx".to_string()
}

fn default_model_name() -> String {
    "all-MiniLM-L6-v2".to_string()
}

fn default_model_dir() -> String {
    "models/all-MiniLM-L6-v2".to_string()
}

fn default_dimensions() -> usize {
    384
}

fn default_max_input_tokens() -> usize {
    256
}

fn default_true() -> bool {
    true
}

fn default_llm_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_llm_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_api_key_env() -> String {
    "GOOGLE_API_KEY".to_string()
}

fn default_temperature() -> f32 {
    0.6
}

fn default_timeout_secs() -> u64 {
    30
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub embedder: EmbedderConfig,

    #[serde(default)]
    pub llm: LlmConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndexConfig {
    /// Directory holding the persisted index snapshot.
    #[serde(default = "default_index_path")]
    pub path: String,

    /// Number of documents retrieved per query.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// JSON file with the documents to index on first start. The built-in
    /// seed documents are used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_corpus: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbedderConfig {
    /// `onnx` or `hashing`.
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default = "default_model_name")]
    pub model_name: String,

    #[serde(default = "default_model_dir")]
    pub model_dir: String,

    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    #[serde(default = "default_max_input_tokens")]
    pub max_input_tokens: usize,

    #[serde(default = "default_true")]
    pub auto_download: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_model")]
    pub model: String,

    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_index_path(),
            top_k: default_top_k(),
            seed_corpus: None,
        }
    }
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model_name: default_model_name(),
            model_dir: default_model_dir(),
            dimensions: default_dimensions(),
            max_input_tokens: default_max_input_tokens(),
            auto_download: default_true(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_llm_model(),
            base_url: default_llm_base_url(),
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// If `config_path` is empty, defaults to `"config.json"`.
    /// If the file does not exist, returns a default config and, for the
    /// default path only, writes a template file.
    pub fn load(config_path: &str) -> Result<Self> {
        let path = if config_path.is_empty() {
            DEFAULT_CONFIG_PATH
        } else {
            config_path
        };

        if !Path::new(path).exists() {
            info!("{path} not found, using defaults");
            let cfg = Self::default();

            if path == DEFAULT_CONFIG_PATH {
                match cfg.save(path) {
                    Ok(()) => info!("Generated config template: {path}"),
                    Err(e) => warn!("Failed to generate config template: {e}"),
                }
            }

            return Ok(cfg);
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;

        let cfg: Config = match serde_json::from_str(&data) {
            Ok(c) => c,
            Err(e) => {
                warn!("Invalid JSON in {path}: {e}");
                warn!("Using default configuration");
                return Ok(Self::default());
            }
        };

        info!("Loaded configuration from {path}");
        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &str) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data).with_context(|| format!("failed to write config: {path}"))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.index.top_k > 0, "index.top_k must be positive");
        anyhow::ensure!(
            !self.index.path.is_empty(),
            "index.path must not be empty"
        );
        anyhow::ensure!(
            self.embedder.dimensions > 0,
            "embedder.dimensions must be positive"
        );
        anyhow::ensure!(
            self.embedder.max_input_tokens > 0,
            "embedder.max_input_tokens must be positive"
        );
        anyhow::ensure!(
            EMBEDDER_PROVIDERS.contains(&self.embedder.provider.as_str()),
            "embedder.provider must be one of {EMBEDDER_PROVIDERS:?}, got {:?}",
            self.embedder.provider
        );
        anyhow::ensure!(
            self.llm.timeout_secs > 0,
            "llm.timeout_secs must be positive"
        );
        anyhow::ensure!(
            (0.0..=2.0).contains(&self.llm.temperature),
            "llm.temperature must be within 0.0..=2.0"
        );
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.bind, "127.0.0.1:5000");
        assert_eq!(config.index.path, "./vector_store");
        assert_eq!(config.index.top_k, 4);
        assert!(config.index.seed_corpus.is_none());
        assert_eq!(config.embedder.provider, "onnx");
        assert_eq!(config.embedder.dimensions, 384);
        assert_eq!(config.embedder.model_name, "all-MiniLM-L6-v2");
        assert!(config.embedder.auto_download);
        assert_eq!(config.llm.model, "gemini-1.5-flash");
        assert_eq!(config.llm.api_key_env, "GOOGLE_API_KEY");
        assert_eq!(config.llm.timeout_secs, 30);
    }

    #[test]
    fn test_load_from_json() {
        let json = r#"{"index": {"top_k": 2}, "embedder": {"provider": "hashing"}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.index.top_k, 2);
        assert_eq!(config.embedder.provider, "hashing");
        // Other fields should have defaults
        assert_eq!(config.index.path, "./vector_store");
        assert_eq!(config.embedder.dimensions, 384);
        assert_eq!(config.llm.temperature, 0.6);
    }

    #[test]
    fn test_validate_ok() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_bad_top_k() {
        let mut config = Config::default();
        config.index.top_k = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = Config::default();
        config.embedder.provider = "bm25".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("bm25"));
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = Config::default();
        config.llm.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_non_default_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.index.top_k, 4);
        // No template is written for non-default paths
        assert!(!path.exists());
    }

    #[test]
    fn test_load_invalid_json_falls_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.index.top_k, 4);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = Config::default();
        config.index.seed_corpus = Some("corpus.json".to_string());
        config.save(path.to_str().unwrap()).unwrap();

        let loaded = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(loaded.index.seed_corpus.as_deref(), Some("corpus.json"));
        assert_eq!(loaded.llm.model, config.llm.model);
    }
}
