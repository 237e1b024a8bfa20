//! 统一配置
//!
//! 服务的所有可调参数集中在这里，避免在多个 crate 中重复定义阈值和路径。
//! 环境变量 `NLU_*` 可覆盖默认值。

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default values for tunables.
pub mod defaults {
    /// Gates the regex paths.
    pub const CONFIDENCE_THRESHOLD: f32 = 0.5;
    /// Gates the model paths (domain classification and intent matching).
    pub const SIMILARITY_THRESHOLD: f32 = 0.6;
    /// Domain used when nothing better is known.
    pub const FALLBACK_DOMAIN: &str = "通用";
    /// Intent used when no path produced an acceptable result.
    pub const FALLBACK_INTENT: &str = "unknown";
    /// Reference embedding model (multilingual MiniLM family).
    pub const EMBEDDING_MODEL: &str = "paraphrase-multilingual-MiniLM-L12-v2";
    /// MiniLM output dimension.
    pub const EMBEDDING_DIMENSION: usize = 384;
    /// Bounded cache sizes for embeddings and predictions.
    pub const CACHE_SIZE: usize = 1000;
}

/// Environment variable names.
pub mod env_vars {
    pub const CONFIG_DIR: &str = "NLU_CONFIG_DIR";
    pub const CONFIDENCE_THRESHOLD: &str = "NLU_CONFIDENCE_THRESHOLD";
    pub const SIMILARITY_THRESHOLD: &str = "NLU_SIMILARITY_THRESHOLD";
    pub const EMBEDDING_ENDPOINT: &str = "NLU_EMBEDDING_ENDPOINT";
    pub const EMBEDDING_MODEL: &str = "NLU_EMBEDDING_MODEL";
    pub const REQUEST_TIMEOUT_MS: &str = "NLU_REQUEST_TIMEOUT_MS";
    pub const LOG_JSON: &str = "NLU_LOG_JSON";
}

/// Embedding provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    /// HTTP endpoint of the embedding server. When absent the deterministic
    /// hash fallback is used.
    pub endpoint: Option<String>,
    /// Model name passed to the provider.
    pub model: String,
    /// Vector dimension the provider returns.
    pub dimension: usize,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Embedding cache capacity (entries).
    pub cache_size: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: defaults::EMBEDDING_MODEL.to_string(),
            dimension: defaults::EMBEDDING_DIMENSION,
            timeout_secs: 30,
            cache_size: defaults::CACHE_SIZE,
        }
    }
}

/// Runtime settings for the recognition pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Confidence gate for regex paths.
    pub confidence_threshold: f32,
    /// Similarity gate for model paths.
    pub similarity_threshold: f32,
    /// Domain reported when classification fails or nothing matches.
    pub fallback_domain: String,
    /// Intent reported when nothing matches.
    pub fallback_intent: String,
    /// Vocabulary group definitions.
    pub vocabulary_path: PathBuf,
    /// Directory of per-domain regex rule files.
    pub regex_dir: PathBuf,
    /// Domain example document.
    pub domain_examples_path: PathBuf,
    /// Intent example document.
    pub intent_examples_path: PathBuf,
    /// Overall per-request deadline in milliseconds; 0 disables it.
    pub request_timeout_ms: u64,
    /// Prediction cache capacity for the classifier and intent matcher.
    pub cache_size: usize,
    /// Embedding provider settings.
    pub embedding: EmbeddingSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            confidence_threshold: defaults::CONFIDENCE_THRESHOLD,
            similarity_threshold: defaults::SIMILARITY_THRESHOLD,
            fallback_domain: defaults::FALLBACK_DOMAIN.to_string(),
            fallback_intent: defaults::FALLBACK_INTENT.to_string(),
            vocabulary_path: PathBuf::from("configs/vocabulary_groups.json"),
            regex_dir: PathBuf::from("configs/regex"),
            domain_examples_path: PathBuf::from("configs/domain_examples.json"),
            intent_examples_path: PathBuf::from("configs/intent_examples.json"),
            request_timeout_ms: 0,
            cache_size: defaults::CACHE_SIZE,
            embedding: EmbeddingSettings::default(),
        }
    }
}

impl Settings {
    /// Build settings from defaults plus `NLU_*` environment overrides.
    pub fn from_env() -> Self {
        let mut settings = Self::default();

        if let Ok(dir) = std::env::var(env_vars::CONFIG_DIR) {
            settings = settings.with_config_dir(Path::new(&dir));
        }
        if let Some(v) = parse_env::<f32>(env_vars::CONFIDENCE_THRESHOLD) {
            settings.confidence_threshold = v.clamp(0.0, 1.0);
        }
        if let Some(v) = parse_env::<f32>(env_vars::SIMILARITY_THRESHOLD) {
            settings.similarity_threshold = v.clamp(0.0, 1.0);
        }
        if let Ok(endpoint) = std::env::var(env_vars::EMBEDDING_ENDPOINT) {
            if !endpoint.is_empty() {
                settings.embedding.endpoint = Some(endpoint);
            }
        }
        if let Ok(model) = std::env::var(env_vars::EMBEDDING_MODEL) {
            if !model.is_empty() {
                settings.embedding.model = model;
            }
        }
        if let Some(v) = parse_env::<u64>(env_vars::REQUEST_TIMEOUT_MS) {
            settings.request_timeout_ms = v;
        }

        settings
    }

    /// Re-root all config document paths under `dir`.
    pub fn with_config_dir(mut self, dir: &Path) -> Self {
        self.vocabulary_path = dir.join("vocabulary_groups.json");
        self.regex_dir = dir.join("regex");
        self.domain_examples_path = dir.join("domain_examples.json");
        self.intent_examples_path = dir.join("intent_examples.json");
        self
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
