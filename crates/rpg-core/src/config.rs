//! Configuration for the encode/evolve pipeline.
//!
//! Load order: `.rpg/config.toml` → environment variables → defaults.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RpgConfig {
    pub encoding: EncodingConfig,
    pub storage: StorageConfig,
}

/// Storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Compress graph.json with zstd before writing. Decompression on load is automatic
    /// (detected by magic bytes).
    pub compress: bool,
}

/// Encoding and evolution pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingConfig {
    /// Minimum estimated tokens for a semantic-lifting batch before a trailing small batch is
    /// merged into the previous one (SPEC_FULL.md §4.6).
    pub min_batch_tokens: usize,
    /// Token budget per semantic-lifting batch — batches are filled until this limit.
    pub max_batch_tokens: usize,
    /// Semantic drift threshold: above this, the Evolver re-routes rather than updates in place.
    pub drift_threshold: f64,
    /// Whether to broadcast file-level imports to entities without call-site info. When false
    /// (default), entities without invokes/inherits get no import edges — "refuse to guess".
    pub broadcast_imports: bool,
    /// File count above which the Structural Reorganizer clusters files for domain discovery
    /// instead of presenting the whole repository to the LLM in one call.
    pub cluster_threshold: usize,
    /// Semantic cache TTL, in seconds. Default: 7 days.
    pub cache_ttl_secs: u64,
    /// Per-batch LLM retry budget for semantic lifting and structured parsing.
    pub max_parse_iterations: u32,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            min_batch_tokens: 10_000,
            max_batch_tokens: 50_000,
            drift_threshold: 0.3,
            broadcast_imports: false,
            cluster_threshold: 70,
            cache_ttl_secs: 7 * 24 * 60 * 60,
            max_parse_iterations: 3,
        }
    }
}

/// Helper to parse an env var and apply it to a config field.
fn env_override<T: std::str::FromStr>(var: &str, target: &mut T) {
    if let Ok(v) = std::env::var(var)
        && let Ok(n) = v.parse()
    {
        *target = n;
    }
}

impl RpgConfig {
    /// Load config from `.rpg/config.toml` in the project root, with env var overrides. Falls
    /// back to defaults if no config file exists.
    pub fn load(project_root: &Path) -> Result<Self> {
        let config_path = project_root.join(".rpg").join("config.toml");

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };

        env_override("RPG_MIN_BATCH_TOKENS", &mut config.encoding.min_batch_tokens);
        env_override("RPG_MAX_BATCH_TOKENS", &mut config.encoding.max_batch_tokens);
        env_override("RPG_DRIFT_THRESHOLD", &mut config.encoding.drift_threshold);
        env_override("RPG_CLUSTER_THRESHOLD", &mut config.encoding.cluster_threshold);
        env_override("RPG_CACHE_TTL_SECS", &mut config.encoding.cache_ttl_secs);
        env_override(
            "RPG_MAX_PARSE_ITERATIONS",
            &mut config.encoding.max_parse_iterations,
        );

        if config.encoding.min_batch_tokens >= config.encoding.max_batch_tokens {
            anyhow::bail!(
                "min_batch_tokens ({}) must be less than max_batch_tokens ({})",
                config.encoding.min_batch_tokens,
                config.encoding.max_batch_tokens,
            );
        }

        Ok(config)
    }
}
