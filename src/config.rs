use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::statistics::Thresholds;

/// Main configuration structure for the creator pipeline
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// A/B test decision settings
    pub experiment: ExperimentConfig,
    /// Creative generation settings
    pub generation: GenerationConfig,
    /// Snapshot storage settings
    pub storage: StorageConfig,
    /// Logging settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Experiments still undecided after this long pick the best CTR
    pub max_duration_hours: u64,
    /// Confidence needed to declare a statistical winner
    pub min_confidence: f64,
    /// Impressions per arm before an undecided test counts as inconclusive
    pub min_sample_impressions: u64,
    /// Delay between polls when watching a running experiment
    pub check_interval_seconds: u64,
    /// Confidence above which a human may end the test early
    pub early_declare_confidence: f64,
    /// Running time after which a human may end the test early
    pub early_declare_after_seconds: u64,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            max_duration_hours: 72,
            min_confidence: 0.95,
            min_sample_impressions: 1000,
            check_interval_seconds: 30,
            early_declare_confidence: 0.90,
            early_declare_after_seconds: 3600,
        }
    }
}

impl ExperimentConfig {
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            min_confidence: self.min_confidence,
            min_sample_impressions: self.min_sample_impressions,
        }
    }

    pub fn max_duration_seconds(&self) -> i64 {
        (self.max_duration_hours * 3600) as i64
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Image service prompts are appended to
    pub image_base_url: String,
    pub thumbnail_width: u32,
    pub thumbnail_height: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            image_base_url: "https://image.pollinations.ai/prompt".to_string(),
            thumbnail_width: 1280,
            thumbnail_height: 720,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one JSON snapshot per workflow
    pub snapshot_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            snapshot_dir: ".creator-pipeline/workflows".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default log filter when RUST_LOG is unset
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable ones
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (creator-pipeline.toml)
    /// 3. Environment variables (prefixed with CREATOR_PIPELINE__)
    pub fn load() -> Result<Self> {
        // Missing keys fall back to Default via #[serde(default)]
        let mut builder = Config::builder();

        if Path::new("creator-pipeline.toml").exists() {
            builder = builder.add_source(File::with_name("creator-pipeline"));
        }

        builder = builder.add_source(
            Environment::with_prefix("CREATOR_PIPELINE")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<PipelineConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        // Load .env file first
        let _ = PipelineConfig::load_env_file();
        PipelineConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static PipelineConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}
