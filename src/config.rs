//! Service configuration: a TOML file plus `TX_RISK__*` environment overrides.

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Environment variable overriding the configuration file path.
pub const CONFIG_PATH_ENV: &str = "TX_RISK_CONFIG";

/// Prefix of `TX_RISK__SECTION__KEY` overrides.
pub const ENV_PREFIX: &str = "TX_RISK";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub models: ModelsConfig,
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

/// Request/reply transport
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    pub url: String,
    /// Subject for batch scoring requests
    pub predict_subject: String,
    /// Subject for health checks
    pub health_subject: String,
    /// Subject for model information
    pub model_info_subject: String,
    /// Subject that scores the built-in sample transaction
    pub test_predict_subject: String,
    /// Queue group shared by service replicas
    pub queue_group: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    /// Directory the candidate files are resolved against
    pub models_dir: String,
    /// Model files tried in order at startup; the first that loads is used
    #[serde(default = "default_candidates")]
    pub candidates: Vec<String>,
    /// Intra-op threads per ONNX session
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
}

fn default_onnx_threads() -> usize {
    1
}

fn default_candidates() -> Vec<String> {
    vec![
        "calibrated_model_quantile.onnx".to_string(),
        "rf_model_quantile.onnx".to_string(),
        "rf_model.onnx".to_string(),
    ]
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Maximum number of batch requests scored concurrently
    pub workers: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Seconds between metrics summaries (0 disables the reporter)
    pub report_interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            report_interval_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Level for this crate; `RUST_LOG` takes precedence
    pub level: String,
    /// `json`, `pretty`, or anything else for compact text
    pub format: String,
}

impl AppConfig {
    /// Load configuration from `TX_RISK_CONFIG` or the default path
    pub fn load() -> Result<Self> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from_path(path)
    }

    /// Load configuration from a specific path, with `TX_RISK__*` overrides
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_layered(path.as_ref(), Self::environment())
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX).separator("__")
    }

    fn load_layered(path: &Path, environment: Environment) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path))
            .add_source(environment)
            .build()
            .with_context(|| format!("Failed to build configuration from {}", path.display()))?;

        let config: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.pipeline.workers == 0 {
            anyhow::bail!("pipeline.workers must be at least 1");
        }
        if self.models.candidates.is_empty() {
            anyhow::bail!("models.candidates must list at least one model file");
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                predict_subject: "risk.predict_batch".to_string(),
                health_subject: "risk.health".to_string(),
                model_info_subject: "risk.model_info".to_string(),
                test_predict_subject: "risk.test_predict".to_string(),
                queue_group: "tx-risk-pipeline".to_string(),
            },
            models: ModelsConfig {
                models_dir: "models".to_string(),
                candidates: default_candidates(),
                onnx_threads: 1,
            },
            pipeline: PipelineConfig { workers: 4 },
            metrics: MetricsConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}
