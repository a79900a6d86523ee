use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration shared by the training job and the inference service
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TumorClfConfig {
    /// Tracking server / model registry settings
    #[serde(default)]
    pub tracking: TrackingConfig,

    /// Inference service settings
    #[serde(default)]
    pub serving: ServingConfig,

    /// Data preparation settings for training runs
    #[serde(default)]
    pub training: TrainingConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// `file:<dir>` for the local store, `http(s)://host[:port]` for an MLflow server
    #[serde(default = "default_tracking_uri")]
    pub tracking_uri: String,

    #[serde(default = "default_experiment_name")]
    pub experiment_name: String,

    /// Registered model name used for both registration and serving
    #[serde(default = "default_model_name")]
    pub model_name: String,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            tracking_uri: default_tracking_uri(),
            experiment_name: default_experiment_name(),
            model_name: default_model_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServingConfig {
    /// Registered model version pinned at startup
    #[serde(default = "default_model_version")]
    pub model_version: String,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServingConfig {
    fn default() -> Self {
        Self {
            model_version: default_model_version(),
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Fraction of rows held out for evaluation
    #[serde(default = "default_test_size")]
    pub test_size: f64,

    /// Seed for the stratified split
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Directory where local copies of run artifacts are written
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_size: default_test_size(),
            seed: default_seed(),
            work_dir: default_work_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// trace, debug, info, warn or error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// pretty or json
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_tracking_uri() -> String {
    "file:./experiments".to_string()
}
fn default_experiment_name() -> String {
    "BreastCancer_Classification".to_string()
}
fn default_model_name() -> String {
    "ClassificationModel".to_string()
}
fn default_model_version() -> String {
    "3".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    5000
}
fn default_test_size() -> f64 {
    crate::prep::DEFAULT_TEST_SIZE
}
fn default_seed() -> u64 {
    crate::prep::DEFAULT_SEED
}
fn default_work_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

/// Configuration manager with layered sources
pub struct ConfigManager {
    config: TumorClfConfig,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with the following precedence:
    /// 1. Environment variables (.env file)
    /// 2. Config file (.tumorclf.toml)
    /// 3. Defaults
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_dotenv();

        let (config, config_path) = Self::load_config_file()?;
        let config = Self::apply_env_overrides(config, |key| std::env::var(key).ok());
        Self::validate_config(&config)?;

        info!(
            tracking_uri = %config.tracking.tracking_uri,
            model_name = %config.tracking.model_name,
            config_file = ?config_path,
            "Configuration loaded"
        );

        Ok(Self {
            config,
            config_path,
        })
    }

    /// Build a manager around an explicit configuration, validating it first
    pub fn from_config(config: TumorClfConfig) -> Result<Self, ConfigError> {
        Self::validate_config(&config)?;
        Ok(Self {
            config,
            config_path: None,
        })
    }

    fn load_dotenv() {
        if Path::new(".env").exists() {
            if let Err(e) = dotenv::from_filename(".env") {
                warn!("Failed to load .env file: {}", e);
            }
        }
    }

    /// Search order:
    /// 1. ./.tumorclf.toml
    /// 2. ~/.tumorclf/config.toml
    /// 3. Defaults
    fn load_config_file() -> Result<(TumorClfConfig, Option<PathBuf>), ConfigError> {
        let local_config = Path::new(".tumorclf.toml");
        if local_config.exists() {
            let config = Self::read_toml_file(local_config)?;
            return Ok((config, Some(local_config.to_path_buf())));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".tumorclf").join("config.toml");
            if user_config.exists() {
                let config = Self::read_toml_file(&user_config)?;
                return Ok((config, Some(user_config)));
            }
        }

        Ok((TumorClfConfig::default(), None))
    }

    fn read_toml_file(path: &Path) -> Result<TumorClfConfig, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Apply overrides looked up through `lookup` (the process environment in `load`)
    fn apply_env_overrides(
        mut config: TumorClfConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> TumorClfConfig {
        if let Some(uri) = lookup("MLFLOW_TRACKING_URI") {
            config.tracking.tracking_uri = uri;
        }
        if let Some(experiment) = lookup("TUMORCLF_EXPERIMENT") {
            config.tracking.experiment_name = experiment;
        }
        if let Some(name) = lookup("MODEL_NAME") {
            config.tracking.model_name = name;
        }
        if let Some(version) = lookup("MODEL_VERSION") {
            config.serving.model_version = version;
        }
        if let Some(host) = lookup("TUMORCLF_HOST") {
            config.serving.host = host;
        }
        if let Some(port) = lookup("TUMORCLF_PORT").or_else(|| lookup("PORT")) {
            match port.parse() {
                Ok(port) => config.serving.port = port,
                Err(_) => warn!("Ignoring invalid port override: {}", port),
            }
        }
        if let Some(dir) = lookup("TUMORCLF_WORK_DIR") {
            config.training.work_dir = PathBuf::from(dir);
        }
        if let Some(level) = lookup("RUST_LOG") {
            config.logging.level = level;
        }
        if let Some(format) = lookup("TUMORCLF_LOG_FORMAT") {
            config.logging.format = format;
        }

        config
    }

    fn validate_config(config: &TumorClfConfig) -> Result<(), ConfigError> {
        let uri = config.tracking.tracking_uri.as_str();
        if !(uri.starts_with("file:") || uri.starts_with("http://") || uri.starts_with("https://"))
        {
            return Err(ConfigError::ValidationError(format!(
                "Unsupported tracking URI: {}. Must start with file:, http:// or https://",
                uri
            )));
        }

        if config.tracking.model_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Model name must not be empty".to_string(),
            ));
        }
        if config.serving.model_version.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Model version must not be empty".to_string(),
            ));
        }

        let test_size = config.training.test_size;
        if !(test_size > 0.0 && test_size < 1.0) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid test_size: {}. Must be between 0 and 1",
                test_size
            )));
        }

        match config.logging.format.as_str() {
            "pretty" | "json" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log format: {}. Must be one of: pretty, json",
                    other
                )))
            }
        }

        // RUST_LOG may carry full directives such as "tumorclf_api=debug,tower_http=info"
        if !config.logging.level.contains('=') {
            match config.logging.level.as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => {}
                other => {
                    return Err(ConfigError::ValidationError(format!(
                        "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                        other
                    )))
                }
            }
        }

        Ok(())
    }

    pub fn config(&self) -> &TumorClfConfig {
        &self.config
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = TumorClfConfig::default();
        assert_eq!(config.tracking.tracking_uri, "file:./experiments");
        assert_eq!(config.tracking.model_name, "ClassificationModel");
        assert_eq!(config.serving.model_version, "3");
        assert_eq!(config.serving.port, 5000);
        assert_eq!(config.training.seed, 42);
    }

    #[test]
    fn test_config_validation() {
        let config = TumorClfConfig::default();
        assert!(ConfigManager::validate_config(&config).is_ok());

        let mut bad_uri = config.clone();
        bad_uri.tracking.tracking_uri = "s3://bucket".to_string();
        assert!(ConfigManager::validate_config(&bad_uri).is_err());

        let mut bad_split = config.clone();
        bad_split.training.test_size = 1.5;
        assert!(ConfigManager::validate_config(&bad_split).is_err());

        let mut directives = config;
        directives.logging.level = "tumorclf_api=debug,tower_http=info".to_string();
        assert!(ConfigManager::validate_config(&directives).is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("MLFLOW_TRACKING_URI", "http://mlflow:5000"),
            ("MODEL_NAME", "Other"),
            ("MODEL_VERSION", "7"),
            ("PORT", "8000"),
        ]);
        let config = ConfigManager::apply_env_overrides(TumorClfConfig::default(), |key| {
            env.get(key).map(|v| v.to_string())
        });

        assert_eq!(config.tracking.tracking_uri, "http://mlflow:5000");
        assert_eq!(config.tracking.model_name, "Other");
        assert_eq!(config.serving.model_version, "7");
        assert_eq!(config.serving.port, 8000);
        assert_eq!(config.tracking.experiment_name, "BreastCancer_Classification");
    }

    #[test]
    fn test_invalid_port_override_is_ignored() {
        let config = ConfigManager::apply_env_overrides(TumorClfConfig::default(), |key| {
            (key == "TUMORCLF_PORT").then(|| "not-a-port".to_string())
        });
        assert_eq!(config.serving.port, 5000);
    }

    #[test]
    fn test_toml_sections_fill_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[serving]\nmodel_version = \"2\"\n").unwrap();

        let config = ConfigManager::read_toml_file(&path).unwrap();
        assert_eq!(config.serving.model_version, "2");
        assert_eq!(config.serving.port, 5000);
        assert_eq!(config.tracking.model_name, "ClassificationModel");
    }
}
