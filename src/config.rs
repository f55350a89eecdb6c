/// Configuration management using figment
///
/// Loads configuration with this precedence (highest wins):
/// 1. Defaults (hardcoded)
/// 2. TOML file: querybench.toml (in working directory, or --config-file)
/// 3. Environment variables: prefixed QUERYBENCH_, `__` for nesting
///    (e.g., QUERYBENCH_BENCHMARK__EXECUTE_FUZZY_QUERY=false)
/// 4. JSON overrides for the `benchmark` section (command-line argument)

use std::path::Path;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Toml, Serialized},
};
use serde::{Deserialize, Serialize};

use crate::benchmark::executor::RetryPolicy;
use crate::benchmark::{BenchmarkConfig, SearchFields};
use crate::errors::BenchError;

pub const DEFAULT_CONFIG_FILE: &str = "querybench.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Per-attempt HTTP timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Total attempts per request when attempts time out
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff delay in milliseconds, doubled after each timeout
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Index field names used by queries and digests
    #[serde(default)]
    pub fields: SearchFields,

    /// Which query families run, and their parameters
    #[serde(default)]
    pub benchmark: BenchmarkConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1000
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level: default_log_level(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            fields: SearchFields::default(),
            benchmark: BenchmarkConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from `toml_path` (skipped if absent), environment
    /// variables, and optional JSON overrides for the `benchmark` section.
    ///
    /// The result is validated: malformed JSON, unknown keys, empty
    /// parameter lists and zero limits are all configuration errors.
    pub fn load_from(toml_path: &Path, benchmark_json: Option<&str>) -> Result<Config, BenchError> {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(toml_path))
            .merge(Env::prefixed("QUERYBENCH_").split("__"));

        if let Some(json) = benchmark_json {
            figment = figment.merge(Serialized::default("benchmark", parse_overrides(json)?));
        }

        let config: Config = figment
            .extract()
            .map_err(|e| BenchError::Config {
                message: format!("Failed to load config: {}", e),
                field: None,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), BenchError> {
        if self.request_timeout_secs == 0 {
            return Err(BenchError::config("request_timeout_secs", "must be positive"));
        }
        if self.max_retries == 0 {
            return Err(BenchError::config("max_retries", "must be at least 1"));
        }
        self.benchmark.validate()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            max_retries: self.max_retries,
            backoff_base: Duration::from_millis(self.backoff_base_ms),
        }
    }
}

/// Parse the JSON override mapping; anything but an object is rejected.
fn parse_overrides(json: &str) -> Result<serde_json::Value, BenchError> {
    let value: serde_json::Value = serde_json::from_str(json).map_err(|e| BenchError::Config {
        message: format!("Error parsing configuration JSON: {}", e),
        field: None,
    })?;
    if !value.is_object() {
        return Err(BenchError::Config {
            message: "Configuration JSON must be an object".to_string(),
            field: None,
        });
    }
    Ok(value)
}
