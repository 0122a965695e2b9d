//! Configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Execution engine limits
    pub engine: EngineConfig,

    /// Queue pump scheduling
    pub pump: PumpConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        if self.engine.max_concurrent_executions == 0 {
            return Err(eyre::eyre!("engine.max-concurrent-executions must be at least 1"));
        }
        if self.pump.stuck_threshold_secs == 0 {
            return Err(eyre::eyre!("pump.stuck-threshold-secs must be at least 1"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    ///
    /// Explicit path, then `.taskforge.yml` in the working directory, then
    /// `~/.config/taskforge/taskforge.yml`, then defaults.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let local_config = PathBuf::from(".taskforge.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("taskforge").join("taskforge.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Execution engine limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Max in-flight executions on the legacy queue path
    #[serde(rename = "max-concurrent-executions")]
    pub max_concurrent_executions: usize,

    /// Default per-invocation timeout in milliseconds
    #[serde(rename = "default-timeout-ms")]
    pub default_timeout_ms: u64,

    /// Workflow name used when options carry no task mode
    #[serde(rename = "default-workflow")]
    pub default_workflow: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_executions: 5,
            default_timeout_ms: 300_000,
            default_workflow: "standard-task-workflow".to_string(),
        }
    }
}

impl EngineConfig {
    /// Default timeout as a Duration
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}

/// Queue pump scheduling
///
/// The stuck threshold is deliberately a config value: the window after
/// which a running item is considered abandoned and eligible for reclaim.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PumpConfig {
    /// Poll interval in seconds (the timer half of the wake condition)
    #[serde(rename = "poll-interval-secs")]
    pub poll_interval_secs: u64,

    /// Seconds a running item may go without a terminal update before the
    /// pump reclaims it
    #[serde(rename = "stuck-threshold-secs")]
    pub stuck_threshold_secs: u64,

    /// Delay before the follow-up tick after an item settles, in
    /// milliseconds
    #[serde(rename = "retick-delay-ms")]
    pub retick_delay_ms: u64,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 10,
            stuck_threshold_secs: 30,
            retick_delay_ms: 2_000,
        }
    }
}

impl PumpConfig {
    /// Poll interval as a Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Stuck threshold as a Duration
    pub fn stuck_threshold(&self) -> Duration {
        Duration::from_secs(self.stuck_threshold_secs)
    }

    /// Retick delay as a Duration
    pub fn retick_delay(&self) -> Duration {
        Duration::from_millis(self.retick_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.engine.max_concurrent_executions, 5);
        assert_eq!(config.engine.default_timeout_ms, 300_000);
        assert_eq!(config.pump.stuck_threshold_secs, 30);
        assert_eq!(config.pump.retick_delay_ms, 2_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let config = Config {
            engine: EngineConfig {
                max_concurrent_executions: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duration_accessors() {
        let pump = PumpConfig::default();
        assert_eq!(pump.poll_interval(), Duration::from_secs(10));
        assert_eq!(pump.stuck_threshold(), Duration::from_secs(30));
        assert_eq!(pump.retick_delay(), Duration::from_millis(2_000));
    }

    #[test]
    fn test_parse_yaml_partial_override() {
        let yaml = "engine:\n  max-concurrent-executions: 2\npump:\n  stuck-threshold-secs: 60\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.engine.max_concurrent_executions, 2);
        // Untouched fields keep defaults
        assert_eq!(config.engine.default_timeout_ms, 300_000);
        assert_eq!(config.pump.stuck_threshold_secs, 60);
        assert_eq!(config.pump.poll_interval_secs, 10);
    }

    #[test]
    fn test_load_missing_path_errors() {
        let path = PathBuf::from("/nonexistent/taskforge.yml");
        assert!(Config::load(Some(&path)).is_err());
    }
}
