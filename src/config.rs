use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tick_interval_ms: u64,
    pub report_interval_secs: u64,
    pub state_dir: PathBuf,
    pub deposit_amount: f64,
    pub initial_vault_balance: f64,
    pub initial_credit_balance: f64,
    pub advisor_url: Option<String>,
    pub advisor_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_interval_ms: 8_000,
            report_interval_secs: 3_600,
            state_dir: PathBuf::from("./aegis-state"),
            deposit_amount: 100.0,
            initial_vault_balance: 42_580.45,
            initial_credit_balance: 250.0,
            advisor_url: None,
            advisor_timeout_ms: 5_000,
        }
    }
}

impl Config {
    /// Defaults, then the JSON file named by `AEGIS_CONFIG` (if any),
    /// then environment overrides, then validation.
    ///
    /// | Env Var                | Field             |
    /// |------------------------|-------------------|
    /// | `AEGIS_STATE_DIR`      | `state_dir`       |
    /// | `AEGIS_TICK_MS`        | `tick_interval_ms`|
    /// | `AEGIS_DEPOSIT_AMOUNT` | `deposit_amount`  |
    /// | `AEGIS_ADVISOR_URL`    | `advisor_url`     |
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var("AEGIS_CONFIG") {
            Ok(path) if !path.is_empty() => Self::from_file(Path::new(&path))?,
            _ => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| EngineError::Config(format!("parsing {}: {}", path.display(), e)))
    }

    fn apply_env_overrides(&mut self) {
        if let Some(dir) = env_string("AEGIS_STATE_DIR") {
            log::info!("env override: AEGIS_STATE_DIR={}", dir);
            self.state_dir = PathBuf::from(dir);
        }
        if let Some(ms) = env_parse::<u64>("AEGIS_TICK_MS") {
            log::info!("env override: AEGIS_TICK_MS={}", ms);
            self.tick_interval_ms = ms;
        }
        if let Some(amount) = env_parse::<f64>("AEGIS_DEPOSIT_AMOUNT") {
            log::info!("env override: AEGIS_DEPOSIT_AMOUNT={}", amount);
            self.deposit_amount = amount;
        }
        if let Some(url) = env_string("AEGIS_ADVISOR_URL") {
            log::info!("env override: AEGIS_ADVISOR_URL");
            self.advisor_url = Some(url);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            return Err(EngineError::Config("tick_interval_ms must be > 0".into()));
        }
        if self.report_interval_secs == 0 {
            return Err(EngineError::Config("report_interval_secs must be > 0".into()));
        }
        if !self.deposit_amount.is_finite() || self.deposit_amount <= 0.0 {
            return Err(EngineError::Config(format!(
                "deposit_amount must be positive, got {}",
                self.deposit_amount
            )));
        }
        for (name, value) in [
            ("initial_vault_balance", self.initial_vault_balance),
            ("initial_credit_balance", self.initial_credit_balance),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(EngineError::Config(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }

    pub fn advisor_timeout(&self) -> Duration {
        Duration::from_millis(self.advisor_timeout_ms)
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let raw = env_string(name)?;
    match raw.parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("ignoring unparsable {}={}", name, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.tick_interval(), Duration::from_secs(8));
        assert_eq!(config.deposit_amount, 100.0);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aegis.json");
        std::fs::write(&path, r#"{"tick_interval_ms": 1000, "deposit_amount": 50.0}"#).unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.tick_interval_ms, 1000);
        assert_eq!(config.deposit_amount, 50.0);
        assert_eq!(config.initial_credit_balance, 250.0);
    }

    #[test]
    fn test_rejects_bad_values() {
        let config = Config {
            tick_interval_ms: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            deposit_amount: -1.0,
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("deposit_amount"));

        let config = Config {
            initial_credit_balance: f64::NAN,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = Config::from_file(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }
}
