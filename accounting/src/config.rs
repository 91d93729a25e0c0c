use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::PoolError;

#[derive(Debug, Clone, Deserialize)]
pub struct AccountingConfig {
    /// Root directory for per-client worker logs and records.
    #[serde(default = "default_persist_dir")]
    pub persist_dir: PathBuf,
    /// How often live shifts are rotated out for settlement.
    #[serde(default = "default_shift_duration_secs")]
    pub shift_duration_secs: u64,
    /// Initial vardiff target for a fresh session.
    #[serde(default = "default_difficulty")]
    pub default_difficulty: f64,
}

impl Default for AccountingConfig {
    fn default() -> Self {
        Self {
            persist_dir: default_persist_dir(),
            shift_duration_secs: default_shift_duration_secs(),
            default_difficulty: default_difficulty(),
        }
    }
}

fn default_persist_dir() -> PathBuf {
    PathBuf::from("data/pool")
}

fn default_shift_duration_secs() -> u64 {
    300
}

fn default_difficulty() -> f64 {
    10_000.0
}

impl AccountingConfig {
    /// Optional env overrides (useful for tests / tuning):
    /// - GALENA_PERSIST_DIR
    /// - GALENA_SHIFT_SECS
    /// - GALENA_DEFAULT_DIFFICULTY
    pub fn from_env_or_default() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("GALENA_PERSIST_DIR") {
            if !v.is_empty() {
                cfg.persist_dir = PathBuf::from(v);
            }
        }
        if let Ok(v) = std::env::var("GALENA_SHIFT_SECS") {
            if let Ok(n) = v.parse::<u64>() {
                if n > 0 {
                    cfg.shift_duration_secs = n;
                }
            }
        }
        if let Ok(v) = std::env::var("GALENA_DEFAULT_DIFFICULTY") {
            if let Ok(n) = v.parse::<f64>() {
                if n.is_finite() && n > 0.0 {
                    cfg.default_difficulty = n;
                }
            }
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), PoolError> {
        if self.persist_dir.as_os_str().is_empty() {
            return Err(PoolError::Configuration(
                "persist_dir must not be empty".to_string(),
            ));
        }
        if self.shift_duration_secs == 0 {
            return Err(PoolError::Configuration(
                "shift_duration_secs must be positive".to_string(),
            ));
        }
        if !self.default_difficulty.is_finite() || self.default_difficulty <= 0.0 {
            return Err(PoolError::Configuration(
                "default_difficulty must be a positive finite number".to_string(),
            ));
        }
        Ok(())
    }

    pub fn shift_duration(&self) -> Duration {
        Duration::from_secs(self.shift_duration_secs)
    }
}
