use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:9012";

/// Longest accepted duration for any of the timing settings (one day).
pub const MAX_DURATION_SECS: u64 = 86_400;

const ENV_VOTE_DURATION: &str = "REQUEST_MAP_VOTE_DURATION";
const ENV_MAP_SWITCH_DELAY: &str = "REQUEST_MAP_SWITCH_DELAY";
const ENV_COOLDOWN_DELAY: &str = "REQUEST_MAP_COOLDOWN_DELAY";
const ENV_APPROVE_THRESHOLD: &str = "REQUEST_MAP_APPROVE_THRESHOLD";
const ENV_BIND_ADDR: &str = "REQUEST_MAP_BIND_ADDR";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} is not a valid number: {value:?}")]
    InvalidNumber { var: &'static str, value: String },
    #[error("{field} of {secs}s exceeds the {max}s limit")]
    DurationTooLong {
        field: &'static str,
        secs: u64,
        max: u64,
    },
    #[error("approve_threshold must be at least 1")]
    ZeroThreshold,
    #[error("config parse failed: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Fixed at enable time; the running plugin never edits it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PluginConfig {
    /// Seconds a request stays open for approvals.
    pub vote_duration: u64,
    /// Seconds between approval and the map switch.
    pub map_switch_delay: u64,
    /// Seconds after opening a request before the next one may be opened.
    pub cooldown_delay: u64,
    pub approve_threshold: u32,
    pub bind_addr: String,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            vote_duration: 60,
            map_switch_delay: 15,
            cooldown_delay: 30,
            approve_threshold: 1,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
        }
    }
}

impl PluginConfig {
    /// Defaults overridden by any `REQUEST_MAP_*` variables that are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        if let Some(v) = lookup(ENV_VOTE_DURATION) {
            cfg.vote_duration = parse_number(ENV_VOTE_DURATION, &v)?;
        }
        if let Some(v) = lookup(ENV_MAP_SWITCH_DELAY) {
            cfg.map_switch_delay = parse_number(ENV_MAP_SWITCH_DELAY, &v)?;
        }
        if let Some(v) = lookup(ENV_COOLDOWN_DELAY) {
            cfg.cooldown_delay = parse_number(ENV_COOLDOWN_DELAY, &v)?;
        }
        if let Some(v) = lookup(ENV_APPROVE_THRESHOLD) {
            cfg.approve_threshold = parse_number(ENV_APPROVE_THRESHOLD, &v)?;
        }
        if let Some(v) = lookup(ENV_BIND_ADDR) {
            cfg.bind_addr = v.trim().to_string();
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.approve_threshold == 0 {
            return Err(ConfigError::ZeroThreshold);
        }
        for (field, secs) in [
            ("vote_duration", self.vote_duration),
            ("map_switch_delay", self.map_switch_delay),
            ("cooldown_delay", self.cooldown_delay),
        ] {
            if secs > MAX_DURATION_SECS {
                return Err(ConfigError::DurationTooLong {
                    field,
                    secs,
                    max: MAX_DURATION_SECS,
                });
            }
        }
        Ok(())
    }

    pub fn vote_duration(&self) -> Duration {
        Duration::from_secs(self.vote_duration)
    }

    pub fn map_switch_delay(&self) -> Duration {
        Duration::from_secs(self.map_switch_delay)
    }

    pub fn cooldown_delay(&self) -> Duration {
        Duration::from_secs(self.cooldown_delay)
    }
}

fn parse_number<N: std::str::FromStr>(var: &'static str, value: &str) -> Result<N, ConfigError> {
    value
        .trim()
        .parse::<N>()
        .map_err(|_| ConfigError::InvalidNumber {
            var,
            value: value.to_string(),
        })
}
