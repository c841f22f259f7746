//! Configuration loading and representation.
//!
//! Values come from the process environment. The binary loads a `.env` file
//! first (via `dotenvy`), so anything set there is visible here too.

use std::net::SocketAddr;

use thiserror::Error;

pub const BIND_ADDR_VAR: &str = "STOCKLEDGER_BIND_ADDR";
pub const MAX_CONFLICT_RETRIES_VAR: &str = "STOCKLEDGER_MAX_CONFLICT_RETRIES";

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} is not a valid value: {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// How many times an operation is re-run after losing an optimistic
    /// concurrency race before the conflict is reported.
    pub max_conflict_retries: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build the config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_raw = lookup(BIND_ADDR_VAR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .trim()
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                var: BIND_ADDR_VAR,
                value: bind_raw.clone(),
                reason: e.to_string(),
            })?;

        let max_conflict_retries = match lookup(MAX_CONFLICT_RETRIES_VAR) {
            Some(raw) => raw.trim().parse::<u32>().map_err(|e| ConfigError::Invalid {
                var: MAX_CONFLICT_RETRIES_VAR,
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => DEFAULT_MAX_CONFLICT_RETRIES,
        };

        Ok(Self {
            bind_addr,
            max_conflict_retries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.bind_addr.port(), 8080);
    }

    #[test]
    fn values_are_read_and_trimmed() {
        let config = AppConfig::from_lookup(lookup(&[
            (BIND_ADDR_VAR, " 127.0.0.1:9000 "),
            (MAX_CONFLICT_RETRIES_VAR, "7"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.max_conflict_retries, 7);
    }

    #[test]
    fn malformed_values_are_errors() {
        let err = AppConfig::from_lookup(lookup(&[(MAX_CONFLICT_RETRIES_VAR, "lots")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                var: MAX_CONFLICT_RETRIES_VAR,
                ..
            }
        ));
        assert!(AppConfig::from_lookup(lookup(&[(BIND_ADDR_VAR, "nowhere")])).is_err());
    }
}
