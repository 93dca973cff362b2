//! Configuration types

use crate::{ConfigError, SwitchyardResult, TurnOffMode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cache settings for bulk and name-listing reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// When false, every read goes straight to the repository.
    pub enabled: bool,
    /// Prefix of every cache key, e.g. `preference:all_names`.
    pub namespace: String,
    /// Entries older than this are treated as misses. `None` keeps them
    /// until invalidated or evicted by the backend.
    pub entry_ttl: Option<Duration>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            namespace: "preference".to_string(),
            entry_ttl: None,
        }
    }
}

/// Store behavior settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSettings {
    pub turn_off_mode: TurnOffMode,
    /// How many times `find_or_create` retries after losing a creation race.
    pub find_or_create_attempts: u32,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            turn_off_mode: TurnOffMode::PreserveEnabled,
            find_or_create_attempts: 3,
        }
    }
}

/// Master configuration struct.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SwitchyardConfig {
    pub cache: CacheSettings,
    pub store: StoreSettings,
}

impl SwitchyardConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    ///
    /// Environment variables:
    /// - `SWITCHYARD_CACHE_ENABLED`: "true" or "false" (default: true)
    /// - `SWITCHYARD_CACHE_NAMESPACE`: cache key prefix (default: "preference")
    /// - `SWITCHYARD_CACHE_TTL_SECS`: entry TTL in seconds (default: none)
    /// - `SWITCHYARD_TURN_OFF_MODE`: "preserve" or "force" (default: preserve)
    /// - `SWITCHYARD_FIND_OR_CREATE_ATTEMPTS`: retry budget (default: 3)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let enabled = lookup("SWITCHYARD_CACHE_ENABLED")
            .map(|s| s.to_lowercase() != "false")
            .unwrap_or(defaults.cache.enabled);

        let namespace = lookup("SWITCHYARD_CACHE_NAMESPACE")
            .map(|s| s.trim().to_string())
            .unwrap_or(defaults.cache.namespace);

        let entry_ttl = lookup("SWITCHYARD_CACHE_TTL_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .or(defaults.cache.entry_ttl);

        let turn_off_mode = match lookup("SWITCHYARD_TURN_OFF_MODE")
            .map(|s| s.to_lowercase())
            .as_deref()
        {
            Some("force") => TurnOffMode::ForceEnabled,
            Some("preserve") => TurnOffMode::PreserveEnabled,
            _ => defaults.store.turn_off_mode,
        };

        let find_or_create_attempts = lookup("SWITCHYARD_FIND_OR_CREATE_ATTEMPTS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.store.find_or_create_attempts);

        Self {
            cache: CacheSettings {
                enabled,
                namespace,
                entry_ttl,
            },
            store: StoreSettings {
                turn_off_mode,
                find_or_create_attempts,
            },
        }
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - cache namespace is non-empty and contains no `:`
    /// - entry TTL, when set, is non-zero
    /// - find_or_create_attempts >= 1
    pub fn validate(&self) -> SwitchyardResult<()> {
        if self.cache.namespace.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "cache.namespace".to_string(),
                value: self.cache.namespace.clone(),
                reason: "must not be empty".to_string(),
            }
            .into());
        }
        if self.cache.namespace.contains(':') {
            return Err(ConfigError::InvalidValue {
                field: "cache.namespace".to_string(),
                value: self.cache.namespace.clone(),
                reason: "must not contain ':'".to_string(),
            }
            .into());
        }
        if self.cache.entry_ttl == Some(Duration::ZERO) {
            return Err(ConfigError::InvalidValue {
                field: "cache.entry_ttl".to_string(),
                value: "0s".to_string(),
                reason: "must be positive when set".to_string(),
            }
            .into());
        }
        if self.store.find_or_create_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "store.find_or_create_attempts".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            }
            .into());
        }
        Ok(())
    }
}
