use crate::grid::Size;
use crate::power::BASELINE_POWER;
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use thiserror::Error;

/// Interval between scheduled steps used by the browser build
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 25;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialize(String),
}

/// Top-level simulation configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Initial imbalance of starting profiles, `0..BASELINE_POWER`
    pub variance: u8,

    /// Delay between scheduled steps while running
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Fixed RNG seed for reproducible runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Grid dimensions
    pub size: Size,

    #[serde(default, deserialize_with = "or_default")]
    pub mutation: MutationConfig,

    #[serde(default, deserialize_with = "or_default")]
    pub fight: FightConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationConfig {
    /// Transfer attempts per step
    #[serde(default = "default_mutation_attempts")]
    pub attempts: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FightConfig {
    /// Contests per step
    #[serde(default)]
    pub attempts: u32,
}

fn default_mutation_attempts() -> u32 {
    1
}

fn default_tick_interval_ms() -> u64 {
    DEFAULT_TICK_INTERVAL_MS
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            attempts: default_mutation_attempts(),
        }
    }
}

/// Deserialize `T`, substituting `T::default()` for anything that does not
/// parse as `T`.
fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lenient<V> {
        Valid(V),
        Invalid(IgnoredAny),
    }

    Ok(match Lenient::<T>::deserialize(deserializer)? {
        Lenient::Valid(value) => value,
        Lenient::Invalid(_) => {
            tracing::debug!(
                "malformed {} block, using defaults",
                std::any::type_name::<T>()
            );
            T::default()
        }
    })
}

impl SimulationConfig {
    /// Load and validate configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Load from `path`, falling back to the defaults (with a warning) when
    /// the file is missing or invalid
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        Self::from_file(path).unwrap_or_else(|e| {
            tracing::warn!("failed to load {}: {e}, using defaults", path.display());
            Self::default()
        })
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: SimulationConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.size.width == 0 || self.size.height == 0 {
            return Err(ConfigError::Validation(format!(
                "grid size must be at least 1x1, got {}x{}",
                self.size.width, self.size.height
            )));
        }

        validate_variance(self.variance)
    }
}

/// Variance must leave every axis at least 1 before redistribution
pub fn validate_variance(variance: u8) -> Result<(), ConfigError> {
    if variance >= BASELINE_POWER {
        return Err(ConfigError::Validation(format!(
            "variance must be below {BASELINE_POWER}, got {variance}"
        )));
    }
    Ok(())
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            variance: 4,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            seed: None,
            size: Size::new(320, 160),
            mutation: MutationConfig { attempts: 1 },
            fight: FightConfig { attempts: 10_000 },
        }
    }
}
