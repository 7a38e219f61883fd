//! Binder Configuration
//!
//! Tuning knobs for the call-site cache and the resolver. Every field has a
//! default, so an empty TOML document is a valid configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while loading a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Configuration for a binder runtime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinderConfig {
    /// Call-site cache configuration.
    pub cache: CacheConfig,

    /// Resolution and rule compilation configuration.
    pub resolution: ResolutionConfig,

    /// Diagnostics configuration.
    pub diagnostics: DiagnosticsConfig,
}

/// Call-site cache configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of rules in a polymorphic chain.
    pub max_chain_length: usize,

    /// Consecutive full-chain misses on a full chain before a site turns
    /// megamorphic.
    pub megamorphic_threshold: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_chain_length: 4,
            megamorphic_threshold: 3,
        }
    }
}

/// Resolution configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Widen guards to shape classes when a single candidate provably
    /// handles the whole class.
    pub widen_guards: bool,

    /// Fall back to `method_missing` when a call finds no member.
    pub method_missing: bool,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            widen_guards: true,
            method_missing: true,
        }
    }
}

/// Diagnostics configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Re-bind every cache hit and fault the site if the cached rule
    /// disagrees with a fresh resolution. Expensive.
    pub verify_guards: bool,
}

impl BinderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: BinderConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.max_chain_length == 0 {
            return Err(ConfigError::Invalid(
                "cache.max_chain_length must be at least 1".to_string(),
            ));
        }
        if self.cache.megamorphic_threshold == 0 {
            return Err(ConfigError::Invalid(
                "cache.megamorphic_threshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Set the polymorphic chain bound.
    pub fn with_max_chain_length(mut self, k: usize) -> Self {
        self.cache.max_chain_length = k;
        self
    }

    pub fn with_widen_guards(mut self, widen: bool) -> Self {
        self.resolution.widen_guards = widen;
        self
    }

    pub fn with_verify_guards(mut self, verify: bool) -> Self {
        self.diagnostics.verify_guards = verify;
        self
    }
}
