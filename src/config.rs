//! Engine Configuration
//!
//! Tunables for one orchestrator instance. Loadable from YAML (standalone
//! file or the `config:` block of a graph definition).
//!
//! ## Priority Order (highest to lowest)
//!
//! 1. Environment variables (`QUARRY_DEBUG`, `QUARRY_CACHE_MAX_ENTRIES`)
//! 2. Config file / graph `config:` block
//! 3. Defaults

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{QuarryError, Result};
use crate::util::constants::{
    CACHE_MAX_ENTRIES_ENV, DEBUG_ENV, DEFAULT_MAX_CACHE_ENTRIES, DEFAULT_MAX_DEFAULT_SOURCE_DEPTH,
};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Include params/responses in error messages
    pub debug: bool,

    /// TTL cache bounds
    pub cache: CacheConfig,

    /// Maximum nesting of default-source schema resolution
    pub max_default_source_depth: usize,
}

/// TTL cache bounds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Argument sets kept per node (0 = unbounded)
    pub max_entries_per_node: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries_per_node: DEFAULT_MAX_CACHE_ENTRIES,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debug: false,
            cache: CacheConfig::default(),
            max_default_source_depth: DEFAULT_MAX_DEFAULT_SOURCE_DEPTH,
        }
    }
}

impl EngineConfig {
    /// Defaults with environment overrides applied
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// Load from a YAML file (environment overrides are not applied)
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|e| QuarryError::ConfigError {
            reason: format!("{}: {}", path.display(), e),
        })
    }

    /// Overlay environment variables on top of this config
    pub fn with_env(mut self) -> Self {
        if let Ok(raw) = std::env::var(DEBUG_ENV) {
            self.debug = is_truthy_flag(&raw);
        }
        if let Some(max) = std::env::var(CACHE_MAX_ENTRIES_ENV)
            .ok()
            .and_then(|raw| raw.trim().parse::<usize>().ok())
        {
            self.cache.max_entries_per_node = max;
        }
        self
    }

    /// Enable or disable debug error detail
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Set the per-node cache bound (0 = unbounded)
    pub fn with_max_cache_entries(mut self, max: usize) -> Self {
        self.cache.max_entries_per_node = max;
        self
    }

    /// Set the default-source nesting limit
    pub fn with_max_default_source_depth(mut self, depth: usize) -> Self {
        self.max_default_source_depth = depth;
        self
    }
}

fn is_truthy_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
