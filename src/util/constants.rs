//! Centralized constants for engine defaults
//!
//! All limit values in one place for easy tuning.

use std::time::Duration;

// ═══════════════════════════════════════════════════════════════
// Engine Limits
// ═══════════════════════════════════════════════════════════════

/// Cached argument sets kept per node before the oldest is evicted
pub const DEFAULT_MAX_CACHE_ENTRIES: usize = 256;

/// Nesting depth allowed when resolving default-source schemas
pub const DEFAULT_MAX_DEFAULT_SOURCE_DEPTH: usize = 16;

/// Reserved parameter carrying the structured adapter configuration
pub const ADAPTER_CONFIG_PARAM: &str = "apiConfig";

/// Environment variable enabling debug error messages
pub const DEBUG_ENV: &str = "QUARRY_DEBUG";

/// Environment variable overriding the per-node cache bound
pub const CACHE_MAX_ENTRIES_ENV: &str = "QUARRY_CACHE_MAX_ENTRIES";

// ═══════════════════════════════════════════════════════════════
// HTTP Client Limits
// ═══════════════════════════════════════════════════════════════

/// Timeout for a single HTTP request issued by the http adapter
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum number of HTTP redirects to follow
pub const REDIRECT_LIMIT: usize = 5;

// ═══════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════
