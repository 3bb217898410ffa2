//! Utilities Module - shared infrastructure
//!
//! Contains helper functions used across the codebase:
//! - `constants`: Centralized defaults and limits
//! - `path`: Dotted path get/set/merge over JSON values
//! - `value`: JSON truthiness, flatten/concat merges, ordering

pub mod constants;
pub mod path;
pub mod value;

pub use constants::{
    DEFAULT_MAX_CACHE_ENTRIES, DEFAULT_MAX_DEFAULT_SOURCE_DEPTH, HTTP_TIMEOUT, REDIRECT_LIMIT,
};
