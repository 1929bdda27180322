//! Error types for cache configuration

use thiserror::Error;

/// Errors raised while configuring or building caches
///
/// Cache operations themselves never fail: a backend fault is logged and
/// reported as a miss.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Failed to read a configuration file
    #[error("Failed to read cache config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse cache config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Configuration values are inconsistent
    #[error("Invalid cache configuration: {0}")]
    Invalid(String),
}
