//! Error types for the kernel facade

use tessera_cache::CacheError;
use tessera_reasoner::{ParseError, ReasonerError};
use tessera_store::{StoreError, TransactionError};
use thiserror::Error;

/// Errors raised while assembling or operating a [`Kernel`](crate::Kernel)
#[derive(Debug, Error)]
pub enum KernelError {
    /// Cache configuration error
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Backing store error
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Transaction error
    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),

    /// Rule text error
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Reasoning engine error
    #[error("Reasoner error: {0}")]
    Reasoner(#[from] ReasonerError),

    /// Failed to read a configuration or rule file
    #[error("Failed to read file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Configuration values are inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// The kernel was built without a reasoner
    #[error("Reasoner is disabled")]
    ReasonerDisabled,
}
