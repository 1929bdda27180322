//! Error types for rule parsing and reasoning

use tessera_model::RuleError;
use tessera_store::{StoreError, TransactionError};
use thiserror::Error;

/// Errors raised while parsing rule text
///
/// Positions are 1-based.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Malformed input
    #[error("Syntax error at line {line}, column {column}: {message}")]
    Syntax {
        /// Line of the offending input
        line: usize,
        /// Column of the offending input
        column: usize,
        /// What was expected
        message: String,
    },

    /// A `prefix:local` reference to a prefix that was never declared
    #[error("Unknown prefix '{prefix}' at line {line}, column {column}")]
    UnknownPrefix {
        /// The undeclared prefix
        prefix: String,
        /// Line of the reference
        line: usize,
        /// Column of the reference
        column: usize,
    },

    /// The rule parsed but is not well formed (unsafe or empty body)
    #[error("Invalid rule at line {line}, column {column}: {source}")]
    InvalidRule {
        /// Line where the rule starts
        line: usize,
        /// Column where the rule starts
        column: usize,
        /// Why the rule was rejected
        #[source]
        source: RuleError,
    },
}

/// Errors raised by the reasoning engine and its worker
#[derive(Error, Debug)]
pub enum ReasonerError {
    /// Reading committed data failed
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Committing inferences failed
    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),

    /// Rule text could not be parsed
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// No program with this name is registered
    #[error("Unknown program: {0}")]
    UnknownProgram(String),

    /// A program with this name is already registered
    #[error("Program already registered: {0}")]
    DuplicateProgram(String),

    /// Failed to read a configuration file
    #[error("Failed to read reasoner config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse reasoner config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Configuration values are inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// Worker error (tokio runtime issues)
    #[error("Worker error: {0}")]
    Worker(String),
}
