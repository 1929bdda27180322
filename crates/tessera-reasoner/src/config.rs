//! Configuration for the reasoning engine
//!
//! ```toml
//! inferred_context = "urn:tessera:context:inferred"
//! retraction = "incremental"
//! ```

use crate::error::ReasonerError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tessera_model::Term;

/// How inferences are withdrawn when explicit facts are removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetractionStrategy {
    /// Delete-and-rederive: only inferences reachable from the removed facts
    /// are reconsidered
    Incremental,
    /// Recompute the whole closure and diff it against the stored inferences
    Recompute,
}

/// Configuration of the reasoning engine
///
/// # Examples
///
/// ```
/// use tessera_reasoner::{ReasonerConfig, RetractionStrategy};
///
/// let config = ReasonerConfig::default();
/// assert_eq!(config.retraction, RetractionStrategy::Incremental);
///
/// let config = ReasonerConfig::from_toml_str(r#"retraction = "recompute""#).unwrap();
/// assert_eq!(config.retraction, RetractionStrategy::Recompute);
/// assert_eq!(config.inferred_context, "urn:tessera:context:inferred");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasonerConfig {
    /// Context URI that receives every inferred triple
    /// Default: urn:tessera:context:inferred
    #[serde(default = "default_inferred_context")]
    pub inferred_context: String,

    /// Retraction strategy
    /// Default: incremental
    #[serde(default = "default_retraction")]
    pub retraction: RetractionStrategy,

    /// Whether the kernel starts a reasoner at all
    /// Default: true
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_inferred_context() -> String {
    "urn:tessera:context:inferred".to_string()
}

fn default_retraction() -> RetractionStrategy {
    RetractionStrategy::Incremental
}

fn default_enabled() -> bool {
    true
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            inferred_context: default_inferred_context(),
            retraction: default_retraction(),
            enabled: default_enabled(),
        }
    }
}

impl ReasonerConfig {
    /// Full recomputation on every retraction
    pub fn recompute() -> Self {
        Self {
            retraction: RetractionStrategy::Recompute,
            ..Self::default()
        }
    }

    /// Reasoner switched off
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Use another inferred-triples context
    pub fn with_inferred_context(mut self, uri: &str) -> Self {
        self.inferred_context = uri.to_string();
        self
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self, ReasonerError> {
        let config: ReasonerConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ReasonerError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Check the configuration for inconsistencies
    pub fn validate(&self) -> Result<(), ReasonerError> {
        let uri = &self.inferred_context;
        if uri.is_empty() {
            return Err(ReasonerError::Config(
                "inferred_context cannot be empty".to_string(),
            ));
        }
        if !uri.contains(':') || uri.chars().any(char::is_whitespace) {
            return Err(ReasonerError::Config(format!(
                "inferred_context must be an absolute URI: '{}'",
                uri
            )));
        }
        Ok(())
    }

    /// The inferred-triples context as a term
    pub fn inferred_context_term(&self) -> Term {
        Term::uri(&self.inferred_context)
    }
}
