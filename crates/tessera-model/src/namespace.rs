//! Namespace module - prefix bindings for URIs

/// A namespace record binding a prefix to a URI
///
/// Used by rule programs to resolve `prefix:local` references and by the store
/// to remember well-known abbreviations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    prefix: String,
    uri: String,
    created_at: u64,
}

impl Namespace {
    /// Create a new namespace record
    ///
    /// The empty prefix is allowed (the default namespace).
    ///
    /// # Errors
    /// Returns error if the prefix contains characters other than letters,
    /// digits, `_`, `-` and `.`, or if the URI is empty.
    pub fn new(prefix: &str, uri: &str) -> Result<Self, String> {
        if uri.is_empty() {
            return Err(format!("Namespace URI for prefix '{}' cannot be empty", prefix));
        }
        if !prefix
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.')
        {
            return Err(format!("Invalid namespace prefix: '{}'", prefix));
        }

        Ok(Self {
            prefix: prefix.to_string(),
            uri: uri.to_string(),
            created_at: crate::timestamp_millis(),
        })
    }

    /// Override the creation timestamp (storage layer deserialization)
    pub fn with_created_at(mut self, created_at: u64) -> Self {
        self.created_at = created_at;
        self
    }

    /// The prefix
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The namespace URI
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Creation time in milliseconds since the Unix epoch
    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    /// Expand a local name into a full URI
    pub fn expand(&self, local: &str) -> String {
        format!("{}{}", self.uri, local)
    }

    /// Local part of `uri` if it lies in this namespace
    pub fn local_name<'a>(&self, uri: &'a str) -> Option<&'a str> {
        uri.strip_prefix(self.uri.as_str())
    }
}
