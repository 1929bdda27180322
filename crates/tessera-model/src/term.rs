//! Term module - RDF values and their interned identities

use std::fmt;
use std::sync::Arc;

/// Identity of an interned term
///
/// Assigned by the backing store the first time a term is interned and stable
/// for the lifetime of the store. Two terms with the same lexical form always
/// resolve to the same identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TermId(u64);

impl TermId {
    /// Create a TermId from a raw value
    ///
    /// This is primarily for storage layer deserialization.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the raw value
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind of a term, without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TermKind {
    /// A URI reference
    Uri,
    /// A blank node
    BlankNode,
    /// A literal value
    Literal,
}

impl TermKind {
    /// Get the kind name as a string (also used as a storage tag)
    pub fn as_str(&self) -> &'static str {
        match self {
            TermKind::Uri => "uri",
            TermKind::BlankNode => "bnode",
            TermKind::Literal => "literal",
        }
    }

    /// Parse a kind from its storage tag
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "uri" => Some(TermKind::Uri),
            "bnode" => Some(TermKind::BlankNode),
            "literal" => Some(TermKind::Literal),
            _ => None,
        }
    }
}

/// An RDF literal: lexical value plus an optional language tag or datatype
///
/// Language tags are normalized to lowercase so that equal literals compare equal.
/// A literal carries either a language tag or a datatype, never both. An empty
/// tag or datatype is the same as none.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Literal {
    value: Arc<str>,
    language: Option<Arc<str>>,
    datatype: Option<Arc<str>>,
}

impl Literal {
    /// Create a plain literal
    pub fn simple(value: &str) -> Self {
        Self {
            value: Arc::from(value),
            language: None,
            datatype: None,
        }
    }

    /// Create a language-tagged literal
    ///
    /// An empty tag gives a plain literal.
    pub fn with_language(value: &str, language: &str) -> Self {
        Self {
            value: Arc::from(value),
            language: (!language.is_empty()).then(|| Arc::from(language.to_lowercase())),
            datatype: None,
        }
    }

    /// Create a typed literal
    ///
    /// An empty datatype gives a plain literal.
    pub fn typed(value: &str, datatype: &str) -> Self {
        Self {
            value: Arc::from(value),
            language: None,
            datatype: (!datatype.is_empty()).then(|| Arc::from(datatype)),
        }
    }

    /// Create a literal from its parts
    ///
    /// # Errors
    /// Returns an error if both a language tag and a datatype are given.
    pub fn new(value: &str, language: Option<&str>, datatype: Option<&str>) -> Result<Self, String> {
        let language = language.filter(|l| !l.is_empty());
        let datatype = datatype.filter(|d| !d.is_empty());
        match (language, datatype) {
            (Some(_), Some(_)) => Err(format!(
                "Literal \"{}\" cannot carry both a language tag and a datatype",
                value
            )),
            (Some(lang), None) => Ok(Self::with_language(value, lang)),
            (None, Some(dt)) => Ok(Self::typed(value, dt)),
            (None, None) => Ok(Self::simple(value)),
        }
    }

    /// Lexical value
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Language tag, if any
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// Datatype URI, if any
    pub fn datatype(&self) -> Option<&str> {
        self.datatype.as_deref()
    }

    /// Key identifying this literal in the literal cache
    ///
    /// Equal literals produce equal keys; the key is the N-Triples form.
    pub fn cache_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", escape(&self.value))?;
        if let Some(lang) = &self.language {
            write!(f, "@{}", lang)?;
        } else if let Some(dt) = &self.datatype {
            write!(f, "^^<{}>", dt)?;
        }
        Ok(())
    }
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

/// An RDF term
///
/// Terms are content-addressed: equality and hashing use the lexical form only.
/// Cloning is cheap, the strings are shared.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Term {
    /// A URI reference
    Uri(Arc<str>),
    /// A blank node, identified by its label
    BlankNode(Arc<str>),
    /// A literal
    Literal(Literal),
}

impl Term {
    /// Create a URI term
    pub fn uri(uri: &str) -> Self {
        Term::Uri(Arc::from(uri))
    }

    /// Create a blank node term
    pub fn blank(label: &str) -> Self {
        Term::BlankNode(Arc::from(label))
    }

    /// Create a plain literal term
    pub fn literal(value: &str) -> Self {
        Term::Literal(Literal::simple(value))
    }

    /// Create a language-tagged literal term
    pub fn lang_literal(value: &str, language: &str) -> Self {
        Term::Literal(Literal::with_language(value, language))
    }

    /// Create a typed literal term
    pub fn typed_literal(value: &str, datatype: &str) -> Self {
        Term::Literal(Literal::typed(value, datatype))
    }

    /// Kind of this term
    pub fn kind(&self) -> TermKind {
        match self {
            Term::Uri(_) => TermKind::Uri,
            Term::BlankNode(_) => TermKind::BlankNode,
            Term::Literal(_) => TermKind::Literal,
        }
    }

    /// Whether this term is a URI
    pub fn is_uri(&self) -> bool {
        matches!(self, Term::Uri(_))
    }

    /// Whether this term is a blank node
    pub fn is_blank(&self) -> bool {
        matches!(self, Term::BlankNode(_))
    }

    /// Whether this term is a literal
    pub fn is_literal(&self) -> bool {
        matches!(self, Term::Literal(_))
    }

    /// Whether this term may appear in subject or context position
    pub fn is_resource(&self) -> bool {
        !self.is_literal()
    }

    /// The URI string, if this is a URI
    pub fn as_uri(&self) -> Option<&str> {
        match self {
            Term::Uri(uri) => Some(uri),
            _ => None,
        }
    }

    /// The literal, if this is a literal
    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Term::Literal(lit) => Some(lit),
            _ => None,
        }
    }

    /// The lexical part used as primary storage key (URI, label or literal value)
    pub fn lexical(&self) -> &str {
        match self {
            Term::Uri(uri) => uri,
            Term::BlankNode(label) => label,
            Term::Literal(lit) => lit.value(),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Uri(uri) => write!(f, "<{}>", uri),
            Term::BlankNode(label) => write!(f, "_:{}", label),
            Term::Literal(lit) => write!(f, "{}", lit),
        }
    }
}

impl From<Literal> for Term {
    fn from(lit: Literal) -> Self {
        Term::Literal(lit)
    }
}

/// An interned term together with its identity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Node {
    /// Identity assigned by the backing store
    pub id: TermId,
    /// The term itself
    pub term: Term,
}

impl Node {
    /// Create a node
    pub fn new(id: TermId, term: Term) -> Self {
        Self { id, term }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_addressed_equality() {
        assert_eq!(Term::uri("http://example.org/a"), Term::uri("http://example.org/a"));
        assert_ne!(Term::uri("http://example.org/a"), Term::blank("http://example.org/a"));
        assert_ne!(Term::literal("a"), Term::lang_literal("a", "en"));
    }

    #[test]
    fn test_language_tags_are_normalized() {
        assert_eq!(Term::lang_literal("chat", "FR"), Term::lang_literal("chat", "fr"));
    }

    #[test]
    fn test_empty_tags_mean_plain() {
        assert_eq!(Term::typed_literal("x", ""), Term::literal("x"));
        assert_eq!(Term::lang_literal("x", ""), Term::literal("x"));
        assert_eq!(Literal::new("x", Some(""), Some("")).unwrap(), Literal::simple("x"));
        assert_eq!(Literal::new("x", Some("en"), Some("")).unwrap(), Literal::with_language("x", "en"));
        assert_eq!(Term::typed_literal("x", "").to_string(), "\"x\"");
    }

    #[test]
    fn test_literal_rejects_language_and_datatype() {
        assert!(Literal::new("1", Some("en"), Some("http://www.w3.org/2001/XMLSchema#int")).is_err());
        assert_eq!(Literal::new("1", None, None).unwrap(), Literal::simple("1"));
    }

    #[test]
    fn test_display() {
        assert_eq!(Term::uri("http://x/y").to_string(), "<http://x/y>");
        assert_eq!(Term::blank("b0").to_string(), "_:b0");
        assert_eq!(Term::lang_literal("hi \"there\"", "en").to_string(), "\"hi \\\"there\\\"\"@en");
        assert_eq!(
            Term::typed_literal("1", "http://www.w3.org/2001/XMLSchema#int").to_string(),
            "\"1\"^^<http://www.w3.org/2001/XMLSchema#int>"
        );
    }

    #[test]
    fn test_literal_cache_keys_distinguish_datatypes() {
        let plain = Literal::simple("1");
        let typed = Literal::typed("1", "http://www.w3.org/2001/XMLSchema#int");
        assert_ne!(plain.cache_key(), typed.cache_key());
        assert_eq!(plain.cache_key(), Literal::simple("1").cache_key());
    }

    #[test]
    fn test_kind_roundtrip() {
        for kind in [TermKind::Uri, TermKind::BlankNode, TermKind::Literal] {
            assert_eq!(TermKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(TermKind::parse("graph"), None);
    }
}
