//! Triple module - statements, their identities and query patterns

use crate::term::Term;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identity of a persisted triple, assigned by the backing store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TripleId(u64);

impl TripleId {
    /// Create a TripleId from a raw value
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the raw value
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// The four positions that identify a statement
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TripleKey {
    /// Subject (URI or blank node)
    pub subject: Term,
    /// Predicate (URI)
    pub predicate: Term,
    /// Object (any term)
    pub object: Term,
    /// Context the statement belongs to, `None` for the default context
    pub context: Option<Term>,
}

/// A statement in the store
///
/// Equality and hashing consider only subject, predicate, object and context:
/// the `inferred` flag and creation time are metadata, not identity.
///
/// Inferred triples are created only by the reasoning engine; application code
/// builds explicit triples with [`Triple::new`].
#[derive(Debug, Clone)]
pub struct Triple {
    key: TripleKey,
    inferred: bool,
    created_at: u64,
}

impl Triple {
    /// Create an explicit triple
    ///
    /// # Errors
    /// Returns an error if the subject or context is a literal, or the predicate
    /// is not a URI.
    pub fn new(
        subject: Term,
        predicate: Term,
        object: Term,
        context: Option<Term>,
    ) -> Result<Self, String> {
        if subject.is_literal() {
            return Err(format!("Literal {} cannot be used as subject", subject));
        }
        if !predicate.is_uri() {
            return Err(format!("Predicate must be a URI, got {}", predicate));
        }
        if let Some(ctx) = &context {
            if ctx.is_literal() {
                return Err(format!("Literal {} cannot be used as context", ctx));
            }
        }

        Ok(Self {
            key: TripleKey {
                subject,
                predicate,
                object,
                context,
            },
            inferred: false,
            created_at: crate::timestamp_millis(),
        })
    }

    /// Create an inferred triple (reasoning engine only)
    pub fn new_inferred(
        subject: Term,
        predicate: Term,
        object: Term,
        context: Option<Term>,
    ) -> Result<Self, String> {
        let mut triple = Self::new(subject, predicate, object, context)?;
        triple.inferred = true;
        Ok(triple)
    }

    /// Override the creation timestamp (storage layer deserialization)
    pub fn with_created_at(mut self, created_at: u64) -> Self {
        self.created_at = created_at;
        self
    }

    /// Override the inferred flag (storage layer deserialization)
    pub fn with_inferred(mut self, inferred: bool) -> Self {
        self.inferred = inferred;
        self
    }

    /// Subject
    pub fn subject(&self) -> &Term {
        &self.key.subject
    }

    /// Predicate
    pub fn predicate(&self) -> &Term {
        &self.key.predicate
    }

    /// Object
    pub fn object(&self) -> &Term {
        &self.key.object
    }

    /// Context, `None` for the default context
    pub fn context(&self) -> Option<&Term> {
        self.key.context.as_ref()
    }

    /// Whether the triple was derived by the reasoner
    pub fn is_inferred(&self) -> bool {
        self.inferred
    }

    /// Creation time in milliseconds since the Unix epoch
    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    /// The identifying positions of this triple
    pub fn key(&self) -> &TripleKey {
        &self.key
    }

    /// The (subject, predicate, object) statement, ignoring the context
    pub fn statement(&self) -> (Term, Term, Term) {
        (
            self.key.subject.clone(),
            self.key.predicate.clone(),
            self.key.object.clone(),
        )
    }
}

impl PartialEq for Triple {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Triple {}

impl Hash for Triple {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.key.subject, self.key.predicate, self.key.object)?;
        if let Some(ctx) = &self.key.context {
            write!(f, " {}", ctx)?;
        }
        if self.inferred {
            write!(f, " (inferred)")?;
        }
        Ok(())
    }
}

/// A triple pattern: each position is either bound or a wildcard
///
/// # Examples
///
/// ```
/// use tessera_model::{Term, Triple, TriplePattern};
///
/// let alice = Term::uri("http://example.org/alice");
/// let knows = Term::uri("http://xmlns.com/foaf/0.1/knows");
/// let bob = Term::uri("http://example.org/bob");
/// let triple = Triple::new(alice.clone(), knows, bob, None).unwrap();
///
/// assert!(TriplePattern::any().with_subject(alice).matches(&triple));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TriplePattern {
    /// Required subject, `None` matches any
    pub subject: Option<Term>,
    /// Required predicate, `None` matches any
    pub predicate: Option<Term>,
    /// Required object, `None` matches any
    pub object: Option<Term>,
    /// Required context, `None` matches any
    pub context: Option<Term>,
    /// Whether inferred triples match
    pub include_inferred: bool,
}

impl TriplePattern {
    /// A pattern matching every triple, explicit or inferred
    pub fn any() -> Self {
        Self {
            subject: None,
            predicate: None,
            object: None,
            context: None,
            include_inferred: true,
        }
    }

    /// Build a pattern from its positions
    pub fn new(
        subject: Option<Term>,
        predicate: Option<Term>,
        object: Option<Term>,
        context: Option<Term>,
        include_inferred: bool,
    ) -> Self {
        Self {
            subject,
            predicate,
            object,
            context,
            include_inferred,
        }
    }

    /// Bind the subject
    pub fn with_subject(mut self, subject: Term) -> Self {
        self.subject = Some(subject);
        self
    }

    /// Bind the predicate
    pub fn with_predicate(mut self, predicate: Term) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Bind the object
    pub fn with_object(mut self, object: Term) -> Self {
        self.object = Some(object);
        self
    }

    /// Bind the context
    pub fn with_context(mut self, context: Term) -> Self {
        self.context = Some(context);
        self
    }

    /// Restrict to explicit triples
    pub fn explicit_only(mut self) -> Self {
        self.include_inferred = false;
        self
    }

    /// Whether the triple satisfies this pattern
    pub fn matches(&self, triple: &Triple) -> bool {
        if !self.include_inferred && triple.is_inferred() {
            return false;
        }
        bound_eq(&self.subject, triple.subject())
            && bound_eq(&self.predicate, triple.predicate())
            && bound_eq(&self.object, triple.object())
            && match (&self.context, triple.context()) {
                (None, _) => true,
                (Some(wanted), Some(actual)) => wanted == actual,
                (Some(_), None) => false,
            }
    }
}

impl Default for TriplePattern {
    fn default() -> Self {
        Self::any()
    }
}

fn bound_eq(bound: &Option<Term>, actual: &Term) -> bool {
    bound.as_ref().map_or(true, |b| b == actual)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> Term {
        Term::uri(&format!("http://example.org/{}", s))
    }

    #[test]
    fn test_position_validation() {
        assert!(Triple::new(Term::literal("x"), uri("p"), uri("o"), None).is_err());
        assert!(Triple::new(uri("s"), Term::blank("p"), uri("o"), None).is_err());
        assert!(Triple::new(uri("s"), uri("p"), uri("o"), Some(Term::literal("c"))).is_err());
        assert!(Triple::new(Term::blank("s"), uri("p"), Term::literal("o"), Some(Term::blank("g"))).is_ok());
    }

    #[test]
    fn test_identity_ignores_metadata() {
        let explicit = Triple::new(uri("s"), uri("p"), uri("o"), None).unwrap();
        let inferred = Triple::new_inferred(uri("s"), uri("p"), uri("o"), None)
            .unwrap()
            .with_created_at(42);
        assert_eq!(explicit, inferred);
        assert!(inferred.is_inferred());
        assert_eq!(inferred.created_at(), 42);
    }

    #[test]
    fn test_context_is_identity() {
        let a = Triple::new(uri("s"), uri("p"), uri("o"), None).unwrap();
        let b = Triple::new(uri("s"), uri("p"), uri("o"), Some(uri("g"))).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.statement(), b.statement());
    }

    #[test]
    fn test_pattern_matching() {
        let t = Triple::new(uri("s"), uri("p"), uri("o"), Some(uri("g"))).unwrap();

        assert!(TriplePattern::any().matches(&t));
        assert!(TriplePattern::any().with_subject(uri("s")).with_object(uri("o")).matches(&t));
        assert!(!TriplePattern::any().with_predicate(uri("q")).matches(&t));
        assert!(TriplePattern::any().with_context(uri("g")).matches(&t));

        let default_ctx = Triple::new(uri("s"), uri("p"), uri("o"), None).unwrap();
        assert!(!TriplePattern::any().with_context(uri("g")).matches(&default_ctx));
    }

    #[test]
    fn test_pattern_inferred_filter() {
        let t = Triple::new_inferred(uri("s"), uri("p"), uri("o"), None).unwrap();
        assert!(TriplePattern::any().matches(&t));
        assert!(!TriplePattern::any().explicit_only().matches(&t));
    }
}
