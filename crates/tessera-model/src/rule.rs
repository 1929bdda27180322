//! Rule module - Horn clauses over triple patterns
//!
//! A [`Rule`] is an ordered list of body patterns implying exactly one head
//! pattern. Rules are safe by construction: every variable used in the head
//! must occur somewhere in the body, so [`Rule::new`] rejects anything else.

use crate::namespace::Namespace;
use crate::term::{Literal, Term};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// A rule variable, scoped to the rule it appears in
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Variable(Arc<str>);

impl Variable {
    /// Create a variable from its name (without sigil)
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    /// The variable name
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.0)
    }
}

/// One position of a rule pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Field {
    /// A bound resource (URI or blank node)
    Resource(Term),
    /// A bound literal
    Literal(Literal),
    /// A free variable
    Variable(Variable),
}

impl Field {
    /// Bound URI resource
    pub fn uri(uri: &str) -> Self {
        Field::Resource(Term::uri(uri))
    }

    /// Free variable
    pub fn var(name: &str) -> Self {
        Field::Variable(Variable::new(name))
    }

    /// The variable, if this field is one
    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            Field::Variable(v) => Some(v),
            _ => None,
        }
    }

    /// The bound term, if this field is not a variable
    pub fn constant(&self) -> Option<Term> {
        match self {
            Field::Resource(term) => Some(term.clone()),
            Field::Literal(lit) => Some(Term::Literal(lit.clone())),
            Field::Variable(_) => None,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Resource(term) => write!(f, "{}", term),
            Field::Literal(lit) => write!(f, "{}", lit),
            Field::Variable(v) => write!(f, "{}", v),
        }
    }
}

/// A (subject, predicate, object) pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pattern {
    /// Subject position
    pub subject: Field,
    /// Predicate position
    pub predicate: Field,
    /// Object position
    pub object: Field,
}

impl Pattern {
    /// Create a pattern
    pub fn new(subject: Field, predicate: Field, object: Field) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }

    /// The three positions in order
    pub fn fields(&self) -> [&Field; 3] {
        [&self.subject, &self.predicate, &self.object]
    }

    /// Variables occurring in this pattern
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.fields().into_iter().filter_map(Field::as_variable)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} {} {})", self.subject, self.predicate, self.object)
    }
}

/// Reasons a rule cannot be built
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    /// The body has no patterns
    EmptyBody,
    /// A head variable does not occur in the body
    UnsafeVariable(String),
    /// A literal was used in subject position of the head
    LiteralSubject,
    /// A literal was used in predicate position
    LiteralPredicate,
}

impl fmt::Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleError::EmptyBody => write!(f, "rule body must contain at least one pattern"),
            RuleError::UnsafeVariable(name) => write!(
                f,
                "head variable ?{} does not occur in the rule body",
                name
            ),
            RuleError::LiteralSubject => write!(f, "rule head cannot have a literal subject"),
            RuleError::LiteralPredicate => write!(f, "patterns cannot have a literal predicate"),
        }
    }
}

impl std::error::Error for RuleError {}

/// A Horn clause: body patterns imply the head pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Rule {
    name: Option<String>,
    body: Vec<Pattern>,
    head: Pattern,
}

impl Rule {
    /// Create a rule, checking the safety condition
    ///
    /// # Examples
    ///
    /// ```
    /// use tessera_model::{Field, Pattern, Rule};
    ///
    /// let sub = "http://www.w3.org/2000/01/rdf-schema#subClassOf";
    /// let rule = Rule::new(
    ///     Some("transitivity".to_string()),
    ///     vec![
    ///         Pattern::new(Field::var("x"), Field::uri(sub), Field::var("y")),
    ///         Pattern::new(Field::var("y"), Field::uri(sub), Field::var("z")),
    ///     ],
    ///     Pattern::new(Field::var("x"), Field::uri(sub), Field::var("z")),
    /// );
    /// assert!(rule.is_ok());
    ///
    /// let unsafe_rule = Rule::new(
    ///     None,
    ///     vec![Pattern::new(Field::var("x"), Field::uri(sub), Field::var("y"))],
    ///     Pattern::new(Field::var("x"), Field::uri(sub), Field::var("w")),
    /// );
    /// assert!(unsafe_rule.is_err());
    /// ```
    pub fn new(name: Option<String>, body: Vec<Pattern>, head: Pattern) -> Result<Self, RuleError> {
        if body.is_empty() {
            return Err(RuleError::EmptyBody);
        }
        if matches!(head.subject, Field::Literal(_)) {
            return Err(RuleError::LiteralSubject);
        }
        if body
            .iter()
            .chain(std::iter::once(&head))
            .any(|p| matches!(p.predicate, Field::Literal(_)))
        {
            return Err(RuleError::LiteralPredicate);
        }

        let bound: BTreeSet<&Variable> = body.iter().flat_map(Pattern::variables).collect();
        if let Some(free) = head.variables().find(|v| !bound.contains(v)) {
            return Err(RuleError::UnsafeVariable(free.name().to_string()));
        }

        Ok(Self { name, body, head })
    }

    /// Optional rule name
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Body patterns in order
    pub fn body(&self) -> &[Pattern] {
        &self.body
    }

    /// Head pattern
    pub fn head(&self) -> &Pattern {
        &self.head
    }

    /// Label for logs and metrics: the name, or the rule text
    pub fn label(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.to_string())
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.name {
            write!(f, "{}: ", name)?;
        }
        for (i, pattern) in self.body.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", pattern)?;
        }
        write!(f, " -> {}", self.head)
    }
}

/// A named, ordered set of rules plus the namespaces used to write them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    name: String,
    namespaces: BTreeMap<String, Namespace>,
    rules: Vec<Rule>,
}

impl Program {
    /// Create an empty program
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            namespaces: BTreeMap::new(),
            rules: Vec::new(),
        }
    }

    /// Program name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register or replace a namespace binding
    pub fn add_namespace(&mut self, namespace: Namespace) {
        self.namespaces.insert(namespace.prefix().to_string(), namespace);
    }

    /// Namespace bound to `prefix`
    pub fn namespace(&self, prefix: &str) -> Option<&Namespace> {
        self.namespaces.get(prefix)
    }

    /// All namespace bindings, ordered by prefix
    pub fn namespaces(&self) -> impl Iterator<Item = &Namespace> {
        self.namespaces.values()
    }

    /// Append a rule
    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// Rules in program order
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for ns in self.namespaces.values() {
            writeln!(f, "@prefix {}: <{}> .", ns.prefix(), ns.uri())?;
        }
        for rule in &self.rules {
            writeln!(f, "{} .", rule)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const P: &str = "http://example.org/p";

    #[test]
    fn test_empty_body_rejected() {
        let head = Pattern::new(Field::uri("http://a"), Field::uri(P), Field::uri("http://b"));
        assert_eq!(Rule::new(None, vec![], head), Err(RuleError::EmptyBody));
    }

    #[test]
    fn test_unsafe_head_variable_rejected() {
        let body = vec![Pattern::new(Field::var("x"), Field::uri(P), Field::var("y"))];
        let head = Pattern::new(Field::var("x"), Field::uri(P), Field::var("z"));
        assert_eq!(
            Rule::new(None, body, head),
            Err(RuleError::UnsafeVariable("z".to_string()))
        );
    }

    #[test]
    fn test_literal_positions_rejected() {
        let body = vec![Pattern::new(Field::var("x"), Field::uri(P), Field::var("y"))];
        let head = Pattern::new(Field::Literal(Literal::simple("x")), Field::uri(P), Field::var("y"));
        assert_eq!(Rule::new(None, body.clone(), head), Err(RuleError::LiteralSubject));

        let head = Pattern::new(Field::var("x"), Field::Literal(Literal::simple("p")), Field::var("y"));
        assert_eq!(Rule::new(None, body, head), Err(RuleError::LiteralPredicate));
    }

    #[test]
    fn test_ground_head_is_safe() {
        let body = vec![Pattern::new(Field::var("x"), Field::uri(P), Field::var("y"))];
        let head = Pattern::new(Field::uri("http://a"), Field::uri(P), Field::uri("http://b"));
        assert!(Rule::new(None, body, head).is_ok());
    }

    #[test]
    fn test_rule_display() {
        let body = vec![Pattern::new(Field::var("x"), Field::uri(P), Field::Literal(Literal::with_language("v", "en")))];
        let head = Pattern::new(Field::var("x"), Field::uri(P), Field::uri("http://b"));
        let rule = Rule::new(Some("r1".to_string()), body, head).unwrap();
        assert_eq!(
            rule.to_string(),
            "r1: (?x <http://example.org/p> \"v\"@en) -> (?x <http://example.org/p> <http://b>)"
        );
        assert_eq!(rule.label(), "r1");
    }

    #[test]
    fn test_program_namespaces() {
        let mut program = Program::new("test");
        program.add_namespace(Namespace::new("ex", "http://example.org/").unwrap());
        program.add_namespace(Namespace::new("ex", "http://example.com/").unwrap());

        assert_eq!(program.namespaces().count(), 1);
        assert_eq!(program.namespace("ex").unwrap().uri(), "http://example.com/");
        assert!(program.namespace("missing").is_none());
    }
}
