//! Rule program parser
//!
//! Parses the textual rule format into a [`Program`]:
//!
//! ```text
//! # comments run to the end of the line
//! @prefix ex: <http://example.org/> .
//! transitivity: (?x rdfs:subClassOf ?y), (?y rdfs:subClassOf ?z) -> (?x rdfs:subClassOf ?z) .
//! (?p ex:name $n) -> (?p ex:label $n)
//! ```
//!
//! Positions are `<uri>`, `prefix:local`, `_:label`, `"literal"` (optionally
//! followed by `@lang` or `^^datatype`) or variables `?name` / `$name`.
//! Trailing dots are optional. The `rdf`, `rdfs` and `xsd` prefixes are
//! predeclared in programs.

use crate::error::ParseError;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, multispace1, satisfy},
    combinator::{recognize, value},
    multi::many0,
    sequence::{delimited, pair, preceded},
    IResult,
};
use std::collections::BTreeMap;
use tessera_model::vocabulary::DEFAULT_PREFIXES;
use tessera_model::{Field, Literal, Namespace, Pattern, Program, Rule, Term, Variable};

/// Parse whitespace and comments
fn ws(input: &str) -> IResult<&str, ()> {
    value(
        (),
        many0(alt((
            value((), multispace1),
            value((), preceded(char('#'), take_while(|c| c != '\n'))),
        ))),
    )(input)
}

/// Parse an IRI reference <...>
fn iri_ref(input: &str) -> IResult<&str, &str> {
    delimited(
        char('<'),
        take_while(|c: char| c != '>' && !c.is_whitespace()),
        char('>'),
    )(input)
}

/// Parse a prefix name, possibly empty
fn pn_prefix(input: &str) -> IResult<&str, &str> {
    take_while(|c: char| c.is_alphanumeric() || c == '_' || c == '-')(input)
}

/// Parse the local part of a prefixed name; it cannot end with '.'
fn pn_local(input: &str) -> IResult<&str, &str> {
    let (_, raw) = take_while(|c: char| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))(input)?;
    let len = raw.trim_end_matches('.').len();
    Ok((&input[len..], &input[..len]))
}

/// Parse a variable ?name or $name
fn variable(input: &str) -> IResult<&str, &str> {
    preceded(
        alt((char('?'), char('$'))),
        take_while1(|c: char| c.is_alphanumeric() || c == '_'),
    )(input)
}

/// Parse a blank node _:label
fn blank_node(input: &str) -> IResult<&str, &str> {
    preceded(
        tag("_:"),
        take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '-'),
    )(input)
}

/// Parse a quoted string, returning the raw (still escaped) contents
fn string_literal(input: &str) -> IResult<&str, &str> {
    delimited(
        char('"'),
        recognize(many0(alt((
            take_while1(|c| c != '"' && c != '\\' && c != '\n'),
            recognize(pair(char('\\'), satisfy(|c| c != '\n'))),
        )))),
        char('"'),
    )(input)
}

/// Parse a language tag @en-GB
fn language_tag(input: &str) -> IResult<&str, &str> {
    preceded(
        char('@'),
        recognize(pair(
            take_while1(|c: char| c.is_ascii_alphabetic()),
            many0(pair(char('-'), take_while1(|c: char| c.is_ascii_alphanumeric()))),
        )),
    )(input)
}

/// Parse a rule label
fn rule_name(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_' || c == '-'),
    ))(input)
}

fn unescape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('r') => result.push('\r'),
            Some('t') => result.push('\t'),
            Some(other) => result.push(other),
            None => result.push('\\'),
        }
    }
    result
}

struct RuleParser<'s> {
    source: &'s str,
    namespaces: BTreeMap<String, Namespace>,
}

impl<'s> RuleParser<'s> {
    fn new<'n>(source: &'s str, namespaces: impl IntoIterator<Item = &'n Namespace>) -> Self {
        Self {
            source,
            namespaces: namespaces
                .into_iter()
                .map(|ns| (ns.prefix().to_string(), ns.clone()))
                .collect(),
        }
    }

    /// 1-based line and column of `rest` within the source
    fn position(&self, rest: &str) -> (usize, usize) {
        let offset = self.source.len() - rest.len();
        let consumed = &self.source[..offset];
        let line = consumed.matches('\n').count() + 1;
        let line_start = consumed.rfind('\n').map_or(0, |nl| nl + 1);
        (line, consumed[line_start..].chars().count() + 1)
    }

    fn syntax(&self, rest: &str, message: &str) -> ParseError {
        let (line, column) = self.position(rest);
        ParseError::Syntax {
            line,
            column,
            message: message.to_string(),
        }
    }

    fn skip(&self, input: &'s str) -> &'s str {
        ws(input).map_or(input, |(rest, _)| rest)
    }

    fn expect(&self, input: &'s str, c: char, message: &str) -> Result<&'s str, ParseError> {
        char::<&str, nom::error::Error<&str>>(c)(input)
            .map(|(rest, _)| rest)
            .map_err(|_| self.syntax(input, message))
    }

    fn skip_dot(&self, input: &'s str) -> &'s str {
        let input = self.skip(input);
        input.strip_prefix('.').unwrap_or(input)
    }

    /// Parse @prefix directive
    fn parse_prefix_directive(&mut self, input: &'s str) -> Result<&'s str, ParseError> {
        let Some(rest) = input.strip_prefix("@prefix") else {
            return Err(self.syntax(input, "unknown directive, expected '@prefix'"));
        };
        let (rest, _) = multispace1::<&str, nom::error::Error<&str>>(rest)
            .map_err(|_| self.syntax(rest, "expected whitespace after '@prefix'"))?;
        let (rest, prefix) = pn_prefix(rest).map_err(|_| self.syntax(rest, "expected prefix name"))?;
        let rest = self.expect(rest, ':', "expected ':' after prefix name")?;
        let rest = self.skip(rest);
        let (after, uri) = iri_ref(rest).map_err(|_| self.syntax(rest, "expected <uri> for namespace"))?;
        let namespace = Namespace::new(prefix, uri).map_err(|e| self.syntax(rest, &e))?;

        tracing::trace!("Declared prefix {}: <{}>", prefix, uri);
        self.namespaces.insert(prefix.to_string(), namespace);
        Ok(self.skip_dot(after))
    }

    /// Resolve prefix:local against the declared namespaces
    fn parse_prefixed(&self, input: &'s str) -> Result<(&'s str, String), ParseError> {
        let (rest, prefix) = pn_prefix(input).map_err(|_| self.syntax(input, "expected term"))?;
        let rest = self.expect(
            rest,
            ':',
            "expected <uri>, prefix:local, literal or variable",
        )?;
        let (rest, local) = pn_local(rest).map_err(|_| self.syntax(rest, "expected local name"))?;

        let namespace = self.namespaces.get(prefix).ok_or_else(|| {
            let (line, column) = self.position(input);
            ParseError::UnknownPrefix {
                prefix: prefix.to_string(),
                line,
                column,
            }
        })?;
        Ok((rest, namespace.expand(local)))
    }

    fn parse_literal(&self, input: &'s str) -> Result<(&'s str, Literal), ParseError> {
        let (rest, raw) = string_literal(input).map_err(|_| self.syntax(input, "unterminated string literal"))?;
        let lexical = unescape(raw);

        if let Ok((rest, lang)) = language_tag(rest) {
            return Ok((rest, Literal::with_language(&lexical, lang)));
        }
        if let Some(dt) = rest.strip_prefix("^^") {
            let (rest, datatype) = match iri_ref(dt) {
                Ok((rest, uri)) => (rest, uri.to_string()),
                Err(_) => self.parse_prefixed(dt)?,
            };
            return Ok((rest, Literal::typed(&lexical, &datatype)));
        }
        Ok((rest, Literal::simple(&lexical)))
    }

    fn parse_field(&self, input: &'s str) -> Result<(&'s str, Field), ParseError> {
        match input.chars().next() {
            Some('<') => {
                let (rest, uri) = iri_ref(input).map_err(|_| self.syntax(input, "unterminated <uri>"))?;
                Ok((rest, Field::uri(uri)))
            }
            Some('?') | Some('$') => {
                let (rest, name) = variable(input).map_err(|_| self.syntax(input, "expected variable name"))?;
                Ok((rest, Field::Variable(Variable::new(name))))
            }
            Some('"') => {
                let (rest, literal) = self.parse_literal(input)?;
                Ok((rest, Field::Literal(literal)))
            }
            Some('_') if input.starts_with("_:") => {
                let (rest, label) = blank_node(input).map_err(|_| self.syntax(input, "expected blank node label"))?;
                Ok((rest, Field::Resource(Term::blank(label))))
            }
            Some(_) => {
                let (rest, uri) = self.parse_prefixed(input)?;
                Ok((rest, Field::uri(&uri)))
            }
            None => Err(self.syntax(input, "unexpected end of input")),
        }
    }

    fn parse_pattern(&self, input: &'s str) -> Result<(&'s str, Pattern), ParseError> {
        let rest = self.expect(input, '(', "expected '(' to open a pattern")?;
        let (rest, subject) = self.parse_field(self.skip(rest))?;
        let (rest, predicate) = self.parse_field(self.skip(rest))?;
        let (rest, object) = self.parse_field(self.skip(rest))?;
        let rest = self.skip(rest);
        let rest = self.expect(rest, ')', "expected ')' to close a pattern")?;
        Ok((rest, Pattern::new(subject, predicate, object)))
    }

    fn parse_rule(&self, input: &'s str) -> Result<(&'s str, Rule), ParseError> {
        let start = input;
        let (mut rest, name) = if input.starts_with('(') {
            (input, None)
        } else {
            let (rest, name) = rule_name(input).map_err(|_| self.syntax(input, "expected rule or directive"))?;
            let rest = self.expect(self.skip(rest), ':', "expected ':' after rule name")?;
            (self.skip(rest), Some(name.to_string()))
        };

        let mut body = Vec::new();
        loop {
            let (after, pattern) = self.parse_pattern(rest)?;
            body.push(pattern);
            rest = self.skip(after);
            match rest.strip_prefix(',') {
                Some(after) => rest = self.skip(after),
                None => break,
            }
        }

        let Some(after) = rest.strip_prefix("->") else {
            return Err(self.syntax(rest, "expected ',' or '->'"));
        };
        let (after, head) = self.parse_pattern(self.skip(after))?;

        let rule = Rule::new(name, body, head).map_err(|source| {
            let (line, column) = self.position(start);
            ParseError::InvalidRule {
                line,
                column,
                source,
            }
        })?;
        Ok((self.skip_dot(after), rule))
    }
}

/// Parse a whole rule program
///
/// # Examples
///
/// ```
/// use tessera_reasoner::parse_program;
///
/// let program = parse_program("rdfs", r#"
///     ## subclass reasoning
///     transitivity: (?x rdfs:subClassOf ?y), (?y rdfs:subClassOf ?z) -> (?x rdfs:subClassOf ?z) .
///     inheritance: (?i rdf:type ?c), (?c rdfs:subClassOf ?d) -> (?i rdf:type ?d) .
/// "#).unwrap();
///
/// assert_eq!(program.name(), "rdfs");
/// assert_eq!(program.rules().len(), 2);
/// ```
pub fn parse_program(name: &str, text: &str) -> Result<Program, ParseError> {
    let defaults: Vec<Namespace> = DEFAULT_PREFIXES
        .iter()
        .filter_map(|(prefix, uri)| Namespace::new(prefix, uri).ok())
        .collect();
    let mut parser = RuleParser::new(text, &defaults);
    let mut program = Program::new(name);

    let mut input = parser.skip(text);
    while !input.is_empty() {
        if input.starts_with('@') {
            input = parser.parse_prefix_directive(input)?;
        } else {
            let (rest, rule) = parser.parse_rule(input)?;
            tracing::trace!("Parsed rule {}", rule.label());
            program.add_rule(rule);
            input = rest;
        }
        input = parser.skip(input);
    }

    for namespace in parser.namespaces.into_values() {
        program.add_namespace(namespace);
    }
    tracing::debug!("Parsed program '{}' with {} rules", name, program.rules().len());
    Ok(program)
}

/// Parse a single rule against externally supplied namespaces
///
/// # Examples
///
/// ```
/// use tessera_model::Namespace;
/// use tessera_reasoner::parse_rule;
///
/// let ex = Namespace::new("ex", "http://example.org/").unwrap();
/// let rule = parse_rule("(?a ex:parent ?b) -> (?b ex:child ?a)", [&ex]).unwrap();
/// assert_eq!(rule.body().len(), 1);
///
/// assert!(parse_rule("(?a foo:parent ?b) -> (?b ex:child ?a)", [&ex]).is_err());
/// ```
pub fn parse_rule<'n>(
    text: &str,
    namespaces: impl IntoIterator<Item = &'n Namespace>,
) -> Result<Rule, ParseError> {
    let parser = RuleParser::new(text, namespaces);
    let (rest, rule) = parser.parse_rule(parser.skip(text))?;
    let rest = parser.skip(rest);
    if !rest.is_empty() {
        return Err(parser.syntax(rest, "unexpected input after rule"));
    }
    Ok(rule)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_model::vocabulary::{rdf, rdfs, xsd};
    use tessera_model::RuleError;

    const EX: &str = "http://example.org/";

    fn ex() -> Namespace {
        Namespace::new("ex", EX).unwrap()
    }

    fn no_namespaces() -> [&'static Namespace; 0] {
        []
    }

    #[test]
    fn test_parse_program_with_prefixes_and_comments() {
        let text = r#"
            @prefix ex: <http://example.org/> .
            # comment line
            transitivity: (?x rdfs:subClassOf ?y), (?y rdfs:subClassOf ?z) -> (?x rdfs:subClassOf ?z) .
            (?p ex:knows ?q) -> (?q ex:knows ?p)   # symmetric, no dot
        "#;
        let program = parse_program("test", text).unwrap();

        assert_eq!(program.rules().len(), 2);
        assert_eq!(program.namespace("ex").map(|ns| ns.uri()), Some(EX));
        assert!(program.namespace("rdfs").is_some());

        let transitivity = &program.rules()[0];
        assert_eq!(transitivity.name(), Some("transitivity"));
        assert_eq!(transitivity.body().len(), 2);
        assert_eq!(transitivity.head().predicate, Field::uri(rdfs::SUB_CLASS_OF));

        let symmetric = &program.rules()[1];
        assert_eq!(symmetric.name(), None);
        assert_eq!(symmetric.head().subject, Field::var("q"));
    }

    #[test]
    fn test_literals() {
        let rule = parse_rule(
            r#"(?x ex:label "chat"@FR), (?x ex:count "3"^^xsd:integer), (?x ex:note "say \"hi\"") -> (?x ex:size "big"^^<http://example.org/dt>)"#,
            [&ex(), &Namespace::new("xsd", xsd::NAMESPACE).unwrap()],
        )
        .unwrap();

        assert_eq!(rule.body()[0].object, Field::Literal(Literal::with_language("chat", "fr")));
        assert_eq!(rule.body()[1].object, Field::Literal(Literal::typed("3", xsd::INTEGER)));
        assert_eq!(rule.body()[2].object, Field::Literal(Literal::simple("say \"hi\"")));
        assert_eq!(
            rule.head().object,
            Field::Literal(Literal::typed("big", "http://example.org/dt"))
        );
    }

    #[test]
    fn test_variable_sigils_and_blank_nodes() {
        let rule = parse_rule("($a <http://example.org/p> _:b1) -> (?a <http://example.org/q> _:b1)", no_namespaces()).unwrap();
        assert_eq!(rule.body()[0].subject, Field::var("a"));
        assert_eq!(rule.head().subject, Field::var("a"));
        assert_eq!(rule.body()[0].object, Field::Resource(Term::blank("b1")));
    }

    #[test]
    fn test_unknown_prefix_position() {
        let err = parse_program("p", "(?x rdf:type ?y) ->\n  (?x foo:bar ?y)").unwrap_err();
        assert_eq!(
            err,
            ParseError::UnknownPrefix {
                prefix: "foo".to_string(),
                line: 2,
                column: 7
            }
        );
    }

    #[test]
    fn test_unsafe_rule_rejected() {
        let err = parse_program("p", "\n  bad: (?x rdf:type ?y) -> (?x rdf:type ?z) .").unwrap_err();
        match err {
            ParseError::InvalidRule { line, column, source } => {
                assert_eq!((line, column), (2, 3));
                assert_eq!(source, RuleError::UnsafeVariable("z".to_string()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_literal_head_subject_rejected() {
        let err = parse_rule(r#"(?x <http://a> ?y) -> ("s" <http://a> ?y)"#, no_namespaces()).unwrap_err();
        assert!(matches!(
            err,
            ParseError::InvalidRule { source: RuleError::LiteralSubject, .. }
        ));
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(
            parse_program("p", "(?x rdf:type ?y) (?x rdf:type ?y)"),
            Err(ParseError::Syntax { line: 1, column: 18, .. })
        ));
        assert!(matches!(
            parse_program("p", "-> (?x rdf:type ?y)"),
            Err(ParseError::Syntax { .. })
        ));
        assert!(matches!(
            parse_program("p", "@base <http://example.org/> ."),
            Err(ParseError::Syntax { .. })
        ));
        assert!(matches!(
            parse_program("p", r#"(?x rdf:type "open) -> (?x rdf:type ?x)"#),
            Err(ParseError::Syntax { .. })
        ));
        assert!(matches!(
            parse_rule("(?x <http://a> ?y) -> (?x <http://a> ?y) extra", no_namespaces()),
            Err(ParseError::Syntax { .. })
        ));
    }

    #[test]
    fn test_prefix_override_and_empty_prefix() {
        let program = parse_program(
            "p",
            "@prefix rdf: <http://example.org/not-rdf#>\n@prefix : <http://example.org/>\n(?x rdf:type ?y) -> (?x :kind ?y)",
        )
        .unwrap();
        let rule = &program.rules()[0];
        assert_eq!(rule.body()[0].predicate, Field::uri("http://example.org/not-rdf#type"));
        assert_eq!(rule.head().predicate, Field::uri("http://example.org/kind"));
    }

    #[test]
    fn test_local_name_trailing_dot() {
        let rule = parse_rule("(?x rdf:type ex:Person) -> (?x ex:a ex:b.c).", [&ex(), &Namespace::new("rdf", rdf::NAMESPACE).unwrap()]).unwrap();
        assert_eq!(rule.head().object, Field::uri("http://example.org/b.c"));
    }

    #[test]
    fn test_display_reparses() {
        let program = parse_program(
            "p",
            r#"@prefix ex: <http://example.org/> .
               r1: (?x ex:p "v\n"@en), (?x ex:q ?y) -> (?y ex:r ?x) .
               (?x ex:p "1"^^xsd:integer) -> (?x rdf:type ex:One) ."#,
        )
        .unwrap();
        let reparsed = parse_program("p", &program.to_string()).unwrap();
        assert_eq!(reparsed.rules(), program.rules());
    }

    #[test]
    fn test_empty_program() {
        let program = parse_program("empty", "  # nothing here\n").unwrap();
        assert!(program.rules().is_empty());
    }
}
