//! Rule evaluation over triple tables
//!
//! Pattern unification, semi-naive saturation, and the two halves of
//! delete-and-rederive: over-deletion and one-step rederivation.

use std::collections::{BTreeMap, HashMap, HashSet};
use tessera_model::{Field, Pattern, Rule, Term, Triple, TripleKey, Variable};
use tessera_store::TripleTable;

/// Variable bindings of one partial body match
pub(crate) type Bindings = HashMap<Variable, Term>;

/// The term a field stands for under `bindings`, if it is fixed
fn bound(field: &Field, bindings: &Bindings) -> Option<Term> {
    match field {
        Field::Variable(v) => bindings.get(v).cloned(),
        other => other.constant(),
    }
}

/// Unify a pattern field with a ground term
fn unify(field: &Field, term: &Term, bindings: &mut Bindings) -> bool {
    match field {
        Field::Variable(v) => match bindings.get(v) {
            Some(existing) => existing == term,
            None => {
                bindings.insert(v.clone(), term.clone());
                true
            }
        },
        Field::Resource(resource) => resource == term,
        Field::Literal(literal) => matches!(term, Term::Literal(l) if l == literal),
    }
}

fn unify_statement(pattern: &Pattern, triple: &Triple, bindings: &mut Bindings) -> bool {
    unify(&pattern.subject, triple.subject(), bindings)
        && unify(&pattern.predicate, triple.predicate(), bindings)
        && unify(&pattern.object, triple.object(), bindings)
}

fn match_pattern(pattern: &Pattern, bindings: &Bindings, sources: &[&TripleTable], out: &mut Vec<Bindings>) {
    let subject = bound(&pattern.subject, bindings);
    let predicate = bound(&pattern.predicate, bindings);
    let object = bound(&pattern.object, bindings);

    for table in sources {
        for triple in table.list_triples(subject.as_ref(), predicate.as_ref(), object.as_ref(), None, true) {
            let mut extended = bindings.clone();
            if unify_statement(pattern, &triple, &mut extended) {
                out.push(extended);
            }
        }
    }
}

/// Every extension of `seed` matching the whole body
///
/// With a pivot `(i, delta)`, pattern `i` is matched against `delta` only and
/// evaluated first; all other patterns are matched against `facts`.
fn solutions(
    body: &[Pattern],
    pivot: Option<(usize, &TripleTable)>,
    facts: &[&TripleTable],
    seed: Bindings,
) -> Vec<Bindings> {
    let first = pivot.map(|(i, _)| i);
    let order = first
        .into_iter()
        .chain((0..body.len()).filter(|i| Some(*i) != first));

    let mut frontier = vec![seed];
    for i in order {
        let mut next = Vec::new();
        for bindings in &frontier {
            match pivot {
                Some((p, delta)) if p == i => match_pattern(&body[i], bindings, &[delta], &mut next),
                _ => match_pattern(&body[i], bindings, facts, &mut next),
            }
        }
        if next.is_empty() {
            return next;
        }
        frontier = next;
    }
    frontier
}

fn instantiate(head: &Pattern, bindings: &Bindings) -> Option<(Term, Term, Term)> {
    Some((
        bound(&head.subject, bindings)?,
        bound(&head.predicate, bindings)?,
        bound(&head.object, bindings)?,
    ))
}

/// One evaluation pass of a rule set, with its counters
pub(crate) struct Evaluation<'r> {
    rules: &'r [Rule],
    labels: Vec<String>,
    context: &'r Term,
    pub(crate) rounds: usize,
    pub(crate) firings: BTreeMap<String, usize>,
}

impl<'r> Evaluation<'r> {
    pub(crate) fn new(rules: &'r [Rule], context: &'r Term) -> Self {
        Self {
            rules,
            labels: rules.iter().map(Rule::label).collect(),
            context,
            rounds: 0,
            firings: BTreeMap::new(),
        }
    }

    /// Inferred triple for a statement, in the inferred-triples context
    pub(crate) fn infer(&self, subject: Term, predicate: Term, object: Term) -> Option<Triple> {
        match Triple::new_inferred(subject, predicate, object, Some(self.context.clone())) {
            Ok(triple) => Some(triple),
            Err(e) => {
                tracing::trace!("Discarded ill-formed head instance: {}", e);
                None
            }
        }
    }

    /// Semi-naive forward chaining from `seeds` to fixpoint
    ///
    /// `seeds` must already be in `working`. Every new inference is added to
    /// `working` and returned. A head instance whose statement is present in
    /// any context, explicit or inferred, is skipped.
    pub(crate) fn saturate(&mut self, working: &mut TripleTable, seeds: Vec<Triple>) -> Vec<Triple> {
        let mut derived = Vec::new();
        let mut delta: TripleTable = seeds.into_iter().collect();

        while !delta.is_empty() {
            self.rounds += 1;
            let mut round = Vec::new();
            let mut seen = HashSet::new();

            for (rule, label) in self.rules.iter().zip(&self.labels) {
                for pivot in 0..rule.body().len() {
                    let matches = solutions(rule.body(), Some((pivot, &delta)), &[&*working], Bindings::new());
                    for bindings in matches {
                        let Some((s, p, o)) = instantiate(rule.head(), &bindings) else {
                            continue;
                        };
                        if working.contains_statement(&s, &p, &o) {
                            continue;
                        }
                        let Some(triple) = self.infer(s, p, o) else {
                            continue;
                        };
                        if seen.insert(triple.key().clone()) {
                            tracing::trace!("Rule {} derived {}", label, triple);
                            *self.firings.entry(label.clone()).or_insert(0) += 1;
                            round.push(triple);
                        }
                    }
                }
            }

            for triple in &round {
                working.add(triple.clone());
            }
            delta = round.iter().cloned().collect();
            derived.extend(round);
        }
        derived
    }

    /// Inferred triples of `working` with a derivation through `gone`
    ///
    /// `working` is the state after the removal; `gone` holds the removed
    /// explicit triples. The result is closed: anything derivable from a
    /// doomed triple is doomed too.
    pub(crate) fn overdelete(&mut self, working: &TripleTable, gone: &TripleTable) -> BTreeMap<TripleKey, Triple> {
        let mut doomed = BTreeMap::new();
        let mut delta = gone.clone();

        while !delta.is_empty() {
            self.rounds += 1;
            let mut round = Vec::new();

            for rule in self.rules {
                for pivot in 0..rule.body().len() {
                    let matches = solutions(rule.body(), Some((pivot, &delta)), &[working, gone], Bindings::new());
                    for bindings in matches {
                        let Some((s, p, o)) = instantiate(rule.head(), &bindings) else {
                            continue;
                        };
                        for triple in working.list_triples(Some(&s), Some(&p), Some(&o), None, true) {
                            if triple.is_inferred() && !doomed.contains_key(triple.key()) {
                                doomed.insert(triple.key().clone(), triple.clone());
                                round.push(triple);
                            }
                        }
                    }
                }
            }
            delta = round.into_iter().collect();
        }
        doomed
    }

    /// Whether some rule derives the statement of `triple` in one step from `facts`
    pub(crate) fn derivable(&self, triple: &Triple, facts: &TripleTable) -> bool {
        self.rules.iter().any(|rule| {
            let mut seed = Bindings::new();
            unify_statement(rule.head(), triple, &mut seed)
                && !solutions(rule.body(), None, &[facts], seed).is_empty()
        })
    }
}
