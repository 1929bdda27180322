//! Triple table - the committed triples with covering indexes
//!
//! Triples are keyed by (subject, predicate, object, context). Seven indexes
//! cover the single positions (s, p, o, c) and the pairs (s,p), (s,o), (p,o).
//! A query asks every index that applies to its bound positions, scans the
//! smallest candidate set and filters it against the full pattern.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use tessera_model::{Term, TransactionData, Triple, TripleKey, TriplePattern};

type Bucket = HashSet<TripleKey>;

#[derive(Debug, Clone)]
struct Index<K: Eq + Hash> {
    buckets: HashMap<K, Bucket>,
}

impl<K: Eq + Hash> Default for Index<K> {
    fn default() -> Self {
        Self {
            buckets: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash> Index<K> {
    fn insert(&mut self, key: K, triple: &TripleKey) {
        self.buckets.entry(key).or_default().insert(triple.clone());
    }

    fn remove(&mut self, key: &K, triple: &TripleKey) {
        if let Some(bucket) = self.buckets.get_mut(key) {
            bucket.remove(triple);
            if bucket.is_empty() {
                self.buckets.remove(key);
            }
        }
    }

    fn get(&self, key: &K) -> Option<&Bucket> {
        self.buckets.get(key)
    }

    fn clear(&mut self) {
        self.buckets.clear();
    }
}

/// In-memory set of committed triples
///
/// Cloning produces an independent snapshot.
///
/// # Examples
///
/// ```
/// use tessera_model::{Term, Triple};
/// use tessera_store::TripleTable;
///
/// let mut table = TripleTable::new();
/// let alice = Term::uri("http://example.org/alice");
/// let knows = Term::uri("http://xmlns.com/foaf/0.1/knows");
/// let bob = Term::uri("http://example.org/bob");
///
/// assert!(table.add(Triple::new(alice.clone(), knows.clone(), bob, None).unwrap()));
/// assert_eq!(table.list_triples(Some(&alice), None, None, None, true).len(), 1);
/// assert!(table.list_triples(None, None, Some(&alice), None, true).is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct TripleTable {
    triples: HashMap<TripleKey, Triple>,
    by_subject: Index<Term>,
    by_predicate: Index<Term>,
    by_object: Index<Term>,
    by_context: Index<Term>,
    by_subject_predicate: Index<(Term, Term)>,
    by_subject_object: Index<(Term, Term)>,
    by_predicate_object: Index<(Term, Term)>,
}

impl TripleTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a triple
    ///
    /// Returns `false` when an identical triple (same key and inferred flag)
    /// is already present. A triple with the same key but the other flag
    /// replaces the stored one.
    pub fn add(&mut self, triple: Triple) -> bool {
        if let Some(existing) = self.triples.get(triple.key()) {
            if existing.is_inferred() == triple.is_inferred() {
                return false;
            }
            self.triples.insert(triple.key().clone(), triple);
            return true;
        }

        let key = triple.key().clone();
        self.index(&key);
        self.triples.insert(key, triple);
        true
    }

    /// Remove the triple with the same key
    ///
    /// Returns the removed triple, `None` if it was absent.
    pub fn remove(&mut self, triple: &Triple) -> Option<Triple> {
        self.remove_key(triple.key())
    }

    /// Remove the triple stored under `key`
    pub fn remove_key(&mut self, key: &TripleKey) -> Option<Triple> {
        let removed = self.triples.remove(key)?;
        self.unindex(key);
        Some(removed)
    }

    fn index(&mut self, key: &TripleKey) {
        let (s, p, o) = (&key.subject, &key.predicate, &key.object);
        self.by_subject.insert(s.clone(), key);
        self.by_predicate.insert(p.clone(), key);
        self.by_object.insert(o.clone(), key);
        if let Some(c) = &key.context {
            self.by_context.insert(c.clone(), key);
        }
        self.by_subject_predicate.insert((s.clone(), p.clone()), key);
        self.by_subject_object.insert((s.clone(), o.clone()), key);
        self.by_predicate_object.insert((p.clone(), o.clone()), key);
    }

    fn unindex(&mut self, key: &TripleKey) {
        let (s, p, o) = (&key.subject, &key.predicate, &key.object);
        self.by_subject.remove(s, key);
        self.by_predicate.remove(p, key);
        self.by_object.remove(o, key);
        if let Some(c) = &key.context {
            self.by_context.remove(c, key);
        }
        self.by_subject_predicate.remove(&(s.clone(), p.clone()), key);
        self.by_subject_object.remove(&(s.clone(), o.clone()), key);
        self.by_predicate_object.remove(&(p.clone(), o.clone()), key);
    }

    /// Triples matching the bound positions
    ///
    /// `None` is a wildcard. Inferred triples are returned only when
    /// `include_inferred` is set.
    pub fn list_triples(
        &self,
        subject: Option<&Term>,
        predicate: Option<&Term>,
        object: Option<&Term>,
        context: Option<&Term>,
        include_inferred: bool,
    ) -> Vec<Triple> {
        let pattern = TriplePattern::new(
            subject.cloned(),
            predicate.cloned(),
            object.cloned(),
            context.cloned(),
            include_inferred,
        );
        self.find(&pattern)
    }

    /// Triples matching `pattern`
    pub fn find(&self, pattern: &TriplePattern) -> Vec<Triple> {
        match self.candidates(pattern) {
            Some(bucket) => bucket
                .iter()
                .filter_map(|key| self.triples.get(key))
                .filter(|t| pattern.matches(t))
                .cloned()
                .collect(),
            None => self
                .triples
                .values()
                .filter(|t| pattern.matches(t))
                .cloned()
                .collect(),
        }
    }

    /// Number of triples matching `pattern`
    pub fn count(&self, pattern: &TriplePattern) -> usize {
        match self.candidates(pattern) {
            Some(bucket) => bucket
                .iter()
                .filter_map(|key| self.triples.get(key))
                .filter(|t| pattern.matches(t))
                .count(),
            None => self.triples.values().filter(|t| pattern.matches(t)).count(),
        }
    }

    /// Smallest candidate set among the applicable indexes
    ///
    /// `None` means no position is bound and the whole table must be scanned.
    /// A bound position without a bucket yields the empty set.
    fn candidates(&self, pattern: &TriplePattern) -> Option<&Bucket> {
        static EMPTY: std::sync::OnceLock<Bucket> = std::sync::OnceLock::new();
        let empty = || EMPTY.get_or_init(Bucket::new);

        let (s, p, o) = (&pattern.subject, &pattern.predicate, &pattern.object);
        let mut lookups: Vec<Option<&Bucket>> = Vec::with_capacity(4);
        if let (Some(s), Some(p)) = (s, p) {
            lookups.push(self.by_subject_predicate.get(&(s.clone(), p.clone())));
        }
        if let (Some(s), Some(o)) = (s, o) {
            lookups.push(self.by_subject_object.get(&(s.clone(), o.clone())));
        }
        if let (Some(p), Some(o)) = (p, o) {
            lookups.push(self.by_predicate_object.get(&(p.clone(), o.clone())));
        }
        if lookups.is_empty() {
            if let Some(s) = s {
                lookups.push(self.by_subject.get(s));
            }
            if let Some(p) = p {
                lookups.push(self.by_predicate.get(p));
            }
            if let Some(o) = o {
                lookups.push(self.by_object.get(o));
            }
        }
        if let Some(c) = &pattern.context {
            lookups.push(self.by_context.get(c));
        }

        lookups
            .into_iter()
            .map(|bucket| bucket.unwrap_or_else(empty))
            .min_by_key(|bucket| bucket.len())
    }

    /// Whether a triple with the same key is present
    pub fn contains(&self, triple: &Triple) -> bool {
        self.triples.contains_key(triple.key())
    }

    /// Whether the statement is present in any context, explicit or inferred
    pub fn contains_statement(&self, subject: &Term, predicate: &Term, object: &Term) -> bool {
        self.by_subject_predicate
            .get(&(subject.clone(), predicate.clone()))
            .map_or(false, |bucket| bucket.iter().any(|key| key.object == *object))
    }

    /// Whether the statement is explicitly asserted in any context
    pub fn contains_explicit_statement(&self, subject: &Term, predicate: &Term, object: &Term) -> bool {
        self.by_subject_predicate
            .get(&(subject.clone(), predicate.clone()))
            .map_or(false, |bucket| {
                bucket.iter().any(|key| {
                    key.object == *object
                        && self.triples.get(key).map_or(false, |t| !t.is_inferred())
                })
            })
    }

    /// The stored triple with the given key
    pub fn get(&self, key: &TripleKey) -> Option<&Triple> {
        self.triples.get(key)
    }

    /// Number of triples
    pub fn len(&self) -> usize {
        self.triples.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// Iterate over all triples in no particular order
    pub fn iter(&self) -> impl Iterator<Item = &Triple> {
        self.triples.values()
    }

    /// Remove everything
    pub fn clear(&mut self) {
        self.triples.clear();
        self.by_subject.clear();
        self.by_predicate.clear();
        self.by_object.clear();
        self.by_context.clear();
        self.by_subject_predicate.clear();
        self.by_subject_object.clear();
        self.by_predicate_object.clear();
    }

    /// Remove every triple of a context, returning them
    pub fn remove_context(&mut self, context: &Term) -> Vec<Triple> {
        let keys: Vec<TripleKey> = self
            .by_context
            .get(context)
            .map(|bucket| bucket.iter().cloned().collect())
            .unwrap_or_default();
        keys.iter().filter_map(|key| self.remove_key(key)).collect()
    }

    /// Apply a committed delta: removals first, then additions
    pub fn apply(&mut self, data: &TransactionData) {
        for triple in data.removed() {
            self.remove(triple);
        }
        for triple in data.added() {
            self.add(triple.clone());
        }
    }
}

impl FromIterator<Triple> for TripleTable {
    fn from_iter<I: IntoIterator<Item = Triple>>(iter: I) -> Self {
        let mut table = TripleTable::new();
        for triple in iter {
            table.add(triple);
        }
        table
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn term(i: u8) -> Term {
        Term::uri(&format!("http://example.org/t{}", i))
    }

    prop_compose! {
        fn arb_triple()(s in 0u8..4, p in 0u8..3, o in 0u8..4, c in proptest::option::of(0u8..2), inferred in any::<bool>()) -> Triple {
            Triple::new(term(s), term(p), term(o), c.map(term))
                .unwrap()
                .with_inferred(inferred)
        }
    }

    fn arb_bound() -> impl Strategy<Value = Option<Term>> {
        proptest::option::of((0u8..4).prop_map(term))
    }

    proptest! {
        /// Property: adding the same triples twice leaves the table unchanged
        #[test]
        fn test_add_idempotence(triples in proptest::collection::vec(arb_triple(), 0..30)) {
            let mut table: TripleTable = triples.iter().cloned().collect();
            let len = table.len();
            for t in &triples {
                let stored = table.get(t.key()).cloned().unwrap();
                prop_assert!(!table.add(stored));
            }
            prop_assert_eq!(table.len(), len);
        }

        /// Property: index lookups return exactly what a full scan returns
        #[test]
        fn test_pattern_completeness(
            triples in proptest::collection::vec(arb_triple(), 0..30),
            s in arb_bound(),
            p in arb_bound(),
            o in arb_bound(),
            c in arb_bound(),
            include_inferred in any::<bool>(),
        ) {
            let table: TripleTable = triples.into_iter().collect();
            let pattern = TriplePattern::new(s, p, o, c, include_inferred);

            let mut indexed: Vec<TripleKey> = table.find(&pattern).iter().map(|t| t.key().clone()).collect();
            let mut scanned: Vec<TripleKey> = table
                .iter()
                .filter(|t| pattern.matches(t))
                .map(|t| t.key().clone())
                .collect();
            indexed.sort();
            scanned.sort();
            prop_assert_eq!(indexed, scanned);
        }

        /// Property: the all-wildcard query returns the whole table
        #[test]
        fn test_wildcard_identity(triples in proptest::collection::vec(arb_triple(), 0..30)) {
            let table: TripleTable = triples.into_iter().collect();
            prop_assert_eq!(table.list_triples(None, None, None, None, true).len(), table.len());
        }

        /// Property: removing everything that was added empties every index
        #[test]
        fn test_remove_all(triples in proptest::collection::vec(arb_triple(), 0..30)) {
            let mut table: TripleTable = triples.iter().cloned().collect();
            for t in &triples {
                table.remove(t);
            }
            prop_assert!(table.is_empty());
            prop_assert!(table.by_subject.buckets.is_empty());
            prop_assert!(table.by_predicate_object.buckets.is_empty());
        }
    }
}
