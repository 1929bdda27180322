//! In-process backing store
//!
//! All connections share one dictionary behind a mutex. Terms and namespaces
//! are written through immediately; triple writes made inside a transaction
//! are buffered on the connection and applied in one step at commit.

use super::{BackingStore, StoreConnection, StoredKey, StoredTriple};
use crate::error::StoreError;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tessera_model::{Namespace, Term, TermId, TripleId};

#[derive(Default)]
struct MemoryData {
    term_ids: HashMap<Term, TermId>,
    terms: HashMap<TermId, Term>,
    triples: HashMap<StoredKey, (TripleId, StoredTriple)>,
    triple_keys: HashMap<TripleId, StoredKey>,
    namespaces: BTreeMap<String, Namespace>,
    next_term: u64,
    next_triple: u64,
}

impl MemoryData {
    fn allocate_triple_id(&mut self) -> TripleId {
        self.next_triple += 1;
        TripleId::new(self.next_triple)
    }

    fn insert(&mut self, id: TripleId, triple: StoredTriple) {
        self.triple_keys.insert(id, triple.key);
        self.triples.insert(triple.key, (id, triple));
    }

    fn delete(&mut self, key: &StoredKey, inferred: bool) -> Option<TripleId> {
        let (id, stored) = self.triples.get(key)?;
        if stored.inferred != inferred {
            return None;
        }
        let id = *id;
        self.triples.remove(key);
        self.triple_keys.remove(&id);
        Some(id)
    }
}

enum PendingWrite {
    Add(TripleId, StoredTriple),
    Remove(StoredKey, bool),
}

/// Backing store kept entirely in memory
///
/// Cloning shares the underlying data, so a clone can stand in for a second
/// process attached to the same store.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    data: Arc<Mutex<MemoryData>>,
}

impl MemoryBackend {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed triples
    pub fn triple_count(&self) -> usize {
        self.data.lock().triples.len()
    }

    /// Number of interned terms
    pub fn term_count(&self) -> usize {
        self.data.lock().terms.len()
    }
}

impl BackingStore for MemoryBackend {
    fn connect(&self) -> Result<Box<dyn StoreConnection>, StoreError> {
        Ok(Box::new(MemoryConnection {
            data: self.data.clone(),
            pending: None,
        }))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

struct MemoryConnection {
    data: Arc<Mutex<MemoryData>>,
    pending: Option<Vec<PendingWrite>>,
}

impl StoreConnection for MemoryConnection {
    fn begin(&mut self) -> Result<(), StoreError> {
        if self.pending.is_some() {
            return Err(StoreError::Backend("transaction already in progress".to_string()));
        }
        self.pending = Some(Vec::new());
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        let pending = self
            .pending
            .take()
            .ok_or_else(|| StoreError::Backend("no transaction in progress".to_string()))?;
        let mut data = self.data.lock();
        for write in pending {
            match write {
                PendingWrite::Add(id, triple) => {
                    let id = data.triples.get(&triple.key).map_or(id, |(existing, _)| *existing);
                    data.insert(id, triple);
                }
                PendingWrite::Remove(key, inferred) => {
                    data.delete(&key, inferred);
                }
            }
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        self.pending = None;
        Ok(())
    }

    fn intern_term(&mut self, term: &Term) -> Result<TermId, StoreError> {
        let mut data = self.data.lock();
        if let Some(id) = data.term_ids.get(term) {
            return Ok(*id);
        }
        data.next_term += 1;
        let id = TermId::new(data.next_term);
        data.term_ids.insert(term.clone(), id);
        data.terms.insert(id, term.clone());
        Ok(id)
    }

    fn lookup_term(&mut self, term: &Term) -> Result<Option<TermId>, StoreError> {
        Ok(self.data.lock().term_ids.get(term).copied())
    }

    fn load_term(&mut self, id: TermId) -> Result<Option<Term>, StoreError> {
        Ok(self.data.lock().terms.get(&id).cloned())
    }

    fn add_triple(&mut self, triple: &StoredTriple) -> Result<TripleId, StoreError> {
        let mut data = self.data.lock();
        let existing = data.triples.get(&triple.key).map(|(id, _)| *id);
        let id = match existing {
            Some(id) => id,
            None => data.allocate_triple_id(),
        };
        match self.pending.as_mut() {
            Some(pending) => pending.push(PendingWrite::Add(id, *triple)),
            None => data.insert(id, *triple),
        }
        Ok(id)
    }

    fn remove_triple(&mut self, key: &StoredKey, inferred: bool) -> Result<Option<TripleId>, StoreError> {
        let mut data = self.data.lock();
        match self.pending.as_mut() {
            Some(pending) => {
                let buffered = pending.iter().rev().find_map(|w| match w {
                    PendingWrite::Add(id, t) if t.key == *key && t.inferred == inferred => Some(*id),
                    _ => None,
                });
                let id = data
                    .triples
                    .get(key)
                    .filter(|(_, stored)| stored.inferred == inferred)
                    .map(|(id, _)| *id)
                    .or(buffered);
                pending.push(PendingWrite::Remove(*key, inferred));
                Ok(id)
            }
            None => Ok(data.delete(key, inferred)),
        }
    }

    fn find_triple(&mut self, key: &StoredKey) -> Result<Option<TripleId>, StoreError> {
        Ok(self.data.lock().triples.get(key).map(|(id, _)| *id))
    }

    fn load_triple(&mut self, id: TripleId) -> Result<Option<StoredTriple>, StoreError> {
        let data = self.data.lock();
        Ok(data
            .triple_keys
            .get(&id)
            .and_then(|key| data.triples.get(key))
            .map(|(_, triple)| *triple))
    }

    fn load_triples(&mut self) -> Result<Vec<(TripleId, StoredTriple)>, StoreError> {
        let data = self.data.lock();
        let mut triples: Vec<_> = data.triples.values().copied().collect();
        triples.sort_by_key(|(id, _)| *id);
        Ok(triples)
    }

    fn put_namespace(&mut self, namespace: &Namespace) -> Result<(), StoreError> {
        self.data
            .lock()
            .namespaces
            .insert(namespace.prefix().to_string(), namespace.clone());
        Ok(())
    }

    fn load_namespace(&mut self, prefix: &str) -> Result<Option<Namespace>, StoreError> {
        Ok(self.data.lock().namespaces.get(prefix).cloned())
    }

    fn load_namespace_by_uri(&mut self, uri: &str) -> Result<Option<Namespace>, StoreError> {
        Ok(self
            .data
            .lock()
            .namespaces
            .values()
            .find(|ns| ns.uri() == uri)
            .cloned())
    }

    fn remove_namespace(&mut self, prefix: &str) -> Result<Option<Namespace>, StoreError> {
        Ok(self.data.lock().namespaces.remove(prefix))
    }

    fn load_namespaces(&mut self) -> Result<Vec<Namespace>, StoreError> {
        Ok(self.data.lock().namespaces.values().cloned().collect())
    }
}
