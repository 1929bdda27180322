//! SQLite backing store
//!
//! Every connection opens the database file on its own; SQLite's locking
//! serializes writers. Transactions use `BEGIN IMMEDIATE` so a writer takes
//! the lock up front instead of failing half way through.

use super::{BackingStore, StoreConnection, StoredKey, StoredTriple};
use crate::error::StoreError;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tessera_model::{Literal, Namespace, Term, TermId, TermKind, TripleId};

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Backing store persisted in a SQLite database file
///
/// # Examples
///
/// ```no_run
/// use tessera_store::SqliteBackend;
///
/// let backend = SqliteBackend::open("tessera.db").unwrap();
/// ```
pub struct SqliteBackend {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteBackend {
    /// Open (or create) the database at `path` and initialize the schema
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let backend = Self {
            path: path.as_ref().to_path_buf(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        };
        let conn = backend.open_connection()?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.execute_batch(include_str!("schema.sql"))?;
        tracing::info!(
            "Opened SQLite store at {} (journal mode {})",
            backend.path.display(),
            mode
        );
        Ok(backend)
    }

    /// How long a connection waits for a competing writer
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Database file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_connection(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.busy_timeout)?;
        Ok(conn)
    }
}

impl BackingStore for SqliteBackend {
    fn connect(&self) -> Result<Box<dyn StoreConnection>, StoreError> {
        Ok(Box::new(SqliteConnection {
            conn: self.open_connection()?,
        }))
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}

struct SqliteConnection {
    conn: Connection,
}

/// Column values of a term: kind, lexical, language, datatype
fn term_columns(term: &Term) -> (&'static str, &str, &str, &str) {
    match term {
        Term::Literal(lit) => (
            TermKind::Literal.as_str(),
            lit.value(),
            lit.language().unwrap_or(""),
            lit.datatype().unwrap_or(""),
        ),
        other => (other.kind().as_str(), other.lexical(), "", ""),
    }
}

fn decode_term(kind: &str, lexical: &str, language: &str, datatype: &str) -> Result<Term, StoreError> {
    let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
    match TermKind::parse(kind) {
        Some(TermKind::Uri) => Ok(Term::uri(lexical)),
        Some(TermKind::BlankNode) => Ok(Term::blank(lexical)),
        Some(TermKind::Literal) => {
            let language = non_empty(language);
            let datatype = non_empty(datatype);
            Literal::new(lexical, language.as_deref(), datatype.as_deref())
                .map(Term::Literal)
                .map_err(StoreError::InvalidData)
        }
        None => Err(StoreError::InvalidData(format!("Unknown term kind: {}", kind))),
    }
}

fn context_column(context: Option<TermId>) -> i64 {
    context.map_or(0, |c| c.value() as i64)
}

fn row_to_triple(row: &Row<'_>) -> rusqlite::Result<(TripleId, StoredTriple)> {
    let context: i64 = row.get(4)?;
    Ok((
        TripleId::new(row.get::<_, i64>(0)? as u64),
        StoredTriple {
            key: StoredKey {
                subject: TermId::new(row.get::<_, i64>(1)? as u64),
                predicate: TermId::new(row.get::<_, i64>(2)? as u64),
                object: TermId::new(row.get::<_, i64>(3)? as u64),
                context: (context != 0).then(|| TermId::new(context as u64)),
            },
            inferred: row.get(5)?,
            created_at: row.get::<_, i64>(6)? as u64,
        },
    ))
}

fn decode_namespace(prefix: String, uri: String, created_at: i64) -> Result<Namespace, StoreError> {
    Namespace::new(&prefix, &uri)
        .map(|ns| ns.with_created_at(created_at as u64))
        .map_err(StoreError::InvalidData)
}

const SELECT_TRIPLE: &str =
    "SELECT id, subject, predicate, object, context, inferred, created_at FROM triples";

impl SqliteConnection {
    fn query_namespace(&self, sql: &str, arg: &str) -> Result<Option<Namespace>, StoreError> {
        let row = self
            .conn
            .query_row(sql, params![arg], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, i64>(2)?))
            })
            .optional()?;
        row.map(|(prefix, uri, created_at)| decode_namespace(prefix, uri, created_at))
            .transpose()
    }
}

impl StoreConnection for SqliteConnection {
    fn begin(&mut self) -> Result<(), StoreError> {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }

    fn intern_term(&mut self, term: &Term) -> Result<TermId, StoreError> {
        let (kind, lexical, language, datatype) = term_columns(term);
        self.conn
            .prepare_cached(
                "INSERT OR IGNORE INTO terms (kind, lexical, language, datatype) VALUES (?1, ?2, ?3, ?4)",
            )?
            .execute(params![kind, lexical, language, datatype])?;
        self.lookup_term(term)?
            .ok_or_else(|| StoreError::Backend(format!("Term {} vanished after insert", term)))
    }

    fn lookup_term(&mut self, term: &Term) -> Result<Option<TermId>, StoreError> {
        let (kind, lexical, language, datatype) = term_columns(term);
        let id = self
            .conn
            .prepare_cached(
                "SELECT id FROM terms WHERE kind = ?1 AND lexical = ?2 AND language = ?3 AND datatype = ?4",
            )?
            .query_row(params![kind, lexical, language, datatype], |row| row.get::<_, i64>(0))
            .optional()?;
        Ok(id.map(|id| TermId::new(id as u64)))
    }

    fn load_term(&mut self, id: TermId) -> Result<Option<Term>, StoreError> {
        let row = self
            .conn
            .prepare_cached("SELECT kind, lexical, language, datatype FROM terms WHERE id = ?1")?
            .query_row(params![id.value() as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .optional()?;
        row.map(|(kind, lexical, language, datatype)| decode_term(&kind, &lexical, &language, &datatype))
            .transpose()
    }

    fn add_triple(&mut self, triple: &StoredTriple) -> Result<TripleId, StoreError> {
        let key = &triple.key;
        self.conn
            .prepare_cached(
                "INSERT INTO triples (subject, predicate, object, context, inferred, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(subject, predicate, object, context) DO UPDATE SET
                 inferred = excluded.inferred",
            )?
            .execute(params![
                key.subject.value() as i64,
                key.predicate.value() as i64,
                key.object.value() as i64,
                context_column(key.context),
                triple.inferred,
                triple.created_at as i64,
            ])?;
        self.find_triple(key)?
            .ok_or_else(|| StoreError::Backend("Triple vanished after insert".to_string()))
    }

    fn remove_triple(&mut self, key: &StoredKey, inferred: bool) -> Result<Option<TripleId>, StoreError> {
        let Some(id) = self.find_triple(key)? else {
            return Ok(None);
        };
        let deleted = self
            .conn
            .prepare_cached("DELETE FROM triples WHERE id = ?1 AND inferred = ?2")?
            .execute(params![id.value() as i64, inferred])?;
        Ok((deleted > 0).then_some(id))
    }

    fn find_triple(&mut self, key: &StoredKey) -> Result<Option<TripleId>, StoreError> {
        let id = self
            .conn
            .prepare_cached(
                "SELECT id FROM triples
                 WHERE subject = ?1 AND predicate = ?2 AND object = ?3 AND context = ?4",
            )?
            .query_row(
                params![
                    key.subject.value() as i64,
                    key.predicate.value() as i64,
                    key.object.value() as i64,
                    context_column(key.context),
                ],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(id.map(|id| TripleId::new(id as u64)))
    }

    fn load_triple(&mut self, id: TripleId) -> Result<Option<StoredTriple>, StoreError> {
        let sql = format!("{} WHERE id = ?1", SELECT_TRIPLE);
        let row = self
            .conn
            .prepare_cached(&sql)?
            .query_row(params![id.value() as i64], row_to_triple)
            .optional()?;
        Ok(row.map(|(_, triple)| triple))
    }

    fn load_triples(&mut self) -> Result<Vec<(TripleId, StoredTriple)>, StoreError> {
        let sql = format!("{} ORDER BY id", SELECT_TRIPLE);
        let mut stmt = self.conn.prepare(&sql)?;
        let triples = stmt
            .query_map([], row_to_triple)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(triples)
    }

    fn put_namespace(&mut self, namespace: &Namespace) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO namespaces (prefix, uri, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(prefix) DO UPDATE SET
             uri = excluded.uri, created_at = excluded.created_at",
            params![namespace.prefix(), namespace.uri(), namespace.created_at() as i64],
        )?;
        Ok(())
    }

    fn load_namespace(&mut self, prefix: &str) -> Result<Option<Namespace>, StoreError> {
        self.query_namespace(
            "SELECT prefix, uri, created_at FROM namespaces WHERE prefix = ?1",
            prefix,
        )
    }

    fn load_namespace_by_uri(&mut self, uri: &str) -> Result<Option<Namespace>, StoreError> {
        self.query_namespace(
            "SELECT prefix, uri, created_at FROM namespaces WHERE uri = ?1 ORDER BY prefix LIMIT 1",
            uri,
        )
    }

    fn remove_namespace(&mut self, prefix: &str) -> Result<Option<Namespace>, StoreError> {
        let existing = self.load_namespace(prefix)?;
        if existing.is_some() {
            self.conn
                .execute("DELETE FROM namespaces WHERE prefix = ?1", params![prefix])?;
        }
        Ok(existing)
    }

    fn load_namespaces(&mut self) -> Result<Vec<Namespace>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT prefix, uri, created_at FROM namespaces ORDER BY prefix")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, i64>(2)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(prefix, uri, created_at)| decode_namespace(prefix, uri, created_at))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn backend() -> (TempDir, SqliteBackend) {
        let dir = tempfile::tempdir().unwrap();
        let backend = SqliteBackend::open(dir.path().join("store.db")).unwrap();
        (dir, backend)
    }

    #[test]
    fn test_term_roundtrip() {
        let (_dir, backend) = backend();
        let mut conn = backend.connect().unwrap();

        let terms = [
            Term::uri("http://example.org/a"),
            Term::blank("b0"),
            Term::literal("plain"),
            Term::lang_literal("chat", "fr"),
            Term::typed_literal("1", "http://www.w3.org/2001/XMLSchema#integer"),
        ];
        for term in &terms {
            let id = conn.intern_term(term).unwrap();
            assert_eq!(conn.intern_term(term).unwrap(), id);
            assert_eq!(conn.load_term(id).unwrap().as_ref(), Some(term));
        }

        // same lexical form, different kinds
        let uri = conn.lookup_term(&Term::uri("b0")).unwrap();
        assert!(uri.is_none());
    }

    #[test]
    fn test_transaction_rollback() {
        let (_dir, backend) = backend();
        let mut conn = backend.connect().unwrap();
        let s = conn.intern_term(&Term::uri("http://example.org/s")).unwrap();
        let p = conn.intern_term(&Term::uri("http://example.org/p")).unwrap();
        let triple = StoredTriple {
            key: StoredKey { subject: s, predicate: p, object: s, context: None },
            inferred: false,
            created_at: 1,
        };

        conn.begin().unwrap();
        conn.add_triple(&triple).unwrap();
        conn.rollback().unwrap();
        assert!(conn.load_triples().unwrap().is_empty());

        conn.begin().unwrap();
        let id = conn.add_triple(&triple).unwrap();
        conn.commit().unwrap();

        let mut other = backend.connect().unwrap();
        assert_eq!(other.load_triple(id).unwrap(), Some(triple));
    }

    #[test]
    fn test_upsert_updates_inferred_flag() {
        let (_dir, backend) = backend();
        let mut conn = backend.connect().unwrap();
        let s = conn.intern_term(&Term::uri("http://example.org/s")).unwrap();
        let g = conn.intern_term(&Term::uri("http://example.org/g")).unwrap();
        let mut triple = StoredTriple {
            key: StoredKey { subject: s, predicate: s, object: s, context: Some(g) },
            inferred: true,
            created_at: 1,
        };

        let id = conn.add_triple(&triple).unwrap();
        triple.inferred = false;
        assert_eq!(conn.add_triple(&triple).unwrap(), id);
        assert!(!conn.load_triple(id).unwrap().unwrap().inferred);

        assert_eq!(conn.remove_triple(&triple.key, true).unwrap(), None);
        assert_eq!(conn.remove_triple(&triple.key, false).unwrap(), Some(id));
        assert_eq!(conn.remove_triple(&triple.key, false).unwrap(), None);
    }

    #[test]
    fn test_namespaces() {
        let (_dir, backend) = backend();
        let mut conn = backend.connect().unwrap();
        let ns = Namespace::new("ex", "http://example.org/").unwrap().with_created_at(9);

        conn.put_namespace(&ns).unwrap();
        assert_eq!(conn.load_namespace("ex").unwrap(), Some(ns.clone()));
        assert_eq!(conn.load_namespace_by_uri("http://example.org/").unwrap(), Some(ns.clone()));
        assert_eq!(conn.remove_namespace("ex").unwrap(), Some(ns));
        assert!(conn.load_namespaces().unwrap().is_empty());
    }
}
