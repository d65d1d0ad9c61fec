//! StateStore: redb-backed versioned persistence for Spacehub.
//!
//! Provides typed CRUD over spaces, space apps, secrets and variables.
//! All values are JSON-serialized into redb's `&[u8]` value columns. The
//! store supports both on-disk and in-memory backends (the latter for
//! testing).
//!
//! Mutations of existing rows go through [`StateStore::save`], which only
//! writes when the stored `version` equals the version the caller loaded,
//! and bumps it by one. Zero matching rows means someone else wrote first.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// A versioned row stored in one of the record tables.
pub trait Record: Serialize + DeserializeOwned {
    const TABLE: TableDefinition<'static, u64, &'static [u8]>;
    /// Human-readable kind, also the id sequence key.
    const KIND: &'static str;

    fn id(&self) -> Identity;
    fn set_id(&mut self, id: Identity);
    fn version(&self) -> u64;
    fn set_version(&mut self, version: u64);
}

/// A record that belongs to exactly one space.
pub trait SpaceScoped: Record {
    fn space_id(&self) -> Identity;
}

/// A space-scoped record whose name is unique within its space.
pub trait NamedInSpace: SpaceScoped {
    fn name(&self) -> &str;
}

macro_rules! impl_record {
    ($ty:ty, $table:expr, $kind:literal) => {
        impl Record for $ty {
            const TABLE: TableDefinition<'static, u64, &'static [u8]> = $table;
            const KIND: &'static str = $kind;

            fn id(&self) -> Identity {
                self.id
            }
            fn set_id(&mut self, id: Identity) {
                self.id = id;
            }
            fn version(&self) -> u64 {
                self.version
            }
            fn set_version(&mut self, version: u64) {
                self.version = version;
            }
        }
    };
}

impl_record!(Space, SPACES, "space");
impl_record!(SpaceApp, SPACE_APPS, "space_app");
impl_record!(SpaceSecret, SPACE_SECRETS, "space_secret");
impl_record!(SpaceVariable, SPACE_VARIABLES, "space_variable");

impl SpaceScoped for SpaceApp {
    fn space_id(&self) -> Identity {
        self.index.space_id
    }
}

impl SpaceScoped for SpaceSecret {
    fn space_id(&self) -> Identity {
        self.space_id
    }
}

impl NamedInSpace for SpaceSecret {
    fn name(&self) -> &str {
        &self.name
    }
}

impl SpaceScoped for SpaceVariable {
    fn space_id(&self) -> Identity {
        self.space_id
    }
}

impl NamedInSpace for SpaceVariable {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(SPACES).map_err(map_err!(Table))?;
        txn.open_table(SPACE_APPS).map_err(map_err!(Table))?;
        txn.open_table(SPACE_SECRETS).map_err(map_err!(Table))?;
        txn.open_table(SPACE_VARIABLES).map_err(map_err!(Table))?;
        txn.open_table(SEQUENCES).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Generic records ───────────────────────────────────────────

    /// Insert a new record, assigning its id and initial version (1).
    pub fn insert<T: Record>(&self, record: &mut T) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        insert_in(&txn, record)?;
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(kind = T::KIND, id = record.id(), "record inserted");
        Ok(())
    }

    /// Get a record by id; `NotFound` if absent.
    pub fn get<T: Record>(&self, id: Identity) -> StateResult<T> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(T::TABLE).map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize)),
            None => Err(not_found::<T>(id)),
        }
    }

    /// Conditionally write `record` over the stored row.
    ///
    /// Succeeds only if the stored version equals `record.version()`; the
    /// row is then written with version + 1 and `record` is updated to match.
    /// On `ConcurrentUpdate` the caller must re-fetch before retrying.
    pub fn save<T: Record>(&self, record: &mut T) -> StateResult<()> {
        let id = record.id();
        let expected = record.version();

        record.set_version(expected + 1);
        let value = serde_json::to_vec(&*record);
        record.set_version(expected);
        let value = value.map_err(map_err!(Serialize))?;

        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(T::TABLE).map_err(map_err!(Table))?;
            let stored: T = match table.get(id).map_err(map_err!(Read))? {
                Some(guard) => {
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?
                }
                None => return Err(not_found::<T>(id)),
            };
            if stored.version() != expected {
                debug!(
                    kind = T::KIND,
                    id,
                    expected,
                    stored = stored.version(),
                    "version conflict"
                );
                return Err(StateError::ConcurrentUpdate(format!(
                    "{} {id}: expected version {expected}, found {}",
                    T::KIND,
                    stored.version()
                )));
            }
            table
                .insert(id, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;

        record.set_version(expected + 1);
        debug!(kind = T::KIND, id, version = expected + 1, "record saved");
        Ok(())
    }

    /// Delete a record by id. Returns true if it existed.
    pub fn remove<T: Record>(&self, id: Identity) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(T::TABLE).map_err(map_err!(Table))?;
            existed = table.remove(id).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(kind = T::KIND, id, existed, "record removed");
        Ok(existed)
    }

    /// List all records of a kind.
    pub fn list<T: Record>(&self) -> StateResult<Vec<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(T::TABLE).map_err(map_err!(Table))?;
        collect_rows(&table, |_: &T| true)
    }

    /// List all records of a kind belonging to a space.
    pub fn list_in_space<T: SpaceScoped>(&self, space_id: Identity) -> StateResult<Vec<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(T::TABLE).map_err(map_err!(Table))?;
        collect_rows(&table, |r: &T| r.space_id() == space_id)
    }

    /// Number of records of a kind belonging to a space.
    pub fn count_in_space<T: SpaceScoped>(&self, space_id: Identity) -> StateResult<usize> {
        Ok(self.list_in_space::<T>(space_id)?.len())
    }

    // ── Named entries ─────────────────────────────────────────────

    /// Insert a named entry, enforcing name uniqueness and a per-space
    /// ceiling in the same write transaction.
    pub fn insert_named<T: NamedInSpace>(&self, record: &mut T, max: usize) -> StateResult<()> {
        let space_id = record.space_id();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let table = txn.open_table(T::TABLE).map_err(map_err!(Table))?;
            let siblings: Vec<T> = collect_rows(&table, |r: &T| r.space_id() == space_id)?;
            if siblings.iter().any(|r| r.name() == record.name()) {
                return Err(StateError::Duplicate(format!(
                    "{} {} in space {space_id}",
                    T::KIND,
                    record.name()
                )));
            }
            if siblings.len() >= max {
                return Err(StateError::LimitExceeded {
                    table: T::KIND,
                    count: siblings.len(),
                    max,
                });
            }
        }
        insert_in(&txn, record)?;
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(kind = T::KIND, id = record.id(), space_id, "named record inserted");
        Ok(())
    }

    /// Find a named entry within a space.
    pub fn find_named<T: NamedInSpace>(&self, space_id: Identity, name: &str) -> StateResult<Option<T>> {
        Ok(self
            .list_in_space::<T>(space_id)?
            .into_iter()
            .find(|r| r.name() == name))
    }

    // ── Space apps ────────────────────────────────────────────────

    /// Insert `app` as the only live app of its space, retiring any prior
    /// app of the same space in the same transaction. Returns the retired app.
    pub fn replace_space_app(&self, app: &mut SpaceApp) -> StateResult<Option<SpaceApp>> {
        self.replace_space_app_checked(app, |_| Ok::<(), StateError>(()))
    }

    /// Like [`replace_space_app`](Self::replace_space_app), but `check` sees
    /// the current app first and can veto the replacement. The check runs
    /// inside the write transaction, so no other writer can slip in between.
    pub fn replace_space_app_checked<E>(
        &self,
        app: &mut SpaceApp,
        check: impl FnOnce(Option<&SpaceApp>) -> Result<(), E>,
    ) -> Result<Option<SpaceApp>, E>
    where
        E: From<StateError>,
    {
        let space_id = app.space_id();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let retired: Vec<SpaceApp>;
        {
            let mut table = txn.open_table(SPACE_APPS).map_err(map_err!(Table))?;
            retired = collect_rows(&table, |a: &SpaceApp| a.space_id() == space_id)?;
            check(retired.first())?;
            for old in &retired {
                table.remove(old.id).map_err(map_err!(Write))?;
            }
        }
        insert_in(&txn, app)?;
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(space_id, id = app.id, retired = retired.len(), "space app replaced");
        Ok(retired.into_iter().next())
    }

    /// The live app of a space; `NotFound` if the space has none.
    pub fn find_app_by_space(&self, space_id: Identity) -> StateResult<SpaceApp> {
        self.list_in_space::<SpaceApp>(space_id)?
            .into_iter()
            .next()
            .ok_or_else(|| StateError::NotFound(format!("space app for space {space_id}")))
    }

    /// The app deployed for an exact `(space, commit)` index.
    pub fn find_app(&self, index: &SpaceAppIndex) -> StateResult<SpaceApp> {
        match self.find_app_by_space(index.space_id) {
            Ok(app) if app.index.commit_id == index.commit_id => Ok(app),
            Ok(_) => Err(StateError::NotFound(format!("space app {index}"))),
            Err(e) => Err(e),
        }
    }
}

fn not_found<T: Record>(id: Identity) -> StateError {
    StateError::NotFound(format!("{} {id}", T::KIND))
}

/// Allocate the next id for a record kind inside a write transaction.
fn allocate_id(txn: &WriteTransaction, kind: &str) -> StateResult<u64> {
    let mut seq = txn.open_table(SEQUENCES).map_err(map_err!(Table))?;
    let next = seq
        .get(kind)
        .map_err(map_err!(Read))?
        .map(|guard| guard.value())
        .unwrap_or(0)
        + 1;
    seq.insert(kind, next).map_err(map_err!(Write))?;
    Ok(next)
}

fn insert_in<T: Record>(txn: &WriteTransaction, record: &mut T) -> StateResult<()> {
    let id = allocate_id(txn, T::KIND)?;
    record.set_id(id);
    record.set_version(1);
    let value = serde_json::to_vec(&*record).map_err(map_err!(Serialize))?;
    let mut table = txn.open_table(T::TABLE).map_err(map_err!(Table))?;
    table
        .insert(id, value.as_slice())
        .map_err(map_err!(Write))?;
    Ok(())
}

fn collect_rows<T: Record>(
    table: &impl ReadableTable<u64, &'static [u8]>,
    mut keep: impl FnMut(&T) -> bool,
) -> StateResult<Vec<T>> {
    let mut results = Vec::new();
    for entry in table.iter().map_err(map_err!(Read))? {
        let (_, value) = entry.map_err(map_err!(Read))?;
        let record: T = serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
        if keep(&record) {
            results.push(record);
        }
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_space(owner: &str) -> Space {
        Space {
            id: 0,
            owner: owner.to_string(),
            created_by: owner.to_string(),
            name: "demo".to_string(),
            sdk: "gradio".to_string(),
            hardware: "cpu-basic".to_string(),
            description: String::new(),
            visibility: Visibility::Private,
            commit_id: "c1".to_string(),
            version: 0,
            created_at: 1000,
            updated_at: 1000,
        }
    }

    fn test_variable(space_id: Identity, name: &str) -> SpaceVariable {
        SpaceVariable {
            id: 0,
            space_id,
            name: name.to_string(),
            desc: None,
            value: "v".to_string(),
            created_at: 1000,
            updated_at: 1000,
            version: 0,
        }
    }

    // ── Records ────────────────────────────────────────────────────

    #[test]
    fn insert_assigns_id_and_version() {
        let store = StateStore::open_in_memory().unwrap();
        let mut a = test_space("alice");
        let mut b = test_space("bob");

        store.insert(&mut a).unwrap();
        store.insert(&mut b).unwrap();

        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(a.version, 1);
        assert_eq!(store.get::<Space>(a.id).unwrap(), a);
    }

    #[test]
    fn get_missing_is_not_found() {
        let store = StateStore::open_in_memory().unwrap();
        let err = store.get::<SpaceApp>(42).unwrap_err();
        assert!(matches!(err, StateError::NotFound(_)));
    }

    #[test]
    fn save_bumps_version() {
        let store = StateStore::open_in_memory().unwrap();
        let mut space = test_space("alice");
        store.insert(&mut space).unwrap();

        space.description = "updated".to_string();
        store.save(&mut space).unwrap();

        assert_eq!(space.version, 2);
        let stored = store.get::<Space>(space.id).unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.description, "updated");
    }

    #[test]
    fn stale_save_is_concurrent_update() {
        let store = StateStore::open_in_memory().unwrap();
        let mut app = SpaceApp::new(SpaceAppIndex::new(7, "commitA"));
        store.replace_space_app(&mut app).unwrap();
        let initial = app.version;

        let mut first = store.get::<SpaceApp>(app.id).unwrap();
        let mut second = store.get::<SpaceApp>(app.id).unwrap();

        first.status = AppStatus::Building;
        second.status = AppStatus::BuildFailed;

        store.save(&mut first).unwrap();
        let err = store.save(&mut second).unwrap_err();
        assert!(matches!(err, StateError::ConcurrentUpdate(_)));
        // The losing copy keeps the version it read.
        assert_eq!(second.version, initial);

        let stored = store.get::<SpaceApp>(app.id).unwrap();
        assert_eq!(stored.version, initial + 1);
        assert_eq!(stored.status, AppStatus::Building);
    }

    #[test]
    fn racing_threads_exactly_one_wins() {
        let store = StateStore::open_in_memory().unwrap();
        let mut app = SpaceApp::new(SpaceAppIndex::new(1, "c"));
        store.replace_space_app(&mut app).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                let mut copy = app.clone();
                std::thread::spawn(move || {
                    copy.all_build_log = format!("writer {i}");
                    store.save(&mut copy)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let wins = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(StateError::ConcurrentUpdate(_))))
            .count();
        assert_eq!(wins, 1);
        assert_eq!(conflicts, 7);
        assert_eq!(store.get::<SpaceApp>(app.id).unwrap().version, app.version + 1);
    }

    #[test]
    fn save_of_removed_row_is_not_found() {
        let store = StateStore::open_in_memory().unwrap();
        let mut v = test_variable(1, "FOO");
        store.insert(&mut v).unwrap();
        assert!(store.remove::<SpaceVariable>(v.id).unwrap());
        assert!(!store.remove::<SpaceVariable>(v.id).unwrap());

        let err = store.save(&mut v).unwrap_err();
        assert!(matches!(err, StateError::NotFound(_)));
    }

    // ── Named entries ──────────────────────────────────────────────

    #[test]
    fn insert_named_rejects_duplicates() {
        let store = StateStore::open_in_memory().unwrap();
        store.insert_named(&mut test_variable(1, "FOO"), 10).unwrap();

        let err = store.insert_named(&mut test_variable(1, "FOO"), 10).unwrap_err();
        assert!(matches!(err, StateError::Duplicate(_)));

        // Same name in another space is fine.
        store.insert_named(&mut test_variable(2, "FOO"), 10).unwrap();
    }

    #[test]
    fn insert_named_enforces_ceiling() {
        let store = StateStore::open_in_memory().unwrap();
        store.insert_named(&mut test_variable(1, "A"), 2).unwrap();
        store.insert_named(&mut test_variable(1, "B"), 2).unwrap();

        let err = store.insert_named(&mut test_variable(1, "C"), 2).unwrap_err();
        assert!(matches!(
            err,
            StateError::LimitExceeded { count: 2, max: 2, .. }
        ));
        assert_eq!(store.count_in_space::<SpaceVariable>(1).unwrap(), 2);
    }

    #[test]
    fn find_named_within_space() {
        let store = StateStore::open_in_memory().unwrap();
        store.insert_named(&mut test_variable(1, "FOO"), 10).unwrap();

        assert!(store.find_named::<SpaceVariable>(1, "FOO").unwrap().is_some());
        assert!(store.find_named::<SpaceVariable>(1, "BAR").unwrap().is_none());
        assert!(store.find_named::<SpaceVariable>(2, "FOO").unwrap().is_none());
    }

    // ── Space apps ─────────────────────────────────────────────────

    #[test]
    fn replace_retires_prior_app() {
        let store = StateStore::open_in_memory().unwrap();
        let mut first = SpaceApp::new(SpaceAppIndex::new(1, "commitA"));
        assert!(store.replace_space_app(&mut first).unwrap().is_none());

        let mut other = SpaceApp::new(SpaceAppIndex::new(2, "commitA"));
        store.replace_space_app(&mut other).unwrap();

        let mut second = SpaceApp::new(SpaceAppIndex::new(1, "commitB"));
        let retired = store.replace_space_app(&mut second).unwrap();
        assert_eq!(retired.map(|a| a.id), Some(first.id));

        assert_eq!(store.list_in_space::<SpaceApp>(1).unwrap().len(), 1);
        assert_eq!(store.find_app_by_space(1).unwrap().index.commit_id, "commitB");
        assert_eq!(store.find_app_by_space(2).unwrap().id, other.id);
    }

    #[test]
    fn checked_replace_can_veto() {
        let store = StateStore::open_in_memory().unwrap();
        let mut first = SpaceApp::new(SpaceAppIndex::new(1, "commitA"));
        store.replace_space_app(&mut first).unwrap();

        let mut second = SpaceApp::new(SpaceAppIndex::new(1, "commitB"));
        let err = store
            .replace_space_app_checked(&mut second, |current| match current {
                Some(app) if app.status == AppStatus::Init => {
                    Err(StateError::Duplicate("still initialising".to_string()))
                }
                _ => Ok(()),
            })
            .unwrap_err();
        assert!(matches!(err, StateError::Duplicate(_)));

        // Vetoed replacement leaves the prior app in place.
        assert_eq!(store.find_app_by_space(1).unwrap().id, first.id);
        assert_eq!(store.list_in_space::<SpaceApp>(1).unwrap().len(), 1);
    }

    #[test]
    fn find_app_requires_matching_commit() {
        let store = StateStore::open_in_memory().unwrap();
        let mut app = SpaceApp::new(SpaceAppIndex::new(1, "commitA"));
        store.replace_space_app(&mut app).unwrap();

        assert!(store.find_app(&SpaceAppIndex::new(1, "commitA")).is_ok());
        assert!(matches!(
            store.find_app(&SpaceAppIndex::new(1, "commitB")),
            Err(StateError::NotFound(_))
        ));
        assert!(matches!(
            store.find_app(&SpaceAppIndex::new(9, "commitA")),
            Err(StateError::NotFound(_))
        ));
    }

    // ── Persistence (on-disk) ──────────────────────────────────────

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.redb");

        let id = {
            let store = StateStore::open(&db_path).unwrap();
            let mut space = test_space("alice");
            store.insert(&mut space).unwrap();
            space.id
        };

        // Reopen the same database file; ids keep counting from the sequence.
        let store = StateStore::open(&db_path).unwrap();
        assert_eq!(store.get::<Space>(id).unwrap().owner, "alice");
        let mut next = test_space("bob");
        store.insert(&mut next).unwrap();
        assert_eq!(next.id, id + 1);
    }

    #[test]
    fn empty_store_operations() {
        let store = StateStore::open_in_memory().unwrap();

        assert!(store.list::<Space>().unwrap().is_empty());
        assert!(store.list_in_space::<SpaceSecret>(1).unwrap().is_empty());
        assert_eq!(store.count_in_space::<SpaceVariable>(1).unwrap(), 0);
        assert!(!store.remove::<SpaceApp>(1).unwrap());
        assert!(matches!(
            store.find_app_by_space(1),
            Err(StateError::NotFound(_))
        ));
    }
}
