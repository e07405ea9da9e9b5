//! Transactional document store backing scenarios, records and fixture objects.
//!
//! The store is a single-connection relational store: every table is a map of
//! integer ids to JSON rows. A [`Session`] holds the connection exclusively for
//! its lifetime, so one session at a time reads and writes the data.
//!
//! Writes outside [`Session::atomic`] commit immediately. Inside it, changes
//! are visible to the session but can be rolled back as a unit; nested scopes
//! behave as savepoints. A file-backed [`Database`] is flushed to disk on each
//! commit (temp file + rename).

pub mod content_types;
pub mod signals;

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

pub use content_types::{ContentTypes, ObjectRef};
pub use signals::{ListenerId, SaveEvent, SaveListener, Signals};

/// Row identifier, unique within one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(pub u64);

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for Id {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Id)
    }
}

/// A type persisted in its own table.
pub trait Model: Serialize + DeserializeOwned {
    /// Table name; doubles as the content type tag of [`ObjectRef`].
    const TABLE: &'static str;
}

/// A model together with the id it is stored under.
#[derive(Debug, Clone, PartialEq)]
pub struct Stored<M> {
    pub id: Id,
    pub model: M,
}

impl<M> Deref for Stored<M> {
    type Target = M;

    fn deref(&self) -> &M {
        &self.model
    }
}

impl<M> DerefMut for Stored<M> {
    fn deref_mut(&mut self) -> &mut M {
        &mut self.model
    }
}

/// Errors raised by the store itself.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{table} #{id} does not exist")]
    NotFound { table: &'static str, id: Id },

    #[error("database lock poisoned")]
    Poisoned,

    #[error("encode row for {table}")]
    Encode {
        table: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("decode row {table} #{id}")]
    Decode {
        table: &'static str,
        id: Id,
        #[source]
        source: serde_json::Error,
    },

    #[error("read database {}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse database {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("flush database {}", path.display())]
    Flush {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Full table state; also the unit of savepoint snapshots.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Tables {
    next_ids: BTreeMap<String, u64>,
    rows: BTreeMap<String, BTreeMap<u64, Value>>,
}

impl Tables {
    fn allocate_id(&mut self, table: &str) -> Id {
        let next = self.next_ids.entry(table.to_string()).or_insert(1);
        let id = Id(*next);
        *next += 1;
        id
    }

    fn table(&self, table: &str) -> Option<&BTreeMap<u64, Value>> {
        self.rows.get(table)
    }

    fn table_mut(&mut self, table: &str) -> &mut BTreeMap<u64, Value> {
        self.rows.entry(table.to_string()).or_default()
    }
}

/// Shared handle to the data, the notification channel and content types.
pub struct Database {
    path: Option<PathBuf>,
    tables: Mutex<Tables>,
    signals: Signals,
    content_types: ContentTypes,
}

impl Database {
    /// Volatile database; nothing is written to disk.
    pub fn in_memory(content_types: ContentTypes) -> Self {
        Self {
            path: None,
            tables: Mutex::new(Tables::default()),
            signals: Signals::default(),
            content_types,
        }
    }

    /// Open a JSON-file database. A missing file starts empty.
    pub fn open(path: &Path, content_types: ContentTypes) -> Result<Self, StoreError> {
        let tables = if path.exists() {
            let contents = fs::read_to_string(path).map_err(|source| StoreError::Load {
                path: path.to_path_buf(),
                source,
            })?;
            serde_json::from_str(&contents).map_err(|source| StoreError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            Tables::default()
        };
        debug!(path = %path.display(), "database opened");
        Ok(Self {
            path: Some(path.to_path_buf()),
            tables: Mutex::new(tables),
            signals: Signals::default(),
            content_types,
        })
    }

    /// Acquire the connection. Blocks while another session is open.
    pub fn session(&self) -> Result<Session<'_>, StoreError> {
        let tables = self.tables.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(Session {
            db: self,
            tables,
            savepoints: Vec::new(),
        })
    }

    pub fn signals(&self) -> &Signals {
        &self.signals
    }

    pub fn content_types(&self) -> &ContentTypes {
        &self.content_types
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn flush(&self, tables: &Tables) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let flush_err = |source| StoreError::Flush {
            path: path.clone(),
            source,
        };
        let mut buf = serde_json::to_string_pretty(tables).map_err(|source| StoreError::Encode {
            table: "*",
            source,
        })?;
        buf.push('\n');
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(flush_err)?;
        }
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, buf).map_err(flush_err)?;
        fs::rename(&tmp_path, path).map_err(flush_err)?;
        Ok(())
    }
}

/// Exclusive connection to a [`Database`].
pub struct Session<'db> {
    db: &'db Database,
    tables: MutexGuard<'db, Tables>,
    savepoints: Vec<Tables>,
}

impl<'db> Session<'db> {
    /// The database this session is connected to.
    pub fn database(&self) -> &'db Database {
        self.db
    }

    /// Depth of nested atomic scopes (0 = autocommit).
    pub fn depth(&self) -> usize {
        self.savepoints.len()
    }

    /// Run `f` inside a savepoint.
    ///
    /// `Ok` releases the savepoint (committing when it is the outermost one).
    /// `Err` restores the state from before the scope and returns the error
    /// unchanged.
    pub fn atomic<T, E>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        self.savepoints.push(self.tables.clone());
        let depth = self.savepoints.len();
        debug!(depth, "savepoint opened");
        let result = f(self);
        let snapshot = self.savepoints.pop();
        let result = match result {
            Ok(value) if self.savepoints.is_empty() => {
                self.commit().map(|()| value).map_err(E::from)
            }
            other => other,
        };
        match result {
            Ok(value) => {
                debug!(depth, "savepoint released");
                Ok(value)
            }
            Err(err) => {
                if let Some(snapshot) = snapshot {
                    *self.tables = snapshot;
                }
                debug!(depth, "savepoint rolled back");
                Err(err)
            }
        }
    }

    /// Insert a new row and notify listeners with `created = true`.
    pub fn insert<M: Model>(&mut self, model: M) -> Result<Stored<M>, StoreError> {
        let value = encode(&model)?;
        let id = self.write(|tables| {
            let id = tables.allocate_id(M::TABLE);
            tables.table_mut(M::TABLE).insert(id.0, value.clone());
            Ok(id)
        })?;
        self.notify(&ObjectRef::of::<M>(id), &value, true)?;
        Ok(Stored { id, model })
    }

    /// Rewrite an existing row and notify listeners with `created = false`.
    pub fn update<M: Model>(&mut self, stored: &Stored<M>) -> Result<(), StoreError> {
        let value = encode(&stored.model)?;
        self.write(|tables| {
            let row = tables
                .table_mut(M::TABLE)
                .get_mut(&stored.id.0)
                .ok_or(StoreError::NotFound {
                    table: M::TABLE,
                    id: stored.id,
                })?;
            *row = value.clone();
            Ok(())
        })?;
        self.notify(&ObjectRef::of::<M>(stored.id), &value, false)
    }

    pub fn get<M: Model>(&self, id: Id) -> Result<Option<Stored<M>>, StoreError> {
        self.tables
            .table(M::TABLE)
            .and_then(|rows| rows.get(&id.0))
            .map(|value| decode::<M>(id, value))
            .transpose()
    }

    /// Like [`Session::get`], but a missing row is an error.
    pub fn fetch<M: Model>(&self, id: Id) -> Result<Stored<M>, StoreError> {
        self.get(id)?.ok_or(StoreError::NotFound { table: M::TABLE, id })
    }

    /// Every row of `M`'s table in id order.
    pub fn all<M: Model>(&self) -> Result<Vec<Stored<M>>, StoreError> {
        let Some(rows) = self.tables.table(M::TABLE) else {
            return Ok(Vec::new());
        };
        rows.iter()
            .map(|(id, value)| decode::<M>(Id(*id), value))
            .collect()
    }

    pub fn count<M: Model>(&self) -> usize {
        self.tables.table(M::TABLE).map_or(0, BTreeMap::len)
    }

    /// Remove a row. Returns false if it did not exist.
    pub fn delete<M: Model>(&mut self, id: Id) -> Result<bool, StoreError> {
        self.write(|tables| Ok(tables.table_mut(M::TABLE).remove(&id.0).is_some()))
    }

    /// Raw row for a polymorphic reference.
    pub fn resolve(&self, object: &ObjectRef) -> Option<&Value> {
        self.tables
            .table(&object.content_type)
            .and_then(|rows| rows.get(&object.object_id.0))
    }

    /// Render a referenced row through the registered content types.
    pub fn describe(&self, object: &ObjectRef) -> String {
        match self.resolve(object) {
            Some(value) => self.db.content_types.describe(object, value),
            None => object.to_string(),
        }
    }

    fn notify(
        &mut self,
        object: &ObjectRef,
        value: &Value,
        created: bool,
    ) -> Result<(), StoreError> {
        let event = SaveEvent {
            object,
            value,
            created,
        };
        for listener in self.db.signals.snapshot() {
            listener.on_save(self, &event)?;
        }
        Ok(())
    }

    /// Apply `change` to the tables. Outside an atomic scope the change is
    /// committed at once and undone again if the commit fails.
    fn write<T>(
        &mut self,
        change: impl FnOnce(&mut Tables) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        if !self.savepoints.is_empty() {
            return change(&mut *self.tables);
        }
        let before = self.tables.clone();
        let result = change(&mut *self.tables).and_then(|value| self.commit().map(|()| value));
        if result.is_err() {
            *self.tables = before;
        }
        result
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.db.flush(&self.tables)
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if self.savepoints.is_empty() {
            return;
        }
        warn!(
            depth = self.savepoints.len(),
            "session dropped inside atomic scope; rolling back"
        );
        if let Some(outermost) = self.savepoints.drain(..).next() {
            *self.tables = outermost;
        }
    }
}

fn encode<M: Model>(model: &M) -> Result<Value, StoreError> {
    serde_json::to_value(model).map_err(|source| StoreError::Encode {
        table: M::TABLE,
        source,
    })
}

fn decode<M: Model>(id: Id, value: &Value) -> Result<Stored<M>, StoreError> {
    let model = serde_json::from_value(value.clone()).map_err(|source| StoreError::Decode {
        table: M::TABLE,
        id,
        source,
    })?;
    Ok(Stored { id, model })
}
