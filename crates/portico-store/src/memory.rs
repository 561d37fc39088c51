//! In-memory backend.
//!
//! A [`MemoryCatalog`] owns named databases addressed by `memory://<name>`
//! URLs. Connecting to a database that was never provisioned fails with
//! `Unavailable`, the same way a missing schema would on a real server.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::query::Query;
use crate::record::Record;
use crate::scope::Scope;
use crate::store::Store;

/// URL scheme understood by the in-memory backend.
pub const MEMORY_SCHEME: &str = "memory://";

#[derive(Debug, Clone, Default)]
struct Tables {
    version: u64,
    next_id: HashMap<&'static str, u64>,
    rows: HashMap<&'static str, BTreeMap<u64, Value>>,
}

impl Tables {
    fn collection(&self, name: &'static str) -> impl Iterator<Item = (&u64, &Value)> {
        self.rows.get(name).into_iter().flatten()
    }

    fn unique_collision<R: Record>(&self, row: &Value, except: Option<u64>) -> Option<&'static str> {
        R::UNIQUE.iter().copied().find(|field| {
            let Some(value) = row.get(*field) else {
                return false;
            };
            self.collection(R::COLLECTION)
                .any(|(id, other)| Some(*id) != except && other.get(*field) == Some(value))
        })
    }
}

/// Registry of provisioned in-memory databases.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    databases: Mutex<HashMap<String, Arc<RwLock<Tables>>>>,
}

impl MemoryCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the database named by `url` if it does not exist yet.
    pub fn provision(&self, url: &str) -> StoreResult<()> {
        let name = database_name(url)?;
        let mut databases = self.databases.lock();
        if !databases.contains_key(name) {
            tracing::info!(database = name, "provisioned in-memory database");
            databases.insert(name.to_string(), Arc::default());
        }
        Ok(())
    }

    /// Opens the database named by `url`.
    pub fn connect(&self, url: &str) -> StoreResult<MemoryStore> {
        let name = database_name(url)?;
        let db = self
            .databases
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::Unavailable(format!("database {name} does not exist")))?;
        Ok(MemoryStore {
            db,
            scope: Scope::unbounded(),
        })
    }
}

fn database_name(url: &str) -> StoreResult<&str> {
    match url.strip_prefix(MEMORY_SCHEME) {
        Some(name) if !name.is_empty() => Ok(name),
        _ => Err(StoreError::InvalidUrl(url.to_string())),
    }
}

/// Handle to one in-memory database.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    db: Arc<RwLock<Tables>>,
    scope: Scope,
}

impl MemoryStore {
    fn matching<'a>(tables: &'a Tables, collection: &'static str, query: &Query) -> Vec<&'a Value> {
        let rows = tables
            .collection(collection)
            .map(|(_, row)| row)
            .filter(|row| query.matches(row))
            .collect();
        query.arrange(rows)
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn with_context(&self, scope: Scope) -> Self {
        Self {
            db: Arc::clone(&self.db),
            scope,
        }
    }

    async fn create<R: Record>(&self, mut record: R) -> StoreResult<R> {
        self.scope.check()?;
        let mut tables = self.db.write();

        let candidate = serde_json::to_value(&record)?;
        if let Some(field) = tables.unique_collision::<R>(&candidate, None) {
            return Err(StoreError::AlreadyExists {
                collection: R::COLLECTION,
                field,
            });
        }

        let next_id = tables.next_id.entry(R::COLLECTION).or_insert(0);
        *next_id += 1;
        let id = *next_id;
        record.set_id(id);

        let row = serde_json::to_value(&record)?;
        tables.rows.entry(R::COLLECTION).or_default().insert(id, row);
        tables.version += 1;
        Ok(record)
    }

    async fn find<R: Record>(&self, query: &Query) -> StoreResult<Vec<R>> {
        self.scope.check()?;
        let tables = self.db.read();
        Self::matching(&tables, R::COLLECTION, query)
            .into_iter()
            .map(|row| serde_json::from_value(row.clone()).map_err(StoreError::from))
            .collect()
    }

    async fn first<R: Record>(&self, query: &Query) -> StoreResult<R> {
        let query = query.clone().limit(1);
        self.find::<R>(&query)
            .await?
            .into_iter()
            .next()
            .ok_or(StoreError::not_found(R::COLLECTION))
    }

    async fn count<R: Record>(&self, query: &Query) -> StoreResult<u64> {
        self.scope.check()?;
        let tables = self.db.read();
        let count = tables
            .collection(R::COLLECTION)
            .filter(|(_, row)| query.matches(row))
            .count();
        Ok(count as u64)
    }

    async fn delete<R: Record>(&self, query: &Query) -> StoreResult<u64> {
        self.scope.check()?;
        let mut tables = self.db.write();
        let Some(rows) = tables.rows.get_mut(R::COLLECTION) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|_, row| !query.matches(row));
        let removed = (before - rows.len()) as u64;
        if removed > 0 {
            tables.version += 1;
        }
        Ok(removed)
    }

    async fn update<R: Record>(&self, record: &R) -> StoreResult<R> {
        self.scope.check()?;
        let mut tables = self.db.write();
        let id = record.id();
        let exists = tables
            .rows
            .get(R::COLLECTION)
            .is_some_and(|rows| rows.contains_key(&id));
        if !exists {
            return Err(StoreError::not_found(R::COLLECTION));
        }

        let row = serde_json::to_value(record)?;
        if let Some(field) = tables.unique_collision::<R>(&row, Some(id)) {
            return Err(StoreError::AlreadyExists {
                collection: R::COLLECTION,
                field,
            });
        }
        tables.rows.entry(R::COLLECTION).or_default().insert(id, row);
        tables.version += 1;
        Ok(record.clone())
    }

    async fn transaction<T, F, Fut>(&self, work: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(Self) -> Fut + Send + 'static,
        Fut: Future<Output = StoreResult<T>> + Send + 'static,
    {
        self.scope.check()?;
        let snapshot = self.db.read().clone();
        let base_version = snapshot.version;
        let working = Self {
            db: Arc::new(RwLock::new(snapshot)),
            scope: self.scope.clone(),
        };

        let output = work(working.clone()).await?;

        let committed = working.db.read().clone();
        let mut tables = self.db.write();
        if tables.version != base_version {
            return Err(StoreError::Conflict);
        }
        *tables = committed;
        Ok(output)
    }
}
