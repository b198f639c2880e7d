//! Core store type and builder.

use crate::backend::{Row, SqlBackend};
use crate::error::{Error, Result};
use crate::persist::{database_path, default_document_dir};
use crate::serializer::{Codec, JsonSerializer, NaturalKeySerializer, Serializer};
use crate::sqlite::SqliteBackend;
use crate::statement::Statements;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where the backing table stands, as far as this store knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableState {
    /// `create_table` hasn't run yet, or the connection was closed since.
    Uninitialized,
    Ready,
    /// `drop_table` ran and nothing recreated the table.
    Dropped,
}

/// Key-value store over a single SQL table.
///
/// Generic over key `K` and value `V`. Keys are stored in their natural
/// string form and values as compact JSON unless you swap the serializers.
/// Use [`open`](Self::open) for a quick start or [`builder`](Self::builder)
/// to pick the backend, document directory, and serializers.
///
/// Every data operation needs an initialized store with an open connection,
/// otherwise it fails with [`Error::NotOpen`]. Concurrent calls are not
/// coordinated: two `put`s on the same key race and the last one to reach the
/// backend wins.
pub struct SqlKv<K, V> {
    database: String,
    table: String,
    path: PathBuf,
    backend: Arc<dyn SqlBackend>,
    sql: Statements,
    keys: Codec<K>,
    values: Codec<V>,
    state: RwLock<TableState>,
}

impl<K, V> SqlKv<K, V>
where
    K: Serialize + DeserializeOwned + Eq + Hash + 'static,
    V: Serialize + DeserializeOwned + 'static,
{
    /// Uninitialized store for `table` in `database`, on the shared SQLite
    /// backend. Call [`initialize`](Self::initialize) before using it.
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> Result<Self> {
        Self::builder(database, table).build()
    }

    /// Build and initialize in one go.
    pub async fn open(database: impl Into<String>, table: impl Into<String>) -> Result<Self> {
        Self::builder(database, table).open().await
    }

    /// Start configuring a new store. Finish with
    /// [`.build()`](SqlKvBuilder::build) or [`.open()`](SqlKvBuilder::open).
    pub fn builder(database: impl Into<String>, table: impl Into<String>) -> SqlKvBuilder<K, V> {
        SqlKvBuilder::new(database.into(), table.into())
    }

    // ---- lifecycle ----

    /// Open the connection if needed and create the table if it's missing.
    pub async fn initialize(&self) -> Result<()> {
        self.open_connection().await?;
        self.create_table().await?;
        tracing::debug!(database = %self.database, table = %self.table, "store initialized");
        Ok(())
    }

    /// Open the backing connection. No-op when it's already open.
    pub async fn open_connection(&self) -> Result<()> {
        if self.is_connection_open() {
            return Ok(());
        }
        self.backend
            .open_connection(&self.database, &self.path)
            .await
            .map_err(Error::connection)
    }

    /// Close the backing connection. No-op when it's already closed.
    ///
    /// The connection is shared by every store on the same database name, so
    /// this invalidates all of them.
    pub async fn close_connection(&self) -> Result<()> {
        if self.is_connection_open() {
            self.backend
                .close_connection(&self.database)
                .await
                .map_err(Error::connection)?;
        }
        *self.state.write() = TableState::Uninitialized;
        Ok(())
    }

    /// `true` while the backing connection is open.
    #[must_use]
    pub fn is_connection_open(&self) -> bool {
        self.backend.is_connection_open(&self.database, &self.path)
    }

    /// Create the backing table if it doesn't exist.
    pub async fn create_table(&self) -> Result<()> {
        self.ensure_connection()?;
        self.backend
            .execute_statement(&self.database, &self.sql.create_table, &[])
            .await
            .map_err(Error::schema)?;
        *self.state.write() = TableState::Ready;
        tracing::debug!(database = %self.database, table = %self.table, "table ready");
        Ok(())
    }

    /// Drop the backing table and everything in it. Data operations fail with
    /// [`Error::Schema`] until the table is created again, on this store and on
    /// any other store bound to the same table.
    pub async fn drop_table(&self) -> Result<()> {
        self.ensure_connection()?;
        self.backend
            .execute_statement(&self.database, &self.sql.drop_table, &[])
            .await
            .map_err(Error::schema)?;
        *self.state.write() = TableState::Dropped;
        tracing::debug!(database = %self.database, table = %self.table, "table dropped");
        Ok(())
    }

    // ---- configuration ----

    /// Replace the key serializer. Rows written earlier keep their old text.
    pub fn set_key_serializer<F>(&mut self, f: F)
    where
        F: Fn(&K) -> Result<String> + Send + Sync + 'static,
    {
        self.keys.serialize = Arc::new(f);
    }

    /// Replace the key deserializer.
    pub fn set_key_deserializer<F>(&mut self, f: F)
    where
        F: Fn(&str) -> Result<K> + Send + Sync + 'static,
    {
        self.keys.deserialize = Arc::new(f);
    }

    /// Replace the value serializer. Rows written earlier keep their old text.
    pub fn set_value_serializer<F>(&mut self, f: F)
    where
        F: Fn(&V) -> Result<String> + Send + Sync + 'static,
    {
        self.values.serialize = Arc::new(f);
    }

    /// Replace the value deserializer.
    pub fn set_value_deserializer<F>(&mut self, f: F)
    where
        F: Fn(&str) -> Result<V> + Send + Sync + 'static,
    {
        self.values.deserialize = Arc::new(f);
    }

    /// Replace both key functions with a strategy object.
    pub fn set_key_codec<S>(&mut self, serializer: S)
    where
        S: Serializer<K> + 'static,
    {
        self.keys = Codec::from_serializer(serializer);
    }

    /// Replace both value functions with a strategy object.
    pub fn set_value_codec<S>(&mut self, serializer: S)
    where
        S: Serializer<V> + 'static,
    {
        self.values = Codec::from_serializer(serializer);
    }

    // ---- writes ----

    /// Insert or replace the value stored under `key`.
    pub async fn put(&self, key: &K, value: &V) -> Result<()> {
        let params = [self.keys.encode(key)?, self.values.encode(value)?];
        self.execute(&self.sql.upsert, &params).await?;
        Ok(())
    }

    /// Remove `key`. Removing a key that isn't there is fine.
    pub async fn remove(&self, key: &K) -> Result<()> {
        let params = [self.keys.encode(key)?];
        self.execute(&self.sql.delete_key, &params).await?;
        Ok(())
    }

    /// Drop all entries, keeping the table.
    pub async fn clear(&self) -> Result<()> {
        self.execute(&self.sql.delete_all, &[]).await?;
        Ok(())
    }

    /// Put every pair from `iter`, one statement each, in order. Stops at the
    /// first failure; pairs written before it stay written.
    pub async fn extend<I>(&self, iter: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        for (k, v) in iter {
            self.put(&k, &v).await?;
        }
        Ok(())
    }

    // ---- reads ----

    /// Value stored under `key`, or `None` if there is none.
    pub async fn get(&self, key: &K) -> Result<Option<V>> {
        let params = [self.keys.encode(key)?];
        let rows = self.query(&self.sql.select_value, &params).await?;
        match rows.first() {
            Some(row) => Ok(Some(self.values.decode(field(row, "value")?)?)),
            None => Ok(None),
        }
    }

    /// `true` if `key` has a row.
    pub async fn contains_key(&self, key: &K) -> Result<bool> {
        let params = [self.keys.encode(key)?];
        let rows = self.query(&self.sql.exists_key, &params).await?;
        Ok(!rows.is_empty())
    }

    /// Number of entries.
    pub async fn size(&self) -> Result<u64> {
        let rows = self.query(&self.sql.count, &[]).await?;
        let row = rows
            .first()
            .ok_or_else(|| Error::Read("count returned no rows".into()))?;
        let text = field(row, "size")?;
        text.parse()
            .map_err(|_| Error::Read(format!("count returned `{text}`")))
    }

    /// `true` when the table has no rows. Probes a single row instead of
    /// counting.
    pub async fn is_empty(&self) -> Result<bool> {
        let rows = self.query(&self.sql.probe, &[]).await?;
        Ok(rows.is_empty())
    }

    /// All keys, in whatever order the backend returns them.
    pub async fn keys(&self) -> Result<Vec<K>> {
        let rows = self.query(&self.sql.select_keys, &[]).await?;
        rows.iter().map(|row| self.decode_key(row)).collect()
    }

    /// All keys as a set.
    pub async fn key_set(&self) -> Result<HashSet<K>> {
        let rows = self.query(&self.sql.select_keys, &[]).await?;
        rows.iter().map(|row| self.decode_key(row)).collect()
    }

    /// All values, in row order.
    pub async fn values(&self) -> Result<Vec<V>> {
        let rows = self.query(&self.sql.select_values, &[]).await?;
        rows.iter().map(|row| self.decode_value(row)).collect()
    }

    /// All key-value pairs, in row order.
    pub async fn entries(&self) -> Result<Vec<(K, V)>> {
        let rows = self.query(&self.sql.select_entries, &[]).await?;
        rows.iter()
            .map(|row| Ok((self.decode_key(row)?, self.decode_value(row)?)))
            .collect()
    }

    /// All entries as a map. If a key somehow shows up twice, the later row
    /// wins.
    pub async fn map(&self) -> Result<HashMap<K, V>> {
        let rows = self.query(&self.sql.select_entries, &[]).await?;
        let mut out = HashMap::with_capacity(rows.len());
        for row in &rows {
            out.insert(self.decode_key(row)?, self.decode_value(row)?);
        }
        Ok(out)
    }

    // ---- accessors ----

    /// Logical database name.
    #[must_use]
    pub fn database_name(&self) -> &str {
        &self.database
    }

    /// Backing table name.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Database file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    // ---- internal ----

    fn ensure_connection(&self) -> Result<()> {
        if self.is_connection_open() {
            Ok(())
        } else {
            Err(Error::NotOpen(format!(
                "database `{}` is not open",
                self.database
            )))
        }
    }

    fn ensure_ready(&self) -> Result<()> {
        self.ensure_connection()?;
        match *self.state.read() {
            TableState::Ready => Ok(()),
            TableState::Uninitialized => Err(Error::NotOpen(format!(
                "table `{}` is not initialized",
                self.table
            ))),
            TableState::Dropped => Err(Error::Schema(format!(
                "table `{}` has been dropped",
                self.table
            ))),
        }
    }

    async fn execute(&self, sql: &str, params: &[String]) -> Result<u64> {
        self.ensure_ready()?;
        self.backend
            .execute_statement(&self.database, sql, params)
            .await
            .map_err(Error::write)
    }

    async fn query(&self, sql: &str, params: &[String]) -> Result<Vec<Row>> {
        self.ensure_ready()?;
        self.backend
            .execute_query(&self.database, sql, params)
            .await
            .map_err(Error::read)
    }

    fn decode_key(&self, row: &Row) -> Result<K> {
        self.keys.decode(field(row, "key")?)
    }

    fn decode_value(&self, row: &Row) -> Result<V> {
        self.values.decode(field(row, "value")?)
    }
}

impl<K, V> std::fmt::Debug for SqlKv<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlKv")
            .field("database", &self.database)
            .field("table", &self.table)
            .field("path", &self.path)
            .field("state", &*self.state.read())
            .finish_non_exhaustive()
    }
}

fn field<'r>(row: &'r Row, column: &str) -> Result<&'r str> {
    row.get(column).ok_or_else(|| {
        let columns: Vec<&str> = row.columns().collect();
        Error::Read(format!("row has no `{column}` column (got {columns:?})"))
    })
}

fn validate_name(what: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidArgument(format!("{what} name must not be empty")));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Configures a [`SqlKv`] store.
///
/// ```rust,no_run
/// use sql_kv::{SqlKv, SqliteBackend};
/// use std::sync::Arc;
///
/// # async fn run() -> sql_kv::Result<()> {
/// let store = SqlKv::<String, i32>::builder("app", "scores")
///     .backend(Arc::new(SqliteBackend::new()))
///     .document_dir("/var/lib/app")
///     .pretty(true)
///     .open()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct SqlKvBuilder<K, V> {
    database: String,
    table: String,
    backend: Option<Arc<dyn SqlBackend>>,
    document_dir: Option<PathBuf>,
    pretty: bool,
    keys: Option<Codec<K>>,
    values: Option<Codec<V>>,
}

impl<K, V> SqlKvBuilder<K, V>
where
    K: Serialize + DeserializeOwned + Eq + Hash + 'static,
    V: Serialize + DeserializeOwned + 'static,
{
    fn new(database: String, table: String) -> Self {
        Self {
            database,
            table,
            backend: None,
            document_dir: None,
            pretty: false,
            keys: None,
            values: None,
        }
    }

    /// Use `backend` instead of [`SqliteBackend::shared`].
    pub fn backend(mut self, backend: Arc<dyn SqlBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Directory holding `<database>.db` (default: `SQL_KV_DOC_DIR` or
    /// `_doc`).
    pub fn document_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.document_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Store values as indented JSON (default: compact). Ignored when a value
    /// serializer is set.
    pub fn pretty(mut self, yes: bool) -> Self {
        self.pretty = yes;
        self
    }

    /// Key serializer strategy (default: [`NaturalKeySerializer`]).
    pub fn key_serializer<S>(mut self, serializer: S) -> Self
    where
        S: Serializer<K> + 'static,
    {
        self.keys = Some(Codec::from_serializer(serializer));
        self
    }

    /// Value serializer strategy (default: [`JsonSerializer`]).
    pub fn value_serializer<S>(mut self, serializer: S) -> Self
    where
        S: Serializer<V> + 'static,
    {
        self.values = Some(Codec::from_serializer(serializer));
        self
    }

    /// Validate the names and return an uninitialized store.
    pub fn build(self) -> Result<SqlKv<K, V>> {
        validate_name("database", &self.database)?;
        validate_name("table", &self.table)?;

        let dir = self.document_dir.unwrap_or_else(default_document_dir);
        let path = database_path(&dir, &self.database);
        let backend = self
            .backend
            .unwrap_or_else(|| SqliteBackend::shared() as Arc<dyn SqlBackend>);
        let keys = self
            .keys
            .unwrap_or_else(|| Codec::from_serializer(NaturalKeySerializer));
        let pretty = self.pretty;
        let values = self.values.unwrap_or_else(|| {
            Codec::from_serializer(if pretty {
                JsonSerializer::pretty()
            } else {
                JsonSerializer::new()
            })
        });

        Ok(SqlKv {
            sql: Statements::for_table(&self.table),
            database: self.database,
            table: self.table,
            path,
            backend,
            keys,
            values,
            state: RwLock::new(TableState::Uninitialized),
        })
    }

    /// [`build`](Self::build) then [`initialize`](SqlKv::initialize).
    pub async fn open(self) -> Result<SqlKv<K, V>> {
        let store = self.build()?;
        store.initialize().await?;
        Ok(store)
    }
}

impl<K, V> std::fmt::Debug for SqlKvBuilder<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlKvBuilder")
            .field("database", &self.database)
            .field("table", &self.table)
            .field("document_dir", &self.document_dir)
            .field("pretty", &self.pretty)
            .finish_non_exhaustive()
    }
}
