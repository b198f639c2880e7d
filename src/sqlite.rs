//! SQLite backend built on rusqlite.
//!
//! Blocking calls run on tokio's blocking pool via `spawn_blocking`. Each
//! backend owns a registry mapping database name to an open connection;
//! [`SqliteBackend::shared`] is the process-wide one stores use by default.

use crate::backend::{BackendError, Row, SqlBackend};
use crate::persist::ensure_parent_dir;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Connection, OpenFlags};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

static SHARED: Lazy<Arc<SqliteBackend>> = Lazy::new(|| Arc::new(SqliteBackend::new()));

struct Handle {
    path: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

/// SQLite backend with its own connection registry.
pub struct SqliteBackend {
    connections: Mutex<HashMap<String, Handle>>,
    in_memory: bool,
}

impl SqliteBackend {
    /// Backend with a private registry, opening real database files.
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            in_memory: false,
        }
    }

    /// Backend whose connections are in-memory databases. The path given to
    /// [`open_connection`](SqlBackend::open_connection) is remembered but no
    /// file is touched. Data lives until the name is closed.
    pub fn in_memory() -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            in_memory: true,
        }
    }

    /// The process-wide backend. Every store built without an explicit
    /// backend shares it, so the same database name means the same connection.
    pub fn shared() -> Arc<SqliteBackend> {
        Arc::clone(&SHARED)
    }

    /// Names of all currently open databases.
    pub fn open_databases(&self) -> Vec<String> {
        self.connections.lock().keys().cloned().collect()
    }

    fn connection(&self, name: &str) -> Result<Arc<Mutex<Connection>>, BackendError> {
        self.connections
            .lock()
            .get(name)
            .map(|h| Arc::clone(&h.conn))
            .ok_or_else(|| BackendError::new(format!("database `{name}` is not open")))
    }

    fn open_sync(path: &Path, in_memory: bool) -> Result<Connection, BackendError> {
        if in_memory {
            return Ok(Connection::open_in_memory()?);
        }
        ensure_parent_dir(path).map_err(|e| BackendError::new(e.to_string()))?;
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
        Ok(Connection::open_with_flags(path, flags)?)
    }

    fn query_sync(conn: &Connection, sql: &str, params: &[String]) -> Result<Vec<Row>, BackendError> {
        let mut stmt = conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();

        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut fields = Vec::with_capacity(columns.len());
            for (i, column) in columns.iter().enumerate() {
                fields.push((column.clone(), text_of(row.get_ref(i)?)));
            }
            out.push(Row::new(fields));
        }
        Ok(out)
    }
}

impl Default for SqliteBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("open", &self.open_databases())
            .field("in_memory", &self.in_memory)
            .finish()
    }
}

fn text_of(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(t) | ValueRef::Blob(t) => Some(String::from_utf8_lossy(t).into_owned()),
    }
}

fn join_error(err: tokio::task::JoinError) -> BackendError {
    BackendError::new(format!("task join error: {err}"))
}

#[async_trait]
impl SqlBackend for SqliteBackend {
    async fn open_connection(&self, name: &str, path: &Path) -> Result<(), BackendError> {
        if let Some(h) = self.connections.lock().get(name) {
            if h.path == path {
                return Ok(());
            }
            return Err(BackendError::new(format!(
                "database `{name}` is already open at {}",
                h.path.display()
            )));
        }

        let owned = path.to_path_buf();
        let in_memory = self.in_memory;
        let conn = tokio::task::spawn_blocking(move || Self::open_sync(&owned, in_memory))
            .await
            .map_err(join_error)??;

        // Someone may have opened the same name while we were off the lock;
        // first one in wins and ours is dropped.
        self.connections
            .lock()
            .entry(name.to_owned())
            .or_insert_with(|| Handle {
                path: path.to_path_buf(),
                conn: Arc::new(Mutex::new(conn)),
            });
        tracing::debug!(database = name, path = %path.display(), in_memory, "opened connection");
        Ok(())
    }

    async fn close_connection(&self, name: &str) -> Result<(), BackendError> {
        let Some(handle) = self.connections.lock().remove(name) else {
            return Ok(());
        };

        match Arc::try_unwrap(handle.conn) {
            Ok(conn) => {
                tokio::task::spawn_blocking(move || conn.into_inner().close())
                    .await
                    .map_err(join_error)?
                    .map_err(|(_, e)| BackendError::from(e))?;
            }
            Err(_) => {
                // In-flight work still holds it; SQLite closes on the last drop.
                tracing::warn!(database = name, "closing connection with work in flight");
            }
        }
        tracing::debug!(database = name, "closed connection");
        Ok(())
    }

    fn is_connection_open(&self, name: &str, path: &Path) -> bool {
        self.connections
            .lock()
            .get(name)
            .is_some_and(|h| h.path == path)
    }

    async fn execute_statement(
        &self,
        name: &str,
        sql: &str,
        params: &[String],
    ) -> Result<u64, BackendError> {
        let conn = self.connection(name)?;
        let sql = sql.to_owned();
        let params = params.to_vec();
        tracing::trace!(database = name, %sql, "execute");

        tokio::task::spawn_blocking(move || -> Result<u64, BackendError> {
            let conn = conn.lock();
            let changed = conn.execute(&sql, params_from_iter(params.iter()))?;
            Ok(changed as u64)
        })
        .await
        .map_err(join_error)?
    }

    async fn execute_query(
        &self,
        name: &str,
        sql: &str,
        params: &[String],
    ) -> Result<Vec<Row>, BackendError> {
        let conn = self.connection(name)?;
        let sql = sql.to_owned();
        let params = params.to_vec();
        tracing::trace!(database = name, %sql, "query");

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            Self::query_sync(&conn, &sql, &params)
        })
        .await
        .map_err(join_error)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_is_idempotent_and_close_forgets() {
        let backend = SqliteBackend::in_memory();
        let path = Path::new("_doc/t.db");
        backend.open_connection("t", path).await.unwrap();
        backend.open_connection("t", path).await.unwrap();
        assert!(backend.is_connection_open("t", path));
        assert_eq!(backend.open_databases(), vec!["t".to_string()]);

        backend.close_connection("t").await.unwrap();
        assert!(!backend.is_connection_open("t", path));
        backend.close_connection("t").await.unwrap();
    }

    #[tokio::test]
    async fn same_name_other_path_is_rejected() {
        let backend = SqliteBackend::in_memory();
        backend.open_connection("t", Path::new("a/t.db")).await.unwrap();
        let err = backend
            .open_connection("t", Path::new("b/t.db"))
            .await
            .unwrap_err();
        assert!(err.message.contains("already open"));
        assert!(!backend.is_connection_open("t", Path::new("b/t.db")));
    }

    #[tokio::test]
    async fn statements_and_queries_bind_params() {
        let backend = SqliteBackend::in_memory();
        let path = Path::new("q.db");
        backend.open_connection("q", path).await.unwrap();
        backend
            .execute_statement("q", "CREATE TABLE t (k TEXT, n INTEGER)", &[])
            .await
            .unwrap();
        let changed = backend
            .execute_statement(
                "q",
                "INSERT INTO t (k, n) VALUES (?, ?)",
                &["it's".to_string(), "5".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(changed, 1);

        let rows = backend
            .execute_query("q", "SELECT k, n, NULL AS z FROM t", &[])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("k"), Some("it's"));
        assert_eq!(rows[0].get("n"), Some("5"));
        assert_eq!(rows[0].get("z"), None);
    }

    #[tokio::test]
    async fn closed_name_fails_to_execute() {
        let backend = SqliteBackend::in_memory();
        let err = backend
            .execute_query("nope", "SELECT 1", &[])
            .await
            .unwrap_err();
        assert!(err.message.contains("not open"));
    }

    #[tokio::test]
    async fn file_database_persists_across_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("sub").join("f.db");
        let backend = SqliteBackend::new();

        backend.open_connection("f", &path).await.unwrap();
        backend
            .execute_statement("f", "CREATE TABLE t (v TEXT)", &[])
            .await
            .unwrap();
        backend
            .execute_statement("f", "INSERT INTO t VALUES (?)", &["x".to_string()])
            .await
            .unwrap();
        backend.close_connection("f").await.unwrap();
        assert!(path.exists());

        backend.open_connection("f", &path).await.unwrap();
        let rows = backend.execute_query("f", "SELECT v FROM t", &[]).await.unwrap();
        assert_eq!(rows[0].get("v"), Some("x"));
    }

    #[test]
    fn shared_is_a_singleton() {
        assert!(Arc::ptr_eq(&SqliteBackend::shared(), &SqliteBackend::shared()));
    }
}
