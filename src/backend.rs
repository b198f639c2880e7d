//! The SQL execution surface a store delegates to.
//!
//! Implement [`SqlBackend`] to plug in your own engine. The crate ships
//! [`SqliteBackend`](crate::SqliteBackend).

use async_trait::async_trait;
use std::path::Path;

/// Failure reported by a backend, with whatever detail the engine gave us.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct BackendError {
    /// Human-readable detail from the engine.
    pub message: String,
    /// Engine-specific error code, when there is one.
    pub code: Option<i32>,
}

impl BackendError {
    /// Error with a message and no code.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    /// `true` when the engine reports that the statement's table doesn't
    /// exist, e.g. because another store dropped it.
    pub fn is_missing_table(&self) -> bool {
        self.message.starts_with("no such table")
    }
}

impl From<rusqlite::Error> for BackendError {
    fn from(err: rusqlite::Error) -> Self {
        Self {
            message: err.to_string(),
            code: err.sqlite_error_code().map(|c| c as i32),
        }
    }
}

/// One result row: ordered, named text fields. SQL `NULL` is `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    fields: Vec<(String, Option<String>)>,
}

impl Row {
    /// Build a row from `(column, value)` pairs.
    pub fn new(fields: Vec<(String, Option<String>)>) -> Self {
        Self { fields }
    }

    /// Value of the column called `name`. `None` if the column is missing or
    /// holds `NULL`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(column, _)| column == name)
            .and_then(|(_, value)| value.as_deref())
    }

    /// Column names in select order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(column, _)| column.as_str())
    }
}

/// Contract a SQL engine must satisfy to back a [`SqlKv`](crate::SqlKv) store.
///
/// Connections are keyed by database name and shared by everyone using the
/// same backend: closing a name invalidates it for every store. Each method
/// resolves exactly once.
#[async_trait]
pub trait SqlBackend: Send + Sync {
    /// Open the connection for `name`, backed by the file at `path`. Opening a
    /// name that is already open is a no-op.
    async fn open_connection(&self, name: &str, path: &Path) -> Result<(), BackendError>;

    /// Close the connection for `name`. Closing a name that isn't open is a
    /// no-op.
    async fn close_connection(&self, name: &str) -> Result<(), BackendError>;

    /// `true` if `name` is open and was opened at `path`.
    fn is_connection_open(&self, name: &str, path: &Path) -> bool;

    /// Run a statement that returns no rows. `params` bind to `?`
    /// placeholders in order. Returns the number of rows changed.
    async fn execute_statement(
        &self,
        name: &str,
        sql: &str,
        params: &[String],
    ) -> Result<u64, BackendError>;

    /// Run a query and collect every row.
    async fn execute_query(
        &self,
        name: &str,
        sql: &str,
        params: &[String],
    ) -> Result<Vec<Row>, BackendError>;
}
