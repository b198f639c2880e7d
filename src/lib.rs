//! Async key-value store over a single SQL table.
//!
//! Each store binds a database name and a table name to a two-column table
//! (`key`, `value`). Keys are stored in their natural string form, values as
//! JSON, and both sides can be swapped for your own serializers.
//!
//! ```rust,no_run
//! use sql_kv::SqlKv;
//!
//! # async fn run() -> sql_kv::Result<()> {
//! let store = SqlKv::<String, serde_json::Value>::open("app", "cache").await?;
//! store.put(&"x".into(), &serde_json::json!({"n": 1})).await?;
//! assert_eq!(store.get(&"x".into()).await?, Some(serde_json::json!({"n": 1})));
//! store.close_connection().await?;
//! # Ok(())
//! # }
//! ```
//!
//! **Shared connections.** Stores on the same backend and database name share
//! one connection. Closing it from any of them closes it for all.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod error;
pub mod persist;
pub mod serializer;
pub mod sqlite;
mod statement;
pub mod store;

pub use backend::{BackendError, Row, SqlBackend};
pub use error::{Error, Result};
pub use serializer::{JsonSerializer, NaturalKeySerializer, Serializer};
pub use sqlite::SqliteBackend;
pub use store::{SqlKv, SqlKvBuilder};
