//! Where database files live.
//!
//! Every database name maps to `<document dir>/<name>.db`. The document dir
//! defaults to `_doc` relative to the working directory; set `SQL_KV_DOC_DIR`
//! or use [`SqlKvBuilder::document_dir`](crate::SqlKvBuilder::document_dir)
//! to move it.

use std::path::{Path, PathBuf};

/// Document directory used when nothing else is configured.
pub const DEFAULT_DOC_DIR: &str = "_doc";

/// Environment variable that overrides [`DEFAULT_DOC_DIR`].
pub const DOC_DIR_ENV: &str = "SQL_KV_DOC_DIR";

/// The document directory: `SQL_KV_DOC_DIR` if set and non-empty, otherwise
/// [`DEFAULT_DOC_DIR`].
pub fn default_document_dir() -> PathBuf {
    match std::env::var_os(DOC_DIR_ENV) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => PathBuf::from(DEFAULT_DOC_DIR),
    }
}

/// File backing the database called `name` inside `dir`.
pub fn database_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.db"))
}

/// Create the parent directory of `path` if it doesn't exist yet.
pub(crate) fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}
