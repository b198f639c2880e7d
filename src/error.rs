//! Unified error type for all store operations.

use crate::backend::BackendError;

/// Things that can go wrong when using the store.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Empty database or table name, or some other unusable input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The store was never initialized, or its connection has been closed.
    #[error("database not open: {0}")]
    NotOpen(String),
    /// Opening or closing the backend connection failed.
    #[error("connection error: {0}")]
    Connection(String),
    /// Creating or dropping the backing table failed, or the table is gone.
    #[error("schema error: {0}")]
    Schema(String),
    /// A mutating statement failed at the backend.
    #[error("write error: {0}")]
    Write(String),
    /// A query failed at the backend, or returned something unexpected.
    #[error("read error: {0}")]
    Read(String),
    /// A key or value could not be turned into stored text.
    #[error("serialization error: {0}")]
    Serialize(String),
    /// Stored text could not be turned back into a key or value.
    #[error("deserialization error: {0}")]
    Deserialize(String),
}

impl Error {
    pub(crate) fn connection(err: BackendError) -> Self {
        Error::Connection(err.to_string())
    }

    pub(crate) fn schema(err: BackendError) -> Self {
        Error::Schema(err.to_string())
    }

    pub(crate) fn write(err: BackendError) -> Self {
        if err.is_missing_table() {
            return Error::schema(err);
        }
        Error::Write(err.to_string())
    }

    pub(crate) fn read(err: BackendError) -> Self {
        if err.is_missing_table() {
            return Error::schema(err);
        }
        Error::Read(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        if err.is_syntax() || err.is_eof() {
            Error::Deserialize(err.to_string())
        } else {
            Error::Serialize(err.to_string())
        }
    }
}

/// Result alias using our [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;
