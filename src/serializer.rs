//! Serialization layer. Keys default to their natural string form, values to
//! JSON via serde_json.
//!
//! Implement [`Serializer`] for a strategy object, or hand the store plain
//! closures through its `set_*_serializer` / `set_*_deserializer` methods.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Turns a `T` into the text stored in the table.
pub type SerializeFn<T> = Arc<dyn Fn(&T) -> Result<String> + Send + Sync>;

/// Turns stored text back into a `T`.
pub type DeserializeFn<T> = Arc<dyn Fn(&str) -> Result<T> + Send + Sync>;

/// Converts a single key or value to and from its stored text.
///
/// `deserialize(serialize(v))` must give back `v`.
pub trait Serializer<T>: Send + Sync {
    /// Encode `value` as text.
    fn serialize(&self, value: &T) -> Result<String>;

    /// Decode text produced by [`serialize`](Self::serialize).
    fn deserialize(&self, text: &str) -> Result<T>;
}

/// JSON serializer with optional pretty-printing.
#[derive(Debug, Clone, Default)]
pub struct JsonSerializer {
    pretty: bool,
}

impl JsonSerializer {
    /// Compact JSON (single line, no extra whitespace).
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretty-printed JSON with indentation. Easier to read with the sqlite
    /// shell, costs a few bytes per row.
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl<T> Serializer<T> for JsonSerializer
where
    T: Serialize + DeserializeOwned,
{
    fn serialize(&self, value: &T) -> Result<String> {
        let text = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        text.map_err(|e| Error::Serialize(e.to_string()))
    }

    fn deserialize(&self, text: &str) -> Result<T> {
        serde_json::from_str(text).map_err(|e| Error::Deserialize(e.to_string()))
    }
}

/// Stores keys in their natural string form.
///
/// Keys that serialize to a JSON string (`String`, `&str`-like newtypes, unit
/// enum variants) are stored verbatim, without quotes, unless the text would
/// itself parse as JSON: `"1"` and `"null"` are stored quoted so they never
/// collide with the number `1` or with `None`. Anything else (numbers, tuples,
/// structs) is stored as its compact JSON text, so `42u32` becomes `42`.
///
/// Verbatim text never parses as JSON and JSON text always does, so distinct
/// keys always get distinct stored text.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaturalKeySerializer;

impl<T> Serializer<T> for NaturalKeySerializer
where
    T: Serialize + DeserializeOwned,
{
    fn serialize(&self, value: &T) -> Result<String> {
        match serde_json::to_value(value).map_err(|e| Error::Serialize(e.to_string()))? {
            serde_json::Value::String(s) if !parses_as_json(&s) => Ok(s),
            other => Ok(other.to_string()),
        }
    }

    fn deserialize(&self, text: &str) -> Result<T> {
        if parses_as_json(text) {
            return serde_json::from_str(text).map_err(|e| Error::Deserialize(e.to_string()));
        }
        serde_json::from_value(serde_json::Value::String(text.to_owned()))
            .map_err(|e| Error::Deserialize(e.to_string()))
    }
}

fn parses_as_json(text: &str) -> bool {
    serde_json::from_str::<serde::de::IgnoredAny>(text).is_ok()
}

/// A serializer/deserializer pair for one side of the entry (key or value).
pub(crate) struct Codec<T> {
    pub(crate) serialize: SerializeFn<T>,
    pub(crate) deserialize: DeserializeFn<T>,
}

impl<T: 'static> Codec<T> {
    pub(crate) fn from_serializer<S>(serializer: S) -> Self
    where
        S: Serializer<T> + 'static,
    {
        let serializer = Arc::new(serializer);
        let de = Arc::clone(&serializer);
        Self {
            serialize: Arc::new(move |value: &T| serializer.serialize(value)),
            deserialize: Arc::new(move |text: &str| de.deserialize(text)),
        }
    }

    pub(crate) fn encode(&self, value: &T) -> Result<String> {
        (self.serialize)(value)
    }

    pub(crate) fn decode(&self, text: &str) -> Result<T> {
        (self.deserialize)(text)
    }
}

impl<T> Clone for Codec<T> {
    fn clone(&self) -> Self {
        Self {
            serialize: Arc::clone(&self.serialize),
            deserialize: Arc::clone(&self.deserialize),
        }
    }
}

impl<T> fmt::Debug for Codec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec").finish_non_exhaustive()
    }
}
