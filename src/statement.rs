//! The fixed set of SQL statements a store runs against its table.
//!
//! Keys and values always travel as bound `?` parameters. The table name
//! can't be bound, so it is quoted as an identifier instead.

/// Quote `name` as a SQL identifier, doubling embedded quotes.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Statements for one table, rendered once when the store is built.
#[derive(Debug, Clone)]
pub(crate) struct Statements {
    pub(crate) create_table: String,
    pub(crate) drop_table: String,
    pub(crate) upsert: String,
    pub(crate) select_value: String,
    pub(crate) delete_key: String,
    pub(crate) exists_key: String,
    pub(crate) delete_all: String,
    pub(crate) count: String,
    pub(crate) select_keys: String,
    pub(crate) select_values: String,
    pub(crate) select_entries: String,
    pub(crate) probe: String,
}

impl Statements {
    pub(crate) fn for_table(table: &str) -> Self {
        let t = quote_ident(table);
        Self {
            create_table: format!(
                "CREATE TABLE IF NOT EXISTS {t} (\"key\" TEXT PRIMARY KEY NOT NULL, \"value\" TEXT NOT NULL)"
            ),
            drop_table: format!("DROP TABLE IF EXISTS {t}"),
            upsert: format!("INSERT OR REPLACE INTO {t} (\"key\", \"value\") VALUES (?, ?)"),
            select_value: format!("SELECT \"value\" FROM {t} WHERE \"key\" = ?"),
            delete_key: format!("DELETE FROM {t} WHERE \"key\" = ?"),
            exists_key: format!("SELECT \"key\" FROM {t} WHERE \"key\" = ? LIMIT 1"),
            delete_all: format!("DELETE FROM {t}"),
            count: format!("SELECT COUNT(*) AS size FROM {t}"),
            select_keys: format!("SELECT \"key\" FROM {t}"),
            select_values: format!("SELECT \"value\" FROM {t}"),
            select_entries: format!("SELECT \"key\", \"value\" FROM {t}"),
            probe: format!("SELECT \"key\" FROM {t} LIMIT 1"),
        }
    }
}
