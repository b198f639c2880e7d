use sql_kv::{SqlKv, SqliteBackend};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), sql_kv::Error> {
    let dir = std::env::temp_dir().join("sql_kv_example_builder");

    // private connection registry, pretty JSON values
    let backend = Arc::new(SqliteBackend::new());
    let store = SqlKv::<String, Vec<String>>::builder("demo", "settings")
        .backend(backend.clone())
        .document_dir(&dir)
        .pretty(true)
        .open()
        .await?;

    store
        .put(&"authors".into(), &vec!["ada".into(), "lin".into()])
        .await?;
    println!("map = {:?}", store.map().await?);
    println!("file = {}", store.path().display());
    println!("open databases = {:?}", backend.open_databases());
    println!("\nDebug output: {store:?}");

    store.close_connection().await?;
    let _ = std::fs::remove_dir_all(&dir);
    Ok(())
}
