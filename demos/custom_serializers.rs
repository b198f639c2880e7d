use sql_kv::{Error, SqlKv, SqliteBackend};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let mut store = SqlKv::<u32, String>::builder("demo", "upper")
        .backend(Arc::new(SqliteBackend::in_memory()))
        .build()?;

    // keys as zero-padded decimal, values upper-cased on the way in
    store.set_key_serializer(|k: &u32| Ok(format!("{k:08}")));
    store.set_key_deserializer(|s: &str| s.parse().map_err(|e| Error::Deserialize(format!("{e}"))));
    store.set_value_serializer(|v: &String| Ok(v.to_uppercase()));
    store.set_value_deserializer(|s: &str| Ok(s.to_string()));
    store.initialize().await?;

    store.put(&7, &"seven".into()).await?;
    store.put(&42, &"forty-two".into()).await?;
    for (k, v) in store.entries().await? {
        println!("{k} -> {v}");
    }
    Ok(())
}
