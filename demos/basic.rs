use serde_json::json;
use sql_kv::SqlKv;

#[tokio::main]
async fn main() -> Result<(), sql_kv::Error> {
    let dir = std::env::temp_dir().join("sql_kv_example_basic");
    let store = SqlKv::<String, serde_json::Value>::builder("demo", "fruit")
        .document_dir(&dir)
        .open()
        .await?;

    // put / get / remove
    store.put(&"apples".into(), &json!(3)).await?;
    store.put(&"bananas".into(), &json!({"count": 5, "ripe": true})).await?;
    println!("apples  = {:?}", store.get(&"apples".into()).await?);
    println!("bananas = {:?}", store.get(&"bananas".into()).await?);
    println!("cherries = {:?}", store.get(&"cherries".into()).await?);

    // bulk insert
    store
        .extend(vec![("grapes".into(), json!(12)), ("lemons".into(), json!(7))])
        .await?;

    // bulk reads
    println!("keys    = {:?}", store.keys().await?);
    println!("values  = {:?}", store.values().await?);
    println!("size    = {}", store.size().await?);
    println!("empty?  = {}", store.is_empty().await?);

    store.remove(&"apples".into()).await?;
    store.clear().await?;
    println!("after clear: size = {}", store.size().await?);

    store.drop_table().await?;
    store.close_connection().await?;
    let _ = std::fs::remove_dir_all(&dir);
    Ok(())
}
