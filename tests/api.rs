use serde_json::{json, Value};
use sql_kv::{SqlKv, SqliteBackend};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

async fn open<V>(table: &str) -> SqlKv<String, V>
where
    V: serde::Serialize + serde::de::DeserializeOwned + 'static,
{
    SqlKv::builder("api", table)
        .backend(Arc::new(SqliteBackend::in_memory()))
        .open()
        .await
        .unwrap()
}

fn sorted<T: Ord>(mut v: Vec<T>) -> Vec<T> {
    v.sort();
    v
}

// ---- put / get / remove -----------------------------------------------------

#[tokio::test]
async fn basic_lifecycle() {
    let store = SqlKv::<String, Value>::builder("app", "cache")
        .backend(Arc::new(SqliteBackend::in_memory()))
        .open()
        .await
        .unwrap();

    store.put(&"x".into(), &json!({"n": 1})).await.unwrap();
    assert_eq!(store.get(&"x".into()).await.unwrap(), Some(json!({"n": 1})));
    assert!(store.contains_key(&"x".into()).await.unwrap());

    store.remove(&"x".into()).await.unwrap();
    assert_eq!(store.get(&"x".into()).await.unwrap(), None);
}

#[tokio::test]
async fn put_same_pair_twice_is_idempotent() {
    let store = open::<i32>("idem").await;
    store.put(&"k".into(), &7).await.unwrap();
    store.put(&"k".into(), &7).await.unwrap();
    assert_eq!(store.get(&"k".into()).await.unwrap(), Some(7));
    assert_eq!(store.size().await.unwrap(), 1);
}

#[tokio::test]
async fn put_overwrites_without_duplicates() {
    let store = open::<String>("overwrite").await;
    store.put(&"k".into(), &"v1".into()).await.unwrap();
    store.put(&"k".into(), &"v2".into()).await.unwrap();

    assert_eq!(store.get(&"k".into()).await.unwrap(), Some("v2".to_string()));
    assert_eq!(store.keys().await.unwrap(), vec!["k".to_string()]);
}

#[tokio::test]
async fn absent_key_behaviour() {
    let store = open::<i32>("absent").await;
    assert_eq!(store.get(&"never".into()).await.unwrap(), None);
    assert!(!store.contains_key(&"never".into()).await.unwrap());
    store.remove(&"never".into()).await.unwrap();
}

#[tokio::test]
async fn stored_null_is_not_absent() {
    let store = open::<Option<i32>>("nulls").await;
    store.put(&"k".into(), &None).await.unwrap();
    assert_eq!(store.get(&"k".into()).await.unwrap(), Some(None));
    assert_eq!(store.get(&"other".into()).await.unwrap(), None);
}

#[tokio::test]
async fn quotes_in_keys_and_values_are_stored_verbatim() {
    let store = open::<String>("quotes").await;
    let key = "it's a \"key\"; DROP TABLE quotes; --".to_string();
    let value = "o'clock \"sharp\"".to_string();

    store.put(&key, &value).await.unwrap();
    assert_eq!(store.get(&key).await.unwrap(), Some(value));
    assert_eq!(store.size().await.unwrap(), 1);
    assert_eq!(store.keys().await.unwrap(), vec![key]);
}

// ---- size / is_empty / clear ------------------------------------------------

#[tokio::test]
async fn cardinality_tracks_distinct_keys() {
    let store = open::<u32>("cardinality").await;
    assert_eq!(store.size().await.unwrap(), 0);
    assert!(store.is_empty().await.unwrap());

    for i in 0..25u32 {
        store.put(&format!("k{i}"), &i).await.unwrap();
    }
    assert_eq!(store.size().await.unwrap(), 25);
    assert_eq!(store.keys().await.unwrap().len(), 25);
    assert_eq!(store.key_set().await.unwrap().len(), 25);
    assert!(!store.is_empty().await.unwrap());
}

#[tokio::test]
async fn clear_removes_all_entries() {
    let store = open::<i32>("clear").await;
    store.put(&"a".into(), &1).await.unwrap();
    store.put(&"b".into(), &2).await.unwrap();
    assert_eq!(store.size().await.unwrap(), 2);

    store.clear().await.unwrap();
    assert_eq!(store.size().await.unwrap(), 0);
    assert!(store.is_empty().await.unwrap());
    assert_eq!(store.get(&"a".into()).await.unwrap(), None);
}

#[tokio::test]
async fn clear_on_empty_store_is_fine() {
    let store = open::<i32>("clear_empty").await;
    store.clear().await.unwrap();
    assert!(store.is_empty().await.unwrap());
}

// ---- bulk reads -------------------------------------------------------------

#[tokio::test]
async fn bulk_read_views() {
    let store = open::<i32>("bulk").await;
    store.put(&"a".into(), &1).await.unwrap();
    store.put(&"b".into(), &2).await.unwrap();
    store.put(&"c".into(), &3).await.unwrap();

    assert_eq!(sorted(store.values().await.unwrap()), vec![1, 2, 3]);
    assert_eq!(
        sorted(store.keys().await.unwrap()),
        vec!["a".to_string(), "b".to_string(), "c".to_string()]
    );

    let expected = HashMap::from([
        ("a".to_string(), 1),
        ("b".to_string(), 2),
        ("c".to_string(), 3),
    ]);
    assert_eq!(store.map().await.unwrap(), expected);

    let set: HashSet<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
    assert_eq!(store.key_set().await.unwrap(), set);
}

#[tokio::test]
async fn entries_and_map_agree() {
    let store = open::<Value>("views").await;
    store.put(&"one".into(), &json!(1)).await.unwrap();
    store.put(&"list".into(), &json!([1, 2])).await.unwrap();
    store.put(&"obj".into(), &json!({"a": {"b": null}})).await.unwrap();

    let entries = store.entries().await.unwrap();
    let map = store.map().await.unwrap();
    assert_eq!(entries.len(), map.len());
    for (k, v) in &entries {
        assert_eq!(map.get(k), Some(v));
    }
}

#[tokio::test]
async fn values_align_with_entries() {
    let store = open::<i32>("aligned").await;
    store.extend((0..10).map(|i| (format!("k{i}"), i))).await.unwrap();

    let values = store.values().await.unwrap();
    let from_entries: Vec<i32> = store
        .entries()
        .await
        .unwrap()
        .into_iter()
        .map(|(_, v)| v)
        .collect();
    assert_eq!(values, from_entries);
}

#[tokio::test]
async fn bulk_reads_on_empty_store() {
    let store = open::<i32>("empty_views").await;
    assert!(store.keys().await.unwrap().is_empty());
    assert!(store.key_set().await.unwrap().is_empty());
    assert!(store.values().await.unwrap().is_empty());
    assert!(store.entries().await.unwrap().is_empty());
    assert!(store.map().await.unwrap().is_empty());
}

// ---- extend -----------------------------------------------------------------

#[tokio::test]
async fn extend_bulk_insert() {
    let store = open::<i32>("extend").await;
    let batch: Vec<(String, i32)> = (0..50).map(|i| (format!("k{i}"), i)).collect();
    store.extend(batch).await.unwrap();
    assert_eq!(store.size().await.unwrap(), 50);
    assert_eq!(store.get(&"k0".into()).await.unwrap(), Some(0));
    assert_eq!(store.get(&"k49".into()).await.unwrap(), Some(49));
}

#[tokio::test]
async fn extend_overwrites_existing() {
    let store = open::<i32>("extend_overwrite").await;
    store.put(&"a".into(), &1).await.unwrap();
    store
        .extend(vec![("a".into(), 99), ("b".into(), 2)])
        .await
        .unwrap();
    assert_eq!(store.get(&"a".into()).await.unwrap(), Some(99));
    assert_eq!(store.get(&"b".into()).await.unwrap(), Some(2));
}

// ---- concurrency ------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_puts_from_tasks() {
    let store = Arc::new(open::<usize>("concurrent").await);
    let mut tasks = Vec::new();
    for i in 0..16usize {
        let store = Arc::clone(&store);
        tasks.push(tokio::spawn(async move {
            store.put(&format!("k{i}"), &i).await.unwrap();
        }));
    }
    for t in tasks {
        t.await.unwrap();
    }
    assert_eq!(store.size().await.unwrap(), 16);
}

// ---- accessors --------------------------------------------------------------

#[tokio::test]
async fn names_and_path() {
    let store = SqlKv::<String, i32>::builder("names", "tbl")
        .backend(Arc::new(SqliteBackend::in_memory()))
        .document_dir("/data/docs")
        .build()
        .unwrap();
    assert_eq!(store.database_name(), "names");
    assert_eq!(store.table_name(), "tbl");
    assert_eq!(store.path(), std::path::Path::new("/data/docs/names.db"));
}
