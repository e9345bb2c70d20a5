use std::sync::Arc;

use threadline_context::{MemoryConfig, MemoryManager};
use threadline_persist::{LocalBlobStore, SqliteStore, SummaryTableBlobStore};

#[tokio::test]
async fn test_memory_on_local_directory() {
    let dir = tempfile::tempdir().unwrap();
    let memory = MemoryManager::new(
        Arc::new(LocalBlobStore::new(dir.path())),
        MemoryConfig { word_limit: 5 },
    );

    memory
        .write(Some("T1"), "alpha beta gamma delta epsilon")
        .await
        .unwrap();
    memory.maintain(Some("T1"), "zeta eta").await.unwrap();

    let on_disk = std::fs::read_to_string(dir.path().join("memory/threads/T1.txt")).unwrap();
    assert_eq!(on_disk, "gamma delta epsilon zeta eta");
}

#[tokio::test]
async fn test_concurrent_writes_keep_single_summary_row() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteStore::connect(dir.path().join("t.db"), 2).await.unwrap());
    let memory = Arc::new(MemoryManager::new(
        Arc::new(SummaryTableBlobStore::new(store.clone())),
        MemoryConfig::default(),
    ));

    let writes: Vec<_> = (0..12)
        .map(|i| {
            let memory = memory.clone();
            tokio::spawn(async move { memory.write(Some("t1"), &format!("note {}", i)).await })
        })
        .collect();
    for write in writes {
        write.await.unwrap().unwrap();
    }

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM thread_memory WHERE thread_id = 't1'")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(rows, 1);
    assert!(memory.read(Some("t1"), "").await.starts_with("note "));
}
