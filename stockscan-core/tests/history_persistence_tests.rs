use std::path::PathBuf;

use stockscan_core::{NewScan, ScanHistory, STORAGE_FILE};

fn temp_dir(tag: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    dir.push(format!("stockscan_{tag}_{}", uuid::Uuid::new_v4()));
    dir
}

fn scan(barcode: &str) -> NewScan {
    NewScan {
        barcode: barcode.into(),
        item_name: format!("item {barcode}"),
        location: "A".into(),
        quantity: 1,
        is_new: false,
        category_id: Some(4),
        category_name: Some("Tools".into()),
    }
}

#[tokio::test]
async fn history_survives_a_reload() {
    let dir = temp_dir("reload");
    let history = ScanHistory::hydrate_from_dir(&dir, 100).await;
    let first = history.append(scan("111")).await;
    let second = history.append(scan("222")).await;

    let reloaded = ScanHistory::hydrate_from_dir(&dir, 100).await;
    let items = reloaded.items().await;
    assert_eq!(items.len(), 2);
    assert_eq!(items[0], second);
    assert_eq!(items[1].timestamp, first.timestamp);

    let _ = tokio::fs::remove_dir_all(&dir).await;
}

#[tokio::test]
async fn persisted_record_uses_items_envelope() {
    let dir = temp_dir("format");
    let history = ScanHistory::hydrate_from_dir(&dir, 100).await;
    history.append(scan("111")).await;

    let bytes = tokio::fs::read(dir.join(STORAGE_FILE)).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    let items = json["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["barcode"], "111");
    assert_eq!(items[0]["isNew"], false);
    assert!(chrono::DateTime::parse_from_rfc3339(items[0]["timestamp"].as_str().unwrap()).is_ok());

    let _ = tokio::fs::remove_dir_all(&dir).await;
}

#[tokio::test]
async fn persisted_record_never_exceeds_capacity() {
    let dir = temp_dir("cap");
    let history = ScanHistory::hydrate_from_dir(&dir, 100).await;
    for i in 0..130 {
        history.append(scan(&i.to_string())).await;
    }
    assert_eq!(history.len().await, 100);

    let reloaded = ScanHistory::hydrate_from_dir(&dir, 100).await;
    let items = reloaded.items().await;
    assert_eq!(items.len(), 100);
    assert_eq!(items[0].barcode, "129");
    assert_eq!(items[99].barcode, "30");

    let _ = tokio::fs::remove_dir_all(&dir).await;
}

#[tokio::test]
async fn corrupted_record_starts_empty() {
    let dir = temp_dir("corrupt");
    tokio::fs::create_dir_all(&dir).await.unwrap();
    tokio::fs::write(dir.join(STORAGE_FILE), b"{ \"items\": [ oops").await.unwrap();

    let history = ScanHistory::hydrate_from_dir(&dir, 100).await;
    assert!(history.is_empty().await);

    // The next mutation overwrites the broken file.
    history.append(scan("1")).await;
    let reloaded = ScanHistory::hydrate_from_dir(&dir, 100).await;
    assert_eq!(reloaded.len().await, 1);

    let _ = tokio::fs::remove_dir_all(&dir).await;
}

#[tokio::test]
async fn clear_removes_the_persisted_copy() {
    let dir = temp_dir("clear");
    let history = ScanHistory::hydrate_from_dir(&dir, 100).await;
    history.append(scan("1")).await;
    assert!(dir.join(STORAGE_FILE).exists());

    history.clear().await;
    assert!(history.is_empty().await);
    assert!(!dir.join(STORAGE_FILE).exists());

    let reloaded = ScanHistory::hydrate_from_dir(&dir, 100).await;
    assert!(reloaded.is_empty().await);

    // Clearing again with nothing on disk is harmless.
    reloaded.clear().await;

    let _ = tokio::fs::remove_dir_all(&dir).await;
}

#[tokio::test]
async fn write_failure_keeps_memory_state() {
    let dir = temp_dir("readonly");
    tokio::fs::create_dir_all(&dir).await.unwrap();
    // A regular file where the history directory should be.
    let blocker = dir.join("blocker");
    tokio::fs::write(&blocker, b"").await.unwrap();

    let history = ScanHistory::hydrate(blocker.join(STORAGE_FILE), 100).await;
    let item = history.append(scan("1")).await;
    assert_eq!(history.items().await, vec![item]);

    let _ = tokio::fs::remove_dir_all(&dir).await;
}
