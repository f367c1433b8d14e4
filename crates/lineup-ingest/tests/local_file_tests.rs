//! Local files through the same pipeline the CLI `load` command uses

mod common;

use std::sync::Arc;

use common::{csv, test_config, RecordingNotifier};
use lineup_ingest::handler::IngestContext;
use lineup_ingest::source::{LocalFileReader, ObjectLocation};
use lineup_ingest::store::MemoryPerformanceStore;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_local_file_is_loaded_into_store() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("friday.csv"),
        csv(&[
            "Main,2024-07-12,18:00,The Resonators,19:15",
            " Tent , 2024-07-12 , 18:30 , Paper Kites , 19:00 ",
        ]),
    )
    .unwrap();

    let store = Arc::new(MemoryPerformanceStore::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let context = IngestContext::new(
        Arc::new(LocalFileReader::new(dir.path())),
        store.clone(),
        notifier.clone(),
        test_config(1),
    );

    let report = context
        .process_object(&ObjectLocation::new("", "friday.csv"), &CancellationToken::new())
        .await;

    assert_eq!(report.status_code, 200);
    let stored = store.snapshot().await;
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[1].stage, "Tent");
    assert_eq!(stored[1].date_start, "2024-07-12#18:30");
    assert_eq!(stored[1].performer, "Paper Kites");
    assert_eq!(notifier.sent().len(), 1);
}

#[tokio::test]
async fn test_missing_local_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryPerformanceStore::new());
    let context = IngestContext::new(
        Arc::new(LocalFileReader::new(dir.path())),
        store.clone(),
        Arc::new(RecordingNotifier::default()),
        test_config(1),
    );

    let report = context
        .process_object(&ObjectLocation::new("", "absent.csv"), &CancellationToken::new())
        .await;

    assert_eq!(report.status_code, 500);
    assert!(store.is_empty().await);
}
