//! Integration tests for glamscan-store.

use std::path::Path;
use std::sync::Arc;

use glamscan_core::ContentHash;
use glamscan_store::{ScanStore, VirusRecord};

#[test]
fn test_records_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("glamscan.db");
    let digest = ContentHash::new([7; 32]);

    {
        let store = ScanStore::open(&db).unwrap();
        store
            .record_clean(Path::new("/srv/a.txt"), "2024-05-01T10:00:00.000000001Z")
            .unwrap();
        store.record_virus(Path::new("/srv/b.exe"), &digest).unwrap();
    }

    let store = ScanStore::open(&db).unwrap();
    assert!(
        store
            .is_unchanged(Path::new("/srv/a.txt"), "2024-05-01T10:00:00.000000001Z")
            .unwrap()
    );
    assert_eq!(
        store.virus_digest(Path::new("/srv/b.exe")).unwrap(),
        Some(digest)
    );
}

#[test]
fn test_history_is_ordered_by_path() {
    let dir = tempfile::tempdir().unwrap();
    let store = ScanStore::open(dir.path().join("glamscan.db")).unwrap();

    store
        .record_virus(Path::new("/srv/z.bin"), &ContentHash::new([2; 32]))
        .unwrap();
    store
        .record_virus(Path::new("/srv/a.bin"), &ContentHash::new([1; 32]))
        .unwrap();

    let history = store.viruses().unwrap();
    assert_eq!(
        history,
        vec![
            VirusRecord {
                path: "/srv/a.bin".into(),
                digest: ContentHash::new([1; 32]),
            },
            VirusRecord {
                path: "/srv/z.bin".into(),
                digest: ContentHash::new([2; 32]),
            },
        ]
    );
}

#[test]
fn test_concurrent_writers() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(ScanStore::open(dir.path().join("glamscan.db")).unwrap());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                let path = format!("/srv/file-{i}");
                store.record_clean(Path::new(&path), "stamp").unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for i in 0..8 {
        let path = format!("/srv/file-{i}");
        assert!(store.is_unchanged(Path::new(&path), "stamp").unwrap());
    }
}
