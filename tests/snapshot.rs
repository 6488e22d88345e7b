use std::fs;

use tempfile::tempdir;
use trellis::{ProxyError, SnapshotStore};

#[test]
fn missing_or_empty_source_takes_nothing() {
    let dir = tempdir().expect("tempdir");
    let store = SnapshotStore::new(dir.path().join("snapshots"));

    let source = dir.path().join("Caddyfile");
    assert!(store.take(&source).expect("take missing").is_none());

    fs::write(&source, "").expect("seed empty");
    assert!(store.take(&source).expect("take empty").is_none());
}

#[test]
fn take_and_restore_roundtrip() {
    let dir = tempdir().expect("tempdir");
    let store = SnapshotStore::new(dir.path().join("snapshots"));
    let source = dir.path().join("Caddyfile");

    fs::write(&source, "version one\n").expect("write v1");
    store.take(&source).expect("take v1");

    fs::write(&source, "version two\n").expect("write v2");
    store.take(&source).expect("take v2");

    assert_eq!(store.list().expect("list").len(), 2);

    // Simulate a clobbered root, then roll back.
    fs::write(&source, "broken\n").expect("clobber");
    store.restore_latest(&source).expect("restore");

    assert_eq!(
        fs::read_to_string(&source).expect("read restored"),
        "version two\n",
    );
}

#[test]
fn retention_prunes_oldest_first() {
    let dir = tempdir().expect("tempdir");
    let store = SnapshotStore::new(dir.path().join("snapshots")).keep(3);
    let source = dir.path().join("Caddyfile");

    for i in 1..=5 {
        fs::write(&source, format!("version {i}\n")).expect("write");
        store.take(&source).expect("take");
    }

    let remaining = store.list().expect("list");
    assert_eq!(remaining.len(), 3);

    let newest = fs::read_to_string(remaining.last().expect("newest")).expect("read");
    assert_eq!(newest, "version 5\n");
    let oldest = fs::read_to_string(&remaining[0]).expect("read");
    assert_eq!(oldest, "version 3\n");
}

#[test]
fn restore_without_snapshots_is_an_error() {
    let dir = tempdir().expect("tempdir");
    let store = SnapshotStore::new(dir.path().join("snapshots"));

    let err = store
        .restore_latest(&dir.path().join("Caddyfile"))
        .unwrap_err();
    assert!(matches!(err, ProxyError::PrerequisiteMissing(_)));
}

#[test]
fn foreign_files_in_the_snapshot_dir_are_ignored() {
    let dir = tempdir().expect("tempdir");
    let snapshot_dir = dir.path().join("snapshots");
    let store = SnapshotStore::new(snapshot_dir.clone());
    let source = dir.path().join("Caddyfile");

    fs::write(&source, "config\n").expect("write");
    store.take(&source).expect("take");
    fs::write(snapshot_dir.join("README"), "not a snapshot\n").expect("write foreign");

    assert_eq!(store.list().expect("list").len(), 1);
}
