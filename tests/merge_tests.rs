// Merge (compaction) tests for the segkv store
// These tests verify that sealed segments collapse into one with
// latest-wins semantics, and that a failed merge changes nothing.

use segkv::{Error, Options, Store};
use std::fs;
use std::io::{Seek, SeekFrom, Write};
use tempfile::TempDir;

fn segment_files(dir: &TempDir) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("segment-"))
        .collect();
    names.sort();
    names
}

#[test]
fn test_merge_collapses_segments() {
    env_logger::try_init().ok();
    let dir = TempDir::new().unwrap();
    let store = Store::open_with_options(dir.path(), Options::new().max_log_size(10)).unwrap();

    store.put(b"k1", b"v1").unwrap();
    store.put(b"k2", b"v2").unwrap();
    store.put(b"k3", b"v3").unwrap();
    store.put(b"k1", b"v1-updated").unwrap();

    assert!(store.segment_count() >= 2);

    store.merge_segments().unwrap();

    assert_eq!(store.segment_count(), 1);
    assert_eq!(segment_files(&dir).len(), 1);
    assert_eq!(store.get(b"k1").unwrap(), Some(b"v1-updated".to_vec()));
    assert_eq!(store.get(b"k2").unwrap(), Some(b"v2".to_vec()));
    assert_eq!(store.get(b"k3").unwrap(), Some(b"v3".to_vec()));
}

#[test]
fn test_merge_is_noop_below_two_segments() {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path()).unwrap();

    store.put(b"k", b"v").unwrap();
    store.merge_segments().unwrap();
    assert_eq!(store.segment_count(), 0);
    assert_eq!(store.get(b"k").unwrap(), Some(b"v".to_vec()));
}

#[test]
fn test_merge_keeps_latest_value_per_key() {
    let dir = TempDir::new().unwrap();
    let store = Store::open_with_options(dir.path(), Options::new().max_log_size(10)).unwrap();

    // Both values of "k" end up in different sealed segments; the last
    // put keeps the key out of the active log.
    store.put(b"k", b"old").unwrap();
    store.put(b"k", b"new").unwrap();
    store.put(b"x", b"1").unwrap();

    assert!(store.segment_count() >= 2);
    store.merge_segments().unwrap();

    assert_eq!(store.segment_count(), 1);
    assert_eq!(store.get(b"k").unwrap(), Some(b"new".to_vec()));
}

#[test]
fn test_merge_keeps_newest_record_within_one_segment() {
    let dir = TempDir::new().unwrap();
    let store = Store::open_with_options(dir.path(), Options::new().max_log_size(100)).unwrap();

    // Two records for "k" land in the same segment once the oversized
    // filler forces a rotation.
    store.put(b"k", b"old").unwrap();
    store.put(b"k", b"new").unwrap();
    let filler = vec![b'f'; 100];
    store.put(b"fill1", &filler).unwrap();
    store.put(b"fill2", &filler).unwrap();

    assert!(store.segment_count() >= 2);
    store.merge_segments().unwrap();

    assert_eq!(store.get(b"k").unwrap(), Some(b"new".to_vec()));
    assert_eq!(store.get(b"fill1").unwrap(), Some(filler));
}

#[test]
fn test_merge_result_survives_reopen() {
    let dir = TempDir::new().unwrap();

    {
        let store =
            Store::open_with_options(dir.path(), Options::new().max_log_size(10)).unwrap();
        store.put(b"k1", b"v1").unwrap();
        store.put(b"k2", b"v2").unwrap();
        store.put(b"k3", b"v3").unwrap();
        store.merge_segments().unwrap();
        store.close().unwrap();
    }

    let store = Store::open(dir.path()).unwrap();
    assert_eq!(store.segment_count(), 1);
    assert_eq!(store.get(b"k1").unwrap(), Some(b"v1".to_vec()));
    assert_eq!(store.get(b"k2").unwrap(), Some(b"v2".to_vec()));
    assert_eq!(store.get(b"k3").unwrap(), Some(b"v3".to_vec()));
}

#[test]
fn test_failed_merge_changes_nothing() {
    env_logger::try_init().ok();
    let dir = TempDir::new().unwrap();
    let store = Store::open_with_options(dir.path(), Options::new().max_log_size(10)).unwrap();

    store.put(b"k1", b"v1").unwrap();
    store.put(b"k2", b"v2").unwrap();
    store.put(b"k3", b"v3").unwrap();
    store.put(b"k1", b"v1-updated").unwrap();

    let segments_before = segment_files(&dir);
    assert!(segments_before.len() >= 2);

    // Corrupt the size prefix of the segment holding the old "k1" so
    // the merge fails while reading it.
    let victim_name = segments_before
        .iter()
        .find(|name| fs::metadata(dir.path().join(name.as_str())).unwrap().len() > 0)
        .unwrap();
    let victim = dir.path().join(victim_name);
    let mut file = fs::OpenOptions::new().write(true).open(&victim).unwrap();
    file.seek(SeekFrom::Start(0)).unwrap();
    file.write_all(&u32::MAX.to_le_bytes()).unwrap();
    drop(file);

    let result = store.merge_segments();
    assert!(matches!(result, Err(Error::Corruption(_))));

    // The segment list is unchanged and the temporary file is gone.
    assert_eq!(store.segment_count(), segments_before.len());
    assert_eq!(segment_files(&dir), segments_before);
    assert!(!dir.path().join("merged-temp").exists());

    // Keys outside the corrupted segment are still readable.
    assert_eq!(store.get(b"k1").unwrap(), Some(b"v1-updated".to_vec()));
}
