//! End-to-end scans over on-disk index trees.

use std::fs;
use std::path::Path;

use idxscan_core::{report, Digest, ScanError, ScanOptions, ScanSession, Scanner};
use idxscan_format::{ChunkListIndex, ChunkOffsetIndex, FormatError, IndexFile, DIGEST_SIZE};
use tempfile::TempDir;

fn digest(tag: u8) -> Digest {
    let mut bytes = [0u8; DIGEST_SIZE];
    bytes[0] = tag;
    bytes[DIGEST_SIZE - 1] = !tag;
    Digest(bytes)
}

fn write_fidx(path: &Path, tags: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let digests = tags.iter().map(|&t| digest(t)).collect();
    IndexFile::from(ChunkListIndex::new(digests, 4096))
        .save(path)
        .unwrap();
}

fn write_didx(path: &Path, tags: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let index = ChunkOffsetIndex::from_chunks(tags.iter().map(|&t| (1024u64, digest(t))));
    IndexFile::from(index).save(path).unwrap();
}

fn scan(root: &Path, workers: usize) -> (ScanSession, idxscan_core::ScanStats) {
    let session = ScanSession::new();
    let scanner = Scanner::new(ScanOptions {
        workers,
        ..ScanOptions::default()
    });
    let stats = scanner.scan(root, &session).unwrap();
    (session, stats)
}

#[test]
fn test_single_file_occurrences_and_dedup() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("vm/100/drive-scsi0.img.fidx");
    // [A, B, A, C]
    write_fidx(&path, &[0xa, 0xb, 0xa, 0xc]);

    let (session, stats) = scan(temp.path(), 4);
    assert_eq!(stats.files_indexed, 1);
    assert_eq!(stats.digests_read, 4);

    let reg = session.read();
    let top = reg.digests.top_by_reference_count(1);
    assert_eq!(top[0].digest, digest(0xa));
    assert_eq!(top[0].count, 2);

    let record = reg.files.get(&path).unwrap();
    assert_eq!(record.unique_chunks(), 3);
    assert!((record.dedup_ratio() - 4.0 / 3.0).abs() < 0.01);
}

#[test]
fn test_worker_count_does_not_change_totals() {
    let temp = TempDir::new().unwrap();
    for i in 0..100u32 {
        let tags: Vec<u8> = (0..8u32).map(|j| ((i * 3 + j) % 41) as u8).collect();
        let name = format!("ns/{}/backup-{i}.fidx", i % 7);
        write_fidx(&temp.path().join(name), &tags);
    }

    let (four, four_stats) = scan(temp.path(), 4);
    let (one, one_stats) = scan(temp.path(), 1);

    assert_eq!(four_stats.files_indexed, 100);
    assert_eq!(one_stats.files_indexed, 100);

    let (four, one) = (four.read(), one.read());
    assert_eq!(four.digests.count(), one.digests.count());
    assert_eq!(four.digests.total_references(), one.digests.total_references());
    assert_eq!(four.digests.total_references(), 800);
    assert_eq!(four.files.len(), one.files.len());
    assert_eq!(
        four.digests.occurrence_histogram(),
        one.digests.occurrence_histogram()
    );
    for (path, record) in four.files.iter() {
        let other = one.files.get(path).unwrap();
        assert_eq!(record.unique_chunks(), other.unique_chunks());
        assert_eq!(record.reference_count(), other.reference_count());
    }
}

#[test]
fn test_rescan_yields_same_sharing_structure() {
    let temp = TempDir::new().unwrap();
    write_fidx(&temp.path().join("a.fidx"), &[1, 2, 3, 1]);
    write_fidx(&temp.path().join("b.fidx"), &[3, 4]);
    write_didx(&temp.path().join("c.didx"), &[4, 4, 5]);

    let (first, _) = scan(temp.path(), 4);
    let (second, _) = scan(temp.path(), 4);
    let (first, second) = (first.read(), second.read());

    assert_eq!(
        report::Summary::of(&first),
        report::Summary::of(&second)
    );

    // Dense indices may differ between runs; compare by digest instead.
    for (path, record) in first.files.iter() {
        let other = second.files.get(path).unwrap();
        let mine: Vec<Digest> = record
            .references()
            .iter()
            .map(|&i| first.digests.digest_at(i).unwrap())
            .collect();
        let theirs: Vec<Digest> = other
            .references()
            .iter()
            .map(|&i| second.digests.digest_at(i).unwrap())
            .collect();
        assert_eq!(mine, theirs);
    }
}

#[test]
fn test_offset_index_files_are_scanned() {
    let temp = TempDir::new().unwrap();
    write_didx(&temp.path().join("ct/101/root.pxar.didx"), &[7, 8, 7]);

    let (session, stats) = scan(temp.path(), 2);
    assert_eq!(stats.files_indexed, 1);
    let reg = session.read();
    assert_eq!(reg.digests.count(), 2);
    let index = reg.digests.index_of(&digest(7)).unwrap();
    assert_eq!(reg.digests.reference_count(index), Some(2));
}

#[test]
fn test_wrong_magic_is_skipped_and_reported() {
    let temp = TempDir::new().unwrap();
    write_fidx(&temp.path().join("good.fidx"), &[1, 2]);
    // An offset index under a chunk-list name
    let bad = temp.path().join("bad.fidx");
    write_didx(&bad, &[3, 4, 5]);

    let (session, stats) = scan(temp.path(), 4);
    assert_eq!(stats.files_queued, 2);
    assert_eq!(stats.files_indexed, 1);
    assert_eq!(stats.files_failed, 1);
    assert_eq!(stats.failures[0].path, bad);
    assert!(matches!(
        stats.failures[0].error,
        FormatError::InvalidMagic { .. }
    ));

    let reg = session.read();
    assert!(reg.files.get(&bad).is_none());
    assert_eq!(reg.digests.count(), 2);
    assert!(reg.digests.index_of(&digest(3)).is_none());
}

#[test]
fn test_truncated_digest_is_ignored() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("trunc.fidx");
    write_fidx(&path, &[1, 2]);
    let mut bytes = fs::read(&path).unwrap();
    bytes.extend_from_slice(&[0xee; 17]);
    fs::write(&path, bytes).unwrap();

    let (session, stats) = scan(temp.path(), 1);
    assert_eq!(stats.files_failed, 0);
    assert_eq!(session.read().digests.total_references(), 2);
}

#[test]
fn test_chunk_store_is_never_read() {
    let temp = TempDir::new().unwrap();
    write_fidx(&temp.path().join("vm/200/disk.fidx"), &[1]);
    // Would fail to decode if it were ever opened
    let store = temp.path().join(".chunks/0000");
    fs::create_dir_all(&store).unwrap();
    fs::write(store.join("broken.fidx"), b"garbage").unwrap();
    write_fidx(&temp.path().join("vm/.chunks/inner.fidx"), &[2]);

    let (session, stats) = scan(temp.path(), 4);
    assert_eq!(stats.files_queued, 1);
    assert_eq!(stats.files_failed, 0);
    assert_eq!(session.read().digests.count(), 1);
}

#[test]
fn test_missing_root_is_fatal() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("does-not-exist");

    let session = ScanSession::new();
    let err = Scanner::default().scan(&root, &session).unwrap_err();
    match err {
        ScanError::Walk { root: reported, .. } => assert_eq!(reported, root),
        other => panic!("unexpected error: {other}"),
    }
    assert!(session.read().files.is_empty());
}

#[cfg(unix)]
#[test]
fn test_nested_walk_error_is_fatal() {
    let temp = TempDir::new().unwrap();
    write_fidx(&temp.path().join("vm/100/disk.fidx"), &[1, 2]);
    // vm/100/loop -> vm: a cycle once links are followed
    std::os::unix::fs::symlink(temp.path().join("vm"), temp.path().join("vm/100/loop")).unwrap();

    // Not followed: the link is just an entry and the scan succeeds
    let (_, stats) = scan(temp.path(), 2);
    assert_eq!(stats.files_indexed, 1);

    let session = ScanSession::new();
    let scanner = Scanner::new(ScanOptions {
        follow_links: true,
        ..ScanOptions::default()
    });
    match scanner.scan(temp.path(), &session).unwrap_err() {
        ScanError::Walk { root, source } => {
            assert_eq!(root, temp.path());
            assert!(source.depth() > 0);
            assert!(source.loop_ancestor().is_some());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_empty_tree() {
    let temp = TempDir::new().unwrap();
    let (session, stats) = scan(temp.path(), 4);
    assert_eq!(stats.files_queued, 0);
    let summary = report::Summary::of(&session.read());
    assert_eq!(summary.total_unique_digests, 0);
    assert_eq!(summary.dedup_ratio(), 0.0);
}
