#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! Integration tests for reload detection on a repository layout
//!
//! Graph files are replaced the way git replaces them: written next to the
//! target and renamed over it.

use commitgraph_format::{CommitGraphBuilder, CommitRecord, ObjectId};
use commitgraph_storage::{CommitGraphFile, GraphConfig, SharedCommitGraph};
use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

fn graph_bytes(commits: u8) -> Vec<u8> {
    let mut builder = CommitGraphBuilder::new();
    let mut previous: Option<ObjectId> = None;
    for n in 0..commits {
        let id = ObjectId::from_data(&[b'c', n]);
        builder.add_commit(
            CommitRecord::new(id, ObjectId::from_data(&[b't', n]))
                .with_parents(previous.into_iter().collect())
                .with_generation(u32::from(n) + 1)
                .with_commit_time(1_700_000_000 + u64::from(n)),
        );
        previous = Some(id);
    }
    builder.build().unwrap()
}

fn replace(path: &Path, bytes: &[u8]) {
    let staging = path.with_extension("lock");
    std::fs::write(&staging, bytes).unwrap();
    std::fs::rename(&staging, path).unwrap();
}

fn objects_dir() -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let objects = dir.path().join("objects");
    std::fs::create_dir_all(objects.join("info")).unwrap();
    (dir, objects)
}

#[test]
fn fresh_after_identical_reload() {
    let (_dir, objects) = objects_dir();
    let config = GraphConfig::for_objects_dir(&objects);
    replace(&config.path, &graph_bytes(3));

    let graph = CommitGraphFile::open_with(&config).unwrap();
    assert!(!graph.needs_refresh(None));

    replace(&config.path, &graph_bytes(3));
    assert!(!graph.needs_refresh(None));

    let reloaded = CommitGraphFile::open_with(&config).unwrap();
    assert_eq!(reloaded.checksum(), graph.checksum());
}

#[test]
fn stale_after_size_change() {
    let (_dir, objects) = objects_dir();
    let config = GraphConfig::for_objects_dir(&objects);
    replace(&config.path, &graph_bytes(3));
    let graph = CommitGraphFile::open_with(&config).unwrap();

    replace(&config.path, &graph_bytes(4));
    assert!(graph.needs_refresh(None));
}

#[test]
fn stale_when_file_is_gone_or_elsewhere() {
    let (dir, objects) = objects_dir();
    let config = GraphConfig::for_objects_dir(&objects);
    replace(&config.path, &graph_bytes(2));
    let graph = CommitGraphFile::open_with(&config).unwrap();

    let copy = dir.path().join("copy-of-graph");
    std::fs::copy(&config.path, &copy).unwrap();
    assert!(!graph.needs_refresh(Some(&copy)));

    std::fs::remove_file(&config.path).unwrap();
    assert!(graph.needs_refresh(None));
    assert!(graph.needs_refresh(Some(dir.path())));
}

#[test]
fn readers_keep_old_snapshot_across_reload() {
    let (_dir, objects) = objects_dir();
    let config = GraphConfig::for_objects_dir(&objects);
    replace(&config.path, &graph_bytes(5));

    let shared = Arc::new(SharedCommitGraph::new(config.clone()));
    assert!(shared.refresh().unwrap());
    let old = shared.snapshot().unwrap();

    let readers: Vec<_> = (0..4u8)
        .map(|n| {
            let shared = Arc::clone(&shared);
            thread::spawn(move || {
                let graph = shared.snapshot().unwrap();
                let entry = graph.find(&ObjectId::from_data(&[b'c', n + 1]), 40).unwrap();
                let parent = graph.entry_parent(&entry, 0).unwrap();
                assert_eq!(parent.id, ObjectId::from_data(&[b'c', n]));
            })
        })
        .collect();
    for reader in readers {
        reader.join().unwrap();
    }

    replace(&config.path, &graph_bytes(6));
    assert!(shared.refresh().unwrap());
    assert_eq!(shared.snapshot().unwrap().len(), 6);
    assert_eq!(old.len(), 5);
    assert!(old.needs_refresh(None));

    let tip = old.find(&ObjectId::from_data(&[b'c', 4]), 40).unwrap();
    assert_eq!(tip.generation, 5);
    assert_eq!(tip.commit_time, 1_700_000_004);
}

#[test]
fn unmapped_configuration_reads_into_memory() {
    let (_dir, objects) = objects_dir();
    let config = GraphConfig::for_objects_dir(&objects).with_mmap(false);
    replace(&config.path, &graph_bytes(2));

    let graph = CommitGraphFile::open_with(&config).unwrap();
    assert!(!graph.as_bytes().is_empty());
    assert!(!graph.graph().as_bytes().is_empty());
    graph.verify().unwrap();
    graph.close();
}
