//! Integration test: the chunk storage contract over OpenDAL services
//!
//! Runs the same checks against the OpenDAL `Memory` service and an
//! `Fs` operator rooted in a temp dir.

use std::sync::Arc;

use opendal::Operator;
use strata_core::config::StorageConfig;
use strata_core::{Address, EncryptedChunk, OverwriteStrategy, PutStatus};
use strata_storage::{build_operator, chunk_path, ChunkStorage, OpendalChunkStorage};
use tempfile::TempDir;

fn memory_storage() -> OpendalChunkStorage {
    let op = Operator::new(opendal::services::Memory::default())
        .expect("memory operator")
        .finish();
    OpendalChunkStorage::new(op, "test/chunks")
}

fn chunk(n: u8) -> EncryptedChunk {
    EncryptedChunk::new(Address::from_bytes([n; 32]), vec![n; 100 + n as usize])
}

async fn exercise_contract(store: &dyn ChunkStorage) {
    assert_eq!(store.count().await.unwrap(), 0);
    assert!(store.get(&chunk(1).address).await.unwrap().is_none());

    for n in 1..=3 {
        let status = store.put(&chunk(n), OverwriteStrategy::Deny).await.unwrap();
        assert_eq!(status, PutStatus::Success);
    }

    // Second put of the same address is a dedup hit
    let mut imposter = chunk(2);
    imposter.envelope = b"different bytes".to_vec();
    assert_eq!(
        store.put(&imposter, OverwriteStrategy::Deny).await.unwrap(),
        PutStatus::OverwriteDenied
    );
    assert_eq!(store.get(&chunk(2).address).await.unwrap().unwrap(), chunk(2));

    assert!(store.exists(&chunk(3).address).await.unwrap());
    assert!(!store.exists(&chunk(4).address).await.unwrap());
    assert_eq!(store.count().await.unwrap(), 3);

    let mut listed = store.list().await.unwrap();
    listed.sort();
    assert_eq!(
        listed,
        vec![chunk(1).address, chunk(2).address, chunk(3).address]
    );
    store.flush().await.unwrap();
}

#[tokio::test]
async fn memory_service_honors_contract() {
    let store = memory_storage();
    exercise_contract(&store).await;
}

#[tokio::test]
async fn fs_service_honors_contract() {
    let tmp = TempDir::new().unwrap();
    let cfg = StorageConfig {
        backend: "fs".into(),
        root: tmp.path().to_path_buf(),
        prefix: "chunks".into(),
    };
    let store = OpendalChunkStorage::new(build_operator(&cfg).unwrap(), cfg.prefix.clone());
    exercise_contract(&store).await;

    // Objects land in the sharded layout on disk
    let rel = chunk_path("chunks", &chunk(1).address);
    assert!(tmp.path().join(rel).is_file());
}

fn fs_storage(tmp: &TempDir) -> OpendalChunkStorage {
    let cfg = StorageConfig {
        backend: "fs".into(),
        root: tmp.path().to_path_buf(),
        prefix: "chunks".into(),
    };
    OpendalChunkStorage::new(build_operator(&cfg).unwrap(), cfg.prefix)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_deny_puts_have_one_winner() {
    let tmp = TempDir::new().unwrap();
    // Two independent store handles on one root, as two repositories would have
    let left = Arc::new(fs_storage(&tmp));
    let right = Arc::new(fs_storage(&tmp));

    for round in 0..200u16 {
        let mut bytes = [0x5Au8; 32];
        bytes[..2].copy_from_slice(&round.to_be_bytes());
        let address = Address::from_bytes(bytes);
        let ours = EncryptedChunk::new(address, b"written by left".to_vec());
        let theirs = EncryptedChunk::new(address, b"written by right".to_vec());

        let a = {
            let store = Arc::clone(&left);
            let chunk = ours.clone();
            tokio::spawn(async move { store.put(&chunk, OverwriteStrategy::Deny).await })
        };
        let b = {
            let store = Arc::clone(&right);
            let chunk = theirs.clone();
            tokio::spawn(async move { store.put(&chunk, OverwriteStrategy::Deny).await })
        };
        let a = a.await.unwrap().unwrap();
        let b = b.await.unwrap().unwrap();

        let winners = [a, b].iter().filter(|s| s.is_stored()).count();
        assert_eq!(winners, 1, "round {round}: {a:?} / {b:?}");
        let stored = left.get(&address).await.unwrap().unwrap();
        let expected = if a.is_stored() { &ours } else { &theirs };
        assert_eq!(&stored, expected, "round {round}: winner's bytes were replaced");
    }
}

#[tokio::test]
async fn allow_overwrites_existing_object() {
    let store = memory_storage();
    store.put(&chunk(7), OverwriteStrategy::Allow).await.unwrap();
    let mut replacement = chunk(7);
    replacement.envelope = b"replaced".to_vec();
    assert_eq!(
        store.put(&replacement, OverwriteStrategy::Allow).await.unwrap(),
        PutStatus::Success
    );
    let stored = store.get(&chunk(7).address).await.unwrap().unwrap();
    assert_eq!(stored.envelope, b"replaced");
}

#[tokio::test]
async fn foreign_objects_are_not_listed() {
    let store = memory_storage();
    store.put(&chunk(1), OverwriteStrategy::Deny).await.unwrap();
    store
        .operator()
        .write("test/chunks/README", b"not a chunk".to_vec())
        .await
        .unwrap();
    assert_eq!(store.list().await.unwrap(), vec![chunk(1).address]);
}
