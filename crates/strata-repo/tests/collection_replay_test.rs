//! Integration test: collection replay and repository wiring
//!
//! Uses a filesystem-backed repository opened from config plus a key file,
//! the way the CLI opens one.

use std::collections::BTreeMap;

use strata_core::config::StrataConfig;
use strata_core::StrataError;
use strata_crypto::RepositoryKeys;
use strata_repo::{Change, Repository};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn open_repo(tmp: &TempDir) -> Repository {
    let mut config = StrataConfig::default();
    config.storage.backend = "fs".into();
    config.storage.root = tmp.path().join("repo");
    config.keys.key_file = tmp.path().join("keys.json");
    if !config.keys.key_file.exists() {
        RepositoryKeys::generate().save(&config.keys.key_file).unwrap();
    }
    Repository::open(&config).unwrap()
}

fn map(pairs: &[(&str, &str)]) -> BTreeMap<Vec<u8>, Vec<u8>> {
    pairs
        .iter()
        .map(|(k, v)| (k.as_bytes().to_vec(), v.as_bytes().to_vec()))
        .collect()
}

#[tokio::test]
async fn delete_after_upserts_replays_per_version() {
    let tmp = TempDir::new().unwrap();
    let repo = open_repo(&tmp);
    let cancel = CancellationToken::new();
    let collection = repo.collection("sets", "daily");

    let v0 = collection
        .write_changes(
            None,
            &[
                Change::upsert("a", "1"),
                Change::upsert("b", "2"),
                Change::upsert("c", "3"),
                Change::upsert("d", "4"),
            ],
            &cancel,
        )
        .await
        .unwrap();
    assert_eq!(v0, 0);
    let after_v0 = collection.values(&cancel).await.unwrap();
    assert_eq!(after_v0.entries, map(&[("a", "1"), ("b", "2"), ("c", "3"), ("d", "4")]));

    let v1 = collection
        .write_changes(Some(v0), &[Change::delete("b")], &cancel)
        .await
        .unwrap();
    assert_eq!(v1, 1);

    let latest = collection.values(&cancel).await.unwrap();
    assert_eq!(latest.version, Some(1));
    assert_eq!(latest.entries, map(&[("a", "1"), ("c", "3"), ("d", "4")]));

    // Historical snapshot is unchanged by later versions
    assert_eq!(collection.values_at(0, &cancel).await.unwrap(), after_v0);
}

#[tokio::test]
async fn state_survives_reopen() {
    let tmp = TempDir::new().unwrap();
    let cancel = CancellationToken::new();
    let data = b"persisted across process restarts".repeat(1000);

    let written = {
        let repo = open_repo(&tmp);
        repo.collection("ns", "c")
            .write_changes(None, &[Change::upsert("k", "v")], &cancel)
            .await
            .unwrap();
        repo.streams().write_bytes(&data, &cancel).await.unwrap()
    };

    let repo = open_repo(&tmp);
    let back = repo
        .streams()
        .read_to_vec(written.level, written.root, &cancel)
        .await
        .unwrap();
    assert_eq!(back, data);
    let snapshot = repo.collection("ns", "c").values(&cancel).await.unwrap();
    assert_eq!(snapshot.get(b"k"), Some(&b"v"[..]));
}

#[tokio::test]
async fn collections_are_isolated_by_namespace_and_name() {
    let tmp = TempDir::new().unwrap();
    let repo = open_repo(&tmp);
    let cancel = CancellationToken::new();

    repo.collection("ns", "one")
        .write_changes(None, &[Change::upsert("k", "one")], &cancel)
        .await
        .unwrap();
    repo.collection("other", "one")
        .write_changes(None, &[Change::upsert("k", "other")], &cancel)
        .await
        .unwrap();

    assert!(repo.collection("ns", "two").values(&cancel).await.unwrap().is_empty());
    let one = repo.collection("ns", "one").values(&cancel).await.unwrap();
    assert_eq!(one.get(b"k"), Some(&b"one"[..]));
}

#[tokio::test]
async fn stale_writer_is_rejected_after_commit() {
    let tmp = TempDir::new().unwrap();
    let repo = open_repo(&tmp);
    let cancel = CancellationToken::new();
    let writer_a = repo.collection("ns", "shared");
    let writer_b = repo.collection("ns", "shared");

    // Both read "no versions yet", A commits first
    writer_a
        .write_changes(None, &[Change::upsert("owner", "a")], &cancel)
        .await
        .unwrap();
    let err = writer_b
        .write_changes(None, &[Change::upsert("owner", "b")], &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, StrataError::ConcurrentModification { .. }));

    let snapshot = writer_b.values(&cancel).await.unwrap();
    assert_eq!(snapshot.get(b"owner"), Some(&b"a"[..]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sequence_claims_have_one_winner() {
    let tmp = TempDir::new().unwrap();
    let repo = open_repo(&tmp);
    let dictionary = repo.dictionary();

    for sequence in 0..100u64 {
        let claim = |value: &'static [u8]| {
            let dictionary = dictionary.clone();
            tokio::spawn(async move { dictionary.put_value(b"ns", b"k", sequence, value).await })
        };
        let a = claim(&b"first"[..]);
        let b = claim(&b"second"[..]);
        let a = a.await.unwrap().unwrap();
        let b = b.await.unwrap().unwrap();
        assert!(a ^ b, "sequence {sequence}: both claimed = {}", a && b);

        let stored = dictionary.get_value(b"ns", b"k", sequence).await.unwrap();
        let expected = if a { &b"first"[..] } else { &b"second"[..] };
        assert_eq!(stored.as_deref(), Some(expected));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_collection_writers_one_commits() {
    let tmp = TempDir::new().unwrap();
    let repo = open_repo(&tmp);
    let cancel = CancellationToken::new();

    for round in 0..50 {
        let name = format!("race-{round}");
        let write = |owner: &'static str| {
            let collection = repo.collection("ns", name.clone());
            let cancel = cancel.clone();
            tokio::spawn(async move {
                collection
                    .write_changes(None, &[Change::upsert("owner", owner)], &cancel)
                    .await
            })
        };
        let a = write("a");
        let b = write("b");
        let a = a.await.unwrap();
        let b = b.await.unwrap();

        let (winner, loser) = match (&a, &b) {
            (Ok(0), Err(e)) => ("a", e),
            (Err(e), Ok(0)) => ("b", e),
            other => panic!("round {round}: expected one commit, got {other:?}"),
        };
        assert!(loser.is_retryable(), "round {round}: {loser:?}");

        let snapshot = repo.collection("ns", name.clone()).values(&cancel).await.unwrap();
        assert_eq!(snapshot.version, Some(0));
        assert_eq!(snapshot.get(b"owner"), Some(winner.as_bytes()));
    }
}

#[test]
fn missing_key_file_is_a_config_error() {
    let tmp = TempDir::new().unwrap();
    let mut config = StrataConfig::default();
    config.storage.root = tmp.path().join("repo");
    config.keys.key_file = tmp.path().join("absent.json");
    let err = Repository::open(&config).unwrap_err();
    assert!(matches!(err, StrataError::Config(_)), "got {err:?}");
}
