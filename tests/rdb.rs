//! Snapshot loading end-to-end: a hand-built RDB file loaded at startup
//! is immediately visible through GET, KEYS, and CONFIG GET.

mod common;

use std::io::Write;
use std::sync::Arc;

use common::{bulk, spawn_server, TestClient};
use redlite::config::Config;
use redlite::rdb;
use redlite::resp::RespValue;
use redlite::store::Store;

/// A minimal valid snapshot: header, one database section, one key with
/// no expiry, EOF marker plus checksum placeholder.
fn minimal_snapshot() -> Vec<u8> {
    let mut bytes = b"REDIS0011".to_vec();
    bytes.push(0xFE);
    bytes.push(0x00);
    bytes.extend_from_slice(b"\x00\x06orange\x09raspberry");
    bytes.push(0xFF);
    bytes.extend_from_slice(&[0u8; 8]);
    bytes
}

#[tokio::test]
async fn test_snapshot_fidelity_over_the_wire() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dump.rdb");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(&minimal_snapshot()).unwrap();

    // Load the way startup does, then serve the resulting store.
    let snapshot = rdb::load_file(&path).unwrap();
    let store = Arc::new(Store::new());
    assert_eq!(snapshot.apply(&store).await, 1);

    let config = Config {
        port: 0,
        master_addr: None,
        dir: Some(dir.path().to_string_lossy().to_string()),
        dbfilename: Some("dump.rdb".to_string()),
    };
    let addr = spawn_server(config, store).await;

    let mut client = TestClient::connect(addr).await.unwrap();
    assert_eq!(client.roundtrip(&["GET", "orange"]).await, bulk("raspberry"));
    assert_eq!(
        client.roundtrip(&["KEYS", "*"]).await,
        RespValue::Array(vec![bulk("orange")])
    );
    assert_eq!(
        client.roundtrip(&["CONFIG", "GET", "dbfilename"]).await,
        RespValue::Array(vec![bulk("dbfilename"), bulk("dump.rdb")])
    );
}

#[tokio::test]
async fn test_missing_snapshot_file_is_a_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.rdb");

    assert!(matches!(
        rdb::load_file(&missing),
        Err(rdb::SnapshotError::Io(_))
    ));
}

#[tokio::test]
async fn test_corrupt_snapshot_file_is_a_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("corrupt.rdb");
    std::fs::write(&path, b"REDIS0011\x42").unwrap();

    assert!(matches!(
        rdb::load_file(&path),
        Err(rdb::SnapshotError::UnsupportedValueType(0x42))
    ));
}
