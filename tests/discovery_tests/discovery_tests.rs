//! Discovery Tests
//!
//! Tests for publishing, listing and removing discovery records.

use std::fs;

use cartremote::discovery::{Discovery, DiscoveryRecord};
use cartremote::{Callbacks, Config, Server, PROTOCOL_VERSION};
use tempfile::tempdir;

// =============================================================================
// Record Tests
// =============================================================================

#[test]
fn test_publish_writes_json() {
    let dir = tempdir().unwrap();
    let discovery = Discovery::publish(dir.path(), 8123).unwrap();

    let name = discovery.path().file_name().unwrap().to_str().unwrap();
    assert_eq!(name, format!("cartremote-remote.{}.json", std::process::id()));

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(discovery.path()).unwrap()).unwrap();
    assert_eq!(json["pid"], std::process::id());
    assert_eq!(json["host"], "127.0.0.1");
    assert_eq!(json["port"], 8123);
    assert_eq!(json["remotingVersion"], PROTOCOL_VERSION);
    assert!(json["startedAt"].as_str().unwrap().ends_with('Z'));
}

#[test]
fn test_publish_creates_directory() {
    let dir = tempdir().unwrap();
    let nested = dir.path().join("a").join("b");
    let discovery = Discovery::publish(&nested, 1).unwrap();
    assert!(discovery.path().exists());
}

#[test]
fn test_drop_removes_file() {
    let dir = tempdir().unwrap();
    let discovery = Discovery::publish(dir.path(), 8000).unwrap();
    let path = discovery.path().to_path_buf();
    assert!(path.exists());

    drop(discovery);
    assert!(!path.exists());
}

#[test]
fn test_remove_deletes_file() {
    let dir = tempdir().unwrap();
    let discovery = Discovery::publish(dir.path(), 8000).unwrap();
    let path = discovery.path().to_path_buf();

    discovery.remove().unwrap();
    assert!(!path.exists());
}

#[test]
fn test_record_round_trips_through_list() {
    let dir = tempdir().unwrap();
    let discovery = Discovery::publish(dir.path(), 9001).unwrap();

    let records = Discovery::list(dir.path()).unwrap();
    assert_eq!(records, vec![discovery.record().clone()]);
}

#[test]
fn test_list_sorts_newest_first_and_skips_junk() {
    let dir = tempdir().unwrap();

    let older = DiscoveryRecord {
        pid: 1,
        host: "127.0.0.1".to_string(),
        port: 8000,
        started_at: "2024-01-01T00:00:00.000Z".to_string(),
        remoting_version: "v1".to_string(),
    };
    let newer = DiscoveryRecord {
        pid: 2,
        started_at: "2025-06-01T12:00:00.000Z".to_string(),
        port: 8001,
        ..older.clone()
    };

    for record in [&older, &newer] {
        fs::write(
            dir.path().join(format!("cartremote-remote.{}.json", record.pid)),
            serde_json::to_string(record).unwrap(),
        )
        .unwrap();
    }
    fs::write(dir.path().join("cartremote-remote.3.json"), "not json").unwrap();
    fs::write(dir.path().join("notes.txt"), "{}").unwrap();

    let records = Discovery::list(dir.path()).unwrap();
    assert_eq!(records, vec![newer, older]);
}

#[test]
fn test_list_missing_directory_errors() {
    let dir = tempdir().unwrap();
    assert!(Discovery::list(&dir.path().join("missing")).is_err());
}

// =============================================================================
// Server Integration
// =============================================================================

#[test]
fn test_server_publishes_and_removes_record() {
    let dir = tempdir().unwrap();
    let config = Config::builder()
        .port(0)
        .discovery_dir(dir.path())
        .build();

    let mut server = Server::new(config, Callbacks::new()).unwrap();
    let port = server.local_addr().unwrap().port();
    let path = server.discovery().unwrap().path().to_path_buf();
    assert!(path.exists());
    assert_eq!(Discovery::list(dir.path()).unwrap()[0].port, port);

    server.shutdown();
    assert!(server.discovery().is_none());
    assert!(!path.exists());
}

#[test]
fn test_server_without_discovery() {
    let dir = tempdir().unwrap();
    let config = Config::builder()
        .port(0)
        .discovery(false)
        .discovery_dir(dir.path())
        .build();

    let server = Server::new(config, Callbacks::new()).unwrap();
    assert!(server.is_listening());
    assert!(server.discovery().is_none());
    assert!(Discovery::list(dir.path()).unwrap().is_empty());
}
