use std::fs;

use super::{addr, mac};
use crate::config::{ConfigError, QueueConfig, TunnelConfig};
use crate::frame::MacAddr;
use crate::queue::{QueueKind, mem_from_frames};
use crate::sim::SimTime;
use crate::wire::Capacity;

#[test]
fn empty_json_gives_runtime_defaults() {
    let cfg = TunnelConfig::from_json_str("{}").expect("parse");
    assert_eq!(cfg, TunnelConfig::default());
    assert_eq!(cfg.timeout(), SimTime::from_secs(20));
    assert_eq!(cfg.echo_interval(), SimTime::from_millis(1_000));
    assert_eq!(cfg.fragmentation_threshold, 1280 - 46);
    assert_eq!(cfg.queue.kind, QueueKind::None);
    assert_eq!(cfg.queue.max_bytes, mem_from_frames(64));
    assert_eq!(cfg.server_address, None);
    assert!(cfg.enabled);
}

#[test]
fn full_json_is_parsed() {
    let cfg = TunnelConfig::from_json_str(
        r#"{
            "interface_id": "02:00:00:00:00:0a",
            "timeout_ms": 5000,
            "echo_interval_ms": 250,
            "fragmentation_threshold": 600,
            "queue": { "kind": "drop_tail", "max_bytes": 3000 },
            "capacity": { "from_client_to_server": 10, "from_server_to_client": 20 },
            "server_address": "10.0.0.1:4711",
            "enabled": false
        }"#,
    )
    .expect("parse");
    assert_eq!(cfg.interface_id, mac(10));
    assert_eq!(cfg.timeout(), SimTime::from_secs(5));
    assert_eq!(cfg.echo_interval(), SimTime::from_millis(250));
    assert_eq!(cfg.fragmentation_threshold, 600);
    assert_eq!(
        cfg.queue,
        QueueConfig {
            kind: QueueKind::DropTail,
            max_bytes: 3000,
        }
    );
    assert_eq!(
        cfg.capacity,
        Capacity {
            from_client_to_server: 10,
            from_server_to_client: 20,
        }
    );
    assert_eq!(cfg.server_address, Some(addr("10.0.0.1:4711")));
    assert!(!cfg.enabled);
    assert_eq!(cfg.queue.build().capacity_bytes(), 3000);
}

#[test]
fn zero_intervals_are_rejected() {
    for (raw, field) in [
        (r#"{"timeout_ms": 0}"#, "timeout_ms"),
        (r#"{"echo_interval_ms": 0}"#, "echo_interval_ms"),
    ] {
        match TunnelConfig::from_json_str(raw) {
            Err(ConfigError::Invalid { field: f, .. }) => assert_eq!(f, field),
            other => panic!("expected invalid {field}, got {other:?}"),
        }
    }
}

#[test]
fn multicast_interface_id_is_rejected() {
    let cfg = TunnelConfig::with_id(MacAddr::BROADCAST);
    let err = cfg.validate().expect_err("broadcast id");
    assert!(err.to_string().contains("interface_id"));
}

#[test]
fn malformed_json_is_a_parse_error() {
    assert!(matches!(
        TunnelConfig::from_json_str(r#"{"timeout_ms": "soon"}"#),
        Err(ConfigError::Json(_))
    ));
    assert!(matches!(
        TunnelConfig::from_json_str(r#"{"interface_id": "not-a-mac"}"#),
        Err(ConfigError::Json(_))
    ));
}

#[test]
fn from_path_reads_a_file() {
    let dir = std::env::temp_dir().join(format!("p2ptun-config-{}", std::process::id()));
    fs::create_dir_all(&dir).expect("create temp dir");
    let path = dir.join("tunnel.json");
    fs::write(&path, r#"{"timeout_ms": 7000}"#).expect("write config");

    let cfg = TunnelConfig::from_path(&path).expect("load");
    assert_eq!(cfg.timeout_ms, 7000);

    let missing = dir.join("missing.json");
    match TunnelConfig::from_path(&missing) {
        Err(ConfigError::Io { path, .. }) => assert!(path.ends_with("missing.json")),
        other => panic!("expected io error, got {other:?}"),
    }
    let _ = fs::remove_dir_all(&dir);
}
