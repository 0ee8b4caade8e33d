// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;

#[test]
#[serial]
fn missing_config_file_means_defaults() {
    let tmp = tempfile::tempdir().unwrap();
    std::env::set_var("DL_DATA_DIR", tmp.path());
    let (data_dir, config) = Config::load().unwrap();
    std::env::remove_var("DL_DATA_DIR");

    assert_eq!(data_dir, tmp.path());
    assert!(config.mjpeg_port_base.is_none());
    assert_eq!(config.event_capacity(), crate::event_bus::DEFAULT_EVENT_CAPACITY);
}

#[test]
#[serial]
fn config_file_overrides_are_read() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(
        tmp.path().join("daemon.toml"),
        "mjpeg_port_base = 9500\nevent_capacity = 64\ninventory_scan_secs = 0\n",
    )
    .unwrap();
    std::env::set_var("DL_DATA_DIR", tmp.path());
    let (_, config) = Config::load().unwrap();
    std::env::remove_var("DL_DATA_DIR");

    assert_eq!(config.mjpeg_port_base, Some(9500));
    assert_eq!(config.event_capacity(), 64);
    assert_eq!(config.inventory_scan_secs, Some(0));
}

#[test]
#[serial]
fn malformed_config_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("daemon.toml"), "mjpeg_port_base = \"lots\"").unwrap();
    std::env::set_var("DL_DATA_DIR", tmp.path());
    let err = Config::load().unwrap_err();
    std::env::remove_var("DL_DATA_DIR");
    assert!(matches!(err, LifecycleError::InvalidConfig(_)));
}

#[test]
#[serial]
fn data_dir_override_in_config_wins() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(
        tmp.path().join("daemon.toml"),
        "data_dir = \"/tmp/elsewhere\"",
    )
    .unwrap();
    std::env::set_var("DL_DATA_DIR", tmp.path());
    let (data_dir, _) = Config::load().unwrap();
    std::env::remove_var("DL_DATA_DIR");
    assert_eq!(data_dir, PathBuf::from("/tmp/elsewhere"));
}
