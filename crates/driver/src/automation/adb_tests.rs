// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn window_size_parses_physical() {
    let out = "Physical size: 1080x2400\n";
    assert_eq!(parse_window_size(out), Some((1080, 2400)));
}

#[test]
fn window_size_prefers_override() {
    let out = "Physical size: 1080x2400\nOverride size: 720x1280\n";
    assert_eq!(parse_window_size(out), Some((720, 1280)));
}

#[test]
fn window_size_rejects_garbage() {
    assert_eq!(parse_window_size("error: no devices"), None);
}

#[test]
fn devices_parses_states_and_models() {
    let out = "List of devices attached\n\
               emulator-5554          device product:sdk model:sdk_gphone64 device:emu64x\n\
               R3CN30ABCD             unauthorized usb:1-1\n\
               192.168.0.12:5555      offline\n";
    let devices = parse_devices(out);
    assert_eq!(devices.len(), 3);
    assert_eq!(devices[0].id, DeviceId::new("emulator-5554"));
    assert_eq!(devices[0].status, DeviceStatus::Connected);
    assert_eq!(devices[0].model.as_deref(), Some("sdk_gphone64"));
    assert_eq!(devices[1].status, DeviceStatus::Unauthorized);
    assert_eq!(devices[2].status, DeviceStatus::Offline);
    assert!(devices[2].model.is_none());
}

#[test]
fn devices_skips_blank_and_bad_lines() {
    let out = "List of devices attached\n\n* daemon started successfully\n";
    assert!(parse_devices(out).is_empty());
}

const DUMP: &str = r#"<?xml version='1.0'?><hierarchy rotation="0">
<node index="0" text="" resource-id="com.shop:id/login_btn" class="android.widget.Button" content-desc="Log in" checkable="false" bounds="[48,1712][1032,1856]"/>
<node index="1" text="Welcome back" resource-id="" class="android.widget.TextView" content-desc="" bounds="[48,300][1032,420]"/>
</hierarchy>"#;

#[test]
fn find_by_full_resource_id() {
    let selector = Selector::new(SelectorStrategy::Id, "com.shop:id/login_btn");
    let rect = find_in_dump(DUMP, &selector).unwrap();
    assert_eq!(rect.x, 48);
    assert_eq!(rect.y, 1712);
    assert_eq!(rect.center(), (540, 1784));
}

#[test]
fn find_by_short_resource_id_suffix() {
    let selector = Selector::new(SelectorStrategy::Id, "login_btn");
    assert!(find_in_dump(DUMP, &selector).is_some());
}

#[test]
fn find_by_accessibility_id() {
    let selector = Selector::new(SelectorStrategy::AccessibilityId, "Log in");
    assert!(find_in_dump(DUMP, &selector).is_some());
}

#[test]
fn find_by_text() {
    let selector = Selector::new(SelectorStrategy::Text, "Welcome back");
    let rect = find_in_dump(DUMP, &selector).unwrap();
    assert_eq!(rect.height, 120);
}

#[test]
fn find_misses_absent_element() {
    let selector = Selector::new(SelectorStrategy::Text, "Goodbye");
    assert!(find_in_dump(DUMP, &selector).is_none());
}

#[yare::parameterized(
    simple   = { r#"bounds="[0,0][100,200]""#, 0, 0, 100, 200 },
    offset   = { r#"class="x" bounds="[10,20][110,220]""#, 10, 20, 100, 200 },
)]
fn bounds_parse(tag: &str, x: i32, y: i32, w: i32, h: i32) {
    let rect = parse_bounds(tag).unwrap();
    assert_eq!((rect.x, rect.y, rect.width, rect.height), (x, y, w, h));
}

#[test]
fn bounds_parse_rejects_malformed() {
    assert!(parse_bounds(r#"bounds="[0,0]"#).is_none());
    assert!(parse_bounds("no bounds here").is_none());
}
