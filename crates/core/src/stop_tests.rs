// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn starts_unstopped() {
    let signal = StopSignal::new();
    assert!(!signal.is_stopped());
}

#[test]
fn stop_is_visible_to_clones() {
    let signal = StopSignal::new();
    let shared = signal.clone();
    signal.stop();
    assert!(shared.is_stopped());
}

#[test]
fn stop_is_idempotent() {
    let signal = StopSignal::new();
    signal.stop();
    signal.stop();
    assert!(signal.is_stopped());
}
