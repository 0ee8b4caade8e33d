// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use dl_core::{ScheduleId, ScheduleOutcome};

fn entry(n: u64) -> ScheduleHistoryEntry {
    ScheduleHistoryEntry {
        schedule_id: ScheduleId::new("sch-1"),
        schedule_name: "nightly".into(),
        fired_at_ms: n,
        outcome: ScheduleOutcome::Triggered,
        message: None,
        report_id: None,
    }
}

#[test]
fn append_then_read_preserves_order() {
    let dir = tempfile::tempdir().unwrap();
    let history = ScheduleHistoryStore::new(dir.path());

    history.append(entry(1)).unwrap();
    history.append(entry(2)).unwrap();

    let entries = history.read().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].fired_at_ms, 1);
    assert_eq!(entries[1].fired_at_ms, 2);
}

#[test]
fn read_of_missing_file_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let history = ScheduleHistoryStore::new(dir.path());
    assert!(history.read().unwrap().is_empty());
}

#[test]
fn ring_caps_at_limit() {
    let dir = tempfile::tempdir().unwrap();
    let history = ScheduleHistoryStore::new(dir.path());

    for n in 0..(HISTORY_CAP as u64 + 5) {
        history.append(entry(n)).unwrap();
    }

    let entries = history.read().unwrap();
    assert_eq!(entries.len(), HISTORY_CAP);
    // Oldest entries fell off
    assert_eq!(entries[0].fired_at_ms, 5);
    assert_eq!(entries.last().map(|e| e.fired_at_ms), Some(HISTORY_CAP as u64 + 4));
}
