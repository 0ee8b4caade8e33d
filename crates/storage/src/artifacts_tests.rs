// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn screenshot_lands_under_report_and_device() {
    let dir = tempfile::tempdir().unwrap();
    let artifacts = ArtifactStore::new(dir.path());
    let report = ReportId::parallel(1000);
    let device = DeviceId::new("192.168.0.12:5555");

    let path = artifacts
        .write_screenshot(&report, &device, "n3", ScreenshotKind::Failed, 2000, b"png")
        .unwrap();

    assert!(path.ends_with("n3_failed_2000.png"));
    assert!(path
        .to_string_lossy()
        .contains("reports/screenshots/pr-1000/192.168.0.12_5555"));
    assert_eq!(std::fs::read(&path).unwrap(), b"png");
}

#[test]
fn video_lands_under_report() {
    let dir = tempfile::tempdir().unwrap();
    let artifacts = ArtifactStore::new(dir.path());
    let report = ReportId::parallel(1000);
    let device = DeviceId::new("A");

    let path = artifacts.write_video(&report, &device, b"mp4").unwrap();
    assert!(path.ends_with("reports/videos/pr-1000/A.mp4"));
    assert_eq!(std::fs::read(&path).unwrap(), b"mp4");
}

#[test]
fn distinct_runs_never_collide() {
    let dir = tempfile::tempdir().unwrap();
    let artifacts = ArtifactStore::new(dir.path());
    let device = DeviceId::new("A");

    let p1 = artifacts
        .write_video(&ReportId::parallel(1), &device, b"one")
        .unwrap();
    let p2 = artifacts
        .write_video(&ReportId::parallel(2), &device, b"two")
        .unwrap();
    assert_ne!(p1, p2);
}
