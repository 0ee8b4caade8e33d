// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn noop_never_matches() {
    let matcher = NoopMatcher;
    let result = matcher.find_template(b"png", "t1").await.unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn fake_matches_where_placed() {
    let matcher = FakeMatcher::new();
    let placed = TemplateMatch {
        x: 100,
        y: 200,
        width: 40,
        height: 40,
        score: 0.97,
    };
    matcher.place("t1", placed);

    let found = matcher.find_template(b"png", "t1").await.unwrap().unwrap();
    assert_eq!(found, placed);
    assert_eq!(found.center(), (120, 220));

    matcher.clear("t1");
    assert!(matcher.find_template(b"png", "t1").await.unwrap().is_none());
}
