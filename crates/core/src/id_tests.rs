// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::HashMap;

crate::define_id! {
    /// Test-only id type.
    pub struct ProbeId;
}

#[test]
fn new_display_and_as_str_agree() {
    let id = ProbeId::new("dev-1");
    assert_eq!(id.to_string(), "dev-1");
    assert_eq!(id.as_str(), "dev-1");
}

#[test]
fn ids_key_hash_maps() {
    let mut map = HashMap::new();
    map.insert(ProbeId::new("a"), 1);
    map.insert(ProbeId::new("b"), 2);
    assert_eq!(map.get(&ProbeId::new("a")), Some(&1));
    assert_ne!(ProbeId::new("a"), ProbeId::new("b"));
}

#[test]
fn ids_roundtrip_through_json_as_plain_strings() {
    let id = ProbeId::new("q-42");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"q-42\"");
    let back: ProbeId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}

#[test]
fn uuid_gen_produces_unique_ids() {
    let gen = UuidIdGen;
    let a = gen.next();
    let b = gen.next();
    assert_ne!(a, b);
    assert_eq!(a.len(), 36);
}
