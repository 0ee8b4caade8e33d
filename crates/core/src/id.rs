// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ID newtypes and generation.
//!
//! Every identifier in devicelab is a string at heart: ADB serials, driver
//! session handles, document keys, queue tickets. The newtypes exist so a
//! `DeviceId` can never be passed where a `QueueId` belongs; they are minted
//! once at a boundary (admission, discovery, report start) and after that
//! only compared, hashed, and printed.

/// Define a newtype ID wrapper around `String`.
///
/// Generates `new()`, `as_str()`, and `Display`. Ids derive `Eq + Hash` so
/// they can key the registry and queue maps, and serde so they travel in
/// documents and events unchanged.
#[macro_export]
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

/// Generates unique identifiers
pub trait IdGen: Clone + Send + Sync {
    fn next(&self) -> String;
}

/// UUID-based ID generator, used where an id has no natural key (queue
/// tickets and their split clones).
#[derive(Clone, Copy, Default)]
pub struct UuidIdGen;

impl IdGen for UuidIdGen {
    fn next(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
