// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Document types owned by the store (not by the orchestration core).

use serde::{Deserialize, Serialize};

/// Collection names under the data root.
pub mod collections {
    pub const DEVICES: &str = "devices";
    pub const SCENARIOS: &str = "scenarios";
    pub const PACKAGES: &str = "packages";
    pub const CATEGORIES: &str = "categories";
    pub const SCHEDULES: &str = "schedules";
    pub const PARALLEL_REPORTS: &str = "reports/parallel";
    pub const TEST_REPORTS: &str = "reports/tests";
}

/// An app package a scenario targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageDoc {
    pub id: String,
    pub name: String,
    /// Android application id, e.g. `com.example.shop`.
    #[serde(rename = "appPackage")]
    pub app_package: String,
    #[serde(default, rename = "categoryId", skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
}

/// A user-defined grouping of packages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryDoc {
    pub id: String,
    pub name: String,
}
