// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Template matcher collaborator.
//!
//! Image matching (and the OCR behind it) runs in an external service; the
//! interpreter only needs "is this template on screen, and where". The noop
//! implementation is used when no matcher is configured.

use async_trait::async_trait;
use thiserror::Error;

/// Errors from template matching
#[derive(Debug, Error)]
pub enum MatcherError {
    #[error("unknown template: {0}")]
    UnknownTemplate(String),
    #[error("matcher failed: {0}")]
    Failed(String),
}

/// A located template occurrence, in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemplateMatch {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub score: f32,
}

impl TemplateMatch {
    /// Center point, used as the tap target.
    pub fn center(&self) -> (i32, i32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }
}

/// Adapter for the image/OCR matching collaborator.
#[async_trait]
pub trait TemplateMatcher: Clone + Send + Sync + 'static {
    /// Search a PNG screenshot for a stored template.
    async fn find_template(
        &self,
        screenshot_png: &[u8],
        template_id: &str,
    ) -> Result<Option<TemplateMatch>, MatcherError>;
}

/// Matcher used when no matching service is configured: never matches.
#[derive(Clone, Copy, Default)]
pub struct NoopMatcher;

#[async_trait]
impl TemplateMatcher for NoopMatcher {
    async fn find_template(
        &self,
        _screenshot_png: &[u8],
        template_id: &str,
    ) -> Result<Option<TemplateMatch>, MatcherError> {
        tracing::debug!(template_id, "no matcher configured, reporting no match");
        Ok(None)
    }
}

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeMatcher;

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    /// Scripted matcher: templates match wherever tests place them.
    #[derive(Clone, Default)]
    pub struct FakeMatcher {
        matches: Arc<Mutex<HashMap<String, TemplateMatch>>>,
    }

    impl FakeMatcher {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make a template visible at the given match.
        pub fn place(&self, template_id: &str, m: TemplateMatch) {
            self.matches.lock().insert(template_id.to_string(), m);
        }

        /// Remove a template.
        pub fn clear(&self, template_id: &str) {
            self.matches.lock().remove(template_id);
        }
    }

    #[async_trait]
    impl TemplateMatcher for FakeMatcher {
        async fn find_template(
            &self,
            _screenshot_png: &[u8],
            template_id: &str,
        ) -> Result<Option<TemplateMatch>, MatcherError> {
            Ok(self.matches.lock().get(template_id).copied())
        }
    }
}

#[cfg(test)]
#[path = "matcher_tests.rs"]
mod tests;
