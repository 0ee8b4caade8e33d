// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! POSIX 5-field cron expressions.
//!
//! The stored dialect is minute/hour/day-of-month/month/day-of-week with
//! `*`, `a-b`, `a,b,c`, `*/n`, and literal values. Evaluation delegates to
//! a full cron engine (with a pinned seconds field) so `next_run_at` is
//! exact rather than approximated.

use chrono::{DateTime, Utc};
use std::str::FromStr;

use crate::error::EngineError;

/// A validated 5-field cron expression.
#[derive(Debug, Clone)]
pub struct CronExpr {
    expression: String,
    schedule: cron::Schedule,
}

impl CronExpr {
    /// Parse and validate a 5-field expression.
    pub fn parse(expression: &str) -> Result<Self, EngineError> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(EngineError::InvalidCron(format!(
                "expected 5 fields, got {}: {expression}",
                fields.len()
            )));
        }
        // The evaluator also accepts names (JAN, MON) and extensions the
        // stored dialect does not; reject those up front.
        for field in &fields {
            if !field
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '*' | ',' | '-' | '/'))
            {
                return Err(EngineError::InvalidCron(format!(
                    "invalid field {field:?} in {expression}"
                )));
            }
        }

        let with_seconds = format!("0 {expression}");
        let schedule = cron::Schedule::from_str(&with_seconds)
            .map_err(|e| EngineError::InvalidCron(format!("{expression}: {e}")))?;
        Ok(Self {
            expression: expression.to_string(),
            schedule,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Next fire time strictly after the given instant, as epoch ms.
    ///
    /// Pure in (expression, now): disabling and re-enabling a schedule at
    /// the same wall time yields the same answer.
    pub fn next_after_ms(&self, epoch_ms: u64) -> Option<u64> {
        let now = DateTime::<Utc>::from_timestamp_millis(epoch_ms as i64)?;
        self.schedule
            .after(&now)
            .next()
            .map(|t| t.timestamp_millis() as u64)
    }
}

#[cfg(test)]
#[path = "cron_tests.rs"]
mod tests;
