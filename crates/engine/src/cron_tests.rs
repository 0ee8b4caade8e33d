// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

/// 2026-01-01T00:00:00Z
const JAN_1: u64 = 1_767_225_600_000;
const MINUTE: u64 = 60_000;

#[yare::parameterized(
    every_30_min  = { "*/30 * * * *" },
    nine_weekdays = { "0 9 * * 1-5" },
    lists_ranges  = { "5,10 1-3 * * *" },
    wildcard      = { "* * * * *" },
    literal       = { "15 14 1 1 0" },
)]
fn parse_accepts_posix_dialect(expr: &str) {
    let cron = CronExpr::parse(expr).unwrap();
    assert_eq!(cron.expression(), expr);
}

#[yare::parameterized(
    four_fields  = { "* * * *" },
    six_fields   = { "0 * * * * *" },
    month_names  = { "0 0 * JAN *" },
    day_names    = { "0 0 * * MON" },
    garbage      = { "not a cron" },
    bad_range    = { "99-100 * * * *" },
)]
fn parse_rejects_everything_else(expr: &str) {
    assert!(matches!(
        CronExpr::parse(expr),
        Err(EngineError::InvalidCron(_))
    ));
}

#[test]
fn next_is_strictly_after_now() {
    let cron = CronExpr::parse("*/30 * * * *").unwrap();
    // Exactly on a fire slot: the next fire is the following slot
    let next = cron.next_after_ms(JAN_1).unwrap();
    assert_eq!(next, JAN_1 + 30 * MINUTE);
}

#[test]
fn half_hourly_fires_at_zero_and_thirty() {
    let cron = CronExpr::parse("*/30 * * * *").unwrap();
    let at_ten_past = cron.next_after_ms(JAN_1 + 10 * MINUTE).unwrap();
    assert_eq!(at_ten_past, JAN_1 + 30 * MINUTE);
    let at_forty_past = cron.next_after_ms(JAN_1 + 40 * MINUTE).unwrap();
    assert_eq!(at_forty_past, JAN_1 + 60 * MINUTE);
}

#[test]
fn evaluation_is_pure_in_expression_and_now() {
    let a = CronExpr::parse("17 3 * * *").unwrap();
    let b = CronExpr::parse("17 3 * * *").unwrap();
    let now = JAN_1 + 123_456;
    assert_eq!(a.next_after_ms(now), b.next_after_ms(now));
    // Repeated evaluation does not drift
    assert_eq!(a.next_after_ms(now), a.next_after_ms(now));
}

#[test]
fn daily_expression_rolls_to_next_day() {
    let cron = CronExpr::parse("0 9 * * *").unwrap();
    let after_nine = JAN_1 + 10 * 60 * MINUTE;
    let next = cron.next_after_ms(after_nine).unwrap();
    // 2026-01-02T09:00:00Z
    assert_eq!(next, JAN_1 + 33 * 60 * MINUTE);
}
