use chrono::{NaiveDate, NaiveDateTime};

use crate::domain::models::BreakInterval;
use crate::domain::timeparse;

/// Outcome of reconciling a session's wall-clock bounds against its recorded
/// break intervals. Indexes in `unparsed_breaks` refer to the input slice;
/// those intervals contributed zero minutes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusBreakdown {
    pub total_minutes: i64,
    pub break_minutes: i64,
    pub net_focus_minutes: i64,
    pub unparsed_breaks: Vec<usize>,
}

/// Computes total, break, and net-focus minutes for a work session.
///
/// Break intervals that fail to parse are skipped rather than failing the
/// whole computation, and intervals whose end precedes their start count as
/// zero. Net focus is total minus break time and is deliberately not clamped,
/// so inconsistent hand-edited records surface as negative values.
pub fn compute_focus(
    session_start: NaiveDateTime,
    session_end: NaiveDateTime,
    breaks: &[BreakInterval],
    date: NaiveDate,
) -> Result<FocusBreakdown, String> {
    if session_end < session_start {
        return Err("session end time is before its start time".to_string());
    }
    let total_minutes = rounded_minutes(session_start, session_end);

    let mut break_seconds: i64 = 0;
    let mut unparsed_breaks = Vec::new();
    for (index, interval) in breaks.iter().enumerate() {
        let start = timeparse::parse(date, &interval.break_start);
        let end = timeparse::parse(date, &interval.break_end);
        match (start, end) {
            (Ok(start), Ok(end)) => {
                if end > start {
                    break_seconds += (end - start).num_seconds();
                }
            }
            _ => unparsed_breaks.push(index),
        }
    }
    let break_minutes = (break_seconds as f64 / 60.0).round() as i64;

    Ok(FocusBreakdown {
        total_minutes,
        break_minutes,
        net_focus_minutes: total_minutes - break_minutes,
        unparsed_breaks,
    })
}

/// Whole-session duration for a standalone break, in rounded minutes.
pub fn compute_break_total(
    session_start: NaiveDateTime,
    session_end: NaiveDateTime,
) -> Result<i64, String> {
    if session_end < session_start {
        return Err("break end time is before its start time".to_string());
    }
    Ok(rounded_minutes(session_start, session_end))
}

fn rounded_minutes(start: NaiveDateTime, end: NaiveDateTime) -> i64 {
    ((end - start).num_seconds() as f64 / 60.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 16).expect("valid date")
    }

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        date().and_hms_opt(hour, minute, 0).expect("valid time")
    }

    fn interval(start: &str, end: &str) -> BreakInterval {
        BreakInterval {
            break_start: start.to_string(),
            break_end: end.to_string(),
            break_description: String::new(),
        }
    }

    #[test]
    fn fifty_minute_session_with_one_break() {
        let breakdown = compute_focus(
            at(9, 0),
            at(9, 50),
            &[interval("9:20:00 AM", "9:25:00 AM")],
            date(),
        )
        .expect("breakdown");
        assert_eq!(breakdown.total_minutes, 50);
        assert_eq!(breakdown.break_minutes, 5);
        assert_eq!(breakdown.net_focus_minutes, 45);
        assert!(breakdown.unparsed_breaks.is_empty());
    }

    #[test]
    fn zero_length_break_contributes_nothing() {
        let breakdown = compute_focus(
            at(9, 0),
            at(10, 0),
            &[interval("9:30:00 AM", "9:30:00 AM")],
            date(),
        )
        .expect("breakdown");
        assert_eq!(breakdown.break_minutes, 0);
        assert_eq!(breakdown.net_focus_minutes, 60);
    }

    #[test]
    fn inverted_break_interval_counts_as_zero() {
        let breakdown = compute_focus(
            at(9, 0),
            at(10, 0),
            &[interval("9:40:00 AM", "9:30:00 AM")],
            date(),
        )
        .expect("breakdown");
        assert_eq!(breakdown.break_minutes, 0);
        assert!(breakdown.unparsed_breaks.is_empty());
    }

    #[test]
    fn unparseable_break_is_skipped_and_reported() {
        let breakdown = compute_focus(
            at(9, 0),
            at(10, 0),
            &[
                interval("garbage", "9:25:00 AM"),
                interval("9:30:00 AM", "9:40:00 AM"),
            ],
            date(),
        )
        .expect("breakdown");
        assert_eq!(breakdown.unparsed_breaks, vec![0]);
        assert_eq!(breakdown.break_minutes, 10);
        assert_eq!(breakdown.net_focus_minutes, 50);
    }

    #[test]
    fn inverted_session_bounds_are_an_error() {
        assert!(compute_focus(at(10, 0), at(9, 0), &[], date()).is_err());
    }

    #[test]
    fn net_focus_can_go_negative() {
        let breakdown = compute_focus(
            at(9, 0),
            at(9, 10),
            &[interval("9:00:00 AM", "10:00:00 AM")],
            date(),
        )
        .expect("breakdown");
        assert_eq!(breakdown.net_focus_minutes, -50);
    }

    #[test]
    fn break_total_for_standalone_break() {
        assert_eq!(compute_break_total(at(8, 0), at(8, 15)), Ok(15));
        assert!(compute_break_total(at(8, 15), at(8, 0)).is_err());
    }

    proptest! {
        #[test]
        fn net_plus_break_equals_total(
            session_start in 0u32..600,
            session_len in 0u32..600,
            break_offset in 0u32..200,
            break_len in 0u32..200,
        ) {
            let start = date()
                .and_hms_opt(0, 0, 0)
                .expect("midnight")
                + chrono::Duration::minutes(i64::from(session_start));
            let end = start + chrono::Duration::minutes(i64::from(session_len));
            let break_start = start + chrono::Duration::minutes(i64::from(break_offset));
            let break_end = break_start + chrono::Duration::minutes(i64::from(break_len));
            let breaks = vec![BreakInterval {
                break_start: break_start.format("%H:%M:%S").to_string(),
                break_end: break_end.format("%H:%M:%S").to_string(),
                break_description: String::new(),
            }];

            let breakdown = compute_focus(start, end, &breaks, date()).expect("breakdown");
            prop_assert_eq!(
                breakdown.net_focus_minutes + breakdown.break_minutes,
                breakdown.total_minutes
            );
            prop_assert!(breakdown.unparsed_breaks.is_empty());
        }
    }
}
