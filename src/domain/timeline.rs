use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::models::{BreakSessionRecord, WorkSessionRecord};
use crate::domain::timeparse;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimelineKind {
    Work,
    Break,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum TimelineRecord {
    Work(WorkSessionRecord),
    Break(BreakSessionRecord),
}

/// One row of a day's merged timeline. `original_index` points back into the
/// per-kind collection the record came from, so edits and deletes can address
/// the stored record directly.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DailyTimelineEntry {
    pub kind: TimelineKind,
    pub sort_key: u32,
    pub original_index: usize,
    pub record: TimelineRecord,
}

/// Merges a day's work and break records into one start-time-ordered view.
///
/// Records whose start time cannot be parsed sort to minute 0 rather than
/// being dropped. The sort is stable, and work entries are enumerated before
/// break entries, so ties keep that relative order.
pub fn merge(
    date: NaiveDate,
    sessions: &[WorkSessionRecord],
    break_sessions: &[BreakSessionRecord],
) -> Vec<DailyTimelineEntry> {
    let mut entries: Vec<DailyTimelineEntry> = Vec::with_capacity(
        sessions.len() + break_sessions.len(),
    );

    for (original_index, record) in sessions.iter().enumerate() {
        entries.push(DailyTimelineEntry {
            kind: TimelineKind::Work,
            sort_key: sort_key(date, &record.pre_session.start_time),
            original_index,
            record: TimelineRecord::Work(record.clone()),
        });
    }
    for (original_index, record) in break_sessions.iter().enumerate() {
        entries.push(DailyTimelineEntry {
            kind: TimelineKind::Break,
            sort_key: sort_key(date, &record.pre_session.start_time),
            original_index,
            record: TimelineRecord::Break(record.clone()),
        });
    }

    entries.sort_by_key(|entry| entry.sort_key);
    entries
}

fn sort_key(date: NaiveDate, start_time: &str) -> u32 {
    timeparse::minutes_since_midnight(date, start_time).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::samples::{break_record, work_record};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 16).expect("valid date")
    }

    #[test]
    fn merge_orders_by_start_time_across_kinds() {
        let sessions = vec![
            work_record("sess-1", "9:00:00 AM"),
            work_record("sess-2", "2:00:00 PM"),
        ];
        let breaks = vec![break_record("brk-1", "8:00:00 AM")];

        let timeline = merge(date(), &sessions, &breaks);
        let ids: Vec<&str> = timeline
            .iter()
            .map(|entry| match &entry.record {
                TimelineRecord::Work(record) => record.session_id.as_str(),
                TimelineRecord::Break(record) => record.session_id.as_str(),
            })
            .collect();
        assert_eq!(ids, vec!["brk-1", "sess-1", "sess-2"]);
        assert_eq!(timeline[0].kind, TimelineKind::Break);
        assert_eq!(timeline[1].sort_key, 540);
    }

    #[test]
    fn original_index_tracks_per_kind_position() {
        let sessions = vec![
            work_record("sess-1", "11:00:00 AM"),
            work_record("sess-2", "9:00:00 AM"),
        ];
        let timeline = merge(date(), &sessions, &[]);
        assert_eq!(timeline[0].original_index, 1);
        assert_eq!(timeline[1].original_index, 0);
    }

    #[test]
    fn unparseable_start_sorts_to_minute_zero() {
        let sessions = vec![work_record("sess-1", "9:00:00 AM")];
        let breaks = vec![break_record("brk-1", "not a time")];

        let timeline = merge(date(), &sessions, &breaks);
        assert_eq!(timeline[0].sort_key, 0);
        assert_eq!(timeline[0].kind, TimelineKind::Break);
        assert_eq!(timeline.len(), 2);
    }

    #[test]
    fn ties_keep_work_before_break() {
        let sessions = vec![work_record("sess-1", "9:00:00 AM")];
        let breaks = vec![break_record("brk-1", "9:00:00 AM")];
        let timeline = merge(date(), &sessions, &breaks);
        assert_eq!(timeline[0].kind, TimelineKind::Work);
        assert_eq!(timeline[1].kind, TimelineKind::Break);
    }
}
