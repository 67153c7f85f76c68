use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Work,
    Break,
}

/// One nested pause taken inside a work session. Times are stored as
/// locale-rendered display strings, not machine timestamps; see
/// `domain::timeparse` for the reconciliation path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct BreakInterval {
    pub break_start: String,
    pub break_end: String,
    #[serde(default)]
    pub break_description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkPreSession {
    pub start_time: String,
    #[serde(default)]
    pub subjective_mood: String,
    #[serde(default)]
    pub context_tags: Vec<String>,
    #[serde(default)]
    pub energy_level: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkPostSession {
    pub end_time: String,
    pub total_duration_minutes: i64,
    pub break_duration_minutes: i64,
    pub net_focus_minutes: i64,
    #[serde(default)]
    pub output_rating: String,
    #[serde(default)]
    pub end_mood: String,
    #[serde(default)]
    pub distraction_level: String,
    #[serde(default)]
    pub user_notes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkSessionRecord {
    pub session_id: String,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    #[serde(default)]
    pub job_category: String,
    pub pre_session: WorkPreSession,
    #[serde(default)]
    pub breaks: Vec<BreakInterval>,
    pub post_session: WorkPostSession,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BreakPreSession {
    pub start_time: String,
    #[serde(default)]
    pub subjective_mood: String,
    #[serde(default)]
    pub energy_level: i64,
    #[serde(default)]
    pub planned_duration: i64,
    #[serde(default)]
    pub context_tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BreakPostSession {
    pub end_time: String,
    pub total_duration_minutes: i64,
    #[serde(default)]
    pub guilt_rating: String,
    #[serde(default)]
    pub recovery_rating: String,
    #[serde(default)]
    pub user_notes: String,
}

/// A whole session logged as a break, as opposed to a pause nested inside a
/// work session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BreakSessionRecord {
    pub session_id: String,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    #[serde(default)]
    pub trigger: String,
    #[serde(default)]
    pub intent: String,
    #[serde(default)]
    pub activities: Vec<String>,
    pub pre_session: BreakPreSession,
    pub post_session: BreakPostSession,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DailyBioMetrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sleep_bedtime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sleep_waketime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sleep_duration_hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waking_condition: Option<String>,
    #[serde(default)]
    pub physical_state: Vec<String>,
}

/// The unit of remote storage: one log per calendar date, holding the day's
/// bio-metrics plus the two independently appended record collections.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DailyLog {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_bio_metrics: Option<DailyBioMetrics>,
    #[serde(default)]
    pub sessions: Vec<WorkSessionRecord>,
    #[serde(default)]
    pub break_sessions: Vec<BreakSessionRecord>,
}

impl WorkSessionRecord {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.session_id, "session.session_id")?;
        validate_non_empty(&self.pre_session.start_time, "session.pre_session.start_time")?;
        if self.post_session.total_duration_minutes < 0 {
            return Err("session.post_session.total_duration_minutes must be >= 0".to_string());
        }
        if self.post_session.break_duration_minutes < 0 {
            return Err("session.post_session.break_duration_minutes must be >= 0".to_string());
        }
        Ok(())
    }
}

impl BreakSessionRecord {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.session_id, "break_session.session_id")?;
        validate_non_empty(
            &self.pre_session.start_time,
            "break_session.pre_session.start_time",
        )?;
        if self.post_session.total_duration_minutes < 0 {
            return Err(
                "break_session.post_session.total_duration_minutes must be >= 0".to_string(),
            );
        }
        Ok(())
    }
}

pub(crate) fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod samples {
    use super::*;

    pub fn work_record(session_id: &str, start_time: &str) -> WorkSessionRecord {
        WorkSessionRecord {
            session_id: session_id.to_string(),
            kind: ActivityKind::Work,
            job_category: "Coding".to_string(),
            pre_session: WorkPreSession {
                start_time: start_time.to_string(),
                subjective_mood: "Focused".to_string(),
                context_tags: vec!["Caffeinated".to_string()],
                energy_level: 7,
            },
            breaks: vec![BreakInterval {
                break_start: "9:20:00 AM".to_string(),
                break_end: "9:25:00 AM".to_string(),
                break_description: "Coffee".to_string(),
            }],
            post_session: WorkPostSession {
                end_time: "9:50:00 AM".to_string(),
                total_duration_minutes: 50,
                break_duration_minutes: 5,
                net_focus_minutes: 45,
                output_rating: "High".to_string(),
                end_mood: "Focused".to_string(),
                distraction_level: "Low".to_string(),
                user_notes: String::new(),
            },
        }
    }

    pub fn break_record(session_id: &str, start_time: &str) -> BreakSessionRecord {
        BreakSessionRecord {
            session_id: session_id.to_string(),
            kind: ActivityKind::Break,
            trigger: "Fatigue".to_string(),
            intent: "Recovery".to_string(),
            activities: vec!["Walking".to_string()],
            pre_session: BreakPreSession {
                start_time: start_time.to_string(),
                subjective_mood: "Drained".to_string(),
                energy_level: 3,
                planned_duration: 15,
                context_tags: Vec::new(),
            },
            post_session: BreakPostSession {
                end_time: "8:15:00 AM".to_string(),
                total_duration_minutes: 15,
                guilt_rating: "None".to_string(),
                recovery_rating: "High".to_string(),
                user_notes: String::new(),
            },
        }
    }
}
