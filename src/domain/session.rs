use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::duration;
use crate::domain::models::{
    ActivityKind, BreakInterval, BreakPostSession, BreakPreSession, BreakSessionRecord,
    WorkPostSession, WorkPreSession, WorkSessionRecord, validate_non_empty,
};
use crate::domain::timeparse;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SessionPhase {
    Idle,
    PreSession,
    Active,
    PostSession,
}

/// The in-progress session being assembled across the pre-session, active,
/// and post-session phases. The whole struct is what gets snapshotted for
/// crash recovery, so every field is serde-visible and instants are UTC.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionDraft {
    pub phase: SessionPhase,
    pub activity_kind: ActivityKind,

    // Pre-session form state (work).
    #[serde(default)]
    pub job_category: String,
    #[serde(default)]
    pub subjective_mood: String,
    #[serde(default)]
    pub energy_level: String,
    #[serde(default)]
    pub context_tags: Vec<String>,

    // Pre-session form state (standalone break).
    #[serde(default)]
    pub break_trigger: String,
    #[serde(default)]
    pub break_intent: String,
    #[serde(default)]
    pub planned_duration: String,
    #[serde(default)]
    pub break_activities: Vec<String>,

    // Active-phase state.
    pub start_instant: Option<DateTime<Utc>>,
    #[serde(default)]
    pub on_break: bool,
    pub current_break_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub break_reason: String,
    #[serde(default)]
    pub completed_breaks: Vec<BreakInterval>,

    // Post-session form state.
    #[serde(default)]
    pub output_rating: String,
    #[serde(default)]
    pub end_mood: String,
    #[serde(default)]
    pub distraction_level: String,
    #[serde(default)]
    pub guilt_rating: String,
    #[serde(default)]
    pub recovery_rating: String,
    #[serde(default)]
    pub readiness_to_return: String,
    #[serde(default)]
    pub user_notes: String,

    pub saved_at: Option<DateTime<Utc>>,
}

impl SessionDraft {
    /// Opens the pre-session form for the chosen activity kind.
    pub fn begin(activity_kind: ActivityKind) -> Self {
        SessionDraft {
            phase: SessionPhase::PreSession,
            activity_kind,
            job_category: String::new(),
            subjective_mood: String::new(),
            energy_level: "5".to_string(),
            context_tags: Vec::new(),
            break_trigger: String::new(),
            break_intent: String::new(),
            planned_duration: "15".to_string(),
            break_activities: Vec::new(),
            start_instant: None,
            on_break: false,
            current_break_start: None,
            break_reason: String::new(),
            completed_breaks: Vec::new(),
            output_rating: "Medium".to_string(),
            end_mood: String::new(),
            distraction_level: "Low".to_string(),
            guilt_rating: "None".to_string(),
            recovery_rating: "Medium".to_string(),
            readiness_to_return: "5".to_string(),
            user_notes: String::new(),
            saved_at: None,
        }
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), String> {
        if self.phase != SessionPhase::PreSession {
            return Err(invalid_transition("start", self.phase));
        }
        match self.activity_kind {
            ActivityKind::Work => {
                validate_non_empty(&self.job_category, "job_category")?;
                validate_non_empty(&self.subjective_mood, "subjective_mood")?;
            }
            ActivityKind::Break => {
                validate_non_empty(&self.break_trigger, "break_trigger")?;
                validate_non_empty(&self.break_intent, "break_intent")?;
            }
        }
        self.start_instant = Some(now);
        self.phase = SessionPhase::Active;
        Ok(())
    }

    pub fn start_break(&mut self, reason: &str, now: DateTime<Utc>) -> Result<(), String> {
        if self.phase != SessionPhase::Active {
            return Err(invalid_transition("start_break", self.phase));
        }
        if self.activity_kind != ActivityKind::Work {
            return Err("breaks can only be paused inside work sessions".to_string());
        }
        if self.on_break {
            return Err("a break is already in progress".to_string());
        }
        validate_non_empty(reason, "break reason")?;
        self.on_break = true;
        self.current_break_start = Some(now);
        self.break_reason = reason.trim().to_string();
        Ok(())
    }

    pub fn resume_work(&mut self, now: DateTime<Utc>) -> Result<(), String> {
        if self.phase != SessionPhase::Active || !self.on_break {
            return Err("no break in progress".to_string());
        }
        self.close_open_break(now);
        Ok(())
    }

    /// Ends the active phase. An open break is closed at the stop instant so
    /// the draft never carries a dangling interval into the post-session form.
    pub fn stop(&mut self, now: DateTime<Utc>) -> Result<(), String> {
        if self.phase != SessionPhase::Active {
            return Err(invalid_transition("stop", self.phase));
        }
        if self.on_break {
            self.close_open_break(now);
        }
        self.phase = SessionPhase::PostSession;
        Ok(())
    }

    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        match self.start_instant {
            Some(start) => now - start,
            None => Duration::zero(),
        }
    }

    fn close_open_break(&mut self, now: DateTime<Utc>) {
        if let Some(break_start) = self.current_break_start.take() {
            self.completed_breaks.push(BreakInterval {
                break_start: timeparse::render_display(break_start),
                break_end: timeparse::render_display(now),
                break_description: std::mem::take(&mut self.break_reason),
            });
        }
        self.on_break = false;
    }

    /// Builds the permanent work record from the draft, reconciling breaks
    /// against the session bounds. The save instant is the session end.
    pub fn finalize_work(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<WorkSessionRecord, String> {
        if self.phase != SessionPhase::PostSession {
            return Err(invalid_transition("save", self.phase));
        }
        if self.activity_kind != ActivityKind::Work {
            return Err("draft is not a work session".to_string());
        }
        let start = self
            .start_instant
            .ok_or_else(|| "draft has no start instant".to_string())?;
        let breakdown = duration::compute_focus(
            timeparse::local_naive(start),
            timeparse::local_naive(now),
            &self.completed_breaks,
            timeparse::local_date(start),
        )?;

        let record = WorkSessionRecord {
            session_id: session_id.to_string(),
            kind: ActivityKind::Work,
            job_category: self.job_category.clone(),
            pre_session: WorkPreSession {
                start_time: timeparse::render_display(start),
                subjective_mood: self.subjective_mood.clone(),
                context_tags: self.context_tags.clone(),
                energy_level: self.energy_level.trim().parse().unwrap_or(5),
            },
            breaks: self.completed_breaks.clone(),
            post_session: WorkPostSession {
                end_time: timeparse::render_display(now),
                total_duration_minutes: breakdown.total_minutes,
                break_duration_minutes: breakdown.break_minutes,
                net_focus_minutes: breakdown.net_focus_minutes,
                output_rating: self.output_rating.clone(),
                end_mood: self.end_mood.clone(),
                distraction_level: self.distraction_level.clone(),
                user_notes: self.user_notes.clone(),
            },
        };
        record.validate()?;
        Ok(record)
    }

    pub fn finalize_break(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<BreakSessionRecord, String> {
        if self.phase != SessionPhase::PostSession {
            return Err(invalid_transition("save", self.phase));
        }
        if self.activity_kind != ActivityKind::Break {
            return Err("draft is not a break session".to_string());
        }
        let start = self
            .start_instant
            .ok_or_else(|| "draft has no start instant".to_string())?;
        let total_minutes = duration::compute_break_total(
            timeparse::local_naive(start),
            timeparse::local_naive(now),
        )?;

        let record = BreakSessionRecord {
            session_id: session_id.to_string(),
            kind: ActivityKind::Break,
            trigger: self.break_trigger.clone(),
            intent: self.break_intent.clone(),
            activities: self.break_activities.clone(),
            pre_session: BreakPreSession {
                start_time: timeparse::render_display(start),
                subjective_mood: self.subjective_mood.clone(),
                energy_level: self.energy_level.trim().parse().unwrap_or(5),
                planned_duration: self.planned_duration.trim().parse().unwrap_or(15),
                context_tags: self.context_tags.clone(),
            },
            post_session: BreakPostSession {
                end_time: timeparse::render_display(now),
                total_duration_minutes: total_minutes,
                guilt_rating: self.guilt_rating.clone(),
                recovery_rating: self.recovery_rating.clone(),
                user_notes: self.user_notes.clone(),
            },
        };
        record.validate()?;
        Ok(record)
    }
}

fn invalid_transition(action: &str, phase: SessionPhase) -> String {
    format!("cannot {action} while session phase is {phase:?}")
}
