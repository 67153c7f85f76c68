use crate::domain::duration;
use crate::domain::models::{
    BreakInterval, BreakSessionRecord, DailyBioMetrics, DailyLog, WorkSessionRecord,
};
use crate::domain::timeline::{self, DailyTimelineEntry, TimelineKind};
use crate::domain::timeparse;
use crate::infrastructure::error::CoreError;
use crate::infrastructure::log_store::LogStoreClient;
use chrono::NaiveDate;
use std::future::Future;
use std::sync::Arc;
use tokio::time::{sleep, Duration as TokioDuration};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u8,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
        }
    }
}

/// Edited fields for a stored work session. Times are the display strings the
/// record carries; they are reparsed and the durations recomputed on save.
#[derive(Debug, Clone)]
pub struct WorkSessionEdit {
    pub job_category: String,
    pub start_time: String,
    pub end_time: String,
    pub subjective_mood: String,
    pub energy_level: i64,
    pub context_tags: Vec<String>,
    pub breaks: Vec<BreakInterval>,
    pub output_rating: String,
    pub end_mood: String,
    pub distraction_level: String,
    pub user_notes: String,
}

#[derive(Debug, Clone)]
pub struct BreakSessionEdit {
    pub trigger: String,
    pub intent: String,
    pub activities: Vec<String>,
    pub start_time: String,
    pub end_time: String,
    pub guilt_rating: String,
    pub recovery_rating: String,
    pub user_notes: String,
}

/// Read/write access to the per-day history stored in the remote log store.
/// All mutations are read-modify-write against the whole daily log.
pub struct HistoryService<S>
where
    S: LogStoreClient,
{
    store: Arc<S>,
    retry_policy: RetryPolicy,
}

impl<S> HistoryService<S>
where
    S: LogStoreClient,
{
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub async fn daily_log(&self, date: NaiveDate) -> Result<DailyLog, CoreError> {
        Ok(self
            .with_retry(|| self.store.get_by_date(date))
            .await?
            .unwrap_or_default())
    }

    /// The day's work and break records merged into one start-time-ordered
    /// view. A missing day yields an empty timeline.
    pub async fn daily_timeline(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<DailyTimelineEntry>, CoreError> {
        let log = self.daily_log(date).await?;
        Ok(timeline::merge(date, &log.sessions, &log.break_sessions))
    }

    pub async fn append_work_session(
        &self,
        date: NaiveDate,
        record: WorkSessionRecord,
    ) -> Result<(), CoreError> {
        record.validate().map_err(CoreError::Validation)?;
        let mut log = self.daily_log(date).await?;
        log.sessions.push(record);
        self.with_retry(|| self.store.upsert(date, &log)).await
    }

    pub async fn append_break_session(
        &self,
        date: NaiveDate,
        record: BreakSessionRecord,
    ) -> Result<(), CoreError> {
        record.validate().map_err(CoreError::Validation)?;
        let mut log = self.daily_log(date).await?;
        log.break_sessions.push(record);
        self.with_retry(|| self.store.upsert(date, &log)).await
    }

    pub async fn upsert_bio_metrics(
        &self,
        date: NaiveDate,
        metrics: DailyBioMetrics,
    ) -> Result<(), CoreError> {
        let mut log = self.daily_log(date).await?;
        log.daily_bio_metrics = Some(metrics);
        self.with_retry(|| self.store.upsert(date, &log)).await
    }

    /// Rewrites one stored work session. Session bounds and every break are
    /// reparsed and revalidated, and the duration fields are recomputed rather
    /// than trusted from the caller.
    pub async fn edit_work_session(
        &self,
        date: NaiveDate,
        index: usize,
        edit: WorkSessionEdit,
    ) -> Result<WorkSessionRecord, CoreError> {
        let mut log = self.require_log(date).await?;
        let record = log.sessions.get_mut(index).ok_or_else(|| {
            CoreError::Validation(format!("no work session at index {index} on {date}"))
        })?;

        let session_start = timeparse::parse(date, &edit.start_time)
            .map_err(|failure| CoreError::Validation(failure.to_string()))?;
        let session_end = timeparse::parse(date, &edit.end_time)
            .map_err(|failure| CoreError::Validation(failure.to_string()))?;

        for (position, interval) in edit.breaks.iter().enumerate() {
            let ordinal = position + 1;
            let break_start = timeparse::parse(date, &interval.break_start).map_err(|_| {
                CoreError::Validation(format!("invalid time format in break #{ordinal}"))
            })?;
            let break_end = timeparse::parse(date, &interval.break_end).map_err(|_| {
                CoreError::Validation(format!("invalid time format in break #{ordinal}"))
            })?;
            if break_start < session_start {
                return Err(CoreError::Validation(format!(
                    "break #{ordinal} starts before the session"
                )));
            }
            if break_end > session_end {
                return Err(CoreError::Validation(format!(
                    "break #{ordinal} ends after the session"
                )));
            }
            if break_end <= break_start {
                return Err(CoreError::Validation(format!(
                    "break #{ordinal} must end after it starts"
                )));
            }
        }

        let breakdown = duration::compute_focus(session_start, session_end, &edit.breaks, date)
            .map_err(CoreError::Validation)?;

        record.job_category = edit.job_category;
        record.pre_session.start_time = edit.start_time;
        record.pre_session.subjective_mood = edit.subjective_mood;
        record.pre_session.energy_level = edit.energy_level;
        record.pre_session.context_tags = edit.context_tags;
        record.breaks = edit.breaks;
        record.post_session.end_time = edit.end_time;
        record.post_session.total_duration_minutes = breakdown.total_minutes;
        record.post_session.break_duration_minutes = breakdown.break_minutes;
        record.post_session.net_focus_minutes = breakdown.net_focus_minutes;
        record.post_session.output_rating = edit.output_rating;
        record.post_session.end_mood = edit.end_mood;
        record.post_session.distraction_level = edit.distraction_level;
        record.post_session.user_notes = edit.user_notes;
        let updated = record.clone();

        self.with_retry(|| self.store.update(date, &log)).await?;
        Ok(updated)
    }

    pub async fn edit_break_session(
        &self,
        date: NaiveDate,
        index: usize,
        edit: BreakSessionEdit,
    ) -> Result<BreakSessionRecord, CoreError> {
        let mut log = self.require_log(date).await?;
        let record = log.break_sessions.get_mut(index).ok_or_else(|| {
            CoreError::Validation(format!("no break session at index {index} on {date}"))
        })?;

        let session_start = timeparse::parse(date, &edit.start_time)
            .map_err(|failure| CoreError::Validation(failure.to_string()))?;
        let session_end = timeparse::parse(date, &edit.end_time)
            .map_err(|failure| CoreError::Validation(failure.to_string()))?;
        let total_minutes = duration::compute_break_total(session_start, session_end)
            .map_err(CoreError::Validation)?;

        record.trigger = edit.trigger;
        record.intent = edit.intent;
        record.activities = edit.activities;
        record.pre_session.start_time = edit.start_time;
        record.post_session.end_time = edit.end_time;
        record.post_session.total_duration_minutes = total_minutes;
        record.post_session.guilt_rating = edit.guilt_rating;
        record.post_session.recovery_rating = edit.recovery_rating;
        record.post_session.user_notes = edit.user_notes;
        let updated = record.clone();

        self.with_retry(|| self.store.update(date, &log)).await?;
        Ok(updated)
    }

    /// Removes a stored record by id. Returns false when nothing matched.
    pub async fn delete_session(
        &self,
        date: NaiveDate,
        kind: TimelineKind,
        session_id: &str,
    ) -> Result<bool, CoreError> {
        let mut log = self.require_log(date).await?;
        let before = log.sessions.len() + log.break_sessions.len();
        match kind {
            TimelineKind::Work => log.sessions.retain(|record| record.session_id != session_id),
            TimelineKind::Break => log
                .break_sessions
                .retain(|record| record.session_id != session_id),
        }
        let removed = before != log.sessions.len() + log.break_sessions.len();
        if removed {
            self.with_retry(|| self.store.update(date, &log)).await?;
        }
        Ok(removed)
    }

    async fn require_log(&self, date: NaiveDate) -> Result<DailyLog, CoreError> {
        self.with_retry(|| self.store.get_by_date(date))
            .await?
            .ok_or_else(|| CoreError::Validation(format!("no daily log stored for {date}")))
    }

    async fn with_retry<T, F, Fut>(&self, operation: F) -> Result<T, CoreError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let max_attempts = self.retry_policy.max_attempts.max(1);
        let mut attempt: u8 = 0;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) if Self::should_retry(&error) && attempt + 1 < max_attempts => {
                    let delay = self
                        .retry_policy
                        .base_delay_ms
                        .saturating_mul(2u64.saturating_pow(attempt as u32));
                    sleep(TokioDuration::from_millis(delay)).await;
                    attempt = attempt.saturating_add(1);
                }
                Err(error) => return Err(error),
            }
        }
    }

    fn should_retry(error: &CoreError) -> bool {
        match error {
            CoreError::Remote(message) => {
                let message = message.to_ascii_lowercase();
                message.contains("network error")
                    || message.contains("timeout")
                    || message.contains("timed out")
                    || message.contains("connection reset")
            }
            _ => false,
        }
    }
}
