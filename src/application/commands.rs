use crate::application::advisor::ScheduleAdvisorService;
use crate::application::bootstrap::bootstrap_workspace;
use crate::application::history::HistoryService;
use crate::application::ticker::DisplayTicker;
use crate::domain::models::{ActivityKind, BreakInterval};
use crate::domain::session::{SessionDraft, SessionPhase};
use crate::domain::timeparse;
use crate::infrastructure::advisor_client::ReqwestGeminiClient;
use crate::infrastructure::config::{
    load_advisor_api_key_from_lookup, load_log_store_settings, read_advisor_model,
};
use crate::infrastructure::error::CoreError;
use crate::infrastructure::log_store::{LogStoreClient, ReqwestLogStoreClient};
use crate::infrastructure::snapshot_store::{SessionSnapshotStore, SqliteSnapshotStore};
use chrono::Utc;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id(prefix: &str) -> String {
    let sequence = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{sequence}", Utc::now().timestamp_micros())
}

pub struct AppState {
    config_dir: PathBuf,
    database_path: PathBuf,
    logs_dir: PathBuf,
    runtime: Mutex<RuntimeState>,
    log_guard: Mutex<()>,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, CoreError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let config_dir = workspace_root.join("config");
        let logs_dir = workspace_root.join("logs");

        Ok(Self {
            config_dir,
            database_path: bootstrap.database_path,
            logs_dir,
            runtime: Mutex::new(RuntimeState::default()),
            log_guard: Mutex::new(()),
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn log_info(&self, command: &str, message: &str) {
        self.append_log("info", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("commands.log");
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }
}

#[derive(Debug, Default)]
struct RuntimeState {
    draft: Option<SessionDraft>,
    ticker: Option<DisplayTicker>,
    saving: bool,
}

impl RuntimeState {
    // A save releases the runtime lock across the remote append and then
    // clears the draft; transitions are rejected for that window so a
    // concurrent edit cannot be silently dropped.
    fn reject_if_saving(&self) -> Result<(), CoreError> {
        if self.saving {
            return Err(CoreError::Validation("a save is in flight".to_string()));
        }
        Ok(())
    }
}

/// Optional-field merge for the pre- and post-session forms; only the fields
/// that are present overwrite the draft.
#[derive(Debug, Clone, Default)]
pub struct DraftUpdate {
    pub job_category: Option<String>,
    pub subjective_mood: Option<String>,
    pub energy_level: Option<String>,
    pub context_tags: Option<Vec<String>>,
    pub break_trigger: Option<String>,
    pub break_intent: Option<String>,
    pub planned_duration: Option<String>,
    pub break_activities: Option<Vec<String>>,
    pub output_rating: Option<String>,
    pub end_mood: Option<String>,
    pub distraction_level: Option<String>,
    pub guilt_rating: Option<String>,
    pub recovery_rating: Option<String>,
    pub readiness_to_return: Option<String>,
    pub user_notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SessionStateResponse {
    pub phase: String,
    pub activity_kind: Option<String>,
    pub on_break: bool,
    pub elapsed_ms: i64,
    pub start_time: Option<String>,
    pub completed_breaks: Vec<BreakInterval>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SavedSessionResponse {
    pub date: String,
    pub session_id: String,
    pub kind: String,
    pub total_duration_minutes: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_focus_minutes: Option<i64>,
}

fn phase_name(phase: SessionPhase) -> &'static str {
    match phase {
        SessionPhase::Idle => "idle",
        SessionPhase::PreSession => "pre-session",
        SessionPhase::Active => "active",
        SessionPhase::PostSession => "post-session",
    }
}

fn kind_name(kind: ActivityKind) -> &'static str {
    match kind {
        ActivityKind::Work => "work",
        ActivityKind::Break => "break",
    }
}

fn state_response(draft: Option<&SessionDraft>) -> SessionStateResponse {
    match draft {
        None => SessionStateResponse {
            phase: "idle".to_string(),
            activity_kind: None,
            on_break: false,
            elapsed_ms: 0,
            start_time: None,
            completed_breaks: Vec::new(),
        },
        Some(draft) => SessionStateResponse {
            phase: phase_name(draft.phase).to_string(),
            activity_kind: Some(kind_name(draft.activity_kind).to_string()),
            on_break: draft.on_break,
            elapsed_ms: draft.elapsed(Utc::now()).num_milliseconds().max(0),
            start_time: draft.start_instant.map(|instant| instant.to_rfc3339()),
            completed_breaks: draft.completed_breaks.clone(),
        },
    }
}

fn lock_runtime(state: &AppState) -> Result<MutexGuard<'_, RuntimeState>, CoreError> {
    state
        .runtime
        .lock()
        .map_err(|error| CoreError::Validation(format!("runtime lock poisoned: {error}")))
}

fn snapshot_store(state: &AppState) -> SqliteSnapshotStore {
    SqliteSnapshotStore::new(state.database_path())
}

/// History service backed by the remote log store configured in
/// `config/app.json` plus the environment.
pub fn history_service_from_config(
    state: &AppState,
) -> Result<HistoryService<ReqwestLogStoreClient>, CoreError> {
    let settings = load_log_store_settings(state.config_dir())?;
    let client = ReqwestLogStoreClient::new(&settings.base_url, &settings.table, &settings.api_key)?;
    Ok(HistoryService::new(std::sync::Arc::new(client)))
}

pub fn advisor_service_from_config(
    state: &AppState,
) -> Result<ScheduleAdvisorService<ReqwestGeminiClient>, CoreError> {
    let model = read_advisor_model(state.config_dir())?;
    let api_key = load_advisor_api_key_from_lookup(|key| std::env::var(key).ok())?;
    Ok(ScheduleAdvisorService::new(
        std::sync::Arc::new(ReqwestGeminiClient::new()),
        &model,
        &api_key,
    ))
}

// The snapshot is crash resilience, not the source of truth, so a failed
// write is logged and the transition still goes through.
fn persist_snapshot(state: &AppState, draft: &SessionDraft) {
    if let Err(error) = snapshot_store(state).save(draft) {
        state.log_error("session_snapshot", &error.to_string());
    }
}

pub fn begin_session_impl(
    state: &AppState,
    kind: String,
) -> Result<SessionStateResponse, CoreError> {
    let kind = match kind.trim() {
        "work" => ActivityKind::Work,
        "break" => ActivityKind::Break,
        other => {
            return Err(CoreError::Validation(format!(
                "unknown session kind '{other}'"
            )))
        }
    };

    let mut runtime = lock_runtime(state)?;
    runtime.reject_if_saving()?;
    if runtime.draft.is_some() {
        return Err(CoreError::Validation(
            "a session is already in progress".to_string(),
        ));
    }
    let draft = SessionDraft::begin(kind);
    persist_snapshot(state, &draft);
    let response = state_response(Some(&draft));
    runtime.draft = Some(draft);
    state.log_info("begin_session", kind_name(kind));
    Ok(response)
}

pub fn update_draft_impl(
    state: &AppState,
    update: DraftUpdate,
) -> Result<SessionStateResponse, CoreError> {
    let mut runtime = lock_runtime(state)?;
    runtime.reject_if_saving()?;
    let draft = runtime
        .draft
        .as_mut()
        .ok_or_else(|| CoreError::Validation("no session in progress".to_string()))?;

    if let Some(job_category) = update.job_category {
        draft.job_category = job_category;
    }
    if let Some(subjective_mood) = update.subjective_mood {
        draft.subjective_mood = subjective_mood;
    }
    if let Some(energy_level) = update.energy_level {
        draft.energy_level = energy_level;
    }
    if let Some(context_tags) = update.context_tags {
        draft.context_tags = context_tags;
    }
    if let Some(break_trigger) = update.break_trigger {
        draft.break_trigger = break_trigger;
    }
    if let Some(break_intent) = update.break_intent {
        draft.break_intent = break_intent;
    }
    if let Some(planned_duration) = update.planned_duration {
        draft.planned_duration = planned_duration;
    }
    if let Some(break_activities) = update.break_activities {
        draft.break_activities = break_activities;
    }
    if let Some(output_rating) = update.output_rating {
        draft.output_rating = output_rating;
    }
    if let Some(end_mood) = update.end_mood {
        draft.end_mood = end_mood;
    }
    if let Some(distraction_level) = update.distraction_level {
        draft.distraction_level = distraction_level;
    }
    if let Some(guilt_rating) = update.guilt_rating {
        draft.guilt_rating = guilt_rating;
    }
    if let Some(recovery_rating) = update.recovery_rating {
        draft.recovery_rating = recovery_rating;
    }
    if let Some(readiness_to_return) = update.readiness_to_return {
        draft.readiness_to_return = readiness_to_return;
    }
    if let Some(user_notes) = update.user_notes {
        draft.user_notes = user_notes;
    }

    persist_snapshot(state, draft);
    Ok(state_response(Some(draft)))
}

/// Must be called from within a tokio runtime; starting spawns the display
/// ticker for the active phase.
pub fn start_session_impl(state: &AppState) -> Result<SessionStateResponse, CoreError> {
    let now = Utc::now();
    let mut runtime = lock_runtime(state)?;
    runtime.reject_if_saving()?;
    let draft = runtime
        .draft
        .as_mut()
        .ok_or_else(|| CoreError::Validation("no session in progress".to_string()))?;
    draft.start(now).map_err(CoreError::Validation)?;
    persist_snapshot(state, draft);
    let response = state_response(Some(draft));
    runtime.ticker = Some(DisplayTicker::spawn(now));
    state.log_info("start_session", &response.phase);
    Ok(response)
}

pub fn start_break_impl(
    state: &AppState,
    reason: String,
) -> Result<SessionStateResponse, CoreError> {
    let mut runtime = lock_runtime(state)?;
    runtime.reject_if_saving()?;
    let draft = runtime
        .draft
        .as_mut()
        .ok_or_else(|| CoreError::Validation("no session in progress".to_string()))?;
    draft
        .start_break(&reason, Utc::now())
        .map_err(CoreError::Validation)?;
    persist_snapshot(state, draft);
    state.log_info("start_break", &reason);
    Ok(state_response(Some(draft)))
}

pub fn resume_work_impl(state: &AppState) -> Result<SessionStateResponse, CoreError> {
    let mut runtime = lock_runtime(state)?;
    runtime.reject_if_saving()?;
    let draft = runtime
        .draft
        .as_mut()
        .ok_or_else(|| CoreError::Validation("no session in progress".to_string()))?;
    draft.resume_work(Utc::now()).map_err(CoreError::Validation)?;
    persist_snapshot(state, draft);
    state.log_info("resume_work", "break closed");
    Ok(state_response(Some(draft)))
}

pub fn stop_session_impl(state: &AppState) -> Result<SessionStateResponse, CoreError> {
    let mut runtime = lock_runtime(state)?;
    runtime.reject_if_saving()?;
    let draft = runtime
        .draft
        .as_mut()
        .ok_or_else(|| CoreError::Validation("no session in progress".to_string()))?;
    draft.stop(Utc::now()).map_err(CoreError::Validation)?;
    persist_snapshot(state, draft);
    if let Some(ticker) = runtime.ticker.take() {
        ticker.cancel();
    }
    state.log_info("stop_session", "entered post-session");
    Ok(state_response(runtime.draft.as_ref()))
}

/// While a ticker is running, its once-a-second counter is the reported
/// elapsed value; outside the active phase it falls back to the draft.
pub fn get_session_state_impl(state: &AppState) -> Result<SessionStateResponse, CoreError> {
    let runtime = lock_runtime(state)?;
    let mut response = state_response(runtime.draft.as_ref());
    if let Some(ticker) = &runtime.ticker {
        response.elapsed_ms = ticker.elapsed_ms();
    }
    Ok(response)
}

/// Loads a crash snapshot into the runtime, restarting the display ticker if
/// the session was mid-active. A corrupt snapshot degrades to no draft.
pub fn restore_session_impl(state: &AppState) -> Result<SessionStateResponse, CoreError> {
    let loaded = match snapshot_store(state).load() {
        Ok(loaded) => loaded,
        Err(error) => {
            state.log_error("restore_session", &error.to_string());
            None
        }
    };

    let mut runtime = lock_runtime(state)?;
    runtime.reject_if_saving()?;
    let Some(draft) = loaded else {
        return Ok(state_response(runtime.draft.as_ref()));
    };

    if draft.phase == SessionPhase::Active {
        if let Some(start) = draft.start_instant {
            runtime.ticker = Some(DisplayTicker::spawn(start));
        }
    }
    state.log_info(
        "restore_session",
        &format!("restored draft in phase {}", phase_name(draft.phase)),
    );
    let response = state_response(Some(&draft));
    runtime.draft = Some(draft);
    Ok(response)
}

pub async fn save_session_impl<S>(
    state: &AppState,
    history: &HistoryService<S>,
) -> Result<SavedSessionResponse, CoreError>
where
    S: LogStoreClient,
{
    let now = Utc::now();
    let (draft, start) = {
        let mut runtime = lock_runtime(state)?;
        runtime.reject_if_saving()?;
        let draft = runtime
            .draft
            .clone()
            .ok_or_else(|| CoreError::Validation("no session to save".to_string()))?;
        if draft.phase != SessionPhase::PostSession {
            return Err(CoreError::Validation(
                "session must be stopped before saving".to_string(),
            ));
        }
        let start = draft
            .start_instant
            .ok_or_else(|| CoreError::Validation("draft has no start instant".to_string()))?;
        runtime.saving = true;
        (draft, start)
    };
    let date = timeparse::local_date(start);

    let outcome = match draft.activity_kind {
        ActivityKind::Work => match draft.finalize_work(&next_id("sess"), now) {
            Ok(record) => {
                let response = SavedSessionResponse {
                    date: date.to_string(),
                    session_id: record.session_id.clone(),
                    kind: kind_name(ActivityKind::Work).to_string(),
                    total_duration_minutes: record.post_session.total_duration_minutes,
                    net_focus_minutes: Some(record.post_session.net_focus_minutes),
                };
                history
                    .append_work_session(date, record)
                    .await
                    .map(|_| response)
            }
            Err(error) => Err(CoreError::Validation(error)),
        },
        ActivityKind::Break => match draft.finalize_break(&next_id("break"), now) {
            Ok(record) => {
                let response = SavedSessionResponse {
                    date: date.to_string(),
                    session_id: record.session_id.clone(),
                    kind: kind_name(ActivityKind::Break).to_string(),
                    total_duration_minutes: record.post_session.total_duration_minutes,
                    net_focus_minutes: None,
                };
                history
                    .append_break_session(date, record)
                    .await
                    .map(|_| response)
            }
            Err(error) => Err(CoreError::Validation(error)),
        },
    };

    let response = {
        let mut runtime = lock_runtime(state)?;
        runtime.saving = false;
        let response = outcome?;
        runtime.draft = None;
        if let Some(ticker) = runtime.ticker.take() {
            ticker.cancel();
        }
        response
    };
    snapshot_store(state).clear()?;
    state.log_info(
        "save_session",
        &format!("saved {} on {}", response.session_id, response.date),
    );
    Ok(response)
}

pub fn discard_session_impl(state: &AppState) -> Result<SessionStateResponse, CoreError> {
    let mut runtime = lock_runtime(state)?;
    runtime.reject_if_saving()?;
    if runtime.draft.take().is_none() {
        return Err(CoreError::Validation("no session to discard".to_string()));
    }
    if let Some(ticker) = runtime.ticker.take() {
        ticker.cancel();
    }
    snapshot_store(state).clear()?;
    state.log_info("discard_session", "draft dropped");
    Ok(state_response(None))
}
