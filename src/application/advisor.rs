use crate::domain::models::{DailyBioMetrics, DailyLog};
use crate::infrastructure::advisor_client::AdvisorClient;
use crate::infrastructure::error::CoreError;
use chrono::{DateTime, Local, Utc};
use serde_json::Value;
use std::sync::Arc;

const SYSTEM_PROMPT: &str = r#"You are a Data-Driven Chronobiology Coach. Your goal is to maximize the user's "Net Focus Output" by analyzing their biological patterns.

### YOUR CORE PHILOSOPHY
1. **Output > Mood:** A user may feel "unmotivated" but perform well. Trust the 'output_rating' and 'net_focus_minutes' over 'subjective_mood'.
2. **Context is Key:** Look at causal factors. If a user performs poorly, check if 'sleep_duration' was low or if 'distraction_level' was high.
3. **Pattern Matching:** Always compare today's starting conditions (Sleep/Mood) with historical entries to predict today's outcome.
4. **Break Analysis (Interruptions):** Pay attention to the "breaks" array *inside* work sessions. Frequent short breaks might indicate high distraction, while long scheduled breaks might indicate deep work recovery.
5. **Break Intent (Dedicated Sessions):** Distinguish between "Recovery" (charging the battery) and "Procrastination" (avoidance). High 'guilt_rating' in a break session is a major red flag for bad habits.

### INSTRUCTIONS
You will receive three data blocks:
1. HISTORY_LOGS: A JSON array of the user's past performance (Work Sessions and Break Sessions).
2. DAILY_BIO_METRICS: A JSON object containing today's sleep stats and waking mood (The "Baseline").
3. CURRENT_STATUS: A JSON object containing how the user feels RIGHT NOW (The "Variable").

**Step 1: Analyze the History**
- Scan HISTORY_LOGS for days with similar 'sleep_duration' and 'waking_condition' to today's DAILY_BIO_METRICS.
- Identify the "Peak Performance Window" (time of day with highest 'output_rating') on those specific days.
- Identify "Crash Zones" (time of day where 'energy_level' drops or 'distraction_level' spikes).
- Analyze the breaks array within each session to determine if the break was restorative or a distraction loop.

**Step 2: Analyze Dedicated Break Sessions**
*Apply these specific rules when analyzing logs where "session_type": "break":*
- **Identify the Loop:** Compare 'trigger' with 'break_activity'.
    - *The "Dopamine Trap":* If Trigger is "Boredom" and Activity is "Social Media" (or similar), check 'recovery_rating'. If Low, warn user that this activity drains them further.
    - *The "Avoidance Trap":* If Trigger is "Stuck/Blocked" and Intent is "Procrastination", this is a defense mechanism.
- **Calculate "Inertia":** If 'actual_duration_minutes' > 'planned_duration_minutes' by 50%+, flag this activity as a "Time Blindness Risk."
- **The "Guilt" Signal:** If 'guilt_rating' is High, valid recovery did NOT occur. Note this activity as one to avoid in the future.

**Step 3: Generate Strategy**
- Create a schedule for today starting from the provided 'Current Time' until the end of the day.
- Factor in CURRENT_STATUS. If the user is currently "Drained" despite a good "Waking Condition", adjust the immediate next block to be lighter or recovery-focused.
- Assign "Logical/Deep Work" during predicted Peak Windows.
- Assign "Admin/Shallow Work" or Breaks during predicted Crash Zones.
- If the user has high friction (low sleep/bad mood), suggest specific Context Tags to fix it (e.g., "History shows Caffeine helps you recover from < 6 hours sleep").
- **Break Advice:** If the user recently had a High Guilt break, suggest a "Low Dopamine" reset (e.g., Walking, Meditation) for the next break.

### OUTPUT FORMAT
Return your response in this JSON format (do not wrap in markdown code blocks):
{
  "dailyPrediction": "One sentence summary of how today looks based on data.",
  "recommendedFlow": [
    {
      "timeRange": "HH:MM - HH:MM",
      "taskType": "Task Name",
      "reason": "Data-backed reason"
    }
  ],
  "insight": "A specific pattern you found in the logs."
}"#;

/// Fields shortened from full ISO timestamps to bare HH:MM:SS before the
/// payload goes to the model.
const TIME_KEYS: &[&str] = &[
    "start_time",
    "end_time",
    "sleep_bedtime",
    "sleep_waketime",
    "break_start",
    "break_end",
    "timestamp",
];

/// Strips identifier keys, empty values, and redundant date prefixes from a
/// payload bound for the advisor. Returns `None` when nothing survives.
pub fn clean_for_advisor(value: &Value) -> Option<Value> {
    match value {
        Value::Array(items) => {
            let cleaned: Vec<Value> = items.iter().filter_map(clean_for_advisor).collect();
            if cleaned.is_empty() {
                None
            } else {
                Some(Value::Array(cleaned))
            }
        }
        Value::Object(fields) => {
            let mut cleaned = serde_json::Map::new();
            for (key, field_value) in fields {
                if key == "id" || key.ends_with("_id") {
                    continue;
                }
                if is_empty_value(field_value) {
                    continue;
                }
                let Some(mut cleaned_value) = clean_for_advisor(field_value) else {
                    continue;
                };
                if TIME_KEYS.contains(&key.as_str()) {
                    if let Value::String(text) = &cleaned_value {
                        if let Some(time_of_day) = iso_time_of_day(text) {
                            cleaned_value = Value::String(time_of_day);
                        }
                    }
                }
                cleaned.insert(key.clone(), cleaned_value);
            }
            if cleaned.is_empty() {
                None
            } else {
                Some(Value::Object(cleaned))
            }
        }
        Value::Null => None,
        other => Some(other.clone()),
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn iso_time_of_day(text: &str) -> Option<String> {
    let (_, rest) = text.split_once('T')?;
    let time: String = rest.chars().take(8).collect();
    if time.len() == 8
        && time.as_bytes()[2] == b':'
        && time.as_bytes()[5] == b':'
        && time
            .chars()
            .enumerate()
            .all(|(index, c)| matches!(index, 2 | 5) || c.is_ascii_digit())
    {
        Some(time)
    } else {
        None
    }
}

/// Turns day history plus current state into a schedule suggestion via the
/// configured text-generation model.
pub struct ScheduleAdvisorService<C>
where
    C: AdvisorClient,
{
    client: Arc<C>,
    model: String,
    api_key: String,
}

impl<C> ScheduleAdvisorService<C>
where
    C: AdvisorClient,
{
    pub fn new(client: Arc<C>, model: &str, api_key: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub async fn generate_schedule(
        &self,
        history: &[DailyLog],
        bio_metrics: Option<&DailyBioMetrics>,
        current_status: &Value,
        user_tasks: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<String, CoreError> {
        let history_value = serde_json::to_value(history)?;
        let bio_value = match bio_metrics {
            Some(metrics) => serde_json::to_value(metrics)?,
            None => Value::Null,
        };

        let optimized_history = clean_for_advisor(&history_value).unwrap_or(Value::Array(Vec::new()));
        let optimized_bio = clean_for_advisor(&bio_value).unwrap_or(Value::Object(Default::default()));
        let optimized_status =
            clean_for_advisor(current_status).unwrap_or(Value::Object(Default::default()));

        let current_time = now.with_timezone(&Local).format("%H:%M").to_string();
        let user_message = format!(
            "CURRENT_TIME: {current_time}\n\n\
             DAILY_BIO_METRICS (Baseline):\n{bio}\n\n\
             CURRENT_STATUS (Right Now):\n{status}\n\n\
             USER_TASKS (Tasks I want to do):\n{tasks}\n\n\
             HISTORY_LOGS:\n{history}\n\n\
             Please generate my schedule for today starting from {current_time}.\n\
             If USER_TASKS are provided, incorporate them into the schedule where they fit best based on my energy levels.",
            bio = optimized_bio,
            status = optimized_status,
            tasks = user_tasks
                .map(str::trim)
                .filter(|tasks| !tasks.is_empty())
                .unwrap_or("None specified"),
            history = optimized_history,
        );

        self.client
            .generate(&self.model, &self.api_key, SYSTEM_PROMPT, &user_message)
            .await
    }
}
