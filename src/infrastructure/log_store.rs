use crate::domain::models::DailyLog;
use crate::infrastructure::error::CoreError;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Mutex;
use url::Url;

/// Remote home of the daily logs, keyed by calendar date. One row per date;
/// `upsert` inserts or merges, `update` rewrites an existing row's payload.
#[async_trait]
pub trait LogStoreClient: Send + Sync {
    async fn get_by_date(&self, date: NaiveDate) -> Result<Option<DailyLog>, CoreError>;
    async fn upsert(&self, date: NaiveDate, log: &DailyLog) -> Result<(), CoreError>;
    async fn update(&self, date: NaiveDate, log: &DailyLog) -> Result<(), CoreError>;
}

/// PostgREST-speaking implementation. Filters ride in the query string
/// (`entry_date=eq.<date>`) and the api key doubles as the bearer token.
#[derive(Debug, Clone)]
pub struct ReqwestLogStoreClient {
    client: Client,
    base_url: String,
    table: String,
    api_key: String,
}

#[derive(Debug, serde::Deserialize)]
struct LogRow {
    log_data: DailyLog,
}

#[derive(Debug, serde::Serialize)]
struct UpsertRow<'a> {
    entry_date: String,
    log_data: &'a DailyLog,
}

#[derive(Debug, serde::Serialize)]
struct UpdateRow<'a> {
    log_data: &'a DailyLog,
}

impl ReqwestLogStoreClient {
    pub fn new(base_url: &str, table: &str, api_key: &str) -> Result<Self, CoreError> {
        if base_url.trim().is_empty() {
            return Err(CoreError::InvalidConfig(
                "log store base url must not be empty".to_string(),
            ));
        }
        if api_key.trim().is_empty() {
            return Err(CoreError::InvalidConfig(
                "log store api key must not be empty".to_string(),
            ));
        }
        Ok(Self {
            client: Client::new(),
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            table: table.trim().to_string(),
            api_key: api_key.trim().to_string(),
        })
    }

    fn table_endpoint(&self) -> Result<Url, CoreError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|error| CoreError::Remote(format!("invalid log store base url: {error}")))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| CoreError::Remote("log store base URL cannot be a base".to_string()))?;
            segments.push("rest");
            segments.push("v1");
            segments.push(&self.table);
        }
        Ok(url)
    }

    fn http_error(status: reqwest::StatusCode, body: &str) -> CoreError {
        let message = if body.trim().is_empty() {
            format!("log store api error: http {}", status.as_u16())
        } else {
            format!("log store api error: http {}; body={body}", status.as_u16())
        };
        CoreError::Remote(message)
    }
}

#[async_trait]
impl LogStoreClient for ReqwestLogStoreClient {
    async fn get_by_date(&self, date: NaiveDate) -> Result<Option<DailyLog>, CoreError> {
        let endpoint = self.table_endpoint()?;
        let response = self
            .client
            .get(endpoint)
            .query(&[
                ("entry_date", format!("eq.{date}")),
                ("select", "log_data".to_string()),
            ])
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|error| {
                CoreError::Remote(format!("network error while fetching daily log: {error}"))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            CoreError::Remote(format!("failed reading daily log response: {error}"))
        })?;
        if !status.is_success() {
            return Err(Self::http_error(status, &body));
        }

        let mut rows: Vec<LogRow> = serde_json::from_str(&body).map_err(|error| {
            CoreError::Remote(format!("invalid daily log payload: {error}; body={body}"))
        })?;
        Ok(rows.pop().map(|row| row.log_data))
    }

    async fn upsert(&self, date: NaiveDate, log: &DailyLog) -> Result<(), CoreError> {
        let endpoint = self.table_endpoint()?;
        let row = UpsertRow {
            entry_date: date.to_string(),
            log_data: log,
        };
        let response = self
            .client
            .post(endpoint)
            .query(&[("on_conflict", "entry_date")])
            .header("apikey", &self.api_key)
            .header("Prefer", "resolution=merge-duplicates")
            .bearer_auth(&self.api_key)
            .json(&row)
            .send()
            .await
            .map_err(|error| {
                CoreError::Remote(format!("network error while upserting daily log: {error}"))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            CoreError::Remote(format!("failed reading upsert response: {error}"))
        })?;
        if !status.is_success() {
            return Err(Self::http_error(status, &body));
        }
        Ok(())
    }

    async fn update(&self, date: NaiveDate, log: &DailyLog) -> Result<(), CoreError> {
        let endpoint = self.table_endpoint()?;
        let response = self
            .client
            .patch(endpoint)
            .query(&[("entry_date", format!("eq.{date}"))])
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .json(&UpdateRow { log_data: log })
            .send()
            .await
            .map_err(|error| {
                CoreError::Remote(format!("network error while updating daily log: {error}"))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            CoreError::Remote(format!("failed reading update response: {error}"))
        })?;
        if !status.is_success() {
            return Err(Self::http_error(status, &body));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryLogStore {
    logs: Mutex<HashMap<NaiveDate, DailyLog>>,
}

impl InMemoryLogStore {
    fn locked(&self) -> Result<std::sync::MutexGuard<'_, HashMap<NaiveDate, DailyLog>>, CoreError> {
        self.logs
            .lock()
            .map_err(|error| CoreError::Remote(format!("log store lock poisoned: {error}")))
    }
}

#[async_trait]
impl LogStoreClient for InMemoryLogStore {
    async fn get_by_date(&self, date: NaiveDate) -> Result<Option<DailyLog>, CoreError> {
        Ok(self.locked()?.get(&date).cloned())
    }

    async fn upsert(&self, date: NaiveDate, log: &DailyLog) -> Result<(), CoreError> {
        self.locked()?.insert(date, log.clone());
        Ok(())
    }

    async fn update(&self, date: NaiveDate, log: &DailyLog) -> Result<(), CoreError> {
        let mut logs = self.locked()?;
        if !logs.contains_key(&date) {
            return Err(CoreError::Remote(format!("no daily log stored for {date}")));
        }
        logs.insert(date, log.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::samples::work_record;

    #[test]
    fn client_rejects_blank_settings() {
        assert!(ReqwestLogStoreClient::new("  ", "productivity_logs", "key").is_err());
        assert!(ReqwestLogStoreClient::new("https://store.example.com", "logs", " ").is_err());
    }

    #[test]
    fn table_endpoint_is_postgrest_shaped() {
        let client = ReqwestLogStoreClient::new(
            "https://store.example.com/",
            "productivity_logs",
            "key",
        )
        .expect("client");
        let endpoint = client.table_endpoint().expect("endpoint");
        assert_eq!(
            endpoint.as_str(),
            "https://store.example.com/rest/v1/productivity_logs"
        );
    }

    #[tokio::test]
    async fn in_memory_store_upsert_and_fetch() {
        let store = InMemoryLogStore::default();
        let date = NaiveDate::from_ymd_opt(2026, 2, 16).expect("valid date");
        assert!(store.get_by_date(date).await.expect("get").is_none());

        let log = DailyLog {
            sessions: vec![work_record("sess-1", "9:00:00 AM")],
            ..DailyLog::default()
        };
        store.upsert(date, &log).await.expect("upsert");
        let fetched = store.get_by_date(date).await.expect("get").expect("log");
        assert_eq!(fetched.sessions.len(), 1);
    }

    #[tokio::test]
    async fn in_memory_update_requires_existing_row() {
        let store = InMemoryLogStore::default();
        let date = NaiveDate::from_ymd_opt(2026, 2, 16).expect("valid date");
        assert!(store.update(date, &DailyLog::default()).await.is_err());
        store.upsert(date, &DailyLog::default()).await.expect("upsert");
        assert!(store.update(date, &DailyLog::default()).await.is_ok());
    }
}
