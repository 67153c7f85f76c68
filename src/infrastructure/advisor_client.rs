use crate::infrastructure::error::CoreError;
use async_trait::async_trait;
use reqwest::Client;
use url::Url;

const GENERATIVE_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models/";

/// Text-generation seam for the schedule advisor. One call: a system prompt
/// plus a user message, returning the model's text.
#[async_trait]
pub trait AdvisorClient: Send + Sync {
    async fn generate(
        &self,
        model: &str,
        api_key: &str,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<String, CoreError>;
}

#[derive(Debug, Clone, Default)]
pub struct ReqwestGeminiClient {
    client: Client,
}

#[derive(Debug, serde::Serialize)]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
}

#[derive(Debug, serde::Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, serde::Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, serde::Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, serde::Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, serde::Deserialize)]
struct CandidateContent {
    parts: Option<Vec<CandidatePart>>,
}

#[derive(Debug, serde::Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl ReqwestGeminiClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    // The action suffix uses a literal colon, which the path-segment API
    // would percent-encode, so the endpoint is formatted as a whole.
    fn generate_endpoint(model: &str) -> Result<Url, CoreError> {
        if model.contains('/') {
            return Err(CoreError::Advisor(format!(
                "advisor model must not contain '/': {model}"
            )));
        }
        Url::parse(&format!("{GENERATIVE_API_BASE}{model}:generateContent"))
            .map_err(|error| CoreError::Advisor(format!("invalid advisor endpoint: {error}")))
    }

    fn ensure_non_empty(value: &str, field: &str) -> Result<(), CoreError> {
        if value.trim().is_empty() {
            return Err(CoreError::Advisor(format!("{field} must not be empty")));
        }
        Ok(())
    }

    fn http_error(status: reqwest::StatusCode, body: &str) -> CoreError {
        let message = if body.trim().is_empty() {
            format!("advisor api error: http {}", status.as_u16())
        } else {
            format!("advisor api error: http {}; body={body}", status.as_u16())
        };
        CoreError::Advisor(message)
    }
}

#[async_trait]
impl AdvisorClient for ReqwestGeminiClient {
    async fn generate(
        &self,
        model: &str,
        api_key: &str,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<String, CoreError> {
        Self::ensure_non_empty(model, "advisor model")?;
        Self::ensure_non_empty(api_key, "advisor api key")?;

        let endpoint = Self::generate_endpoint(model.trim())?;
        let request = GenerateRequest {
            system_instruction: Content {
                parts: vec![Part { text: system_prompt }],
            },
            contents: vec![Content {
                parts: vec![Part { text: user_message }],
            }],
        };

        let response = self
            .client
            .post(endpoint)
            .query(&[("key", api_key)])
            .json(&request)
            .send()
            .await
            .map_err(|error| {
                CoreError::Advisor(format!("network error while generating schedule: {error}"))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            CoreError::Advisor(format!("failed reading advisor response: {error}"))
        })?;
        if !status.is_success() {
            return Err(Self::http_error(status, &body));
        }

        let parsed: GenerateResponse = serde_json::from_str(&body).map_err(|error| {
            CoreError::Advisor(format!("invalid advisor payload: {error}; body={body}"))
        })?;

        parsed
            .candidates
            .unwrap_or_default()
            .into_iter()
            .filter_map(|candidate| candidate.content)
            .filter_map(|content| content.parts)
            .flatten()
            .filter_map(|part| part.text)
            .next()
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| CoreError::Advisor("advisor response contained no text".to_string()))
    }
}
