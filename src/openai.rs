use std::time::Duration;

use anyhow::Context as _;
use serde::Serialize;

use crate::config::LlmConfig;
use crate::sse::{self, SseDecoder, SseEvent};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("missing LLM configuration: {0}")]
    MissingConfig(String),
    #[error("LLM API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("LLM response has no content")]
    EmptyResponse,
    #[error("LLM reply is not valid JSON: {0}")]
    InvalidJson(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub id: String,
    pub owned_by: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub content: String,
}

/// `{api_url}/v1/{path}`. A base that already ends in `/v1` is not doubled.
pub fn api_endpoint(api_url: &str, path: &str) -> anyhow::Result<String> {
    let parsed = url::Url::parse(api_url.trim())
        .with_context(|| format!("parse api url: {api_url}"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        anyhow::bail!("api url must be http/https: {api_url}");
    }
    let base = api_url.trim().trim_end_matches('/');
    let base = base.strip_suffix("/v1").unwrap_or(base);
    Ok(format!("{base}/v1/{}", path.trim_start_matches('/')))
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    config: LlmConfig,
}

impl ChatClient {
    pub fn new(config: LlmConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("build http client")?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    pub async fn list_models(&self) -> anyhow::Result<Vec<ModelInfo>> {
        let missing = self
            .config
            .missing_fields()
            .into_iter()
            .filter(|f| *f != "model")
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            return Err(LlmError::MissingConfig(missing.join(", ")).into());
        }

        let endpoint = api_endpoint(&self.config.api_url, "models")?;
        let response = self
            .http
            .get(&endpoint)
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .with_context(|| format!("GET {endpoint}"))?;
        let response = check_status(response).await?;

        let value: serde_json::Value = response.json().await.context("parse models response")?;
        let items = match &value {
            serde_json::Value::Array(items) => items,
            _ => value
                .get("data")
                .and_then(|v| v.as_array())
                .ok_or_else(|| anyhow::anyhow!("unexpected models response shape"))?,
        };

        let models = items
            .iter()
            .filter_map(|item| {
                let id = item
                    .get("id")
                    .or_else(|| item.get("name"))
                    .and_then(|v| v.as_str())?;
                let owned_by = item
                    .get("owned_by")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown");
                Some(ModelInfo {
                    id: id.to_owned(),
                    owned_by: owned_by.to_owned(),
                })
            })
            .collect();
        Ok(models)
    }

    pub async fn complete(&self, system: &str, user: &str) -> anyhow::Result<Completion> {
        let response = self.post_chat(system, user, false, None).await?;
        read_completion(response).await
    }

    /// Asks for structured output matching `schema` and parses the reply as
    /// JSON. Servers that ignore `response_format` still work as long as the
    /// reply is a JSON document, optionally inside a code fence.
    pub async fn complete_json(
        &self,
        system: &str,
        user: &str,
        name: &str,
        schema: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value> {
        let response_format = serde_json::json!({
            "type": "json_schema",
            "json_schema": { "name": name, "schema": schema },
        });
        let response = self
            .post_chat(system, user, false, Some(response_format))
            .await?;
        let completion = read_completion(response).await?;
        let value = parse_json_reply(&completion.content)?;
        tracing::debug!(name, "structured reply parsed");
        Ok(value)
    }

    /// Streams the completion, calling `on_chunk(delta, accumulated)` for
    /// every non-empty delta. Returns the full text; an error from
    /// `on_chunk` stops the stream.
    pub async fn complete_stream(
        &self,
        system: &str,
        user: &str,
        mut on_chunk: impl FnMut(&str, &str) -> anyhow::Result<()>,
    ) -> anyhow::Result<String> {
        let mut response = self.post_chat(system, user, true, None).await?;

        let mut decoder = SseDecoder::new();
        let mut full = String::new();
        let mut handle = |event: SseEvent, full: &mut String| -> anyhow::Result<()> {
            if let SseEvent::Data(value) = event
                && let Some(delta) = sse::delta_content(&value)
            {
                full.push_str(delta);
                on_chunk(delta, full)?;
            }
            Ok(())
        };

        while let Some(chunk) = response.chunk().await.context("read chat stream")? {
            for event in decoder.push(&chunk) {
                handle(event, &mut full)?;
            }
        }
        if let Some(event) = decoder.finish() {
            handle(event, &mut full)?;
        }

        tracing::debug!(chars = full.chars().count(), "chat stream finished");
        Ok(full)
    }

    async fn post_chat(
        &self,
        system: &str,
        user: &str,
        stream: bool,
        response_format: Option<serde_json::Value>,
    ) -> anyhow::Result<reqwest::Response> {
        self.config.validate()?;
        let endpoint = api_endpoint(&self.config.api_url, "chat/completions")?;
        let body = ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream,
            response_format,
        };

        tracing::info!(model = %self.config.model, stream, "chat completion");
        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("POST {endpoint}"))?;
        check_status(response).await
    }
}

async fn read_completion(response: reqwest::Response) -> anyhow::Result<Completion> {
    let value: serde_json::Value = response.json().await.context("parse chat response")?;
    let content = value
        .pointer("/choices/0/message/content")
        .and_then(|v| v.as_str())
        .ok_or(LlmError::EmptyResponse)?;
    Ok(Completion {
        content: content.to_owned(),
    })
}

fn parse_json_reply(content: &str) -> Result<serde_json::Value, LlmError> {
    let trimmed = content.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);
    serde_json::from_str(body.trim()).map_err(|err| LlmError::InvalidJson(err.to_string()))
}

async fn check_status(response: reqwest::Response) -> anyhow::Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let raw = response.text().await.unwrap_or_default();
    let message = parse_error_message(&raw)
        .unwrap_or_else(|| format!("HTTP error! status: {}", status.as_u16()));
    Err(LlmError::Api {
        status: status.as_u16(),
        message,
    }
    .into())
}

/// `error.message`, else a top-level `message`.
fn parse_error_message(raw_json: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw_json).ok()?;
    value
        .pointer("/error/message")
        .or_else(|| value.get("message"))
        .and_then(|v| v.as_str())
        .filter(|m| !m.is_empty())
        .map(str::to_owned)
}
