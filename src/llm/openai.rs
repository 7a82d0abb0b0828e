//! OpenAI chat completion client.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::config::OpenAiConfig;
use crate::error::{ModelError, Result};
use crate::llm::traits::ChatModel;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

// ============================================================================
// Client
// ============================================================================

/// Client for the OpenAI chat completions API.
pub struct OpenAiChatModel {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl OpenAiChatModel {
    /// Create a client with explicit parameters.
    pub fn new(base_url: &str, model: &str, api_key: &str, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ModelError::Api(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Create a client from configuration plus a resolved API key.
    pub fn from_config(config: &OpenAiConfig, api_key: &str) -> Result<Self> {
        Self::new(&config.base_url, &config.model, api_key, config.timeout_secs)
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn post_completion(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
        max_tokens: u32,
        stream: bool,
    ) -> Result<reqwest::Response> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature,
            max_tokens,
            stream,
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModelError::Api("request timed out".to_string())
                } else if e.is_connect() {
                    ModelError::Api(format!("connection failed: {e}"))
                } else {
                    ModelError::Api(e.to_string())
                }
            })?;

        check_status(response).await
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String> {
        let response = self
            .post_completion(system, user, temperature, max_tokens, false)
            .await?;

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Api(format!("invalid response: {e}")))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or(ModelError::EmptyResponse)?;

        Ok(content)
    }

    async fn complete_stream(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<mpsc::UnboundedReceiver<Result<String>>> {
        let response = self
            .post_completion(system, user, temperature, max_tokens, true)
            .await?;

        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk) = stream.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx.send(Err(ModelError::Stream(e.to_string()).into()));
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                // SSE frames are newline-delimited `data:` lines; anything
                // after the last newline is an incomplete frame.
                while let Some(newline) = buffer.find('\n') {
                    let line = buffer[..newline].trim().to_string();
                    buffer.drain(..=newline);

                    match parse_stream_line(&line) {
                        StreamLine::Done => return,
                        StreamLine::Skip => {}
                        StreamLine::Content(content) => {
                            if tx.send(Ok(content)).is_err() {
                                return;
                            }
                        }
                    }
                }
            }
        });

        Ok(rx)
    }
}

// ============================================================================
// Stream Parsing
// ============================================================================

enum StreamLine {
    Content(String),
    Done,
    Skip,
}

/// Extract the content delta from one SSE line, if it carries any.
fn parse_stream_line(line: &str) -> StreamLine {
    let Some(payload) = line.strip_prefix("data: ") else {
        return StreamLine::Skip;
    };
    if payload.trim() == "[DONE]" {
        return StreamLine::Done;
    }
    match serde_json::from_str::<StreamChunk>(payload) {
        Ok(chunk) => match chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
        {
            Some(content) if !content.is_empty() => StreamLine::Content(content),
            _ => StreamLine::Skip,
        },
        Err(e) => {
            tracing::debug!(error = %e, "Skipping unparsable stream frame");
            StreamLine::Skip
        }
    }
}

/// Map a non-success response to a model error.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status.as_u16() == 429 {
        return Err(ModelError::RateLimited.into());
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorResponse>(&body)
        .map(|parsed| parsed.error.message)
        .unwrap_or(body);
    Err(ModelError::Api(format!("HTTP {status}: {message}")).into())
}
