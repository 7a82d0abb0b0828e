//! Natural-language query interpretation and response rendering.

use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::mpsc;

use crate::config::DEFAULT_QUERY_LIMIT;
use crate::error::Result;
use crate::interpret::prompts::{
    format_schema_for_prompt, RESPONSE_GENERATION_PROMPT, SQL_GENERATION_PROMPT,
};
use crate::interpret::types::Intent;
use crate::llm::ChatModel;
use crate::messages;
use crate::schema::SchemaSnapshot;

const SQL_TEMPERATURE: f32 = 0.1;
const SQL_MAX_TOKENS: u32 = 500;
const RENDER_TEMPERATURE: f32 = 0.7;
const RENDER_MAX_TOKENS: u32 = 300;

/// Wire shape of the model's JSON reply. Tolerant of `"sql": null` and
/// stray extra fields; normalization happens in [`parse_intent`].
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireIntent {
    Sql {
        #[serde(default)]
        sql: Option<String>,
        #[serde(default)]
        explanation: Option<String>,
    },
    Help,
    Tables,
    Error {
        message: String,
    },
}

/// Turns user questions into query intents and query outcomes into prose.
#[derive(Clone)]
pub struct NlToSqlInterpreter {
    model: Arc<dyn ChatModel>,
}

impl NlToSqlInterpreter {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Classify a natural-language question against the discovered schema.
    ///
    /// Always produces an intent when the model answers at all; malformed
    /// output degrades through JSON recovery, then a keyword classifier,
    /// then an [`Intent::Error`] carrying the raw model text. `Err` is
    /// reserved for the model call itself failing.
    pub async fn interpret(&self, question: &str, schema: &SchemaSnapshot) -> Result<Intent> {
        let schema_info = format_schema_for_prompt(schema);
        let system = SQL_GENERATION_PROMPT.replace("{schema_info}", &schema_info);

        let raw = self
            .model
            .complete(&system, question, SQL_TEMPERATURE, SQL_MAX_TOKENS)
            .await?;
        tracing::debug!(raw = %raw, "Model SQL generation reply");

        Ok(parse_intent(question, &raw))
    }

    /// Render a query outcome as a short conversational reply.
    ///
    /// Never fails: if the model call errors, the reply degrades to a
    /// fixed sentence rather than echoing raw result data.
    pub async fn render(&self, question: &str, result: &serde_json::Value) -> String {
        match self.try_render(question, result).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "Response generation failed");
                messages::RENDER_FALLBACK.to_string()
            }
        }
    }

    async fn try_render(&self, question: &str, result: &serde_json::Value) -> Result<String> {
        let user = render_prompt(question, result)?;
        self.model
            .complete(
                RESPONSE_GENERATION_PROMPT,
                &user,
                RENDER_TEMPERATURE,
                RENDER_MAX_TOKENS,
            )
            .await
    }

    /// Stream the rendered reply as prose chunks.
    ///
    /// If the stream cannot be created or dies mid-flight, one
    /// non-streaming [`render`](Self::render) call supplies the full
    /// text as a single chunk instead.
    pub async fn render_stream(
        &self,
        question: &str,
        result: &serde_json::Value,
    ) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();

        let user = match render_prompt(question, result) {
            Ok(user) => user,
            Err(e) => {
                tracing::warn!(error = %e, "Response generation failed");
                let _ = tx.send(messages::RENDER_FALLBACK.to_string());
                return rx;
            }
        };

        let upstream = self
            .model
            .complete_stream(
                RESPONSE_GENERATION_PROMPT,
                &user,
                RENDER_TEMPERATURE,
                RENDER_MAX_TOKENS,
            )
            .await;

        let mut upstream = match upstream {
            Ok(upstream) => upstream,
            Err(e) => {
                tracing::warn!(error = %e, "Streaming response failed, rendering once instead");
                let _ = tx.send(self.render(question, result).await);
                return rx;
            }
        };

        let interpreter = self.clone();
        let question = question.to_string();
        let result = result.clone();
        tokio::spawn(async move {
            while let Some(chunk) = upstream.recv().await {
                match chunk {
                    Ok(content) => {
                        if tx.send(content).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Stream died mid-flight, rendering once instead");
                        let _ = tx.send(interpreter.render(&question, &result).await);
                        return;
                    }
                }
            }
        });

        rx
    }
}

fn render_prompt(question: &str, result: &serde_json::Value) -> Result<String> {
    let pretty = serde_json::to_string_pretty(result)?;
    Ok(format!(
        "\nUser asked: \"{question}\"\n\nQuery result: {pretty}\n\nPlease provide a natural language response to the user.\n"
    ))
}

/// Parse the raw model reply into an intent, degrading through JSON
/// recovery and the keyword classifier before giving up.
fn parse_intent(question: &str, raw: &str) -> Intent {
    if let Ok(wire) = serde_json::from_str::<WireIntent>(raw) {
        return normalize(wire);
    }

    if let Some(extracted) = extract_json(raw) {
        if let Ok(wire) = serde_json::from_str::<WireIntent>(&extracted) {
            tracing::debug!("Recovered JSON from fenced model reply");
            return normalize(wire);
        }
    }

    tracing::warn!(raw = %raw, "Model reply was not parsable as an intent");
    fallback_intent(question).unwrap_or_else(|| Intent::Error {
        message: format!("Could not parse SQL generation. AI said: {raw}"),
    })
}

fn normalize(wire: WireIntent) -> Intent {
    match wire {
        WireIntent::Sql { sql, explanation } => match sql {
            Some(sql) if !sql.trim().is_empty() => Intent::Sql { sql, explanation },
            _ => Intent::Error {
                message: messages::EMPTY_SQL.to_string(),
            },
        },
        WireIntent::Help => Intent::Help,
        WireIntent::Tables => Intent::ListTables,
        WireIntent::Error { message } => Intent::Error { message },
    }
}

/// Strip markdown fences and take the outermost `{` .. `}` span.
fn extract_json(raw: &str) -> Option<String> {
    let mut cleaned = raw.trim();
    if let Some(rest) = cleaned.strip_prefix("```json") {
        cleaned = rest;
    }
    if let Some(rest) = cleaned.strip_prefix("```") {
        cleaned = rest;
    }
    if let Some(rest) = cleaned.strip_suffix("```") {
        cleaned = rest;
    }
    let cleaned = cleaned.trim();

    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if end < start {
        return None;
    }
    Some(cleaned[start..=end].to_string())
}

/// Deterministic classifier for the two entities the service can always
/// answer about, used when the model reply defies parsing.
fn fallback_intent(question: &str) -> Option<Intent> {
    let lowered = question.to_lowercase();

    let table = if lowered.contains("user") {
        "users"
    } else if lowered.contains("product") {
        "products"
    } else {
        return None;
    };

    let wants_count = lowered.contains("count") || lowered.contains("how many");
    let (sql, explanation) = if wants_count {
        (
            format!("SELECT COUNT(*) as total FROM {table};"),
            format!("Count all {table} in the {table} table"),
        )
    } else {
        (
            format!("SELECT * FROM {table} LIMIT {DEFAULT_QUERY_LIMIT};"),
            format!("Retrieve first {DEFAULT_QUERY_LIMIT} {table} from the {table} table"),
        )
    };

    Some(Intent::Sql {
        sql,
        explanation: Some(explanation),
    })
}
