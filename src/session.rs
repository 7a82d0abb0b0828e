//! Chat history persistence.
//!
//! Writes go through a dedicated store so the data-query surface stays
//! read-only. Persistence is best-effort: callers log failures and never
//! let them affect the response already produced.

use std::time::Duration;

use serde_json::{json, Value};

use crate::config::Credentials;
use crate::error::{BackendError, Result};

const MESSAGES_TABLE: &str = "chat_messages";

/// Message author, stored alongside each chat row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    User,
    Bot,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Bot => "bot",
        }
    }
}

/// Appends chat messages to the session history table.
#[derive(Clone)]
pub struct SessionStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl SessionStore {
    pub fn new(url: &str, api_key: &str, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| BackendError::Connection(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn from_credentials(credentials: &Credentials, timeout_secs: u64) -> Result<Self> {
        Self::new(
            &credentials.supabase_url,
            &credentials.supabase_key,
            timeout_secs,
        )
    }

    /// Append one message row to the session history.
    pub async fn append_message(
        &self,
        session_id: &str,
        role: MessageRole,
        content: &str,
        query_result: Option<&Value>,
        query_params: Option<&Value>,
    ) -> Result<()> {
        let row = message_row(session_id, role, content, query_result, query_params);
        self.insert(&row).await
    }

    /// Persist one question/answer exchange as two ordered messages.
    ///
    /// The bot row records the executed SQL and, when the query
    /// succeeded, its result payload.
    pub async fn save_exchange(
        &self,
        session_id: &str,
        user_message: &str,
        bot_response: &str,
        query_result: Option<&Value>,
        sql: &str,
        explanation: Option<&str>,
    ) -> Result<()> {
        self.append_message(session_id, MessageRole::User, user_message, None, None)
            .await?;

        let params = json!({"sql": sql, "explanation": explanation});
        self.append_message(
            session_id,
            MessageRole::Bot,
            bot_response,
            query_result,
            Some(&params),
        )
        .await
    }

    async fn insert(&self, row: &Value) -> Result<()> {
        let url = format!("{}/rest/v1/{MESSAGES_TABLE}", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Prefer", "return=minimal")
            .json(row)
            .send()
            .await
            .map_err(|e| BackendError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Api(format!("HTTP {status}: {body}")).into());
        }
        Ok(())
    }
}

fn message_row(
    session_id: &str,
    role: MessageRole,
    content: &str,
    query_result: Option<&Value>,
    query_params: Option<&Value>,
) -> Value {
    let mut row = json!({
        "session_id": session_id,
        "message_type": role.as_str(),
        "content": content,
    });
    if let Some(result) = query_result {
        row["query_result"] = result.clone();
    }
    if let Some(params) = query_params {
        row["query_params"] = params.clone();
    }
    row
}
