//! Query pipeline orchestration.
//!
//! One [`QueryPipeline`] answers one user question end to end:
//! connectivity probe, schema discovery, interpretation, safety gate,
//! execution, rendering, and best-effort session persistence. The
//! single-shot and streaming paths share every stage; streaming adds
//! progress events and chunked prose.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::backend::{DataBackend, SqlBackendAdapter, SupabaseBackend};
use crate::config::{Config, Credentials};
use crate::interpret::{Intent, NlToSqlInterpreter};
use crate::llm::{ChatModel, OpenAiChatModel};
use crate::messages;
use crate::safety;
use crate::schema::{SchemaIntrospector, SchemaSnapshot, KNOWN_TABLES};
use crate::session::SessionStore;

/// Pipeline stages surfaced as progress updates while streaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Connecting,
    AnalyzingSchema,
    InterpretingQuery,
    ExecutingQuery,
    GeneratingResponse,
}

impl Stage {
    /// Human-readable progress line for this stage.
    pub fn message(&self) -> &'static str {
        match self {
            Stage::Connecting => "Connecting to database...",
            Stage::AnalyzingSchema => "Analyzing database structure...",
            Stage::InterpretingQuery => "Understanding your query...",
            Stage::ExecutingQuery => "Executing database query...",
            Stage::GeneratingResponse => "Generating response...",
        }
    }
}

/// Incremental events produced by [`QueryPipeline::run_stream`].
///
/// A stream is a prefix of `Status` events followed by exactly one
/// terminal: `Response`, `ResponseChunk`* then one `Final`, or `Error`.
/// The `Done` marker is appended by the web layer, never by the
/// pipeline itself.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A stage is about to execute.
    Status {
        stage: Stage,
        message: &'static str,
    },
    /// Terminal reply for short-circuit intents.
    #[serde(rename_all = "camelCase")]
    Response {
        message: String,
        query_result: Option<Value>,
    },
    /// One piece of streamed prose.
    ResponseChunk { content: String },
    /// Terminal summary after a SQL execution.
    #[serde(rename_all = "camelCase")]
    Final {
        query_result: Option<Value>,
        sql_query: String,
        explanation: Option<String>,
        error: Option<String>,
    },
    /// Terminal failure.
    Error { message: String, error: String },
    /// End-of-stream marker.
    Done,
}

/// Reply shape for the single-shot query path.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql_query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryResponse {
    fn reply(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            ..Self::default()
        }
    }

    fn failure(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            response: message.into(),
            error: Some(detail.into()),
            ..Self::default()
        }
    }
}

/// Orchestrates one user query end to end.
#[derive(Clone)]
pub struct QueryPipeline {
    backend: Arc<dyn DataBackend>,
    introspector: SchemaIntrospector,
    interpreter: NlToSqlInterpreter,
    adapter: SqlBackendAdapter,
    sessions: Option<SessionStore>,
}

impl QueryPipeline {
    pub fn new(
        backend: Arc<dyn DataBackend>,
        model: Arc<dyn ChatModel>,
        sessions: Option<SessionStore>,
        default_limit: usize,
    ) -> Self {
        Self {
            introspector: SchemaIntrospector::new(backend.clone()),
            adapter: SqlBackendAdapter::new(backend.clone(), default_limit),
            interpreter: NlToSqlInterpreter::new(model),
            backend,
            sessions,
        }
    }

    /// Assemble a pipeline from configuration and resolved credentials.
    pub fn from_config(config: &Config, credentials: &Credentials) -> crate::error::Result<Self> {
        let backend = Arc::new(SupabaseBackend::from_credentials(
            credentials,
            config.supabase.timeout_secs,
        )?);
        let model = Arc::new(OpenAiChatModel::from_config(
            &config.openai,
            &credentials.openai_api_key,
        )?);
        let sessions = Some(SessionStore::from_credentials(
            credentials,
            config.supabase.timeout_secs,
        )?);

        Ok(Self::new(
            backend,
            model,
            sessions,
            config.limits.default_query_limit,
        ))
    }

    /// Answer one user query, returning a complete response.
    ///
    /// Infallible by construction: every failure class maps to a fixed
    /// user-facing reply, with the diagnostic detail carried in the
    /// `error` field rather than surfaced as the answer.
    pub async fn run(&self, user_query: &str, session_id: Option<&str>) -> QueryResponse {
        if let Err(detail) = self.check_connectivity().await {
            return QueryResponse::failure(messages::CONNECTION_FAILED, detail);
        }

        let schema = self.introspector.discover().await;
        if !schema.has_accessible_tables() {
            return QueryResponse::failure(messages::NO_PERMISSIONS, "No accessible tables found");
        }

        let intent = match self.interpreter.interpret(user_query, &schema).await {
            Ok(intent) => intent,
            Err(e) => {
                tracing::error!(error = %e, "SQL generation failed");
                return QueryResponse::failure(messages::INTERPRETATION_FAILED, e.to_string());
            }
        };

        match intent {
            Intent::Help => QueryResponse::reply(messages::GREETING),
            Intent::ListTables => self.tables_response(&schema),
            Intent::Error { message } => QueryResponse::reply(message),
            Intent::Sql { sql, explanation } => {
                self.execute_and_render(user_query, session_id, &sql, explanation)
                    .await
            }
        }
    }

    /// Answer one user query as a stream of progress and result events.
    ///
    /// The returned channel yields a finite sequence ending with exactly
    /// one terminal event; dropping the receiver cancels the work.
    pub fn run_stream(
        &self,
        user_query: &str,
        session_id: Option<&str>,
    ) -> mpsc::UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        let pipeline = self.clone();
        let user_query = user_query.to_string();
        let session_id = session_id.map(str::to_string);

        tokio::spawn(async move {
            pipeline
                .stream_inner(&user_query, session_id.as_deref(), &tx)
                .await;
        });

        rx
    }

    async fn stream_inner(
        &self,
        user_query: &str,
        session_id: Option<&str>,
        tx: &mpsc::UnboundedSender<Event>,
    ) {
        if !send_status(tx, Stage::Connecting) {
            return;
        }
        if let Err(detail) = self.check_connectivity().await {
            let _ = tx.send(Event::Error {
                message: messages::CONNECTION_FAILED.to_string(),
                error: detail,
            });
            return;
        }

        if !send_status(tx, Stage::AnalyzingSchema) {
            return;
        }
        let schema = self.introspector.discover().await;
        if !schema.has_accessible_tables() {
            let _ = tx.send(Event::Error {
                message: messages::NO_PERMISSIONS.to_string(),
                error: "No accessible tables found".to_string(),
            });
            return;
        }

        if !send_status(tx, Stage::InterpretingQuery) {
            return;
        }
        let intent = match self.interpreter.interpret(user_query, &schema).await {
            Ok(intent) => intent,
            Err(e) => {
                tracing::error!(error = %e, "SQL generation failed");
                let _ = tx.send(Event::Error {
                    message: messages::INTERPRETATION_FAILED.to_string(),
                    error: e.to_string(),
                });
                return;
            }
        };

        match intent {
            Intent::Help => {
                let _ = tx.send(Event::Response {
                    message: messages::GREETING.to_string(),
                    query_result: None,
                });
            }
            Intent::ListTables => {
                let reply = self.tables_response(&schema);
                let _ = tx.send(Event::Response {
                    message: reply.response,
                    query_result: reply.query_result,
                });
            }
            Intent::Error { message } => {
                let _ = tx.send(Event::Response {
                    message,
                    query_result: None,
                });
            }
            Intent::Sql { sql, explanation } => {
                self.stream_sql(user_query, session_id, &sql, explanation, tx)
                    .await;
            }
        }
    }

    async fn stream_sql(
        &self,
        user_query: &str,
        session_id: Option<&str>,
        sql: &str,
        explanation: Option<String>,
        tx: &mpsc::UnboundedSender<Event>,
    ) {
        let verdict = safety::validate(sql);
        if !verdict.allowed {
            let reason = verdict.reason_text().to_string();
            tracing::warn!(sql, "Rejected unsafe SQL");
            let _ = tx.send(Event::Error {
                message: reason.clone(),
                error: reason,
            });
            return;
        }

        if !send_status(tx, Stage::ExecutingQuery) {
            return;
        }
        tracing::info!(sql, "Executing SQL");
        let outcome = self.adapter.execute(sql).await;
        let outcome_json = serde_json::to_value(&outcome).unwrap_or_default();
        let query_result = outcome.success.then(|| outcome_json.clone());

        if !send_status(tx, Stage::GeneratingResponse) {
            return;
        }
        let mut chunks = self.interpreter.render_stream(user_query, &outcome_json).await;
        let mut full_response = String::new();
        while let Some(chunk) = chunks.recv().await {
            full_response.push_str(&chunk);
            if tx.send(Event::ResponseChunk { content: chunk }).is_err() {
                return;
            }
        }

        let _ = tx.send(Event::Final {
            query_result: query_result.clone(),
            sql_query: sql.to_string(),
            explanation: explanation.clone(),
            error: if outcome.success {
                None
            } else {
                outcome.error.clone()
            },
        });

        if let Some(session_id) = session_id {
            self.persist(
                session_id,
                user_query,
                &full_response,
                query_result,
                sql,
                explanation,
            );
        }
    }

    async fn execute_and_render(
        &self,
        user_query: &str,
        session_id: Option<&str>,
        sql: &str,
        explanation: Option<String>,
    ) -> QueryResponse {
        let verdict = safety::validate(sql);
        if !verdict.allowed {
            let reason = verdict.reason_text().to_string();
            tracing::warn!(sql, "Rejected unsafe SQL");
            return QueryResponse {
                response: reason.clone(),
                sql_query: Some(sql.to_string()),
                explanation,
                error: Some(reason),
                ..QueryResponse::default()
            };
        }

        tracing::info!(sql, "Executing SQL");
        let outcome = self.adapter.execute(sql).await;
        let outcome_json = serde_json::to_value(&outcome).unwrap_or_default();
        let query_result = outcome.success.then(|| outcome_json.clone());

        let response_text = self.interpreter.render(user_query, &outcome_json).await;

        if let Some(session_id) = session_id {
            self.persist(
                session_id,
                user_query,
                &response_text,
                query_result.clone(),
                sql,
                explanation.clone(),
            );
        }

        QueryResponse {
            response: response_text,
            query_result,
            sql_query: Some(sql.to_string()),
            explanation,
            error: if outcome.success {
                None
            } else {
                outcome.error.clone()
            },
        }
    }

    /// Probe the backend with a zero-row select on the canonical table.
    ///
    /// A missing-relation error still proves the server answered and the
    /// credentials were accepted, so it counts as reachable.
    async fn check_connectivity(&self) -> std::result::Result<(), String> {
        match self.backend.probe(KNOWN_TABLES[0]).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let detail = e.to_string();
                let lowered = detail.to_lowercase();
                if lowered.contains("relation") && lowered.contains("does not exist") {
                    return Ok(());
                }
                tracing::error!(error = %detail, "Connection test failed");
                Err(detail)
            }
        }
    }

    fn tables_response(&self, schema: &SchemaSnapshot) -> QueryResponse {
        let names = schema.accessible_names();
        let response = format!(
            "Your database has {} tables: {}. You can ask me to count records, view data, or filter information from any of these tables.",
            names.len(),
            names.join(", ")
        );
        QueryResponse {
            response,
            query_result: Some(json!({
                "tables": names,
                "total_tables": names.len(),
            })),
            ..QueryResponse::default()
        }
    }

    /// Persist one exchange without blocking the reply.
    fn persist(
        &self,
        session_id: &str,
        user_message: &str,
        bot_response: &str,
        query_result: Option<Value>,
        sql: &str,
        explanation: Option<String>,
    ) {
        let Some(store) = self.sessions.clone() else {
            return;
        };
        let session_id = session_id.to_string();
        let user_message = user_message.to_string();
        let bot_response = bot_response.to_string();
        let sql = sql.to_string();

        tokio::spawn(async move {
            if let Err(e) = store
                .save_exchange(
                    &session_id,
                    &user_message,
                    &bot_response,
                    query_result.as_ref(),
                    &sql,
                    explanation.as_deref(),
                )
                .await
            {
                tracing::warn!(error = %e, "Failed to save messages to database");
            }
        });
    }
}

fn send_status(tx: &mpsc::UnboundedSender<Event>, stage: Stage) -> bool {
    tx.send(Event::Status {
        stage,
        message: stage.message(),
    })
    .is_ok()
}
