//! Shared doubles for the integration tests.
//!
//! A scripted backend serving fixed tables and a scripted model that
//! answers `complete` calls from a queue, so full pipeline runs are
//! hermetic and deterministic.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use tabletalk::backend::{DataBackend, Row, TableFilter};
use tabletalk::error::{BackendError, ModelError, Result};
use tabletalk::llm::ChatModel;
use tabletalk::pipeline::QueryPipeline;

/// Backend double serving a fixed set of tables.
///
/// Tables not in the set fail their probe with a missing-relation
/// message, the same shape the live REST surface produces.
#[derive(Default)]
pub struct StubBackend {
    tables: HashMap<String, Vec<Row>>,
    unreachable: Option<String>,
    fail_counts: bool,
    calls: Mutex<Vec<String>>,
}

impl StubBackend {
    pub fn with_tables(tables: &[(&str, Vec<Value>)]) -> Self {
        let tables = tables
            .iter()
            .map(|(name, rows)| {
                let rows = rows
                    .iter()
                    .map(|v| v.as_object().cloned().unwrap_or_default())
                    .collect();
                (name.to_string(), rows)
            })
            .collect();
        Self {
            tables,
            ..Self::default()
        }
    }

    /// Every call fails with the given message.
    pub fn unreachable(message: &str) -> Self {
        Self {
            unreachable: Some(message.to_string()),
            ..Self::default()
        }
    }

    /// Tables are visible but every exact count fails.
    pub fn with_failing_counts(tables: &[(&str, Vec<Value>)]) -> Self {
        Self {
            fail_counts: true,
            ..Self::with_tables(tables)
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn rows(&self, table: &str) -> Result<&Vec<Row>> {
        if let Some(message) = &self.unreachable {
            return Err(BackendError::Connection(message.clone()).into());
        }
        self.tables.get(table).ok_or_else(|| {
            BackendError::Api(format!(
                "HTTP 404: relation \"public.{table}\" does not exist"
            ))
            .into()
        })
    }
}

#[async_trait]
impl DataBackend for StubBackend {
    async fn probe(&self, table: &str) -> Result<()> {
        self.record(format!("probe:{table}"));
        self.rows(table).map(|_| ())
    }

    async fn select_sample(&self, table: &str, n: usize) -> Result<Vec<Row>> {
        self.record(format!("sample:{table}:{n}"));
        Ok(self.rows(table)?.iter().take(n).cloned().collect())
    }

    async fn count_exact(&self, table: &str, filter: Option<&TableFilter>) -> Result<u64> {
        self.record(format!("count:{table}:{}", filter.is_some()));
        let rows = self.rows(table)?;
        if self.fail_counts {
            return Err(BackendError::Api("HTTP 403: permission denied".to_string()).into());
        }
        Ok(rows.len() as u64)
    }

    async fn select_filtered(
        &self,
        table: &str,
        columns: Option<&[String]>,
        filter: Option<&TableFilter>,
        limit: usize,
    ) -> Result<Vec<Row>> {
        let cols = columns.map(|c| c.join(",")).unwrap_or_else(|| "*".to_string());
        self.record(format!("select:{table}:{cols}:{limit}"));
        let rows = self
            .rows(table)?
            .iter()
            .filter(|row| match filter {
                None => true,
                Some(f) => row.get(&f.column) == Some(&f.value),
            })
            .take(limit)
            .cloned()
            .collect();
        Ok(rows)
    }
}

/// Model double answering `complete` calls from a scripted queue and
/// `complete_stream` from a scripted chunk list.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<std::result::Result<String, String>>>,
    stream_chunks: Mutex<Option<Vec<std::result::Result<String, String>>>>,
    complete_calls: Mutex<usize>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one successful `complete` reply.
    pub fn reply(self, text: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Ok(text.to_string()));
        self
    }

    /// Queue one failing `complete` reply.
    pub fn fail(self, message: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
        self
    }

    /// Script the chunks the next `complete_stream` call yields.
    pub fn stream(self, chunks: Vec<std::result::Result<&str, &str>>) -> Self {
        let chunks = chunks
            .into_iter()
            .map(|c| c.map(str::to_string).map_err(str::to_string))
            .collect();
        *self.stream_chunks.lock().unwrap() = Some(chunks);
        self
    }

    /// Number of `complete` calls made so far.
    pub fn complete_calls(&self) -> usize {
        *self.complete_calls.lock().unwrap()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(
        &self,
        _system: &str,
        _user: &str,
        _temperature: f32,
        _max_tokens: u32,
    ) -> Result<String> {
        *self.complete_calls.lock().unwrap() += 1;
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(ModelError::Api(message).into()),
            None => Err(ModelError::Api("no scripted reply left".to_string()).into()),
        }
    }

    async fn complete_stream(
        &self,
        _system: &str,
        _user: &str,
        _temperature: f32,
        _max_tokens: u32,
    ) -> Result<mpsc::UnboundedReceiver<Result<String>>> {
        let chunks = match self.stream_chunks.lock().unwrap().take() {
            Some(chunks) => chunks,
            None => return Err(ModelError::Stream("no scripted stream".to_string()).into()),
        };
        let (tx, rx) = mpsc::unbounded_channel();
        for chunk in chunks {
            let _ = tx.send(chunk.map_err(|m| ModelError::Stream(m).into()));
        }
        Ok(rx)
    }
}

/// Pipeline over the doubles, no session store, default limit 10.
pub fn pipeline(backend: StubBackend, model: ScriptedModel) -> QueryPipeline {
    QueryPipeline::new(Arc::new(backend), Arc::new(model), None, 10)
}

/// Pipeline that keeps typed handles to both doubles for assertions.
pub fn pipeline_with_handles(
    backend: StubBackend,
    model: ScriptedModel,
) -> (QueryPipeline, Arc<StubBackend>, Arc<ScriptedModel>) {
    let backend = Arc::new(backend);
    let model = Arc::new(model);
    let pipeline = QueryPipeline::new(backend.clone(), model.clone(), None, 10);
    (pipeline, backend, model)
}
