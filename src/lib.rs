//! Tabletalk: natural-language chat over a Supabase database
//!
//! Translates free-form questions into constrained, read-only SQL,
//! executes them against the Supabase REST surface, and renders the
//! results back as prose. Ships a small HTTP API and a CLI.

pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod interpret;
pub mod llm;
pub mod messages;
pub mod pipeline;
pub mod safety;
pub mod schema;
pub mod session;

pub use api::{create_router, serve, ApiState, ChatRequest, ChatResponse, ErrorResponse};
pub use backend::{DataBackend, QueryOutcome, SqlBackendAdapter, SupabaseBackend};
pub use config::{Config, Credentials};
pub use error::{Result, TabletalkError};
pub use interpret::{Intent, NlToSqlInterpreter};
pub use llm::{ChatModel, OpenAiChatModel};
pub use pipeline::{Event, QueryPipeline, QueryResponse, Stage};
pub use safety::SafetyVerdict;
pub use schema::{SchemaIntrospector, SchemaSnapshot, TableDescriptor};
pub use session::{MessageRole, SessionStore};
