//! Intent types produced by query interpretation.

/// What the user is asking for, decided once per query.
///
/// This is the sole hand-off between interpretation and execution;
/// later stages branch on it and never revisit the raw model output.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// A read query to validate and execute.
    Sql {
        sql: String,
        explanation: Option<String>,
    },
    /// A greeting or "what can you do" question.
    Help,
    /// A request to enumerate the accessible tables.
    ListTables,
    /// A reply the model (or the parser) authored directly; shown to
    /// the user as-is without touching the backend.
    Error { message: String },
}
