//! Fixed user-facing message text.
//!
//! Every string a user can see outside of model-generated prose lives
//! here, so the wording stays identical across the single-shot and
//! streaming paths.

/// Greeting shown for help-style queries.
pub const GREETING: &str = "Hello! I'm your Supabase database assistant. \
    I can help you explore and query your database using natural language. \
    Ask me 'What tables do I have?' to see your data structure, or try \
    queries like 'count records', 'show me data', or any other questions \
    about your database.";

/// Backend unreachable or credentials rejected.
pub const CONNECTION_FAILED: &str = "I'm having trouble connecting to your \
    database. Please check your Supabase configuration.";

/// Schema discovery found nothing accessible.
pub const NO_PERMISSIONS: &str = "I couldn't retrieve information about your \
    database structure. Please ensure your Supabase credentials have the \
    necessary permissions.";

/// Model call failed before an intent could be produced.
pub const INTERPRETATION_FAILED: &str = "I'm having trouble understanding \
    your query. Could you try rephrasing it? For example, you could ask \
    'Show me all users' or 'What tables do I have?'";

/// Backend rejected the translated query.
pub const EXECUTION_FAILED: &str = "I encountered an error while executing \
    your query. Please try rephrasing or check your query parameters.";

/// Catch-all for unclassified failures.
pub const GENERAL_ERROR: &str = "I encountered an unexpected error while \
    processing your query. Please try again or check your configuration.";

/// Model produced a `sql` intent with no statement in it.
pub const EMPTY_SQL: &str = "I couldn't generate a SQL query for your \
    request. Could you try rephrasing it?";

/// Shown when prose rendering fails; results are never echoed raw.
pub const RENDER_FALLBACK: &str = "I found some results for your query, but \
    I'm having trouble explaining them right now.";
