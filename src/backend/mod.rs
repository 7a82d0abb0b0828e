//! Data backend access.
//!
//! [`DataBackend`] is the read-only capability surface the pipeline
//! executes against; [`SupabaseBackend`] implements it over PostgREST.
//! [`SqlBackendAdapter`] maps validated SQL strings onto those calls,
//! so no raw SQL ever travels to the backend.

mod adapter;
mod supabase;
mod traits;

pub use adapter::{ExecutionMethod, QueryOutcome, SqlBackendAdapter};
pub use supabase::SupabaseBackend;
pub use traits::{DataBackend, Row, TableFilter};
