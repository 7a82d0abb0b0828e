//! Schema discovery.
//!
//! Probes a fixed candidate table list against the backend and infers
//! each accessible table's columns from a single sample row. The
//! resulting [`SchemaSnapshot`] feeds both the interpretation prompt
//! and the list-tables answer.

mod introspector;
mod types;

pub use introspector::{SchemaIntrospector, KNOWN_TABLES};
pub use types::{SchemaSnapshot, TableDescriptor};
