//! Data backend trait definitions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One result row: column name to JSON value.
pub type Row = Map<String, Value>;

/// A single equality filter on one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableFilter {
    /// Column name
    pub column: String,
    /// Literal value to match (string, number, or boolean)
    pub value: Value,
}

impl TableFilter {
    pub fn new(column: impl Into<String>, value: Value) -> Self {
        Self {
            column: column.into(),
            value,
        }
    }
}

/// Trait for read-only data backends.
///
/// The capability set deliberately excludes raw SQL execution; every
/// query is expressed through these four structured calls.
#[async_trait]
pub trait DataBackend: Send + Sync {
    /// Probe whether a table is accessible at all (zero-row select).
    async fn probe(&self, table: &str) -> crate::error::Result<()>;

    /// Fetch up to `n` sample rows from a table.
    async fn select_sample(&self, table: &str, n: usize) -> crate::error::Result<Vec<Row>>;

    /// Exact row count for a table, optionally under a filter.
    async fn count_exact(
        &self,
        table: &str,
        filter: Option<&TableFilter>,
    ) -> crate::error::Result<u64>;

    /// Select rows, optionally restricted to named columns, a single
    /// equality filter, and a row limit.
    async fn select_filtered(
        &self,
        table: &str,
        columns: Option<&[String]>,
        filter: Option<&TableFilter>,
        limit: usize,
    ) -> crate::error::Result<Vec<Row>>;
}
