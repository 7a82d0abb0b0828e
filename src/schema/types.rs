//! Schema snapshot types.

use serde::{Deserialize, Serialize};

/// What discovery learned about one candidate table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescriptor {
    /// Table name
    pub name: String,
    /// Column names inferred from a sample row (empty when unknown)
    pub columns: Vec<String>,
    /// Best-effort exact row count
    pub estimated_row_count: Option<u64>,
    /// Whether the access probe succeeded
    pub accessible: bool,
    /// Probe or sampling error, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Point-in-time inferred description of the reachable tables.
///
/// Built by sampling, not catalog metadata; the backend's query
/// surface does not expose the catalog to this credential scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    /// Every probed table, accessible or not, in discovery order
    pub tables: Vec<TableDescriptor>,
    /// Number of tables whose probe succeeded
    pub total_accessible: usize,
}

impl SchemaSnapshot {
    pub fn new(tables: Vec<TableDescriptor>) -> Self {
        let total_accessible = tables.iter().filter(|t| t.accessible).count();
        Self {
            tables,
            total_accessible,
        }
    }

    pub fn has_accessible_tables(&self) -> bool {
        self.total_accessible > 0
    }

    /// Names of the accessible tables, in discovery order.
    pub fn accessible_names(&self) -> Vec<&str> {
        self.tables
            .iter()
            .filter(|t| t.accessible)
            .map(|t| t.name.as_str())
            .collect()
    }

    /// Accessible tables as descriptors, in discovery order.
    pub fn accessible_tables(&self) -> impl Iterator<Item = &TableDescriptor> {
        self.tables.iter().filter(|t| t.accessible)
    }

    /// One quick-reference line per accessible table: the name plus up
    /// to five column names.
    pub fn summary(&self) -> Vec<String> {
        self.accessible_tables()
            .map(|t| {
                let cols: Vec<&str> = t.columns.iter().take(5).map(String::as_str).collect();
                format!("{}: {}", t.name, cols.join(", "))
            })
            .collect()
    }
}
