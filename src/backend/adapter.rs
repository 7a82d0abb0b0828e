//! SQL-to-builder execution adapter.
//!
//! Maps a validated SQL string onto the backend's structured call
//! surface. Two tiers: an exact-count shortcut for statements that
//! mention `count`, then a structural parser for plain selects. Every
//! failure, including backend errors, becomes a failed [`QueryOutcome`]
//! rather than an escaping error.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::backend::traits::{DataBackend, Row, TableFilter};
use crate::error::QueryError;
use crate::safety;

/// How a statement was ultimately executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMethod {
    ExactCount,
    FallbackParse,
}

/// Result of executing one statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryOutcome {
    pub success: bool,
    pub rows: Vec<Row>,
    pub row_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_method: Option<ExecutionMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryOutcome {
    fn completed(rows: Vec<Row>, method: ExecutionMethod) -> Self {
        let row_count = rows.len();
        Self {
            success: true,
            rows,
            row_count,
            execution_method: Some(method),
            error: None,
        }
    }

    fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            rows: Vec::new(),
            row_count: 0,
            execution_method: None,
            error: Some(error.into()),
        }
    }
}

/// Executes validated SQL through the structured backend API.
#[derive(Clone)]
pub struct SqlBackendAdapter {
    backend: Arc<dyn DataBackend>,
    default_limit: usize,
}

impl SqlBackendAdapter {
    pub fn new(backend: Arc<dyn DataBackend>, default_limit: usize) -> Self {
        Self {
            backend,
            default_limit,
        }
    }

    /// Execute one statement.
    ///
    /// The statement is re-validated first; "already checked" is an
    /// assumption this layer does not trust.
    pub async fn execute(&self, sql: &str) -> QueryOutcome {
        let verdict = safety::validate(sql);
        if !verdict.allowed {
            tracing::warn!(sql, "Blocked unsafe SQL at execution");
            return QueryOutcome::failure(verdict.reason_text());
        }

        let lowered = sql.to_ascii_lowercase();
        if lowered.contains("count") && lowered.contains("from") {
            self.execute_count(&lowered).await
        } else {
            self.execute_fallback(sql, &lowered).await
        }
    }

    async fn execute_count(&self, lowered: &str) -> QueryOutcome {
        let table = match table_after_from(lowered) {
            Some(table) => table,
            None => {
                return QueryOutcome::failure(
                    QueryError::UnsupportedSql("could not find a table name after FROM".to_string())
                        .to_string(),
                )
            }
        };

        match self.backend.count_exact(&table, None).await {
            Ok(count) => {
                let mut row = Row::new();
                row.insert("count".to_string(), json!(count));
                QueryOutcome::completed(vec![row], ExecutionMethod::ExactCount)
            }
            Err(e) => QueryOutcome::failure(QueryError::Execution(e.to_string()).to_string()),
        }
    }

    async fn execute_fallback(&self, sql: &str, lowered: &str) -> QueryOutcome {
        let parsed = match parse_simple_select(sql, lowered, self.default_limit) {
            Ok(parsed) => parsed,
            Err(detail) => {
                return QueryOutcome::failure(format!("Fallback SQL parsing failed: {detail}"))
            }
        };

        match self
            .backend
            .select_filtered(
                &parsed.table,
                parsed.columns.as_deref(),
                parsed.filter.as_ref(),
                parsed.limit,
            )
            .await
        {
            Ok(rows) => QueryOutcome::completed(rows, ExecutionMethod::FallbackParse),
            Err(e) => QueryOutcome::failure(QueryError::Execution(e.to_string()).to_string()),
        }
    }
}

/// Structural pieces of a plain `select` statement.
#[derive(Debug, PartialEq)]
struct ParsedSelect {
    table: String,
    columns: Option<Vec<String>>,
    filter: Option<TableFilter>,
    limit: usize,
}

/// Split a plain select into table, columns, filter, and limit.
///
/// Positions are found on the lower-cased text, values are sliced from
/// the original so literal case survives. Constructs the grammar
/// cannot express fail loudly instead of degrading into a partial
/// match.
fn parse_simple_select(
    sql: &str,
    lowered: &str,
    default_limit: usize,
) -> Result<ParsedSelect, String> {
    for (needle, construct) in [
        (" join ", "JOIN"),
        (" or ", "OR"),
        (" order by ", "ORDER BY"),
        (" group by ", "GROUP BY"),
    ] {
        if lowered.contains(needle) {
            return Err(format!("unsupported SQL construct: {construct}"));
        }
    }

    let from_pos = lowered
        .find(" from ")
        .ok_or_else(|| "missing FROM clause".to_string())?;

    // Columns: everything between `select` and `from`
    let select_part = lowered[..from_pos].trim();
    let select_part = select_part.strip_prefix("select").unwrap_or(select_part).trim();
    let columns = if select_part == "*" || select_part.is_empty() {
        None
    } else if select_part.contains('(') {
        return Err("unsupported SQL construct: aggregate functions other than COUNT".to_string());
    } else {
        Some(
            select_part
                .split(',')
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect::<Vec<_>>(),
        )
    };

    let after_from = &lowered[from_pos + " from ".len()..];
    let table = after_from
        .split_whitespace()
        .next()
        .map(|t| t.trim_end_matches(';').to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| "could not find a table name after FROM".to_string())?;

    // WHERE: a single `column = value` equality
    let filter = match lowered.find(" where ") {
        None => None,
        Some(where_pos) => {
            let clause_start = where_pos + " where ".len();
            let clause_end = lowered[clause_start..]
                .find(" limit ")
                .map(|i| clause_start + i)
                .unwrap_or(lowered.len());
            let clause = sql[clause_start..clause_end].trim().trim_end_matches(';').trim();
            Some(parse_equality(clause)?)
        }
    };

    // LIMIT: an unparsable value falls back to the default
    let limit = match lowered.find(" limit ") {
        None => default_limit,
        Some(limit_pos) => lowered[limit_pos + " limit ".len()..]
            .split_whitespace()
            .next()
            .map(|t| t.trim_end_matches(';'))
            .and_then(|t| t.parse::<usize>().ok())
            .unwrap_or(default_limit),
    };

    Ok(ParsedSelect {
        table,
        columns,
        filter,
        limit,
    })
}

/// `column = value`, with the value coerced int, then float, then string.
fn parse_equality(clause: &str) -> Result<TableFilter, String> {
    let parts: Vec<&str> = clause.split(" = ").collect();
    if parts.len() != 2 {
        return Err(format!("Unsupported WHERE clause format: {clause}"));
    }

    let column = parts[0].trim();
    let raw = parts[1].trim().trim_matches('\'').trim_matches('"');
    Ok(TableFilter::new(column, coerce_literal(raw)))
}

fn coerce_literal(raw: &str) -> serde_json::Value {
    if let Ok(n) = raw.parse::<i64>() {
        return json!(n);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return json!(f);
    }
    json!(raw)
}

/// Table name: the token immediately after the first `from`.
fn table_after_from(lowered: &str) -> Option<String> {
    let mut words = lowered.split_whitespace();
    while let Some(word) = words.next() {
        if word == "from" {
            return words
                .next()
                .map(|token| token.trim_end_matches(';').to_string())
                .filter(|t| !t.is_empty());
        }
    }
    None
}
