//! SQL safety validation.
//!
//! Two gates run in order. A token denylist rejects anything carrying a
//! write verb, comment sequence, or catalog token, with the same
//! wording the service has always used. Statements that survive it are
//! then parsed and must reduce to the supported grammar:
//! `SELECT cols|COUNT(*) FROM table [WHERE col = literal] [LIMIT n]`.
//! Anything else is denied. The validator is a pure function over the
//! input string and never panics; unparsable input is denied.

use sqlparser::ast::{
    BinaryOperator, Expr, Function, FunctionArg, FunctionArgExpr, FunctionArguments, GroupByExpr,
    SelectItem, SetExpr, Statement, TableFactor, Value,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

/// Tokens that are never allowed anywhere in a candidate statement.
const FORBIDDEN_TOKENS: &[&str] = &[
    "insert",
    "update",
    "delete",
    "drop",
    "alter",
    "create",
    "truncate",
    "replace",
    "merge",
    "grant",
    "revoke",
    "exec",
    "execute",
    "sp_",
    "xp_",
    "--",
    "/*",
    "*/",
    "union",
    "into",
    "information_schema",
    "pg_",
    "sys",
    "schema",
    "database",
    "table",
    "column",
    "index",
];

const ONLY_SELECT: &str =
    "Only SELECT queries are allowed. I can help you view, count, or filter your data.";
const MULTIPLE_STATEMENTS: &str = "Multiple SQL statements are not allowed.";
const VALIDATION_FAILED: &str = "Unable to validate SQL safety";

/// The validator's allow/deny decision on a candidate SQL string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyVerdict {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl SafetyVerdict {
    fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }

    /// The denial reason, or an empty string when allowed.
    pub fn reason_text(&self) -> &str {
        self.reason.as_deref().unwrap_or_default()
    }
}

/// Decide whether a candidate SQL string may be executed.
pub fn validate(sql: &str) -> SafetyVerdict {
    let lowered = sql.to_lowercase();
    let lowered = lowered.trim();

    for token in FORBIDDEN_TOKENS {
        if lowered.contains(token) {
            return SafetyVerdict::deny(format!(
                "Unsafe SQL detected: '{token}' operations are not allowed. \
                 Only SELECT and COUNT queries are permitted."
            ));
        }
    }

    if !lowered.starts_with("select") {
        return SafetyVerdict::deny(ONLY_SELECT);
    }

    if sql.matches(';').count() > 1 {
        return SafetyVerdict::deny(MULTIPLE_STATEMENTS);
    }

    match check_shape(sql) {
        Ok(()) => SafetyVerdict::allow(),
        Err(reason) => SafetyVerdict::deny(reason),
    }
}

fn shape_reason(detail: &str) -> String {
    format!("Unsafe SQL structure: {detail}. Only simple SELECT and COUNT queries are permitted.")
}

/// Parse the statement and reject anything outside the supported grammar.
fn check_shape(sql: &str) -> Result<(), String> {
    let statements =
        Parser::parse_sql(&GenericDialect {}, sql).map_err(|_| VALIDATION_FAILED.to_string())?;

    let query = match statements.as_slice() {
        [Statement::Query(query)] => query,
        [] => return Err(VALIDATION_FAILED.to_string()),
        [_] => return Err(ONLY_SELECT.to_string()),
        _ => return Err(MULTIPLE_STATEMENTS.to_string()),
    };

    if query.with.is_some() {
        return Err(shape_reason("WITH clauses are not allowed"));
    }
    if query.order_by.is_some() {
        return Err(shape_reason("ORDER BY is not allowed"));
    }
    if query.offset.is_some() || query.fetch.is_some() || !query.limit_by.is_empty() {
        return Err(shape_reason("only a plain LIMIT is allowed"));
    }
    if !query.locks.is_empty() {
        return Err(shape_reason("locking clauses are not allowed"));
    }

    match &query.limit {
        None => {}
        Some(Expr::Value(Value::Number(_, _))) => {}
        // A bare token is tolerated; the execution tier substitutes the
        // default limit for values it cannot parse.
        Some(Expr::Identifier(_)) => {}
        Some(_) => return Err(shape_reason("LIMIT must be a plain number")),
    }

    let select = match query.body.as_ref() {
        SetExpr::Select(select) => select,
        _ => return Err(shape_reason("only a single plain SELECT is allowed")),
    };

    if select.distinct.is_some() || select.top.is_some() {
        return Err(shape_reason("DISTINCT and TOP are not allowed"));
    }
    if !matches!(&select.group_by, GroupByExpr::Expressions(exprs, _) if exprs.is_empty()) {
        return Err(shape_reason("GROUP BY is not allowed"));
    }
    if select.having.is_some() {
        return Err(shape_reason("HAVING is not allowed"));
    }
    if !select.sort_by.is_empty() {
        return Err(shape_reason("SORT BY is not allowed"));
    }

    if select.from.len() != 1 {
        return Err(shape_reason("exactly one table is required"));
    }
    let table = &select.from[0];
    if !table.joins.is_empty() {
        return Err(shape_reason("JOIN clauses are not allowed"));
    }
    match &table.relation {
        TableFactor::Table { args: None, .. } => {}
        _ => return Err(shape_reason("only a plain table name is allowed")),
    }

    if select.projection.is_empty() {
        return Err(shape_reason("the select list is empty"));
    }
    for item in &select.projection {
        let expr = match item {
            SelectItem::Wildcard(_) => continue,
            SelectItem::UnnamedExpr(expr) => expr,
            SelectItem::ExprWithAlias { expr, .. } => expr,
            SelectItem::QualifiedWildcard(_, _) => {
                return Err(shape_reason("qualified wildcards are not allowed"))
            }
        };
        match expr {
            Expr::Identifier(_) => {}
            Expr::Function(func) if is_count_star(func) => {}
            _ => {
                return Err(shape_reason(
                    "only plain columns and COUNT(*) are allowed in the select list",
                ))
            }
        }
    }

    if let Some(selection) = &select.selection {
        check_predicate(selection)?;
    }

    Ok(())
}

fn is_count_star(func: &Function) -> bool {
    if !func.name.to_string().eq_ignore_ascii_case("count") {
        return false;
    }
    if func.over.is_some() || func.filter.is_some() {
        return false;
    }
    match &func.args {
        FunctionArguments::List(list) => {
            list.args.len() == 1
                && matches!(&list.args[0], FunctionArg::Unnamed(FunctionArgExpr::Wildcard))
        }
        _ => false,
    }
}

/// A WHERE clause must be a single `column = literal` equality.
fn check_predicate(expr: &Expr) -> Result<(), String> {
    match expr {
        Expr::BinaryOp {
            left,
            op: BinaryOperator::Eq,
            right,
        } => {
            let column_ok = matches!(left.as_ref(), Expr::Identifier(_));
            let value_ok = matches!(
                right.as_ref(),
                Expr::Value(
                    Value::Number(_, _)
                        | Value::SingleQuotedString(_)
                        | Value::DoubleQuotedString(_)
                        | Value::Boolean(_)
                )
            );
            if column_ok && value_ok {
                Ok(())
            } else {
                Err(shape_reason("only a column = literal filter is allowed"))
            }
        }
        Expr::Nested(inner) => check_predicate(inner),
        Expr::BinaryOp {
            op: BinaryOperator::And | BinaryOperator::Or,
            ..
        } => Err(shape_reason("only a single equality filter is allowed")),
        _ => Err(shape_reason("only a column = literal filter is allowed")),
    }
}
