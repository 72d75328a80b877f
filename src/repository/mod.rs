//! Repository layer (§4.3): a uniform query/insert/validate contract backed
//! by either a remote columnar warehouse or an embedded analytic engine.
//! Callers depend only on [`Repository`]; they never branch on backend.

pub mod embedded;
pub mod warehouse;

#[cfg(test)]
pub mod test_support;

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::PrsError;

/// The small set of canonical scalar types rows are converted into, regardless
/// of the underlying database's native type system.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// One result row: column name → canonical scalar value.
pub type Row = BTreeMap<String, Value>;

/// A bound query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Text(String),
    Int(i64),
    Float(f64),
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Param::Text(value.to_string())
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Param::Text(value)
    }
}

/// A cancellation- and timeout-carrying request context, threaded through
/// every remote operation per §5.
#[derive(Debug, Clone)]
pub struct RepoContext {
    pub cancellation: CancellationToken,
    pub timeout: Duration,
}

impl RepoContext {
    pub fn new(timeout: Duration) -> Self {
        Self {
            cancellation: CancellationToken::new(),
            timeout,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn check_cancelled(&self, op: &str) -> Result<(), PrsError> {
        if self.is_cancelled() {
            return Err(PrsError::Cancelled(op.to_string()));
        }
        Ok(())
    }
}

/// The positional-parameter placeholder syntax a backend's SQL dialect expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// Postgres-style `$1`, `$2`, ...
    Dollar,
    /// SQLite-style positional `?`.
    QuestionMark,
}

impl PlaceholderStyle {
    pub fn render(self, index: usize) -> String {
        match self {
            Self::Dollar => format!("${index}"),
            Self::QuestionMark => "?".to_string(),
        }
    }
}

/// The uniform contract both tabular-store drivers implement (§4.3).
#[async_trait]
pub trait Repository: Send + Sync {
    /// The placeholder syntax this backend's SQL dialect expects.
    fn placeholder_style(&self) -> PlaceholderStyle;

    /// Runs `sql` with positional `args`, returning canonical-scalar rows.
    async fn query(&self, ctx: &RepoContext, sql: &str, args: &[Param]) -> Result<Vec<Row>, PrsError>;

    /// Inserts `rows` into `table`. Callers must ensure cache-key uniqueness
    /// themselves; duplicate full-row inserts are not deduplicated here.
    async fn insert(&self, ctx: &RepoContext, table: &str, rows: &[Row]) -> Result<(), PrsError>;

    /// Equivalent to `validate_table(ctx, table, {})`.
    async fn test_connection(&self, ctx: &RepoContext, table: &str) -> Result<(), PrsError> {
        self.validate_table(ctx, table, &HashSet::new()).await
    }

    /// Confirms `table` exists and its schema is a superset of `required_columns`.
    async fn validate_table(
        &self,
        ctx: &RepoContext,
        table: &str,
        required_columns: &HashSet<String>,
    ) -> Result<(), PrsError>;
}

/// Builds a disjunction predicate over `columns` for `key_count` tuples, e.g.
/// `(a = $1 AND b = $2 AND c = $3) OR (a = $4 AND b = $5 AND c = $6)`, using
/// `placeholder` to render the Nth bound parameter for the target dialect.
pub fn build_disjunction_predicate(
    columns: &[&str],
    key_count: usize,
    mut placeholder: impl FnMut(usize) -> String,
) -> String {
    let mut clauses = Vec::with_capacity(key_count);
    let mut next_index = 1usize;
    for _ in 0..key_count {
        let mut terms = Vec::with_capacity(columns.len());
        for column in columns {
            terms.push(format!("{column} = {}", placeholder(next_index)));
            next_index += 1;
        }
        clauses.push(format!("({})", terms.join(" AND ")));
    }
    clauses.join(" OR ")
}
