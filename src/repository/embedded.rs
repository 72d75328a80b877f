//! Embedded analytic engine driver: a pooled, file- or memory-backed SQLite
//! connection, suited to the stats-cache table in single-machine or test
//! deployments.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row as SqlxRow, TypeInfo};

use super::{Param, RepoContext, Repository, Row, Value};
use crate::error::PrsError;

/// SQLite-backed [`Repository`] implementation.
pub struct EmbeddedRepository {
    pool: sqlx::SqlitePool,
}

impl EmbeddedRepository {
    /// `path` is a filesystem path or `:memory:`.
    pub async fn open(path: &str, max_connections: u32) -> Result<Self, PrsError> {
        let url = if path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite://{path}?mode=rwc")
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(&url)
            .await
            .map_err(|e| PrsError::catalogue("<connect>", format!("failed to open embedded store: {e}")))?;
        Ok(Self { pool })
    }

    fn decode_row(row: &SqliteRow) -> Row {
        let mut out = Row::new();
        for column in row.columns() {
            let name = column.name().to_string();
            let value = decode_value(row, column);
            out.insert(name, value);
        }
        out
    }
}

fn decode_value(row: &SqliteRow, column: &sqlx::sqlite::SqliteColumn) -> Value {
    let idx = column.ordinal();
    match column.type_info().name() {
        "BOOLEAN" => row
            .try_get::<Option<bool>, _>(idx)
            .ok()
            .flatten()
            .map_or(Value::Null, Value::Bool),
        "INTEGER" => row
            .try_get::<Option<i64>, _>(idx)
            .ok()
            .flatten()
            .map_or(Value::Null, Value::Int),
        "REAL" => row
            .try_get::<Option<f64>, _>(idx)
            .ok()
            .flatten()
            .map_or(Value::Null, Value::Float),
        "BLOB" => row
            .try_get::<Option<Vec<u8>>, _>(idx)
            .ok()
            .flatten()
            .map_or(Value::Null, Value::Bytes),
        _ => row
            .try_get::<Option<String>, _>(idx)
            .ok()
            .flatten()
            .map_or(Value::Null, Value::Text),
    }
}

fn bind_params<'q>(
    mut query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    args: &'q [Param],
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    for arg in args {
        query = match arg {
            Param::Text(s) => query.bind(s.as_str()),
            Param::Int(i) => query.bind(i),
            Param::Float(f) => query.bind(f),
        };
    }
    query
}

#[async_trait]
impl Repository for EmbeddedRepository {
    fn placeholder_style(&self) -> super::PlaceholderStyle {
        super::PlaceholderStyle::QuestionMark
    }

    async fn query(&self, ctx: &RepoContext, sql: &str, args: &[Param]) -> Result<Vec<Row>, PrsError> {
        ctx.check_cancelled(sql)?;
        let query = bind_params(sqlx::query(sql), args);
        let rows = tokio::time::timeout(ctx.timeout, query.fetch_all(&self.pool))
            .await
            .map_err(|_| PrsError::Cancelled(format!("embedded query timed out: {sql}")))?
            .map_err(|e| PrsError::catalogue(sql, format!("query failed: {e}")))?;
        Ok(rows.iter().map(EmbeddedRepository::decode_row).collect())
    }

    async fn insert(&self, ctx: &RepoContext, table: &str, rows: &[Row]) -> Result<(), PrsError> {
        ctx.check_cancelled(table)?;
        if rows.is_empty() {
            return Ok(());
        }
        let mut columns: Vec<&str> = rows[0].keys().map(String::as_str).collect();
        columns.sort_unstable();

        let mut sql = format!("INSERT INTO {table} ({}) VALUES ", columns.join(", "));
        let mut args: Vec<Param> = Vec::with_capacity(rows.len() * columns.len());
        let mut value_groups = Vec::with_capacity(rows.len());
        for row in rows {
            let mut group = Vec::with_capacity(columns.len());
            for column in &columns {
                group.push("?".to_string());
                args.push(value_to_param(row.get(*column).unwrap_or(&Value::Null)));
            }
            value_groups.push(format!("({})", group.join(", ")));
        }
        sql.push_str(&value_groups.join(", "));

        let query = bind_params(sqlx::query(&sql), &args);
        tokio::time::timeout(ctx.timeout, query.execute(&self.pool))
            .await
            .map_err(|_| PrsError::Cancelled(format!("embedded insert timed out: {table}")))?
            .map_err(|e| PrsError::CacheWrite(format!("insert into {table} failed: {e}")))?;
        Ok(())
    }

    async fn validate_table(
        &self,
        ctx: &RepoContext,
        table: &str,
        required_columns: &HashSet<String>,
    ) -> Result<(), PrsError> {
        ctx.check_cancelled(table)?;
        let rows = self
            .query(ctx, &format!("PRAGMA table_info({table})"), &[])
            .await?;
        if rows.is_empty() {
            return Err(PrsError::catalogue(table, "table does not exist"));
        }
        let actual: HashSet<String> = rows
            .iter()
            .filter_map(|r| r.get("name").and_then(Value::as_str))
            .map(str::to_string)
            .collect();
        let missing: Vec<&String> = required_columns.difference(&actual).collect();
        if !missing.is_empty() {
            return Err(PrsError::catalogue(
                table,
                format!("missing required columns: {missing:?}"),
            ));
        }
        Ok(())
    }
}

fn value_to_param(value: &Value) -> Param {
    match value {
        Value::Null => Param::Text(String::new()),
        Value::Bool(b) => Param::Int(i64::from(*b)),
        Value::Int(i) => Param::Int(*i),
        Value::Float(f) => Param::Float(*f),
        Value::Text(s) => Param::Text(s.clone()),
        Value::Bytes(b) => Param::Text(String::from_utf8_lossy(b).into_owned()),
    }
}
