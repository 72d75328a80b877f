//! Remote columnar warehouse driver: a pooled Postgres connection standing in
//! for a warehouse such as BigQuery/Redshift in this deployment.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Column, Row as SqlxRow, TypeInfo};

use super::{Param, RepoContext, Repository, Row, Value};
use crate::error::PrsError;

/// Postgres-backed [`Repository`] implementation.
pub struct WarehouseRepository {
    pool: sqlx::PgPool,
}

impl WarehouseRepository {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, PrsError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await
            .map_err(|e| PrsError::catalogue("<connect>", format!("failed to connect to warehouse: {e}")))?;
        Ok(Self { pool })
    }

    fn decode_row(row: &PgRow) -> Row {
        let mut out = Row::new();
        for column in row.columns() {
            let name = column.name().to_string();
            let value = decode_value(row, column);
            out.insert(name, value);
        }
        out
    }
}

fn decode_value(row: &PgRow, column: &sqlx::postgres::PgColumn) -> Value {
    let idx = column.ordinal();
    match column.type_info().name() {
        "BOOL" => row
            .try_get::<Option<bool>, _>(idx)
            .ok()
            .flatten()
            .map_or(Value::Null, Value::Bool),
        "INT2" | "INT4" | "INT8" => row
            .try_get::<Option<i64>, _>(idx)
            .ok()
            .flatten()
            .map_or(Value::Null, Value::Int),
        "FLOAT4" | "FLOAT8" | "NUMERIC" => row
            .try_get::<Option<f64>, _>(idx)
            .ok()
            .flatten()
            .map_or(Value::Null, Value::Float),
        "BYTEA" => row
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
    mut query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    args: &'q [Param],
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
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
impl Repository for WarehouseRepository {
    fn placeholder_style(&self) -> super::PlaceholderStyle {
        super::PlaceholderStyle::Dollar
    }

    async fn query(&self, ctx: &RepoContext, sql: &str, args: &[Param]) -> Result<Vec<Row>, PrsError> {
        ctx.check_cancelled(sql)?;
        let query = bind_params(sqlx::query(sql), args);
        let rows = tokio::time::timeout(ctx.timeout, query.fetch_all(&self.pool))
            .await
            .map_err(|_| PrsError::Cancelled(format!("warehouse query timed out: {sql}")))?
            .map_err(|e| PrsError::catalogue(sql, format!("query failed: {e}")))?;
        Ok(rows.iter().map(WarehouseRepository::decode_row).collect())
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
        let mut placeholder = 1usize;
        let mut value_groups = Vec::with_capacity(rows.len());
        for row in rows {
            let mut group = Vec::with_capacity(columns.len());
            for column in &columns {
                group.push(format!("${placeholder}"));
                placeholder += 1;
                args.push(value_to_param(row.get(*column).unwrap_or(&Value::Null)));
            }
            value_groups.push(format!("({})", group.join(", ")));
        }
        sql.push_str(&value_groups.join(", "));

        let query = bind_params(sqlx::query(&sql), &args);
        tokio::time::timeout(ctx.timeout, query.execute(&self.pool))
            .await
            .map_err(|_| PrsError::Cancelled(format!("warehouse insert timed out: {table}")))?
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
            .query(
                ctx,
                "SELECT column_name FROM information_schema.columns WHERE table_name = $1",
                &[Param::Text(table.to_string())],
            )
            .await?;
        if rows.is_empty() {
            return Err(PrsError::catalogue(table, "table does not exist"));
        }
        let actual: HashSet<String> = rows
            .iter()
            .filter_map(|r| r.get("column_name").and_then(Value::as_str))
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
