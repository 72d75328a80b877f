//! An in-memory [`Repository`] used across unit tests for the cache,
//! reference service, and orchestrator. Never compiled into the release binary.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Param, RepoContext, Repository, Row, Value};
use crate::error::PrsError;

#[derive(Default)]
pub struct InMemoryRepository {
    tables: Mutex<std::collections::HashMap<String, Vec<Row>>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, table: &str, rows: Vec<Row>) {
        self.tables.lock().unwrap().insert(table.to_string(), rows);
    }

    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    fn placeholder_style(&self) -> super::PlaceholderStyle {
        super::PlaceholderStyle::QuestionMark
    }

    /// Extracts the queried table from a `FROM <table>` clause and returns
    /// everything seeded for it — enough fidelity for unit tests, which seed
    /// exactly the rows relevant to the scenario under test rather than
    /// exercising a real predicate evaluator.
    async fn query(&self, ctx: &RepoContext, sql: &str, _args: &[Param]) -> Result<Vec<Row>, PrsError> {
        ctx.check_cancelled(sql)?;
        let table = table_from_sql(sql).ok_or_else(|| {
            PrsError::catalogue("<test>", format!("could not find table name in: {sql}"))
        })?;
        Ok(self.rows(&table))
    }

    async fn insert(&self, ctx: &RepoContext, table: &str, rows: &[Row]) -> Result<(), PrsError> {
        ctx.check_cancelled(table)?;
        let mut tables = self.tables.lock().unwrap();
        tables.entry(table.to_string()).or_default().extend(rows.iter().cloned());
        Ok(())
    }

    async fn validate_table(
        &self,
        ctx: &RepoContext,
        table: &str,
        _required_columns: &HashSet<String>,
    ) -> Result<(), PrsError> {
        ctx.check_cancelled(table)?;
        Ok(())
    }
}

fn table_from_sql(sql: &str) -> Option<String> {
    let lower = sql.to_ascii_lowercase();
    let from_idx = lower.find("from ")?;
    let rest = sql[from_idx + 5..].trim_start();
    let table = rest.split_whitespace().next()?;
    Some(table.trim_matches(|c| c == '(' || c == ')').to_string())
}

pub fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

pub fn float(value: f64) -> Value {
    Value::Float(value)
}
