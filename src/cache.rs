//! Reference cache (§4.4): batched get/put over the repository, keyed by
//! (ancestry, trait, model_id).

use std::collections::HashMap;

use tracing::debug;

use crate::entities::{CacheKey, ReferenceStats};
use crate::error::PrsError;
use crate::kernel;
use crate::repository::{Param, RepoContext, Repository};

const STATS_COLUMNS: [&str; 7] = ["ancestry", "trait_name", "model_id", "mean", "std_dev", "min", "max"];

/// Wraps a [`Repository`] for the stats-cache table.
pub struct ReferenceCache<'a> {
    repository: &'a dyn Repository,
    table: String,
}

impl<'a> ReferenceCache<'a> {
    pub fn new(repository: &'a dyn Repository, table: impl Into<String>) -> Self {
        Self {
            repository,
            table: table.into(),
        }
    }

    /// Single query whose predicate is a disjunction over every requested key.
    /// Absent entries are marked `None`; partial hits are the common case.
    pub async fn get_batch(
        &self,
        ctx: &RepoContext,
        requests: &[CacheKey],
    ) -> Result<HashMap<CacheKey, Option<ReferenceStats>>, PrsError> {
        let mut result: HashMap<CacheKey, Option<ReferenceStats>> =
            requests.iter().cloned().map(|k| (k, None)).collect();
        if requests.is_empty() {
            return Ok(result);
        }

        let style = self.repository.placeholder_style();
        let predicate = crate::repository::build_disjunction_predicate(
            &["ancestry", "trait_name", "model_id"],
            requests.len(),
            |n| style.render(n),
        );
        let sql = format!(
            "SELECT ancestry, trait_name, model_id, mean, std_dev, min, max FROM {} WHERE {predicate}",
            self.table
        );
        let mut args = Vec::with_capacity(requests.len() * 3);
        for key in requests {
            args.push(Param::Text(key.ancestry.clone()));
            args.push(Param::Text(key.trait_name.clone()));
            args.push(Param::Text(key.model_id.clone()));
        }

        debug!(table = %self.table, keys = requests.len(), "cache get_batch");
        let rows = self.repository.query(ctx, &sql, &args).await?;
        for row in rows {
            let stats = ReferenceStats {
                ancestry: row.get("ancestry").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                trait_name: row.get("trait_name").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                model_id: row.get("model_id").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                mean: row.get("mean").and_then(|v| v.as_f64()).unwrap_or(f64::NAN),
                std_dev: row.get("std_dev").and_then(|v| v.as_f64()).unwrap_or(f64::NAN),
                min: row.get("min").and_then(|v| v.as_f64()).unwrap_or(f64::NAN),
                max: row.get("max").and_then(|v| v.as_f64()).unwrap_or(f64::NAN),
            };
            result.insert(stats.cache_key(), Some(stats));
        }
        Ok(result)
    }

    /// Single insert of all pending entries. Each is validated via §4.2
    /// (`ReferenceStats::is_valid`) before being accepted; one invalid entry
    /// aborts the whole batch.
    pub async fn store_batch(
        &self,
        ctx: &RepoContext,
        entries: &[ReferenceStats],
    ) -> Result<(), PrsError> {
        if entries.is_empty() {
            return Ok(());
        }
        for entry in entries {
            if !entry.is_valid() {
                return Err(PrsError::CacheWrite(format!(
                    "invalid reference stats for {:?}: mean={} std_dev={} min={} max={}",
                    entry.cache_key(),
                    entry.mean,
                    entry.std_dev,
                    entry.min,
                    entry.max
                )));
            }
            kernel::normalize(entry.mean, entry)
                .map_err(|e| PrsError::CacheWrite(format!("stats failed normalization self-check: {e}")))?;
        }

        let rows: Vec<crate::repository::Row> = entries
            .iter()
            .map(|entry| {
                let mut row = crate::repository::Row::new();
                row.insert("ancestry".into(), crate::repository::Value::Text(entry.ancestry.clone()));
                row.insert("trait_name".into(), crate::repository::Value::Text(entry.trait_name.clone()));
                row.insert("model_id".into(), crate::repository::Value::Text(entry.model_id.clone()));
                row.insert("mean".into(), crate::repository::Value::Float(entry.mean));
                row.insert("std_dev".into(), crate::repository::Value::Float(entry.std_dev));
                row.insert("min".into(), crate::repository::Value::Float(entry.min));
                row.insert("max".into(), crate::repository::Value::Float(entry.max));
                row
            })
            .collect();

        debug!(table = %self.table, entries = entries.len(), "cache store_batch");
        self.repository.insert(ctx, &self.table, &rows).await
    }
}

/// Required columns for `validate_table` against the stats-cache table.
pub fn required_columns() -> std::collections::HashSet<String> {
    STATS_COLUMNS.iter().map(|c| c.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{float, text, InMemoryRepository};
    use std::time::Duration;

    fn stats(ancestry: &str, trait_name: &str, model_id: &str, mean: f64, std_dev: f64) -> ReferenceStats {
        ReferenceStats {
            ancestry: ancestry.into(),
            trait_name: trait_name.into(),
            model_id: model_id.into(),
            mean,
            std_dev,
            min: mean - 3.0 * std_dev,
            max: mean + 3.0 * std_dev,
        }
    }

    fn row(ancestry: &str, trait_name: &str, model_id: &str, mean: f64, std_dev: f64) -> crate::repository::Row {
        let mut row = crate::repository::Row::new();
        row.insert("ancestry".into(), text(ancestry));
        row.insert("trait_name".into(), text(trait_name));
        row.insert("model_id".into(), text(model_id));
        row.insert("mean".into(), float(mean));
        row.insert("std_dev".into(), float(std_dev));
        row.insert("min".into(), float(mean - 3.0 * std_dev));
        row.insert("max".into(), float(mean + 3.0 * std_dev));
        row
    }

    #[tokio::test]
    async fn partial_hit_marks_misses_as_none() {
        let repo = InMemoryRepository::new();
        repo.seed(
            "stats_cache",
            vec![row("EUR", "height", "m1", 0.06, 0.247)],
        );
        let cache = ReferenceCache::new(&repo, "stats_cache");
        let ctx = RepoContext::new(Duration::from_secs(5));

        let requests = vec![
            CacheKey::new("EUR", "height", "m1"),
            CacheKey::new("EUR", "weight", "m1"),
        ];
        let result = cache.get_batch(&ctx, &requests).await.unwrap();
        assert!(result[&requests[0]].is_some());
        assert!(result[&requests[1]].is_none());
    }

    #[tokio::test]
    async fn get_batch_of_empty_requests_issues_no_query() {
        let repo = InMemoryRepository::new();
        let cache = ReferenceCache::new(&repo, "stats_cache");
        let ctx = RepoContext::new(Duration::from_secs(5));
        let result = cache.get_batch(&ctx, &[]).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn store_then_get_turns_a_miss_into_a_hit() {
        let repo = InMemoryRepository::new();
        let cache = ReferenceCache::new(&repo, "stats_cache");
        let ctx = RepoContext::new(Duration::from_secs(5));

        let key = CacheKey::new("EUR", "height", "m1");
        assert!(cache.get_batch(&ctx, &[key.clone()]).await.unwrap()[&key].is_none());

        cache
            .store_batch(&ctx, &[stats("EUR", "height", "m1", 0.06, 0.247)])
            .await
            .unwrap();

        let hit = cache.get_batch(&ctx, &[key.clone()]).await.unwrap();
        assert!(hit[&key].is_some());
    }

    #[tokio::test]
    async fn store_batch_rejects_an_invalid_entry_and_aborts() {
        let repo = InMemoryRepository::new();
        let cache = ReferenceCache::new(&repo, "stats_cache");
        let ctx = RepoContext::new(Duration::from_secs(5));

        let mut bad = stats("EUR", "height", "m1", 0.06, 0.247);
        bad.std_dev = -1.0;
        assert!(cache.store_batch(&ctx, &[bad]).await.is_err());
        assert!(repo.rows("stats_cache").is_empty());
    }
}
