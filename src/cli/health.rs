//! `prs health`: validates connectivity and schema for each configured table
//! without running the pipeline, for operational smoke-testing.

use std::time::{Duration, Instant};

use clap::Args;

use crate::cache;
use crate::config::{self, ConfigOverrides, StoreBackend};
use crate::error::PrsError;
use crate::repository::embedded::EmbeddedRepository;
use crate::repository::warehouse::WarehouseRepository;
use crate::repository::{RepoContext, Repository};

#[derive(Args, Debug)]
pub struct HealthArgs {
    /// Backend-tagged connection string, as in `prs run --gwas-source`
    #[arg(long)]
    pub gwas_source: String,

    #[arg(long)]
    pub config: Option<std::path::PathBuf>,

    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone)]
struct TableCheck {
    table: String,
    status: Result<(), String>,
    latency: Duration,
}

pub async fn execute(args: HealthArgs) -> Result<String, PrsError> {
    let overrides = ConfigOverrides {
        database_url: Some(args.gwas_source.clone()),
        backend: Some(if args.gwas_source.starts_with("postgres") {
            StoreBackend::Warehouse
        } else {
            StoreBackend::Embedded
        }),
        timeout_ms: args.timeout_ms,
        ..Default::default()
    };
    let config = config::load(args.config.as_deref(), overrides)?;
    let database_url = config
        .database_url
        .clone()
        .ok_or_else(|| PrsError::Config("no data-store connection string configured".into()))?;

    let repository: Box<dyn Repository> = match config.backend {
        StoreBackend::Warehouse => Box::new(WarehouseRepository::connect(&database_url, 1).await?),
        StoreBackend::Embedded => Box::new(EmbeddedRepository::open(&database_url, 1).await?),
    };
    let ctx = RepoContext::new(Duration::from_millis(config.timeout_ms));

    let tables = [
        (&config.gwas_table, None),
        (&config.model_table, None),
        (&config.allele_frequency_table, None),
        (&config.stats_cache_table, Some(cache::required_columns())),
    ];

    let mut checks = Vec::with_capacity(tables.len());
    for (table, required_columns) in tables {
        let required = required_columns.unwrap_or_default();
        let start = Instant::now();
        let status = repository
            .validate_table(&ctx, table, &required)
            .await
            .map_err(|e| e.to_string());
        checks.push(TableCheck {
            table: table.clone(),
            status,
            latency: start.elapsed(),
        });
    }

    Ok(render(&checks))
}

fn render(checks: &[TableCheck]) -> String {
    let healthy = checks.iter().filter(|c| c.status.is_ok()).count();
    let mut out = format!("health: {healthy}/{} tables healthy\n", checks.len());
    for check in checks {
        match &check.status {
            Ok(()) => out.push_str(&format!("  ok    {} ({}ms)\n", check.table, check.latency.as_millis())),
            Err(e) => out.push_str(&format!("  error {} ({}ms): {e}\n", check.table, check.latency.as_millis())),
        }
    }
    out
}
