//! `prs run`: parses CLI flags into a [`crate::config::RunConfig`], wires up
//! the configured repository backend, and drives the orchestrator end to end.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use tracing::info;

use crate::ancestry::lookup_ancestry_profile;
use crate::config::{self, ConfigOverrides, OutputFormat, StoreBackend};
use crate::error::PrsError;
use crate::input::{parse_genotype_file, parse_snp_list};
use crate::orchestrator::{self, OrchestratorInput};
use crate::output::{RunOutput, write_output};
use crate::repository::embedded::EmbeddedRepository;
use crate::repository::warehouse::WarehouseRepository;
use crate::repository::{RepoContext, Repository};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the subject's genotype file
    #[arg(long)]
    pub genotype_file: PathBuf,

    /// Inline comma-separated SNP list
    #[arg(long, conflicts_with = "snp_file")]
    pub snps: Option<String>,

    /// Path to a SNP-list file (JSON array or delimited)
    #[arg(long, conflicts_with = "snps")]
    pub snp_file: Option<PathBuf>,

    /// Backend-tagged connection string: `postgres://...` for the warehouse,
    /// `sqlite://path` or `sqlite::memory:` for the embedded engine
    #[arg(long)]
    pub gwas_source: String,

    /// GWAS catalogue table name
    #[arg(long)]
    pub gwas_table: Option<String>,

    /// Per-trait model table name
    #[arg(long)]
    pub model_table: Option<String>,

    /// Allele-frequency table name
    #[arg(long)]
    pub allele_frequency_table: Option<String>,

    /// Stats-cache table name
    #[arg(long)]
    pub stats_cache_table: Option<String>,

    /// Model identifier to scope this run's cache entries under
    #[arg(long, default_value = "default")]
    pub model_id: String,

    /// Ancestry code (EUR, AFR, EAS, SAS, AMR, GLOBAL)
    #[arg(long)]
    pub ancestry: Option<String>,

    /// Output format
    #[arg(long, value_enum)]
    pub output_format: Option<CliOutputFormat>,

    /// Output destination path, or `-` for stdout
    #[arg(long)]
    pub output: Option<String>,

    /// Path to a layered config file (YAML or JSON)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Per-operation timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy)]
pub enum CliOutputFormat {
    Json,
    Csv,
}

impl From<CliOutputFormat> for OutputFormat {
    fn from(value: CliOutputFormat) -> Self {
        match value {
            CliOutputFormat::Json => OutputFormat::Json,
            CliOutputFormat::Csv => OutputFormat::Csv,
        }
    }
}

pub async fn execute(args: RunArgs) -> Result<String, PrsError> {
    let overrides = ConfigOverrides {
        gwas_table: args.gwas_table.clone(),
        model_table: args.model_table.clone(),
        allele_frequency_table: args.allele_frequency_table.clone(),
        stats_cache_table: args.stats_cache_table.clone(),
        ancestry_code: args.ancestry.clone(),
        output_format: args.output_format.map(Into::into),
        output_destination: args.output.clone(),
        timeout_ms: args.timeout_ms,
        database_url: Some(args.gwas_source.clone()),
        backend: Some(detect_backend(&args.gwas_source)),
        ..Default::default()
    };
    let config = config::load(args.config.as_deref(), overrides)?;
    crate::validators::set_validation_state(crate::validators::ValidationState {
        enabled: config.invariance.enable_validation,
        strict: config.invariance.strict_mode,
    });

    let ancestry = lookup_ancestry_profile(&config.ancestry_code)?;

    let genotype_contents = std::fs::read_to_string(&args.genotype_file)
        .map_err(|e| PrsError::Input(format!("failed to read genotype file {}: {e}", args.genotype_file.display())))?;
    let genotypes = parse_genotype_file(&genotype_contents)?;

    let requested_variant_ids = match (&args.snps, &args.snp_file) {
        (Some(inline), None) => parse_snp_list(inline)?,
        (None, Some(path)) => {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| PrsError::Input(format!("failed to read SNP list {}: {e}", path.display())))?;
            parse_snp_list(&contents)?
        }
        (None, None) => return Err(PrsError::Input("one of --snps or --snp-file is required".into())),
        (Some(_), Some(_)) => unreachable!("clap enforces mutual exclusion"),
    };

    let database_url = config
        .database_url
        .clone()
        .ok_or_else(|| PrsError::Config("no data-store connection string configured".into()))?;
    let ctx = RepoContext::new(Duration::from_millis(config.timeout_ms));

    info!(backend = ?config.backend, "connecting to configured repository");
    let repository: Box<dyn Repository> = match config.backend {
        StoreBackend::Warehouse => Box::new(WarehouseRepository::connect(&database_url, 5).await?),
        StoreBackend::Embedded => Box::new(EmbeddedRepository::open(&database_url, 5).await?),
    };

    let input = OrchestratorInput {
        repository: repository.as_ref(),
        gwas_table: &config.gwas_table,
        model_table: &config.model_table,
        allele_frequency_table: &config.allele_frequency_table,
        stats_cache_table: &config.stats_cache_table,
        ancestry: ancestry.clone(),
        model_id: args.model_id.clone(),
        requested_variant_ids,
        genotypes,
    };

    let data = orchestrator::run(&ctx, &input).await?;

    let output = RunOutput {
        ancestry_code: ancestry.code,
        model_id: args.model_id,
        trait_summaries: data.summaries,
        missing_variants: data.missing_variants,
    };

    let stdout_text = write_output(&output, config.output.format, config.output.destination.as_deref())?;
    Ok(stdout_text.unwrap_or_else(|| {
        format!(
            "computed {} trait summaries ({} missing variants), written to {}\n",
            output.trait_summaries.len(),
            output.missing_variants.len(),
            config.output.destination.as_deref().unwrap_or("-")
        )
    }))
}

fn detect_backend(gwas_source: &str) -> StoreBackend {
    if gwas_source.starts_with("postgres://") || gwas_source.starts_with("postgresql://") {
        StoreBackend::Warehouse
    } else {
        StoreBackend::Embedded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postgres_url_selects_the_warehouse_backend() {
        assert!(matches!(
            detect_backend("postgres://user@host/db"),
            StoreBackend::Warehouse
        ));
    }

    #[test]
    fn sqlite_url_selects_the_embedded_backend() {
        assert!(matches!(detect_backend("sqlite://./local.db"), StoreBackend::Embedded));
        assert!(matches!(detect_backend("sqlite::memory:"), StoreBackend::Embedded));
    }
}
