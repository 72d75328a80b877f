//! Phase orchestrator (§4.8): owns the `BulkData` aggregate and drives the
//! four phases strictly in order. Each phase reads fields earlier phases
//! populated and writes only its own; phase boundaries are commit points
//! ("phase fences").

use std::collections::{HashMap, HashSet};

use rayon::prelude::*;
use tracing::{debug, info, instrument};

use crate::ancestry::AncestryProfile;
use crate::annotator;
use crate::cache::ReferenceCache;
use crate::entities::{
    AnnotatedVariant, CacheKey, GwasRecord, NormalizedPrs, ReferenceStats, SubjectGenotype,
    TraitSummary, UNKNOWN_TRAIT, ValidatedVariant,
};
use crate::error::PrsError;
use crate::kernel;
use crate::prs;
use crate::reference_service;
use crate::repository::{Param, RepoContext, Repository};

/// The mutable aggregate threaded through all four phases. Each phase writes
/// only the fields it owns; nothing here is mutated after its phase ends.
#[derive(Debug, Default)]
pub struct BulkData {
    pub annotated: Vec<AnnotatedVariant>,
    pub missing_variants: Vec<String>,
    pub traits: Vec<String>,
    pub cache_keys: Vec<CacheKey>,
    pub cached_stats: HashMap<CacheKey, ReferenceStats>,
    pub computed_stats: HashMap<CacheKey, ReferenceStats>,
    pub pending_cache_writes: Vec<ReferenceStats>,
    pub summaries: Vec<TraitSummary>,
}

/// Everything the orchestrator needs to run a request, independent of the
/// backend-specific repository implementation.
pub struct OrchestratorInput<'a> {
    pub repository: &'a dyn Repository,
    pub gwas_table: &'a str,
    pub model_table: &'a str,
    pub allele_frequency_table: &'a str,
    pub stats_cache_table: &'a str,
    pub ancestry: AncestryProfile,
    pub model_id: String,
    pub requested_variant_ids: Vec<String>,
    pub genotypes: Vec<SubjectGenotype>,
}

/// Runs the full four-phase pipeline and returns the accumulated `BulkData`.
pub async fn run(ctx: &RepoContext, input: &OrchestratorInput<'_>) -> Result<BulkData, PrsError> {
    let mut data = BulkData::default();
    phase1_requirements_analysis(ctx, input, &mut data).await?;
    phase2_bulk_retrieval(ctx, input, &mut data).await?;
    phase3_in_memory_processing(input, &mut data)?;
    phase4_bulk_storage(ctx, input, &mut data).await?;
    Ok(data)
}

#[instrument(skip_all)]
async fn phase1_requirements_analysis(
    ctx: &RepoContext,
    input: &OrchestratorInput<'_>,
    data: &mut BulkData,
) -> Result<(), PrsError> {
    info!(phase = 1, "requirements analysis");
    let gwas_records = fetch_gwas_records(ctx, input).await?;

    let catalogued_ids: HashSet<&str> = gwas_records.iter().map(|r| r.variant_id.as_str()).collect();
    let genotype_by_variant: HashMap<&str, &SubjectGenotype> = input
        .genotypes
        .iter()
        .map(|g| (g.variant_id.as_str(), g))
        .collect();

    let mut validated = Vec::with_capacity(input.requested_variant_ids.len());
    let mut missing = Vec::new();
    for variant_id in &input.requested_variant_ids {
        let Some(genotype) = genotype_by_variant.get(variant_id.as_str()) else {
            missing.push(variant_id.clone());
            continue;
        };
        let found = catalogued_ids.contains(variant_id.as_str());
        if !found {
            missing.push(variant_id.clone());
        }
        validated.push(ValidatedVariant {
            variant_id: variant_id.clone(),
            genotype: genotype.genotype.clone(),
            found_in_catalogue: found,
        });
    }

    let (annotated, _used_records) = annotator::annotate(&validated, &gwas_records);

    let mut traits: Vec<String> = annotated.iter().map(|a| a.trait_name.clone()).collect();
    traits.sort();
    traits.dedup();

    let cache_keys = traits
        .iter()
        .map(|trait_name| CacheKey::new(input.ancestry.code.clone(), trait_name.clone(), input.model_id.clone()))
        .collect();

    data.annotated = annotated;
    data.missing_variants = missing;
    data.traits = traits;
    data.cache_keys = cache_keys;
    Ok(())
}

async fn fetch_gwas_records(
    ctx: &RepoContext,
    input: &OrchestratorInput<'_>,
) -> Result<Vec<GwasRecord>, PrsError> {
    if input.requested_variant_ids.is_empty() {
        return Ok(Vec::new());
    }
    let style = input.repository.placeholder_style();
    let mut sorted_ids = input.requested_variant_ids.clone();
    sorted_ids.sort();
    let placeholders: Vec<String> = (1..=sorted_ids.len()).map(|n| style.render(n)).collect();
    let sql = format!(
        "SELECT variant_id, risk_allele, beta, trait_name FROM {} WHERE variant_id IN ({})",
        input.gwas_table,
        placeholders.join(", ")
    );
    let args: Vec<Param> = sorted_ids.into_iter().map(Param::Text).collect();

    debug!(table = %input.gwas_table, variants = args.len(), "fetching GWAS records");
    let rows = input.repository.query(ctx, &sql, &args).await?;

    rows.into_iter()
        .map(|row| {
            let variant_id = row
                .get("variant_id")
                .and_then(|v| v.as_str())
                .ok_or_else(|| PrsError::catalogue(input.gwas_table, "row missing variant_id"))?
                .to_string();
            let risk_allele = row
                .get("risk_allele")
                .and_then(|v| v.as_str())
                .ok_or_else(|| PrsError::catalogue(input.gwas_table, "row missing risk_allele"))?
                .to_string();
            let beta = row
                .get("beta")
                .and_then(|v| v.as_f64())
                .ok_or_else(|| PrsError::catalogue(input.gwas_table, "row missing beta"))?;
            let trait_name = row
                .get("trait_name")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_default();
            Ok(GwasRecord {
                variant_id,
                risk_allele,
                beta,
                trait_name: normalize_trait_bucket(&trait_name),
            })
        })
        .collect()
}

fn normalize_trait_bucket(raw: &str) -> String {
    if raw.trim().is_empty() {
        UNKNOWN_TRAIT.to_string()
    } else {
        raw.to_string()
    }
}

#[instrument(skip_all)]
async fn phase2_bulk_retrieval(
    ctx: &RepoContext,
    input: &OrchestratorInput<'_>,
    data: &mut BulkData,
) -> Result<(), PrsError> {
    info!(phase = 2, "bulk data retrieval");
    let cache = ReferenceCache::new(input.repository, input.stats_cache_table);
    let hits = cache.get_batch(ctx, &data.cache_keys).await?;

    let mut miss_traits: Vec<String> = Vec::new();
    for key in &data.cache_keys {
        match hits.get(key).and_then(Option::clone) {
            Some(stats) => {
                data.cached_stats.insert(key.clone(), stats);
            }
            None => miss_traits.push(key.trait_name.clone()),
        }
    }

    if miss_traits.is_empty() {
        return Ok(());
    }

    let mut models = Vec::with_capacity(miss_traits.len());
    for trait_name in &miss_traits {
        ctx.check_cancelled(trait_name)?;
        let model = reference_service::load_model(
            input.repository,
            ctx,
            input.model_table,
            trait_name,
        )
        .await?;
        models.push(model);
    }

    let frequencies_by_trait = reference_service::load_allele_frequencies(
        input.repository,
        ctx,
        input.allele_frequency_table,
        &input.ancestry,
        &models,
    )
    .await?;

    for model in &models {
        let empty = HashMap::new();
        let frequencies = frequencies_by_trait.get(&model.trait_name).unwrap_or(&empty);
        let stats = reference_service::compute_reference_stats(&input.ancestry.code, &input.model_id, model, frequencies)?;
        let key = CacheKey::new(input.ancestry.code.clone(), model.trait_name.clone(), input.model_id.clone());
        data.computed_stats.insert(key, stats);
    }

    Ok(())
}

/// Per-trait PRS calculation and normalization. Independent traits never
/// touch the same data, so this loop fans out across a rayon thread pool
/// rather than running strictly sequentially.
fn phase3_in_memory_processing(
    input: &OrchestratorInput<'_>,
    data: &mut BulkData,
) -> Result<(), PrsError> {
    info!(phase = 3, "in-memory processing");
    let mut by_trait: HashMap<&str, Vec<&AnnotatedVariant>> = HashMap::new();
    for variant in &data.annotated {
        by_trait.entry(variant.trait_name.as_str()).or_default().push(variant);
    }

    let cached_stats = &data.cached_stats;
    let computed_stats = &data.computed_stats;

    let results: Vec<Result<(TraitSummary, Option<ReferenceStats>), PrsError>> = data
        .traits
        .par_iter()
        .map(|trait_name| {
            let key = CacheKey::new(input.ancestry.code.clone(), trait_name.clone(), input.model_id.clone());
            let variants: Vec<AnnotatedVariant> = by_trait
                .get(trait_name.as_str())
                .map(|vs| vs.iter().map(|v| (*v).clone()).collect())
                .unwrap_or_default();

            let prs_result = prs::calculate(&variants)?;

            let (stats, pending) = match cached_stats.get(&key) {
                Some(stats) => (stats.clone(), None),
                None => {
                    let stats = computed_stats
                        .get(&key)
                        .ok_or_else(|| PrsError::Computation(format!("no reference stats resolved for trait {trait_name}")))?
                        .clone();
                    (stats.clone(), Some(stats))
                }
            };

            let normalized = kernel::normalize(prs_result.score, &stats)?;
            let risk_allele_count: u32 = variants.iter().map(|v| u32::from(v.dosage)).sum();
            let effect_weighted_contribution: f64 = prs_result.contributions.iter().map(|c| c.value).sum();

            Ok((
                TraitSummary {
                    trait_name: trait_name.clone(),
                    risk_allele_count,
                    effect_weighted_contribution,
                    risk_level: crate::entities::RiskLevel::from_percentile(normalized.percentile),
                    normalized: NormalizedPrs {
                        raw_score: prs_result.score,
                        z_score: normalized.z_score,
                        percentile: normalized.percentile,
                    },
                },
                pending,
            ))
        })
        .collect();

    for result in results {
        let (summary, pending) = result?;
        if let Some(stats) = pending {
            data.pending_cache_writes.push(stats);
        }
        data.summaries.push(summary);
    }

    Ok(())
}

#[instrument(skip_all)]
async fn phase4_bulk_storage(
    ctx: &RepoContext,
    input: &OrchestratorInput<'_>,
    data: &mut BulkData,
) -> Result<(), PrsError> {
    info!(phase = 4, entries = data.pending_cache_writes.len(), "bulk storage");
    if data.pending_cache_writes.is_empty() {
        return Ok(());
    }
    let cache = ReferenceCache::new(input.repository, input.stats_cache_table);
    cache.store_batch(ctx, &data.pending_cache_writes).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ancestry::lookup_ancestry_profile;
    use crate::repository::test_support::{float, text, InMemoryRepository};
    use crate::repository::Row;
    use std::time::Duration;

    fn gwas_row(variant_id: &str, risk_allele: &str, beta: f64, trait_name: &str) -> Row {
        let mut row = Row::new();
        row.insert("variant_id".into(), text(variant_id));
        row.insert("risk_allele".into(), text(risk_allele));
        row.insert("beta".into(), float(beta));
        row.insert("trait_name".into(), text(trait_name));
        row
    }

    fn model_row(variant_id: &str, effect_allele: &str, weight: f64, model_id: &str) -> Row {
        let mut row = Row::new();
        row.insert("variant_id".into(), text(variant_id));
        row.insert("effect_allele".into(), text(effect_allele));
        row.insert("other_allele".into(), text("G"));
        row.insert("weight".into(), float(weight));
        row.insert("model_id".into(), text(model_id));
        row
    }

    #[tokio::test]
    async fn full_pipeline_matches_scenario_1_and_2() {
        let repo = InMemoryRepository::new();
        let ancestry = lookup_ancestry_profile("EUR").unwrap();

        repo.seed(
            "gwas_catalogue",
            vec![
                gwas_row("a", "A", 0.1, "height"),
                gwas_row("b", "A", -0.3, "height"),
                gwas_row("c", "A", 0.2, "height"),
            ],
        );
        repo.seed(
            "prs_models",
            vec![
                model_row("a", "A", 0.1, "m1"),
                model_row("b", "A", -0.3, "m1"),
                model_row("c", "A", 0.2, "m1"),
            ],
        );
        let mut af_row = Row::new();
        af_row.insert("trait_name".into(), text("height"));
        af_row.insert("variant_id".into(), text("a"));
        af_row.insert(ancestry.column_precedence[0].clone(), float(0.2));
        repo.seed("allele_freqs", vec![af_row.clone()]);
        {
            let mut row_b = af_row.clone();
            row_b.insert("variant_id".into(), text("b"));
            row_b.insert(ancestry.column_precedence[0].clone(), float(0.5));
            let mut row_c = af_row.clone();
            row_c.insert("variant_id".into(), text("c"));
            row_c.insert(ancestry.column_precedence[0].clone(), float(0.8));
            repo.seed("allele_freqs", vec![af_row, row_b, row_c]);
        }

        let genotypes = vec![
            SubjectGenotype { variant_id: "a".into(), genotype: "AA".into() },
            SubjectGenotype { variant_id: "b".into(), genotype: "AG".into() },
            SubjectGenotype { variant_id: "c".into(), genotype: "GG".into() },
        ];

        let input = OrchestratorInput {
            repository: &repo,
            gwas_table: "gwas_catalogue",
            model_table: "prs_models",
            allele_frequency_table: "allele_freqs",
            stats_cache_table: "stats_cache",
            ancestry,
            model_id: "m1".into(),
            requested_variant_ids: vec!["a".into(), "b".into(), "c".into()],
            genotypes,
        };
        let ctx = RepoContext::new(Duration::from_secs(5));

        let data = run(&ctx, &input).await.unwrap();
        assert!(data.missing_variants.is_empty());
        assert_eq!(data.summaries.len(), 1);
        let summary = &data.summaries[0];
        assert!((summary.normalized.raw_score - (-0.1)).abs() < 1e-9);
        assert_eq!(summary.risk_allele_count, 3);

        // Second run against the now-populated cache should hit, not recompute.
        let repo2 = InMemoryRepository::new();
        repo2.seed("gwas_catalogue", repo.rows("gwas_catalogue"));
        repo2.seed("prs_models", repo.rows("prs_models"));
        repo2.seed("allele_freqs", repo.rows("allele_freqs"));
        repo2.seed("stats_cache", {
            let cache = ReferenceCache::new(&repo, "stats_cache");
            cache.store_batch(&ctx, &data.pending_cache_writes).await.unwrap();
            repo.rows("stats_cache")
        });
        let input2 = OrchestratorInput {
            repository: &repo2,
            gwas_table: "gwas_catalogue",
            model_table: "prs_models",
            allele_frequency_table: "allele_freqs",
            stats_cache_table: "stats_cache",
            ancestry: lookup_ancestry_profile("EUR").unwrap(),
            model_id: "m1".into(),
            requested_variant_ids: vec!["a".into(), "b".into(), "c".into()],
            genotypes: vec![
                SubjectGenotype { variant_id: "a".into(), genotype: "AA".into() },
                SubjectGenotype { variant_id: "b".into(), genotype: "AG".into() },
                SubjectGenotype { variant_id: "c".into(), genotype: "GG".into() },
            ],
        };
        let data2 = run(&ctx, &input2).await.unwrap();
        assert!(data2.pending_cache_writes.is_empty());
    }

    #[tokio::test]
    async fn requested_variant_without_a_genotype_call_is_reported_missing() {
        let repo = InMemoryRepository::new();
        let ancestry = lookup_ancestry_profile("GLOBAL").unwrap();
        let input = OrchestratorInput {
            repository: &repo,
            gwas_table: "gwas_catalogue",
            model_table: "prs_models",
            allele_frequency_table: "allele_freqs",
            stats_cache_table: "stats_cache",
            ancestry,
            model_id: "m1".into(),
            requested_variant_ids: vec!["rsX".into()],
            genotypes: vec![],
        };
        let ctx = RepoContext::new(Duration::from_secs(5));
        let data = run(&ctx, &input).await.unwrap();
        assert_eq!(data.missing_variants, vec!["rsX".to_string()]);
        assert!(data.summaries.is_empty());
    }
}
