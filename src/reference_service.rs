//! Reference service (§4.5): on cache miss, loads per-trait PRS models and
//! fetches ancestry-specific allele frequencies in one consolidated query,
//! then invokes the kernel.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::ancestry::AncestryProfile;
use crate::entities::{ModelVariant, PrsModel, ReferenceStats};
use crate::error::PrsError;
use crate::kernel;
use crate::repository::{Param, RepoContext, Repository, Value};

/// Loads the ordered effect-size table for `trait_name` from the model table.
/// One query per trait; the row schema is validated implicitly by the
/// presence of every expected column.
pub async fn load_model(
    repository: &dyn Repository,
    ctx: &RepoContext,
    model_table: &str,
    trait_name: &str,
) -> Result<PrsModel, PrsError> {
    let style = repository.placeholder_style();
    let sql = format!(
        "SELECT variant_id, effect_allele, other_allele, weight, model_id FROM {model_table} WHERE trait_name = {}",
        style.render(1)
    );
    debug!(table = %model_table, %trait_name, "loading model");
    let rows = repository.query(ctx, &sql, &[Param::Text(trait_name.to_string())]).await?;
    if rows.is_empty() {
        return Err(PrsError::catalogue(
            model_table,
            format!("no model rows found for trait {trait_name}"),
        ));
    }

    let mut model_id = String::new();
    let mut variants = Vec::with_capacity(rows.len());
    for row in &rows {
        let variant_id = row
            .get("variant_id")
            .and_then(Value::as_str)
            .ok_or_else(|| PrsError::catalogue(model_table, "row missing variant_id"))?
            .to_string();
        let effect_allele = row
            .get("effect_allele")
            .and_then(Value::as_str)
            .ok_or_else(|| PrsError::catalogue(model_table, "row missing effect_allele"))?
            .to_string();
        let other_allele = row.get("other_allele").and_then(Value::as_str).unwrap_or_default().to_string();
        let weight = row
            .get("weight")
            .and_then(Value::as_f64)
            .ok_or_else(|| PrsError::catalogue(model_table, "row missing weight"))?;
        if !weight.is_finite() {
            return Err(PrsError::catalogue(
                model_table,
                format!("non-finite weight for variant {variant_id}"),
            ));
        }
        if let Some(id) = row.get("model_id").and_then(Value::as_str) {
            model_id = id.to_string();
        }
        variants.push(ModelVariant {
            variant_id,
            effect_allele,
            other_allele,
            weight,
        });
    }

    Ok(PrsModel {
        trait_name: trait_name.to_string(),
        model_id,
        variants,
    })
}

/// Builds the union of variant ids across every miss-trait model, issues one
/// consolidated query against the allele-frequency store, and picks the
/// first non-null frequency per variant according to `ancestry`'s declared
/// column precedence.
pub async fn load_allele_frequencies(
    repository: &dyn Repository,
    ctx: &RepoContext,
    allele_frequency_table: &str,
    ancestry: &AncestryProfile,
    models: &[PrsModel],
) -> Result<HashMap<String, HashMap<String, f64>>, PrsError> {
    let mut variant_ids: HashSet<String> = HashSet::new();
    for model in models {
        variant_ids.extend(model.variant_ids().map(str::to_string));
    }
    let mut sorted_ids: Vec<String> = variant_ids.into_iter().collect();
    sorted_ids.sort();

    if sorted_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let style = repository.placeholder_style();
    let placeholders: Vec<String> = (1..=sorted_ids.len()).map(|n| style.render(n)).collect();
    let columns = ancestry.column_precedence.join(", ");
    let sql = format!(
        "SELECT trait_name, variant_id, {columns} FROM {allele_frequency_table} WHERE variant_id IN ({})",
        placeholders.join(", ")
    );
    let args: Vec<Param> = sorted_ids.iter().map(|id| Param::Text(id.clone())).collect();

    debug!(
        table = %allele_frequency_table,
        variants = sorted_ids.len(),
        "consolidated allele-frequency query"
    );
    let rows = repository.query(ctx, &sql, &args).await?;

    let mut by_trait: HashMap<String, HashMap<String, f64>> = HashMap::new();
    for row in rows {
        let Some(trait_name) = row.get("trait_name").and_then(Value::as_str) else {
            continue;
        };
        let Some(variant_id) = row.get("variant_id").and_then(Value::as_str) else {
            continue;
        };
        let frequency = ancestry
            .column_precedence
            .iter()
            .find_map(|column| row.get(column).and_then(Value::as_f64));
        if let Some(frequency) = frequency {
            by_trait
                .entry(trait_name.to_string())
                .or_default()
                .insert(variant_id.to_string(), frequency);
        }
    }
    Ok(by_trait)
}

/// Computes reference stats for `trait_name` from its model and the
/// consolidated allele-frequency result, invoking the kernel (§4.2).
///
/// `cache_model_id` scopes the resulting stats row's cache identity (the
/// run's `--model-id`); it is independent of `model.model_id`, the model
/// table's own identifier, since a run may legitimately score against a
/// model row tagged differently than the cache scope it writes under.
pub fn compute_reference_stats(
    ancestry_code: &str,
    cache_model_id: &str,
    model: &PrsModel,
    frequencies: &HashMap<String, f64>,
) -> Result<ReferenceStats, PrsError> {
    let betas: HashMap<String, f64> = model
        .variants
        .iter()
        .map(|v| (v.variant_id.clone(), v.weight))
        .collect();
    let params = kernel::compute_population_parameters(frequencies, &betas)?;
    Ok(ReferenceStats {
        ancestry: ancestry_code.to_string(),
        trait_name: model.trait_name.clone(),
        model_id: cache_model_id.to_string(),
        mean: params.mean,
        std_dev: params.std_dev,
        min: params.mean - 3.0 * params.std_dev,
        max: params.mean + 3.0 * params.std_dev,
    })
}
