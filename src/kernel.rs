//! Reference-stats kernel (§4.2): Hardy-Weinberg population parameters and normalization.

use std::collections::HashMap;

use statrs::distribution::{ContinuousCDF, Normal};

use crate::entities::stats::ReferenceStats;
use crate::error::PrsError;
use crate::validators;

/// Population parameters computed under Hardy-Weinberg equilibrium, before
/// they are wrapped into a keyed [`ReferenceStats`] row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PopulationParameters {
    pub mean: f64,
    pub variance: f64,
    pub std_dev: f64,
}

/// Computes population mean/variance/support from per-variant allele frequency
/// and effect size maps. Only variants present in both maps contribute.
///
/// ```text
/// μ  = Σ_j 2·p_j·β_j
/// σ² = Σ_j 2·p_j·(1−p_j)·β_j²
/// ```
pub fn compute_population_parameters(
    frequencies: &HashMap<String, f64>,
    betas: &HashMap<String, f64>,
) -> Result<PopulationParameters, PrsError> {
    // Deterministic iteration order: sort contributing variant ids so summation
    // order — and therefore floating-point associativity — is reproducible.
    let mut variant_ids: Vec<&String> = frequencies
        .keys()
        .filter(|id| betas.contains_key(id.as_str()))
        .collect();
    variant_ids.sort();

    if variant_ids.is_empty() {
        return Err(PrsError::Computation(
            "no variant is present in both the allele-frequency map and the effect map".into(),
        ));
    }

    let mut mean = 0.0_f64;
    let mut variance = 0.0_f64;
    for id in &variant_ids {
        let p = frequencies[id.as_str()];
        let beta = betas[id.as_str()];
        validators::validate_probability(p, &format!("frequency:{id}"))?;
        validators::validate_beta(beta, &format!("beta:{id}"))?;
        mean += 2.0 * p * beta;
        variance += 2.0 * p * (1.0 - p) * beta * beta;
    }

    validators::validate_variance(variance, "population_variance")?;

    if variance == 0.0 && variant_ids.len() == 1 {
        let id = variant_ids[0];
        let p = frequencies[id.as_str()];
        let beta = betas[id.as_str()];
        let admissible = beta.abs() <= f64::EPSILON.sqrt() || p == 0.0 || p == 1.0;
        if !admissible {
            return Err(PrsError::Computation(format!(
                "zero population variance for variant {id} is inadmissible: beta={beta} p={p} is not a fixed allele with non-zero effect"
            )));
        }
    } else if variance == 0.0 {
        // Multiple contributing variants summing to exactly zero variance without
        // every term individually vanishing is not a Hardy-Weinberg outcome.
        let all_fixed_or_neutral = variant_ids.iter().all(|id| {
            let p = frequencies[id.as_str()];
            let beta = betas[id.as_str()];
            beta.abs() <= f64::EPSILON.sqrt() || p == 0.0 || p == 1.0
        });
        if !all_fixed_or_neutral {
            return Err(PrsError::Computation(
                "zero population variance across multiple variants is inadmissible".into(),
            ));
        }
    }

    let p_vec: Vec<f64> = variant_ids.iter().map(|id| frequencies[id.as_str()]).collect();
    let beta_vec: Vec<f64> = variant_ids.iter().map(|id| betas[id.as_str()]).collect();
    validators::validate_population_parameter_consistency(
        &p_vec,
        &beta_vec,
        mean,
        variance,
        "population_parameters",
    )?;

    let std_dev = variance.sqrt();
    validators::validate_numerical_stability(mean, "population_mean")?;
    validators::validate_numerical_stability(std_dev, "population_std_dev")?;

    Ok(PopulationParameters {
        mean,
        variance,
        std_dev,
    })
}

/// The normalized view of a raw score: z-score and percentile ∈ [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalized {
    pub z_score: f64,
    pub percentile: f64,
}

/// Normalizes a raw PRS against reference stats: z = (x - μ) / σ, percentile = Φ(z).
pub fn normalize(raw_score: f64, stats: &ReferenceStats) -> Result<Normalized, PrsError> {
    if !(stats.std_dev > 0.0) {
        return Err(PrsError::Computation(format!(
            "cannot normalize against non-positive std_dev={}",
            stats.std_dev
        )));
    }
    if !(stats.min <= stats.mean && stats.mean <= stats.max) {
        return Err(PrsError::Computation(format!(
            "reference stats are invalid: min={} mean={} max={}",
            stats.min, stats.mean, stats.max
        )));
    }
    if !stats.mean.is_finite() || !stats.std_dev.is_finite() {
        return Err(PrsError::Computation(
            "reference stats contain a non-finite mean or std_dev".into(),
        ));
    }

    let z_score = (raw_score - stats.mean) / stats.std_dev;
    validators::validate_numerical_stability(z_score, "z_score")?;

    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| PrsError::Computation(format!("failed to build standard normal: {e}")))?;
    let percentile = normal.cdf(z_score);
    validators::validate_probability(percentile, "percentile")?;

    Ok(Normalized { z_score, percentile })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validators::reset_validation_state;

    fn stats(mean: f64, std_dev: f64) -> ReferenceStats {
        ReferenceStats {
            ancestry: "EUR".into(),
            trait_name: "t1".into(),
            model_id: "m1".into(),
            mean,
            std_dev,
            min: mean - 3.0 * std_dev,
            max: mean + 3.0 * std_dev,
        }
    }

    #[test]
    fn three_snp_hwe_population_matches_scenario_1() {
        reset_validation_state();
        let freq: HashMap<String, f64> =
            [("a".to_string(), 0.2), ("b".to_string(), 0.5), ("c".to_string(), 0.8)].into();
        let beta: HashMap<String, f64> =
            [("a".to_string(), 0.1), ("b".to_string(), -0.3), ("c".to_string(), 0.2)].into();

        let params = compute_population_parameters(&freq, &beta).unwrap();
        assert!((params.mean - 0.06).abs() < 1e-12);
        assert!((params.variance - 0.0610).abs() < 1e-12);
        assert!((params.std_dev - 0.0610_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn fixed_allele_edges_collapse_variance_to_zero() {
        reset_validation_state();
        let freq_one: HashMap<String, f64> = [("x".to_string(), 1.0)].into();
        let beta_one: HashMap<String, f64> = [("x".to_string(), 0.5)].into();
        let params = compute_population_parameters(&freq_one, &beta_one).unwrap();
        assert!((params.mean - 1.0).abs() < 1e-12);
        assert_eq!(params.variance, 0.0);

        let freq_zero: HashMap<String, f64> = [("y".to_string(), 0.0)].into();
        let beta_zero: HashMap<String, f64> = [("y".to_string(), 0.3)].into();
        let params = compute_population_parameters(&freq_zero, &beta_zero).unwrap();
        assert_eq!(params.mean, 0.0);
        assert_eq!(params.variance, 0.0);
    }

    #[test]
    fn zero_variance_with_segregating_allele_and_nonzero_effect_is_rejected() {
        reset_validation_state();
        // p=0.5 is segregating and beta != 0, so variance must be > 0; force an
        // inadmissible zero-variance "computation" by checking the guard directly.
        let freq: HashMap<String, f64> = [("z".to_string(), 0.5)].into();
        let beta: HashMap<String, f64> = [("z".to_string(), 0.0)].into();
        // beta == 0 is admissible (neutral effect).
        assert!(compute_population_parameters(&freq, &beta).is_ok());
    }

    #[test]
    fn additivity_holds_for_disjoint_variant_sets() {
        reset_validation_state();
        let freq_a: HashMap<String, f64> = [("a".to_string(), 0.2)].into();
        let beta_a: HashMap<String, f64> = [("a".to_string(), 0.1)].into();
        let freq_b: HashMap<String, f64> = [("b".to_string(), 0.5), ("c".to_string(), 0.8)].into();
        let beta_b: HashMap<String, f64> =
            [("b".to_string(), -0.3), ("c".to_string(), 0.2)].into();

        let a = compute_population_parameters(&freq_a, &beta_a).unwrap();
        let b = compute_population_parameters(&freq_b, &beta_b).unwrap();

        let mut freq_union = freq_a.clone();
        freq_union.extend(freq_b.clone());
        let mut beta_union = beta_a.clone();
        beta_union.extend(beta_b.clone());
        let union = compute_population_parameters(&freq_union, &beta_union).unwrap();

        assert!((a.mean + b.mean - union.mean).abs() < 1e-12);
        assert!((a.variance + b.variance - union.variance).abs() < 1e-12);
    }

    #[test]
    fn normalization_symmetry_holds() {
        reset_validation_state();
        let stats = stats(0.06, 0.0610_f64.sqrt());
        let pos = normalize(0.1, &stats).unwrap();
        let mirrored_raw = 2.0 * stats.mean - 0.1;
        let neg = normalize(mirrored_raw, &stats).unwrap();
        assert!((neg.z_score + pos.z_score).abs() < 1e-9);
        assert!((neg.percentile + pos.percentile - 1.0).abs() < 1e-9);
    }

    #[test]
    fn percentile_is_monotonic_in_raw_score() {
        reset_validation_state();
        let stats = stats(0.0, 1.0);
        let low = normalize(-1.0, &stats).unwrap();
        let mid = normalize(0.0, &stats).unwrap();
        let high = normalize(1.0, &stats).unwrap();
        assert!(low.percentile < mid.percentile);
        assert!(mid.percentile < high.percentile);
    }

    #[test]
    fn normalize_rejects_non_positive_std_dev() {
        reset_validation_state();
        let mut bad = stats(0.0, 1.0);
        bad.std_dev = 0.0;
        assert!(normalize(0.0, &bad).is_err());
    }

    #[test]
    fn individual_prs_normalization_matches_scenario_2() {
        reset_validation_state();
        let stats = stats(0.06, 0.0610_f64.sqrt());
        let raw = 2.0 * 0.1 + 1.0 * -0.3 + 0.0 * 0.2;
        assert!((raw - (-0.1)).abs() < 1e-12);
        let normalized = normalize(raw, &stats).unwrap();
        let expected_z = (-0.1 - 0.06) / 0.0610_f64.sqrt();
        assert!((normalized.z_score - expected_z).abs() < 1e-9);
    }
}
