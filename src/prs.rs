//! PRS calculator (§4.6): additive score over annotated variants with
//! pre/post invariance gates.

use crate::entities::AnnotatedVariant;
use crate::error::{CalculationPhase, PrsError};
use crate::validators;

/// One variant's contribution to the raw score: `dosage * beta`.
#[derive(Debug, Clone, PartialEq)]
pub struct Contribution {
    pub variant_id: String,
    pub value: f64,
}

/// Total score plus per-variant contributions, in the same order as the input.
#[derive(Debug, Clone, PartialEq)]
pub struct PrsResult {
    pub score: f64,
    pub contributions: Vec<Contribution>,
}

const POST_CONDITION_TOLERANCE: f64 = 1e-12;

/// `score = Σ dosage_j · β_j`, accumulated in input order for reproducibility.
pub fn calculate(variants: &[AnnotatedVariant]) -> Result<PrsResult, PrsError> {
    let mut contributions = Vec::with_capacity(variants.len());

    for variant in variants {
        validators::validate_dosage(variant.dosage, &variant.variant_id).map_err(|e| {
            PrsError::calculation(CalculationPhase::PreCondition, &variant.variant_id, e.to_string())
        })?;
        validators::validate_beta(variant.beta, &variant.variant_id).map_err(|e| {
            PrsError::calculation(CalculationPhase::PreCondition, &variant.variant_id, e.to_string())
        })?;

        let value = f64::from(variant.dosage) * variant.beta;
        validators::validate_numerical_stability(value, &variant.variant_id).map_err(|e| {
            PrsError::calculation(CalculationPhase::PreCondition, &variant.variant_id, e.to_string())
        })?;

        contributions.push(Contribution {
            variant_id: variant.variant_id.clone(),
            value,
        });
    }

    let score: f64 = contributions.iter().map(|c| c.value).sum();
    validators::validate_numerical_stability(score, "prs_score").map_err(|e| {
        PrsError::calculation(CalculationPhase::Calculation, "<score>", e.to_string())
    })?;

    let recomputed: f64 = contributions.iter().map(|c| c.value).sum();
    if (score - recomputed).abs() > POST_CONDITION_TOLERANCE {
        return Err(PrsError::calculation(
            CalculationPhase::PostCondition,
            "<score>",
            format!("recomputed score {recomputed} diverges from {score}"),
        ));
    }

    Ok(PrsResult { score, contributions })
}

/// As [`calculate`], but additionally fails if the score falls outside `[min, max]`.
pub fn calculate_with_bounds(
    variants: &[AnnotatedVariant],
    min: f64,
    max: f64,
) -> Result<PrsResult, PrsError> {
    let result = calculate(variants)?;
    if result.score < min || result.score > max {
        return Err(PrsError::calculation(
            CalculationPhase::PostCondition,
            "<score>",
            format!("score {} outside bounds [{min}, {max}]", result.score),
        ));
    }
    Ok(result)
}
