//! Pure value validators (§4.1) plus the process-wide enable/strict switch.
//!
//! Validation is globally switchable at runtime. When disabled, every guard
//! below is a no-op that always succeeds — this is the production-performance
//! path. Tests flip the switch through [`set_validation_state`] /
//! [`reset_validation_state`] rather than reloading the module.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{ValidationError, ValidationKind};

static VALIDATION_ENABLED: AtomicBool = AtomicBool::new(true);
static VALIDATION_STRICT: AtomicBool = AtomicBool::new(false);

const BETA_STRICT_BOUND: f64 = 10.0;
const STABILITY_STRICT_MAX: f64 = 1e12;
const STABILITY_STRICT_MIN_NONZERO: f64 = 1e-300;
const HWE_TOLERANCE: f64 = 1e-12;
const POPULATION_TOLERANCE: f64 = 1e-12;

/// Runtime validation configuration, set once from the run configuration.
#[derive(Debug, Clone, Copy)]
pub struct ValidationState {
    pub enabled: bool,
    pub strict: bool,
}

impl Default for ValidationState {
    fn default() -> Self {
        Self {
            enabled: true,
            strict: false,
        }
    }
}

/// Installs process-wide validation configuration. Intended to run once at startup.
pub fn set_validation_state(state: ValidationState) {
    VALIDATION_ENABLED.store(state.enabled, Ordering::SeqCst);
    VALIDATION_STRICT.store(state.strict, Ordering::SeqCst);
}

/// Resets validation state to the default (enabled, non-strict). Test-only reset hook.
pub fn reset_validation_state() {
    set_validation_state(ValidationState::default());
}

fn enabled() -> bool {
    VALIDATION_ENABLED.load(Ordering::SeqCst)
}

fn strict() -> bool {
    VALIDATION_STRICT.load(Ordering::SeqCst)
}

/// Probability must be finite and in [0, 1].
pub fn validate_probability(p: f64, context: &str) -> Result<(), ValidationError> {
    if !enabled() {
        return Ok(());
    }
    if !p.is_finite() || !(0.0..=1.0).contains(&p) {
        return Err(ValidationError::new(ValidationKind::Probability, context, p));
    }
    Ok(())
}

/// Variance must be finite and non-negative.
pub fn validate_variance(var: f64, context: &str) -> Result<(), ValidationError> {
    if !enabled() {
        return Ok(());
    }
    if !var.is_finite() || var < 0.0 {
        return Err(ValidationError::new(ValidationKind::Variance, context, var));
    }
    Ok(())
}

/// Dosage must be an integral value in {0, 1, 2} (diploid organisms only).
pub fn validate_dosage(dosage: u8, context: &str) -> Result<(), ValidationError> {
    if !enabled() {
        return Ok(());
    }
    if dosage > 2 {
        return Err(ValidationError::new(
            ValidationKind::Dosage,
            context,
            f64::from(dosage),
        ));
    }
    Ok(())
}

/// Beta must be finite; in strict mode additionally |β| ≤ 10.
pub fn validate_beta(beta: f64, context: &str) -> Result<(), ValidationError> {
    if !enabled() {
        return Ok(());
    }
    if !beta.is_finite() {
        return Err(ValidationError::new(ValidationKind::Beta, context, beta));
    }
    if strict() && beta.abs() > BETA_STRICT_BOUND {
        return Err(ValidationError::new(ValidationKind::Beta, context, beta));
    }
    Ok(())
}

/// Not NaN/infinite; in strict mode additionally |x| ≤ 1e12 and either 0 or |x| ≥ 1e-300.
pub fn validate_numerical_stability(x: f64, context: &str) -> Result<(), ValidationError> {
    if !enabled() {
        return Ok(());
    }
    if x.is_nan() || x.is_infinite() {
        return Err(ValidationError::new(
            ValidationKind::NumericalStability,
            context,
            x,
        ));
    }
    if strict() {
        let magnitude = x.abs();
        if magnitude > STABILITY_STRICT_MAX {
            return Err(ValidationError::new(
                ValidationKind::NumericalStability,
                context,
                x,
            ));
        }
        if magnitude != 0.0 && magnitude < STABILITY_STRICT_MIN_NONZERO {
            return Err(ValidationError::new(
                ValidationKind::NumericalStability,
                context,
                x,
            ));
        }
    }
    Ok(())
}

/// |observed_var - 2p(1-p)β²| ≤ 1e-12.
pub fn validate_hwe_variance_consistency(
    p: f64,
    beta: f64,
    observed_var: f64,
    context: &str,
) -> Result<(), ValidationError> {
    if !enabled() {
        return Ok(());
    }
    let expected = 2.0 * p * (1.0 - p) * beta * beta;
    let diff = (observed_var - expected).abs();
    if diff > HWE_TOLERANCE {
        return Err(ValidationError::new(
            ValidationKind::HweVarianceConsistency,
            context,
            diff,
        ));
    }
    Ok(())
}

/// Verifies μ = Σ 2 p_j β_j and Var = Σ 2 p_j(1-p_j) β_j² within 1e-12, for equal-length vectors.
pub fn validate_population_parameter_consistency(
    p: &[f64],
    beta: &[f64],
    mu: f64,
    var: f64,
    context: &str,
) -> Result<(), ValidationError> {
    if !enabled() {
        return Ok(());
    }
    debug_assert_eq!(p.len(), beta.len());
    let expected_mu: f64 = p.iter().zip(beta).map(|(pj, bj)| 2.0 * pj * bj).sum();
    let expected_var: f64 = p
        .iter()
        .zip(beta)
        .map(|(pj, bj)| 2.0 * pj * (1.0 - pj) * bj * bj)
        .sum();

    let mu_diff = (mu - expected_mu).abs();
    if mu_diff > POPULATION_TOLERANCE {
        return Err(ValidationError::new(
            ValidationKind::PopulationParameterConsistency,
            format!("{context}:mean"),
            mu_diff,
        ));
    }
    let var_diff = (var - expected_var).abs();
    if var_diff > POPULATION_TOLERANCE {
        return Err(ValidationError::new(
            ValidationKind::PopulationParameterConsistency,
            format!("{context}:variance"),
            var_diff,
        ));
    }
    Ok(())
}

/// Direction of a monotonic walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonotonicDirection {
    NonDecreasing,
    NonIncreasing,
}

/// Checks that `values` walks monotonically in the given direction.
pub fn validate_monotonicity(
    values: &[f64],
    direction: MonotonicDirection,
    context: &str,
) -> Result<(), ValidationError> {
    if !enabled() {
        return Ok(());
    }
    for window in values.windows(2) {
        let [a, b] = window else { unreachable!() };
        let ok = match direction {
            MonotonicDirection::NonDecreasing => b >= a,
            MonotonicDirection::NonIncreasing => b <= a,
        };
        if !ok {
            return Err(ValidationError::new(ValidationKind::Monotonicity, context, *b));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probability_rejects_out_of_range() {
        reset_validation_state();
        assert!(validate_probability(0.5, "p").is_ok());
        assert!(validate_probability(1.2, "p").is_err());
        assert!(validate_probability(f64::NAN, "p").is_err());
    }

    #[test]
    fn disabling_validation_makes_every_guard_a_no_op() {
        set_validation_state(ValidationState {
            enabled: false,
            strict: false,
        });
        assert!(validate_probability(42.0, "p").is_ok());
        assert!(validate_dosage(9, "d").is_ok());
        reset_validation_state();
    }

    #[test]
    fn strict_mode_bounds_beta_and_stability() {
        set_validation_state(ValidationState {
            enabled: true,
            strict: true,
        });
        assert!(validate_beta(5.0, "b").is_ok());
        assert!(validate_beta(11.0, "b").is_err());
        assert!(validate_numerical_stability(1e13, "x").is_err());
        assert!(validate_numerical_stability(1e-301, "x").is_err());
        assert!(validate_numerical_stability(0.0, "x").is_ok());
        reset_validation_state();
    }

    #[test]
    fn dosage_accepts_diploid_range_only() {
        reset_validation_state();
        for d in 0..=2u8 {
            assert!(validate_dosage(d, "d").is_ok());
        }
        assert!(validate_dosage(3, "d").is_err());
    }

    #[test]
    fn population_parameter_consistency_matches_hwe_formulas() {
        reset_validation_state();
        let p = [0.2, 0.5, 0.8];
        let beta = [0.1, -0.3, 0.2];
        assert!(validate_population_parameter_consistency(&p, &beta, 0.06, 0.0610, "t").is_ok());
        assert!(validate_population_parameter_consistency(&p, &beta, 0.07, 0.0610, "t").is_err());
    }

    #[test]
    fn monotonicity_detects_a_decrease_in_a_non_decreasing_walk() {
        reset_validation_state();
        assert!(validate_monotonicity(&[0.1, 0.2, 0.2, 0.5], MonotonicDirection::NonDecreasing, "m").is_ok());
        assert!(validate_monotonicity(&[0.1, 0.05], MonotonicDirection::NonDecreasing, "m").is_err());
    }
}
