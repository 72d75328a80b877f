//! Error taxonomy for the PRS engine.
//!
//! Mirrors the propagation policy of the specification: validator failures
//! and catalogue/store failures surface immediately, cache-write failures
//! are fatal to the run but do not invalidate already-computed output, and
//! context cancellation is its own variant so callers can distinguish it
//! from an ordinary I/O failure.

use std::fmt;

/// The kind of value a [`ValidationError`] was checking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationKind {
    Probability,
    Variance,
    Dosage,
    Beta,
    NumericalStability,
    HweVarianceConsistency,
    PopulationParameterConsistency,
    Monotonicity,
}

impl fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Probability => "probability",
            Self::Variance => "variance",
            Self::Dosage => "dosage",
            Self::Beta => "beta",
            Self::NumericalStability => "numerical_stability",
            Self::HweVarianceConsistency => "hwe_variance_consistency",
            Self::PopulationParameterConsistency => "population_parameter_consistency",
            Self::Monotonicity => "monotonicity",
        };
        f.write_str(label)
    }
}

/// A single validator failure: what kind of check failed, where, and on what value.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub kind: ValidationKind,
    pub context: String,
    pub value: f64,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "validation failed: kind={} context={} value={}",
            self.kind, self.context, self.value
        )
    }
}

impl std::error::Error for ValidationError {}

impl ValidationError {
    pub fn new(kind: ValidationKind, context: impl Into<String>, value: f64) -> Self {
        Self {
            kind,
            context: context.into(),
            value,
        }
    }
}

/// Which gate of the PRS calculator observed a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalculationPhase {
    PreCondition,
    Calculation,
    PostCondition,
}

impl fmt::Display for CalculationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::PreCondition => "pre_condition",
            Self::Calculation => "calculation",
            Self::PostCondition => "post_condition",
        };
        f.write_str(label)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PrsError {
    #[error("input error: {0}")]
    Input(String),

    #[error("catalogue error ({table}): {message}")]
    Catalogue { table: String, message: String },

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("computation error: {0}")]
    Computation(String),

    #[error("cache write error: {0}")]
    CacheWrite(String),

    #[error("calculation error in phase {phase} for variant {variant}: {message}")]
    Calculation {
        phase: CalculationPhase,
        variant: String,
        message: String,
    },

    #[error("operation cancelled: {0}")]
    Cancelled(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl PrsError {
    /// The single-line diagnostic kind surfaced to users on exit, per §7.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Input(_) => "InputError",
            Self::Catalogue { .. } => "CatalogueError",
            Self::Validation(_) => "ValidationError",
            Self::Computation(_) => "ComputationError",
            Self::CacheWrite(_) => "CacheWriteError",
            Self::Calculation { .. } => "ComputationError",
            Self::Cancelled(_) => "Cancelled",
            Self::Config(_) => "InputError",
        }
    }

    pub fn catalogue(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Catalogue {
            table: table.into(),
            message: message.into(),
        }
    }

    pub fn calculation(
        phase: CalculationPhase,
        variant: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Calculation {
            phase,
            variant: variant.into(),
            message: message.into(),
        }
    }
}

pub type PrsResult<T> = Result<T, PrsError>;
