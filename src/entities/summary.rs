//! Per-trait summaries and normalized-PRS output entities (Phase 3, §3).

use serde::{Deserialize, Serialize};

/// Risk band derived from percentile: low <20, moderate [20,80), high >=80.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

impl RiskLevel {
    /// `percentile` is expected in [0, 1]; bands are expressed here in percent terms.
    pub fn from_percentile(percentile: f64) -> Self {
        let percent = percentile * 100.0;
        if percent < 20.0 {
            Self::Low
        } else if percent < 80.0 {
            Self::Moderate
        } else {
            Self::High
        }
    }
}

/// Raw score plus its normalized z-score and percentile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPrs {
    pub raw_score: f64,
    pub z_score: f64,
    pub percentile: f64,
}

/// Per-trait rollup produced in Phase 3.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitSummary {
    pub trait_name: String,
    pub risk_allele_count: u32,
    pub effect_weighted_contribution: f64,
    pub risk_level: RiskLevel,
    pub normalized: NormalizedPrs,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_bands_match_scenario_6() {
        assert_eq!(RiskLevel::from_percentile(0.10), RiskLevel::Low);
        assert_eq!(RiskLevel::from_percentile(0.50), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_percentile(0.85), RiskLevel::High);
    }

    #[test]
    fn risk_band_boundaries_are_half_open() {
        assert_eq!(RiskLevel::from_percentile(0.20), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_percentile(0.80), RiskLevel::High);
        assert_eq!(RiskLevel::from_percentile(0.199_999), RiskLevel::Low);
    }
}
