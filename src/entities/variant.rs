//! Variant-level entities: subject genotypes, GWAS records, and the
//! validated/annotated forms the annotator produces (§4.7).

use serde::{Deserialize, Serialize};

/// Blank or whitespace-only GWAS trait names are bucketed under this literal string.
pub const UNKNOWN_TRAIT: &str = "unknown";

/// A genotype call for one variant, as read from the subject's genotype file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectGenotype {
    pub variant_id: String,
    /// Two-letter genotype, e.g. "AG". May be "NN"/"--" for missing calls.
    pub genotype: String,
}

/// One row of the GWAS effect-size catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GwasRecord {
    pub variant_id: String,
    pub risk_allele: String,
    pub beta: f64,
    #[serde(default)]
    pub trait_name: String,
}

impl GwasRecord {
    /// The trait name with blank/whitespace-only values bucketed to [`UNKNOWN_TRAIT`].
    pub fn normalized_trait(&self) -> &str {
        let trimmed = self.trait_name.trim();
        if trimmed.is_empty() { UNKNOWN_TRAIT } else { trimmed }
    }
}

/// A subject variant after checking it against the catalogue, prior to annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedVariant {
    pub variant_id: String,
    pub genotype: String,
    pub found_in_catalogue: bool,
}

/// A subject variant joined with its matching GWAS record and dosage computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedVariant {
    pub variant_id: String,
    pub genotype: String,
    pub risk_allele: String,
    pub beta: f64,
    pub dosage: u8,
    pub trait_name: String,
}

/// Counts occurrences of `risk_allele`'s single character in a two-letter
/// genotype. Returns 0 for ambiguous/missing genotypes per §4.7.
pub fn compute_dosage(genotype: &str, risk_allele: &str) -> u8 {
    if genotype.len() != 2 || genotype.eq_ignore_ascii_case("NN") || genotype == "--" {
        return 0;
    }
    let Some(risk_char) = risk_allele.chars().next() else {
        return 0;
    };
    if risk_allele.chars().count() != 1 {
        return 0;
    }
    genotype
        .chars()
        .filter(|c| c.eq_ignore_ascii_case(&risk_char))
        .count() as u8
}
