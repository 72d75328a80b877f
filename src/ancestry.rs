//! Ancestry code to allele-frequency column precedence mapping (§4.9/§4.11).
//!
//! A run's declared ancestry code resolves to an ordered list of columns to
//! read from the allele-frequency store, most specific first, falling back to
//! a global column when a population-specific one is unavailable.

use phf::phf_map;

use crate::error::PrsError;

/// The resolved column precedence for one ancestry code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AncestryProfile {
    pub code: String,
    pub column_precedence: Vec<String>,
}

static ANCESTRY_COLUMNS: phf::Map<&'static str, &'static [&'static str]> = phf_map! {
    "EUR" => &["af_eur", "af_global"],
    "AFR" => &["af_afr", "af_global"],
    "EAS" => &["af_eas", "af_global"],
    "SAS" => &["af_sas", "af_global"],
    "AMR" => &["af_amr", "af_global"],
    "GLOBAL" => &["af_global"],
};

/// Resolves `code` (case-insensitive) to its column precedence. Unrecognized
/// codes are rejected explicitly rather than silently falling back to
/// `GLOBAL`, since a typo'd ancestry code would otherwise pass quietly.
pub fn lookup_ancestry_profile(code: &str) -> Result<AncestryProfile, PrsError> {
    let normalized = code.trim().to_ascii_uppercase();
    let columns = ANCESTRY_COLUMNS
        .get(normalized.as_str())
        .ok_or_else(|| {
            PrsError::Config(format!(
                "unrecognized ancestry code '{code}'; known codes are {:?}",
                known_codes()
            ))
        })?;
    Ok(AncestryProfile {
        code: normalized,
        column_precedence: columns.iter().map(|c| c.to_string()).collect(),
    })
}

/// The sorted list of recognized ancestry codes, for error messages and help text.
pub fn known_codes() -> Vec<&'static str> {
    let mut codes: Vec<&'static str> = ANCESTRY_COLUMNS.keys().copied().collect();
    codes.sort_unstable();
    codes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_code_resolves_with_global_fallback_last() {
        let profile = lookup_ancestry_profile("eur").unwrap();
        assert_eq!(profile.code, "EUR");
        assert_eq!(profile.column_precedence, vec!["af_eur", "af_global"]);
    }

    #[test]
    fn global_code_resolves_to_single_column() {
        let profile = lookup_ancestry_profile("GLOBAL").unwrap();
        assert_eq!(profile.column_precedence, vec!["af_global"]);
    }

    #[test]
    fn unrecognized_code_is_rejected() {
        assert!(lookup_ancestry_profile("XYZ").is_err());
    }

    #[test]
    fn whitespace_and_case_are_normalized() {
        let profile = lookup_ancestry_profile("  afr \n").unwrap();
        assert_eq!(profile.code, "AFR");
    }
}
