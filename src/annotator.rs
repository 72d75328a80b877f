//! Annotator (§4.7): joins validated subject variants with GWAS records and
//! computes risk-allele dosage.

use std::collections::HashMap;

use crate::entities::variant::compute_dosage;
use crate::entities::{AnnotatedVariant, GwasRecord, ValidatedVariant};

/// Joins `validated` against `gwas_records` by variant id and emits an
/// annotated variant per match. Returns the annotated variants plus the
/// subset of GWAS records actually used (by reference index, cloned).
pub fn annotate(
    validated: &[ValidatedVariant],
    gwas_records: &[GwasRecord],
) -> (Vec<AnnotatedVariant>, Vec<GwasRecord>) {
    let mut by_variant: HashMap<&str, Vec<&GwasRecord>> = HashMap::new();
    for record in gwas_records {
        by_variant.entry(record.variant_id.as_str()).or_default().push(record);
    }

    let mut annotated = Vec::new();
    let mut used_indices: Vec<usize> = Vec::new();

    for subject in validated {
        if !subject.found_in_catalogue {
            continue;
        }
        let Some(matches) = by_variant.get(subject.variant_id.as_str()) else {
            continue;
        };
        for record in matches {
            let dosage = compute_dosage(&subject.genotype, &record.risk_allele);
            annotated.push(AnnotatedVariant {
                variant_id: subject.variant_id.clone(),
                genotype: subject.genotype.clone(),
                risk_allele: record.risk_allele.clone(),
                beta: record.beta,
                dosage,
                trait_name: record.normalized_trait().to_string(),
            });
            if let Some(idx) = gwas_records
                .iter()
                .position(|r| std::ptr::eq(*r, *record))
            {
                used_indices.push(idx);
            }
        }
    }

    used_indices.sort_unstable();
    used_indices.dedup();
    let used = used_indices
        .into_iter()
        .map(|idx| gwas_records[idx].clone())
        .collect();

    (annotated, used)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gwas(id: &str, allele: &str, beta: f64, trait_name: &str) -> GwasRecord {
        GwasRecord {
            variant_id: id.into(),
            risk_allele: allele.into(),
            beta,
            trait_name: trait_name.into(),
        }
    }

    fn validated(id: &str, genotype: &str, found: bool) -> ValidatedVariant {
        ValidatedVariant {
            variant_id: id.into(),
            genotype: genotype.into(),
            found_in_catalogue: found,
        }
    }

    #[test]
    fn annotates_matching_variants_with_computed_dosage() {
        let validated_variants = vec![
            validated("rs1", "AG", true),
            validated("rs2", "GG", true),
            validated("rs3", "AA", false),
        ];
        let gwas_records = vec![
            gwas("rs1", "A", 0.1, "height"),
            gwas("rs2", "A", 0.2, "height"),
        ];

        let (annotated, used) = annotate(&validated_variants, &gwas_records);
        assert_eq!(annotated.len(), 2);
        assert_eq!(annotated[0].dosage, 1);
        assert_eq!(annotated[1].dosage, 0);
        assert_eq!(used.len(), 2);
    }

    #[test]
    fn skips_variants_not_flagged_as_found() {
        let validated_variants = vec![validated("rs1", "AG", false)];
        let gwas_records = vec![gwas("rs1", "A", 0.1, "height")];
        let (annotated, used) = annotate(&validated_variants, &gwas_records);
        assert!(annotated.is_empty());
        assert!(used.is_empty());
    }

    #[test]
    fn one_variant_can_annotate_multiple_traits() {
        let validated_variants = vec![validated("rs1", "AA", true)];
        let gwas_records = vec![
            gwas("rs1", "A", 0.1, "height"),
            gwas("rs1", "A", 0.2, "weight"),
        ];
        let (annotated, _used) = annotate(&validated_variants, &gwas_records);
        assert_eq!(annotated.len(), 2);
        let trait_names: Vec<&str> = annotated.iter().map(|a| a.trait_name.as_str()).collect();
        assert!(trait_names.contains(&"height"));
        assert!(trait_names.contains(&"weight"));
    }
}
