//! Genotype file parsing (§4.9): auto-detects one of two tab-separated
//! header shapes and produces the subject's observed calls.
//!
//! - Diploid two-column form: `rsid, chromosome, position, allele1, allele2`.
//! - Concatenated form: `rsid, chromosome, position, genotype`.
//!
//! Lines starting with `#` are comments, skipped before header detection.
//! Header matching is case- and whitespace-insensitive. A header matching
//! neither shape is a fatal `InputError`.

use crate::entities::SubjectGenotype;
use crate::error::PrsError;

const COL_RSID: &str = "rsid";
const COL_CHROMOSOME: &str = "chromosome";
const COL_POSITION: &str = "position";
const COL_ALLELE1: &str = "allele1";
const COL_ALLELE2: &str = "allele2";
const COL_GENOTYPE: &str = "genotype";

enum Layout {
    /// Column indices: rsid, allele1, allele2.
    TwoColumn(usize, usize, usize),
    /// Column indices: rsid, genotype.
    Concatenated(usize, usize),
}

pub fn parse_genotype_file(contents: &str) -> Result<Vec<SubjectGenotype>, PrsError> {
    let mut lines = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'));

    let Some(header_line) = lines.next() else {
        return Ok(Vec::new());
    };

    let layout = detect_layout(header_line)?;
    let mut records = Vec::new();
    for line in lines {
        push_record(&mut records, line, &layout)?;
    }
    Ok(records)
}

fn split_fields(line: &str) -> Vec<String> {
    let delimiter = if line.contains('\t') { '\t' } else { ',' };
    line.split(delimiter).map(|f| f.trim().to_string()).collect()
}

fn detect_layout(header_line: &str) -> Result<Layout, PrsError> {
    let columns: Vec<String> = split_fields(header_line)
        .iter()
        .map(|c| c.to_ascii_lowercase())
        .collect();

    let position_of = |name: &str| columns.iter().position(|c| c == name);

    let rsid = position_of(COL_RSID);
    let chromosome = position_of(COL_CHROMOSOME);
    let position = position_of(COL_POSITION);
    let allele1 = position_of(COL_ALLELE1);
    let allele2 = position_of(COL_ALLELE2);
    let genotype = position_of(COL_GENOTYPE);

    match (rsid, chromosome, position, allele1, allele2, genotype) {
        (Some(rsid), Some(_), Some(_), Some(a1), Some(a2), _) => {
            Ok(Layout::TwoColumn(rsid, a1, a2))
        }
        (Some(rsid), Some(_), Some(_), _, _, Some(gt)) => Ok(Layout::Concatenated(rsid, gt)),
        _ => Err(PrsError::Input(format!(
            "unrecognized genotype file header; expected '{COL_RSID},{COL_CHROMOSOME},{COL_POSITION},{COL_ALLELE1},{COL_ALLELE2}' or '{COL_RSID},{COL_CHROMOSOME},{COL_POSITION},{COL_GENOTYPE}', got: {header_line}"
        ))),
    }
}

fn push_record(out: &mut Vec<SubjectGenotype>, line: &str, layout: &Layout) -> Result<(), PrsError> {
    let fields = split_fields(line);
    let field = |idx: usize| -> Result<&str, PrsError> {
        fields
            .get(idx)
            .map(String::as_str)
            .ok_or_else(|| PrsError::Input(format!("row has too few columns: {line}")))
    };

    match *layout {
        Layout::TwoColumn(rsid, a1, a2) => {
            let genotype = format!(
                "{}{}",
                field(a1)?.to_ascii_uppercase(),
                field(a2)?.to_ascii_uppercase()
            );
            out.push(SubjectGenotype {
                variant_id: field(rsid)?.to_string(),
                genotype,
            });
        }
        Layout::Concatenated(rsid, gt) => {
            out.push(SubjectGenotype {
                variant_id: field(rsid)?.to_string(),
                genotype: field(gt)?.to_ascii_uppercase(),
            });
        }
    }
    Ok(())
}
