//! SNP-list parsing (§4.9): the set of variant ids a run should score,
//! accepted as either a JSON array of strings or a delimited column file.

use std::collections::HashSet;

use crate::error::PrsError;

const KNOWN_ID_HEADERS: &[&str] = &["rsid"];

/// Parses `contents` as a SNP-list. Rejects embedded null bytes outright,
/// since a null byte in a variant id indicates a malformed or truncated
/// upload rather than a legitimate identifier. De-duplicates while
/// preserving first-seen order. Format is detected by attempting a JSON
/// decode first, falling back to delimited parsing.
pub fn parse_snp_list(contents: &str) -> Result<Vec<String>, PrsError> {
    if contents.contains('\0') {
        return Err(PrsError::Input("SNP list contains an embedded null byte".into()));
    }

    let raw_ids = match serde_json::from_str::<Vec<String>>(contents) {
        Ok(ids) => ids,
        Err(_) => parse_delimited(contents),
    };

    let mut seen = HashSet::new();
    let mut ordered = Vec::with_capacity(raw_ids.len());
    for id in raw_ids {
        let id = id.trim().to_string();
        if id.is_empty() {
            continue;
        }
        if seen.insert(id.clone()) {
            ordered.push(id);
        }
    }
    Ok(ordered)
}

fn parse_delimited(contents: &str) -> Vec<String> {
    let mut lines = contents.lines().map(str::trim).filter(|l| !l.is_empty());
    let Some(first) = lines.clone().next() else {
        return Vec::new();
    };

    let delimiter = if first.contains('\t') { '\t' } else { ',' };
    let first_fields: Vec<&str> = first.split(delimiter).map(str::trim).collect();
    let id_column = first_fields
        .iter()
        .position(|f| KNOWN_ID_HEADERS.contains(&f.to_ascii_lowercase().as_str()));

    match id_column {
        Some(column) => lines
            .skip(1)
            .filter_map(|line| line.split(delimiter).nth(column))
            .map(str::trim)
            .map(str::to_string)
            .collect(),
        None if first_fields.len() > 1 => lines
            .skip(1)
            .filter_map(|line| line.split(delimiter).next())
            .map(str::trim)
            .map(str::to_string)
            .collect(),
        None => lines.map(str::to_string).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_array_is_parsed() {
        let ids = parse_snp_list(r#"["rs1", "rs2", "rs1"]"#).unwrap();
        assert_eq!(ids, vec!["rs1", "rs2"]);
    }

    #[test]
    fn delimited_file_with_rsid_header_extracts_that_column() {
        let ids = parse_snp_list("rsid,chrom\nrs1,1\nrs2,2\n").unwrap();
        assert_eq!(ids, vec!["rs1", "rs2"]);
    }

    #[test]
    fn single_column_file_without_header_is_used_verbatim() {
        let ids = parse_snp_list("rs1\nrs2\nrs1\n").unwrap();
        assert_eq!(ids, vec!["rs1", "rs2"]);
    }

    #[test]
    fn embedded_null_byte_is_rejected() {
        assert!(parse_snp_list("rs1\0rs2").is_err());
    }

    #[test]
    fn blank_lines_are_ignored() {
        let ids = parse_snp_list("rs1\n\nrs2\n").unwrap();
        assert_eq!(ids, vec!["rs1", "rs2"]);
    }

    #[test]
    fn headered_file_without_an_rsid_column_falls_back_to_the_first_column() {
        let ids = parse_snp_list("chrom,pos\nrs1,100\nrs2,200\n").unwrap();
        assert_eq!(ids, vec!["rs1", "rs2"]);
    }

    #[test]
    fn an_id_column_is_not_mistaken_for_an_rsid_column() {
        let ids = parse_snp_list("id,chrom\nrs1,1\nrs2,2\n").unwrap();
        assert_eq!(ids, vec!["rs1", "rs2"]);
    }
}
