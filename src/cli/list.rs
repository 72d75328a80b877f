//! `prs list`: documents recognized configuration keys and ancestry codes.

use crate::ancestry::known_codes;
use crate::error::PrsError;

pub fn render() -> Result<String, PrsError> {
    let mut out = String::new();
    out.push_str("# Configuration keys\n\n");
    out.push_str("- ancestry_code\n");
    out.push_str("- gwas_table\n");
    out.push_str("- model_table\n");
    out.push_str("- allele_frequency_table\n");
    out.push_str("- stats_cache_table\n");
    out.push_str("- invariance.enable_validation\n");
    out.push_str("- invariance.strict_mode\n");
    out.push_str("- output.format (json|csv)\n");
    out.push_str("- output.destination\n");
    out.push_str("- timeout_ms\n");
    out.push_str("\n# Ancestry codes\n\n");
    for code in known_codes() {
        out.push_str(&format!("- {code}\n"));
    }
    Ok(out)
}
