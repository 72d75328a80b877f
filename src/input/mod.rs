//! Input adapters (§4.9): genotype file and SNP-list parsing, the two ambient
//! entry points upstream of the requirements-analysis phase.

pub mod genotype;
pub mod snplist;

pub use genotype::parse_genotype_file;
pub use snplist::parse_snp_list;
