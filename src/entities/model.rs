//! PRS model entity: a trait's ordered effect-size table (§3).

use serde::{Deserialize, Serialize};

/// One weighted variant in a per-trait PRS model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelVariant {
    pub variant_id: String,
    pub effect_allele: String,
    pub other_allele: String,
    pub weight: f64,
}

/// A trait's PRS model: the ordered list of weighted variants loaded on cache miss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrsModel {
    pub trait_name: String,
    pub model_id: String,
    pub variants: Vec<ModelVariant>,
}

impl PrsModel {
    pub fn variant_ids(&self) -> impl Iterator<Item = &str> {
        self.variants.iter().map(|v| v.variant_id.as_str())
    }
}
