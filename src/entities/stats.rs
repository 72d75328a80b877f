//! Reference stats and the cache key that identifies them (§3, §4.4).

use serde::{Deserialize, Serialize};

/// Uniquely identifies a stats row: (ancestry code, trait, model id). Case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub ancestry: String,
    pub trait_name: String,
    pub model_id: String,
}

impl CacheKey {
    pub fn new(
        ancestry: impl Into<String>,
        trait_name: impl Into<String>,
        model_id: impl Into<String>,
    ) -> Self {
        Self {
            ancestry: ancestry.into(),
            trait_name: trait_name.into(),
            model_id: model_id.into(),
        }
    }
}

/// A population reference row: mean, std (>0), and the [min, max] support bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceStats {
    pub ancestry: String,
    pub trait_name: String,
    pub model_id: String,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl ReferenceStats {
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(&self.ancestry, &self.trait_name, &self.model_id)
    }

    pub fn is_valid(&self) -> bool {
        self.std_dev > 0.0
            && self.min <= self.mean
            && self.mean <= self.max
            && self.mean.is_finite()
            && self.std_dev.is_finite()
            && self.min.is_finite()
            && self.max.is_finite()
    }
}
