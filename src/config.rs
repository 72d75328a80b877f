//! Layered run configuration (§4.11): built-in defaults, an optional config
//! file, `PRS_*` environment variables, then CLI flags, each layer
//! overriding the previous. Unknown keys in the config file are rejected
//! rather than silently ignored.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::PrsError;

const RECOGNIZED_KEYS: &[&str] = &[
    "ancestry_code",
    "gwas_table",
    "model_table",
    "allele_frequency_table",
    "stats_cache_table",
    "invariance",
    "output",
    "timeout_ms",
    "backend",
    "database_url",
];

/// Validation toggles, nested under `invariance` in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InvarianceConfig {
    #[serde(default = "default_true")]
    pub enable_validation: bool,
    #[serde(default)]
    pub strict_mode: bool,
}

impl Default for InvarianceConfig {
    fn default() -> Self {
        Self {
            enable_validation: true,
            strict_mode: false,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Output shape and destination, nested under `output`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
    /// `None` means stdout.
    #[serde(default)]
    pub destination: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Json,
            destination: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = PrsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            other => Err(PrsError::Config(format!("unknown output format '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Warehouse,
    Embedded,
}

/// The fully resolved configuration an orchestrator run is built from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub ancestry_code: String,
    pub gwas_table: String,
    pub model_table: String,
    pub allele_frequency_table: String,
    pub stats_cache_table: String,
    #[serde(default)]
    pub invariance: InvarianceConfig,
    #[serde(default)]
    pub output: OutputConfig,
    pub timeout_ms: u64,
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default)]
    pub database_url: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            ancestry_code: "GLOBAL".to_string(),
            gwas_table: "gwas_catalogue".to_string(),
            model_table: "prs_models".to_string(),
            allele_frequency_table: "allele_frequencies".to_string(),
            stats_cache_table: "reference_stats_cache".to_string(),
            invariance: InvarianceConfig::default(),
            output: OutputConfig::default(),
            timeout_ms: 30_000,
            backend: StoreBackend::Warehouse,
            database_url: None,
        }
    }
}

/// CLI-flag overrides. Every field is optional; only set fields override.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub ancestry_code: Option<String>,
    pub gwas_table: Option<String>,
    pub model_table: Option<String>,
    pub allele_frequency_table: Option<String>,
    pub stats_cache_table: Option<String>,
    pub enable_validation: Option<bool>,
    pub strict_mode: Option<bool>,
    pub output_format: Option<OutputFormat>,
    pub output_destination: Option<String>,
    pub timeout_ms: Option<u64>,
    pub backend: Option<StoreBackend>,
    pub database_url: Option<String>,
}

/// Loads and merges the four layers: defaults, file, `PRS_*` env, overrides.
pub fn load(config_path: Option<&Path>, overrides: ConfigOverrides) -> Result<RunConfig, PrsError> {
    let mut config = RunConfig::default();

    if let Some(path) = config_path {
        merge_file(&mut config, path)?;
    }
    merge_env(&mut config, std::env::vars());
    merge_overrides(&mut config, overrides);

    if config.timeout_ms == 0 {
        return Err(PrsError::Config("timeout_ms must be greater than zero".into()));
    }
    Ok(config)
}

fn merge_file(config: &mut RunConfig, path: &Path) -> Result<(), PrsError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| PrsError::Config(format!("failed to read config file {}: {e}", path.display())))?;

    reject_unknown_keys(&contents, path)?;

    let parsed: RunConfig = if path.extension().and_then(|e| e.to_str()) == Some("json") {
        serde_json::from_str(&contents)
            .map_err(|e| PrsError::Config(format!("invalid JSON config {}: {e}", path.display())))?
    } else {
        serde_yaml::from_str(&contents)
            .map_err(|e| PrsError::Config(format!("invalid YAML config {}: {e}", path.display())))?
    };
    *config = parsed;
    Ok(())
}

/// `serde(deny_unknown_fields)` already rejects unrecognized keys at parse
/// time; this pre-check gives a clearer message naming the offending key
/// before the generic serde error would.
fn reject_unknown_keys(contents: &str, path: &Path) -> Result<(), PrsError> {
    let value: serde_yaml::Value = serde_yaml::from_str(contents)
        .map_err(|e| PrsError::Config(format!("invalid config {}: {e}", path.display())))?;
    let Some(mapping) = value.as_mapping() else {
        return Ok(());
    };
    for key in mapping.keys() {
        let Some(key) = key.as_str() else { continue };
        if !RECOGNIZED_KEYS.contains(&key) {
            return Err(PrsError::Config(format!(
                "unrecognized config key '{key}' in {}",
                path.display()
            )));
        }
    }
    Ok(())
}

fn merge_env(config: &mut RunConfig, vars: impl Iterator<Item = (String, String)>) {
    let env: HashMap<String, String> = vars.filter(|(k, _)| k.starts_with("PRS_")).collect();

    if let Some(v) = env.get("PRS_ANCESTRY_CODE") {
        config.ancestry_code = v.clone();
    }
    if let Some(v) = env.get("PRS_GWAS_TABLE") {
        config.gwas_table = v.clone();
    }
    if let Some(v) = env.get("PRS_MODEL_TABLE") {
        config.model_table = v.clone();
    }
    if let Some(v) = env.get("PRS_ALLELE_FREQUENCY_TABLE") {
        config.allele_frequency_table = v.clone();
    }
    if let Some(v) = env.get("PRS_STATS_CACHE_TABLE") {
        config.stats_cache_table = v.clone();
    }
    if let Some(v) = env.get("PRS_ENABLE_VALIDATION") {
        config.invariance.enable_validation = parse_bool(v);
    }
    if let Some(v) = env.get("PRS_STRICT_MODE") {
        config.invariance.strict_mode = parse_bool(v);
    }
    if let Some(v) = env.get("PRS_OUTPUT_FORMAT") {
        if let Ok(format) = v.parse() {
            config.output.format = format;
        }
    }
    if let Some(v) = env.get("PRS_OUTPUT_DESTINATION") {
        config.output.destination = Some(v.clone());
    }
    if let Some(v) = env.get("PRS_TIMEOUT_MS") {
        if let Ok(ms) = v.parse() {
            config.timeout_ms = ms;
        }
    }
    if let Some(v) = env.get("PRS_DATABASE_URL") {
        config.database_url = Some(v.clone());
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn merge_overrides(config: &mut RunConfig, overrides: ConfigOverrides) {
    if let Some(v) = overrides.ancestry_code {
        config.ancestry_code = v;
    }
    if let Some(v) = overrides.gwas_table {
        config.gwas_table = v;
    }
    if let Some(v) = overrides.model_table {
        config.model_table = v;
    }
    if let Some(v) = overrides.allele_frequency_table {
        config.allele_frequency_table = v;
    }
    if let Some(v) = overrides.stats_cache_table {
        config.stats_cache_table = v;
    }
    if let Some(v) = overrides.enable_validation {
        config.invariance.enable_validation = v;
    }
    if let Some(v) = overrides.strict_mode {
        config.invariance.strict_mode = v;
    }
    if let Some(v) = overrides.output_format {
        config.output.format = v;
    }
    if let Some(v) = overrides.output_destination {
        config.output.destination = Some(v);
    }
    if let Some(v) = overrides.timeout_ms {
        config.timeout_ms = v;
    }
    if let Some(v) = overrides.backend {
        config.backend = v;
    }
    if let Some(v) = overrides.database_url {
        config.database_url = Some(v);
    }
}
