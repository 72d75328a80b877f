//! Output writer (§4.12): serializes the run output document to JSON or CSV
//! and writes it to stdout or a file destination.

use serde::{Deserialize, Serialize};

use crate::config::OutputFormat;
use crate::entities::TraitSummary;
use crate::error::PrsError;

/// The full run output document: one per invocation of `run`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutput {
    pub ancestry_code: String,
    pub model_id: String,
    pub trait_summaries: Vec<TraitSummary>,
    pub missing_variants: Vec<String>,
}

/// Renders `output` per `format` and delivers it to `destination` (`None` or
/// `"-"` means stdout). Returns the text that went to stdout, if any, so the
/// caller can print it exactly once rather than duplicating it alongside a
/// status message.
pub fn write_output(
    output: &RunOutput,
    format: OutputFormat,
    destination: Option<&str>,
) -> Result<Option<String>, PrsError> {
    let rendered = render(output, format)?;

    match destination {
        None | Some("-") => Ok(Some(rendered)),
        Some(path) => {
            std::fs::write(path, rendered)
                .map_err(|e| PrsError::Input(format!("failed to write output to {path}: {e}")))?;
            Ok(None)
        }
    }
}

fn render(output: &RunOutput, format: OutputFormat) -> Result<String, PrsError> {
    match format {
        OutputFormat::Json => render_json(output),
        OutputFormat::Csv => render_csv(output),
    }
}

fn render_json(output: &RunOutput) -> Result<String, PrsError> {
    serde_json::to_string_pretty(output)
        .map(|mut s| {
            s.push('\n');
            s
        })
        .map_err(|e| PrsError::Input(format!("failed to serialize output as JSON: {e}")))
}

/// One row per trait summary; a leading row carries the run-level fields
/// (ancestry, model id) and a trailing row lists missing variants.
fn render_csv(output: &RunOutput) -> Result<String, PrsError> {
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());

    writer
        .write_record(["ancestry_code", "model_id"])
        .map_err(csv_error)?;
    writer
        .write_record([output.ancestry_code.as_str(), output.model_id.as_str()])
        .map_err(csv_error)?;
    writer.write_record::<_, &str>([]).map_err(csv_error)?;

    writer
        .write_record([
            "trait_name",
            "risk_allele_count",
            "effect_weighted_contribution",
            "risk_level",
            "raw_score",
            "z_score",
            "percentile",
        ])
        .map_err(csv_error)?;
    for summary in &output.trait_summaries {
        writer
            .write_record([
                summary.trait_name.as_str(),
                &summary.risk_allele_count.to_string(),
                &summary.effect_weighted_contribution.to_string(),
                risk_level_label(summary.risk_level),
                &summary.normalized.raw_score.to_string(),
                &summary.normalized.z_score.to_string(),
                &summary.normalized.percentile.to_string(),
            ])
            .map_err(csv_error)?;
    }

    writer.write_record::<_, &str>([]).map_err(csv_error)?;
    writer.write_record(["missing_variants"]).map_err(csv_error)?;
    writer
        .write_record([output.missing_variants.join(";")])
        .map_err(csv_error)?;

    let bytes = writer.into_inner().map_err(|e| PrsError::Input(format!("CSV flush failed: {e}")))?;
    String::from_utf8(bytes).map_err(|e| PrsError::Input(format!("CSV output was not valid UTF-8: {e}")))
}

fn risk_level_label(level: crate::entities::RiskLevel) -> &'static str {
    match level {
        crate::entities::RiskLevel::Low => "low",
        crate::entities::RiskLevel::Moderate => "moderate",
        crate::entities::RiskLevel::High => "high",
    }
}

fn csv_error(e: csv::Error) -> PrsError {
    PrsError::Input(format!("failed to write CSV output: {e}"))
}
