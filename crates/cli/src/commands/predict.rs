//! Prediction commands, against the server or in-process

use anyhow::{Context, Result};
use colored::Colorize;
use diagnosis_lib::{
    feature_spec, ArtifactLayout, ArtifactStore, Condition, InferenceEngine, InferenceRequest,
    InferenceResponse,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{
    color_diagnosis, format_probability, format_vector, print_error, print_info, print_json,
    print_rows, OutputFormat,
};

#[derive(Tabled)]
struct TraceRow {
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Raw")]
    raw: String,
    #[tabled(rename = "Scaled")]
    scaled: String,
}

/// Parse a `name=value` pair; the value may itself contain `=`
pub fn parse_field(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", s))?;
    if name.trim().is_empty() {
        return Err(format!("missing field name in '{}'", s));
    }
    Ok((name.trim().to_string(), value.to_string()))
}

/// Merge fields from an optional JSON file with `-F` pairs; pairs win
pub fn collect_fields(
    input: Option<&Path>,
    pairs: Vec<(String, String)>,
) -> Result<BTreeMap<String, String>> {
    let mut fields = BTreeMap::new();

    if let Some(path) = input {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let object: BTreeMap<String, Value> =
            serde_json::from_str(&content).context("Input file must be a JSON object")?;
        for (name, value) in object {
            let value = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                other => anyhow::bail!("Field '{}' must be a string or number, got {}", name, other),
            };
            fields.insert(name, value);
        }
    }

    fields.extend(pairs);
    Ok(fields)
}

/// Ask the server for a diagnosis
pub async fn remote(
    client: &ApiClient,
    condition: Condition,
    fields: BTreeMap<String, String>,
    trace: bool,
    format: OutputFormat,
) -> Result<()> {
    let request = InferenceRequest {
        condition,
        fields,
        trace: trace.then_some(true),
    };
    let response = client.predict(&request).await?;
    render(&response, format)
}

/// Load artifacts from disk and run the engine in this process
pub fn local(
    model_dir: &Path,
    condition: Condition,
    fields: BTreeMap<String, String>,
    trace: bool,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let store = ArtifactStore::load_all(&ArtifactLayout::new(model_dir))
        .with_context(|| format!("Failed to load artifacts from {}", model_dir.display()))?;
    if verbose {
        print_info(&format!("Loaded {} artifact pairs from {}", store.len(), model_dir.display()));
    }

    let engine = InferenceEngine::new(std::sync::Arc::new(store));
    let response = match engine.infer_with(condition, &fields, trace) {
        Ok(result) => InferenceResponse::success(result),
        Err(e) => {
            if verbose {
                print_info(&format!("Cause: {}", e));
            }
            InferenceResponse::failure(condition, e.descriptor())
        }
    };
    render(&response, format)
}

fn render(response: &InferenceResponse, format: OutputFormat) -> Result<()> {
    if let OutputFormat::Json = format {
        print_json(response)?;
    } else if let Some(diagnosis) = response.diagnosis {
        let verdict = response
            .message
            .clone()
            .unwrap_or_else(|| response.condition.verdict(diagnosis).to_string());
        println!("{}", response.condition.display_name().bold());
        println!("{}", "=".repeat(40));
        println!("{}", color_diagnosis(diagnosis, &verdict));
        if response.probability.is_some() {
            println!("Probability: {}", format_probability(response.probability));
        }

        if let Some(trace) = &response.trace {
            println!();
            println!("Predictor:     {}", trace.predictor.cyan());
            println!("Decision path: {}", trace.decision_path);
            if let Some(p) = trace.probabilities {
                println!("Probabilities: {}", format_vector(&p));
            }
            let rows = feature_spec(response.condition)
                .names()
                .zip(trace.raw.iter().zip(&trace.scaled))
                .map(|(name, (raw, scaled))| TraceRow {
                    field: name.to_string(),
                    raw: raw.to_string(),
                    scaled: format!("{:.4}", scaled),
                })
                .collect();
            print_rows(rows, "No trace values");
        }
    }

    match &response.error {
        Some(error) => {
            if let OutputFormat::Table = format {
                print_error(&error.message);
                if !error.fields.is_empty() {
                    println!("Fields: {}", error.fields.join(", ").yellow());
                }
            }
            anyhow::bail!("prediction failed ({:?})", error.kind)
        }
        None => Ok(()),
    }
}
