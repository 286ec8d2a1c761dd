//! Condition schemas and loaded model artifacts

use anyhow::Result;
use diagnosis_lib::Condition;
use tabled::Tabled;

use crate::client::{ApiClient, ConditionSpec, FieldKindView};
use crate::output::{format_timestamp, print_json, print_rows, short_digest, OutputFormat};

#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "#")]
    position: usize,
    #[tabled(rename = "Field")]
    name: String,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Accepts")]
    accepts: String,
}

#[derive(Tabled)]
struct ModelRow {
    #[tabled(rename = "Condition")]
    condition: String,
    #[tabled(rename = "Predictor")]
    predictor: String,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Path")]
    decision_path: String,
    #[tabled(rename = "Scaler")]
    scaler: String,
    #[tabled(rename = "Features")]
    n_features: usize,
    #[tabled(rename = "SHA-256")]
    digest: String,
    #[tabled(rename = "Loaded")]
    loaded_at: String,
}

fn field_rows(spec: &ConditionSpec) -> Vec<FieldRow> {
    spec.fields
        .iter()
        .enumerate()
        .map(|(i, field)| FieldRow {
            position: i + 1,
            name: field.name.clone(),
            label: field.label.clone(),
            accepts: match &field.kind {
                FieldKindView::Numeric => "number".to_string(),
                FieldKindView::Categorical(options) => options
                    .iter()
                    .map(|(label, _)| label.as_str())
                    .collect::<Vec<_>>()
                    .join(" | "),
            },
        })
        .collect()
}

/// List every condition, or the ordered fields of one
pub async fn conditions(
    client: &ApiClient,
    condition: Option<Condition>,
    format: OutputFormat,
) -> Result<()> {
    let specs = match condition {
        Some(c) => vec![client.condition(c.as_str()).await?],
        None => client.conditions().await?,
    };

    match format {
        OutputFormat::Json => print_json(&specs)?,
        OutputFormat::Table => {
            for spec in &specs {
                println!("\n{} ({} fields)", spec.condition, spec.fields.len());
                print_rows(field_rows(spec), "No fields");
            }
        }
    }

    Ok(())
}

/// Show the artifact pairs the server has loaded
pub async fn models(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let infos = client.models().await?;

    match format {
        OutputFormat::Json => print_json(&infos)?,
        OutputFormat::Table => {
            let rows = infos
                .iter()
                .map(|info| ModelRow {
                    condition: info.condition.to_string(),
                    predictor: info.predictor_kind.clone(),
                    source: match &info.unwrapped_by {
                        Some(rule) => format!("{} ({})", info.source, rule),
                        None => info.source.clone(),
                    },
                    decision_path: info.decision_path.to_string(),
                    scaler: info.scaler_kind.clone(),
                    n_features: info.n_features,
                    digest: short_digest(info.predictor_sha256.as_deref()),
                    loaded_at: format_timestamp(info.loaded_at),
                })
                .collect();
            print_rows(rows, "No model artifacts loaded");
        }
    }

    Ok(())
}
