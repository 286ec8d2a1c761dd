//! Server health

use anyhow::Result;
use diagnosis_lib::ComponentStatus;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{
    color_status, format_timestamp, print_json, print_rows, print_success, print_warning, OutputFormat,
};

#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Message")]
    message: String,
    #[tabled(rename = "Checked")]
    checked: String,
}

fn status_label(status: ComponentStatus) -> &'static str {
    match status {
        ComponentStatus::Healthy => "healthy",
        ComponentStatus::Degraded => "degraded",
        ComponentStatus::Unhealthy => "unhealthy",
    }
}

pub async fn health(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health = client.health().await?;

    if let OutputFormat::Json = format {
        return print_json(&health);
    }

    match health.status {
        ComponentStatus::Healthy => print_success("Service is healthy"),
        other => print_warning(&format!("Service is {}", status_label(other))),
    }

    let mut components: Vec<_> = health.components.into_iter().collect();
    components.sort_by(|a, b| a.0.cmp(&b.0));
    let rows = components
        .into_iter()
        .map(|(name, component)| ComponentRow {
            name,
            status: color_status(status_label(component.status)),
            message: component.message.unwrap_or_else(|| "-".to_string()),
            checked: format_timestamp(component.last_check_timestamp),
        })
        .collect();
    print_rows(rows, "No components registered");

    Ok(())
}
