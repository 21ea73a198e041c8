//! Service status and maintenance CLI commands

use anyhow::Result;
use colored::Colorize;
use serde_json::Value;
use tabled::{settings::Style, Table, Tabled};

use crate::client::ApiClient;
use crate::output::{color_status, print_info, print_json, print_success, print_warning, OutputFormat};

/// Row for the models table
#[derive(Tabled)]
struct ModelRow {
    #[tabled(rename = "Model")]
    name: String,
    #[tabled(rename = "Details")]
    details: String,
}

fn model_rows(models: &Value) -> Vec<ModelRow> {
    match models {
        Value::Object(map) => map
            .iter()
            .map(|(name, details)| ModelRow {
                name: name.clone(),
                details: match details {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                },
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Show the feature count and model metadata of the loaded artifacts
pub async fn show_meta(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let result = client.meta().await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            println!("{}", "Model Metadata".bold());
            println!("{}", "=".repeat(50));
            println!("Expected features: {}", result.expected_features.to_string().cyan());
            println!();

            let rows = model_rows(&result.models);
            if rows.is_empty() {
                print_warning("No model metadata available");
            } else {
                let table = Table::new(rows).with(Style::rounded()).to_string();
                println!("{}", table);
            }
        }
    }

    Ok(())
}

/// Show service liveness and whether any model is loaded
pub async fn show_health(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let result = client.health().await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            println!("Status:        {}", color_status(&result.status));
            if result.models_loaded {
                println!("Models loaded: {}", "yes".green());
            } else {
                println!("Models loaded: {}", "no".red());
                print_info("Predictions will fail until artifacts are loaded and reloaded");
            }
        }
    }

    Ok(())
}

/// Ask the service to reload its artifacts
pub async fn reload(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let result = client.reload().await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => print_success(&format!("Artifacts {}", color_status(&result.status))),
    }

    Ok(())
}
