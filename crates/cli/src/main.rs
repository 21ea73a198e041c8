//! Kinetics Predictor CLI
//!
//! A command-line tool for requesting kinetic parameter predictions and
//! inspecting or reloading the prediction service.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{predict, service};

/// Kinetics Predictor CLI
#[derive(Parser)]
#[command(name = "kpred")]
#[command(author, version, about = "CLI for the Kinetics Predictor service", long_about = None)]
pub struct Cli {
    /// API endpoint URL (defaults to http://localhost:8000)
    #[arg(long, env = "KPRED_API_URL")]
    pub api_url: Option<String>,

    /// API key sent as X-API-Key
    #[arg(long, env = "KPRED_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Output format
    #[arg(long, short)]
    pub format: Option<output::OutputFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Predict Arrhenius parameters for one reaction
    Predict {
        /// Named feature, repeatable (e.g. --feature T=300)
        #[arg(long = "feature", short = 'F', value_name = "NAME=VALUE")]
        features: Vec<String>,

        /// Ordered feature vector, comma-separated
        #[arg(long, value_name = "V1,V2,...", allow_hyphen_values = true, conflicts_with = "features")]
        values: Option<String>,
    },

    /// Show expected feature count and model metadata
    Meta,

    /// Show service health
    Health,

    /// Reload model artifacts on the service
    Reload,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::Config::load()?;

    let format = config.format(cli.format)?;
    let client = client::ApiClient::new(&config.api_url(cli.api_url), config.api_key(cli.api_key))?;

    match cli.command {
        Commands::Predict { features, values } => {
            predict::predict(&client, &features, values.as_deref(), format).await?;
        }
        Commands::Meta => service::show_meta(&client, format).await?,
        Commands::Health => service::show_health(&client, format).await?,
        Commands::Reload => service::reload(&client, format).await?,
    }

    Ok(())
}
