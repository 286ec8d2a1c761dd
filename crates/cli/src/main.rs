//! Multiple Disease Prediction CLI
//!
//! A command-line tool for requesting diagnoses from the prediction
//! server, browsing condition schemas, and running loaded artifacts
//! locally without a server.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{catalog, predict, status};
use diagnosis_lib::Condition;
use std::path::PathBuf;

const DEFAULT_MODEL_DIR: &str = "models";

/// Multiple Disease Prediction CLI
#[derive(Parser)]
#[command(name = "mdp")]
#[command(author, version, about = "CLI for Multiple Disease Prediction", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via MDP_API_URL env var)
    #[arg(long, env = "MDP_API_URL")]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Request a diagnosis from the server
    Predict {
        /// Condition to screen for (diabetes, heart, parkinsons)
        condition: Condition,

        #[command(flatten)]
        input: FieldArgs,
    },

    /// Run a diagnosis in-process from artifacts on disk
    Local {
        /// Condition to screen for (diabetes, heart, parkinsons)
        condition: Condition,

        /// Directory holding the scaler and predictor artifacts
        #[arg(long)]
        model_dir: Option<PathBuf>,

        #[command(flatten)]
        input: FieldArgs,
    },

    /// Show the input fields for one or all conditions
    Conditions {
        /// Limit output to one condition
        condition: Option<Condition>,
    },

    /// List the model artifacts loaded by the server
    Models,

    /// Show server health
    Health,
}

#[derive(clap::Args)]
pub struct FieldArgs {
    /// Field value as NAME=VALUE (repeatable)
    #[arg(long = "field", short = 'F', value_parser = predict::parse_field)]
    pub fields: Vec<(String, String)>,

    /// JSON object of field values; --field entries override it
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Include the diagnostic trace in the output
    #[arg(long)]
    pub trace: bool,
}

fn connect(cli_url: Option<&str>, config: &config::Config, verbose: bool) -> Result<client::ApiClient> {
    let api_url = config.resolve_api_url(cli_url);
    if verbose {
        output::print_info(&format!("Using API at {}", api_url));
    }
    client::ApiClient::new(&api_url)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::Config::load()?;
    let api_url = cli.api_url.as_deref();

    // Execute command
    match cli.command {
        Commands::Predict { condition, input } => {
            let client = connect(api_url, &config, cli.verbose)?;
            let fields = predict::collect_fields(input.input.as_deref(), input.fields)?;
            predict::remote(&client, condition, fields, input.trace, cli.format).await?;
        }
        Commands::Local {
            condition,
            model_dir,
            input,
        } => {
            let model_dir = model_dir
                .or_else(|| config.model_dir.clone().map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_DIR));
            let fields = predict::collect_fields(input.input.as_deref(), input.fields)?;
            predict::local(
                &model_dir,
                condition,
                fields,
                input.trace,
                cli.format,
                cli.verbose,
            )?;
        }
        Commands::Conditions { condition } => {
            let client = connect(api_url, &config, cli.verbose)?;
            catalog::conditions(&client, condition, cli.format).await?;
        }
        Commands::Models => {
            let client = connect(api_url, &config, cli.verbose)?;
            catalog::models(&client, cli.format).await?;
        }
        Commands::Health => {
            let client = connect(api_url, &config, cli.verbose)?;
            status::health(&client, cli.format).await?;
        }
    }

    Ok(())
}
