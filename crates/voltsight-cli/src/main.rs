//! Voltsight CLI - Energy usage insights from utility bills
//!
//! Usage:
//!   voltsight connect                      Link a utility account and predict usage
//!   voltsight status CUSTOMER_ID           Show onboarding status
//!   voltsight normalize --bills FILE       Print the prediction request for a bills file
//!   voltsight predict --bills FILE         Predict usage from a bills file
//!   voltsight service-area --lat --lon --postal-code

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Connect {
            utility,
            email,
            no_insights,
        } => {
            commands::cmd_connect(&config, utility.as_deref(), email.as_deref(), no_insights)
                .await
        }
        Commands::Status { customer_id } => commands::cmd_status(&config, &customer_id).await,
        Commands::Normalize { bills } => commands::cmd_normalize(&config, &bills),
        Commands::Predict { bills } => commands::cmd_predict(&config, &bills).await,
        Commands::ServiceArea {
            lat,
            lon,
            postal_code,
        } => commands::cmd_service_area(&config, lat, lon, &postal_code).await,
    }
}
