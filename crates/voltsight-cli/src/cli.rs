//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Voltsight - Energy usage insights from your utility bills
#[derive(Parser)]
#[command(name = "voltsight")]
#[command(about = "Predict monthly electricity usage from utility bills", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to $VOLTSIGHT_CONFIG, then the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Connect a utility account and generate insights
    ///
    /// Creates a provider customer, prints the onboarding link, waits for
    /// credentials and bills, then predicts monthly usage. Ctrl-C stops
    /// waiting for bills.
    Connect {
        /// Utility identifier (defaults to config)
        #[arg(short, long)]
        utility: Option<String>,

        /// Contact email for the provider customer (defaults to config)
        #[arg(short, long)]
        email: Option<String>,

        /// Stop after bills are downloaded
        #[arg(long)]
        no_insights: bool,
    },

    /// Show a provider customer's onboarding status
    Status {
        /// Provider customer ID
        customer_id: String,
    },

    /// Print the prediction request built from a bills file
    Normalize {
        /// JSON file with an array of provider bill records
        #[arg(short, long)]
        bills: PathBuf,
    },

    /// Predict monthly usage from a bills file
    Predict {
        /// JSON file with an array of provider bill records
        #[arg(short, long)]
        bills: PathBuf,
    },

    /// Check whether the prediction service covers a location
    ServiceArea {
        /// Latitude
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Longitude
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Postal code
        #[arg(long)]
        postal_code: String,
    },
}
