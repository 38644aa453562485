//! Offline bill commands (normalize, predict)

use std::path::Path;

use anyhow::{Context, Result};
use voltsight_core::{BillNormalizer, Config, InsightsWorkflow};

use super::{print_insights, read_bills};

/// Print the prediction request JSON for a bills file
pub fn cmd_normalize(config: &Config, bills_path: &Path) -> Result<()> {
    let bills = read_bills(bills_path)?;
    let payload = BillNormalizer::new(config.analysis_window())
        .normalize(&bills)
        .context("Failed to normalize bills")?;

    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

/// Normalize a bills file, submit it, and display the prediction
pub async fn cmd_predict(config: &Config, bills_path: &Path) -> Result<()> {
    let bills = read_bills(bills_path)?;
    let workflow = InsightsWorkflow::from_config(config).context("Cannot run prediction")?;

    println!("🔍 Predicting usage from {} bills...", bills.len());
    let monthly = workflow
        .predict_from_bills(&bills)
        .await
        .context("Prediction failed")?;

    print_insights(&monthly);
    Ok(())
}
