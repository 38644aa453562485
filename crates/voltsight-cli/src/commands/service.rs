//! Remote lookup commands (status, service-area)

use anyhow::{Context, Result};
use voltsight_core::{Config, PredictionClient, PredictionService, ProviderClient, UtilityProvider};

pub async fn cmd_status(config: &Config, customer_id: &str) -> Result<()> {
    let provider = ProviderClient::from_config(config)?;
    let status = provider
        .fetch_status(customer_id)
        .await
        .with_context(|| format!("Failed to fetch status for customer {}", customer_id))?;

    let mark = |flag: bool| if flag { "✅" } else { "⏳" };

    println!();
    println!("📊 Customer {}", customer_id);
    println!("   ─────────────────────────────────────────────");
    println!(
        "   {} Credentials filled: {}",
        mark(status.has_filled_credentials),
        status.has_filled_credentials
    );
    println!(
        "   {} Bills ready:        {}",
        mark(status.bills_are_ready),
        status.bills_are_ready
    );
    if let Some(link) = &status.onboarding_link {
        println!("   Onboarding link: {}", link);
    }
    println!();
    Ok(())
}

pub async fn cmd_service_area(
    config: &Config,
    lat: f64,
    lon: f64,
    postal_code: &str,
) -> Result<()> {
    let client = PredictionClient::from_config(config)?;
    let area = client
        .check_service_area(lat, lon, postal_code)
        .await
        .context("Service area lookup failed")?;

    println!("{}", serde_json::to_string_pretty(&area)?);
    Ok(())
}
