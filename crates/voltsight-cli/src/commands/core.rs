//! Shared command utilities
//!
//! This module contains:
//! - `load_config` - Resolve configuration for every command
//! - `read_bills` - Load provider bill records from a JSON file
//! - `render_insights` / `print_insights` - Monthly prediction display

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use voltsight_core::{BillRecord, Config, MonthlyPrediction};

/// General recommendations shown with every prediction
pub const RECOMMENDATIONS: [&str; 4] = [
    "Consider solar installation based on your usage pattern",
    "Implement energy-efficient lighting",
    "Optimize HVAC scheduling",
    "Monitor peak usage times",
];

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = Config::load(path).context("Failed to load configuration")?;
    tracing::debug!(?config, "Configuration resolved");
    Ok(config)
}

/// Read an array of provider bill records
pub fn read_bills(path: &Path) -> Result<Vec<BillRecord>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read bills file: {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Invalid bills JSON in {}", path.display()))
}

/// Annual total, per-month table, and recommendations
pub fn render_insights(monthly: &MonthlyPrediction) -> String {
    let mut out = String::new();

    if monthly.is_empty() {
        let _ = writeln!(out, "⚠️  The prediction service returned no monthly data.");
        return out;
    }

    let _ = writeln!(out, "⚡ Energy Usage Insights");
    let _ = writeln!(
        out,
        "   ─────────────────────────────────────────────"
    );
    let _ = writeln!(
        out,
        "   Predicted annual usage: {:.2} kWh",
        monthly.annual_total()
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "   {:<12} {:>22}", "Month", "Predicted Usage (kWh)");
    for (month, value) in monthly.iter() {
        let _ = writeln!(out, "   {:<12} {:>22.2}", month, value);
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "💡 Recommendations");
    for recommendation in RECOMMENDATIONS {
        let _ = writeln!(out, "   • {}", recommendation);
    }

    out
}

pub fn print_insights(monthly: &MonthlyPrediction) {
    println!();
    print!("{}", render_insights(monthly));
    println!();
}
