//! Print the historical valuation series for one entity as JSON.
//!
//! Usage: historical_valuation <symbol> [start_date] [end_date]

use fetch_orchestrator::FetchOrchestrator;
use provider_core::ProviderConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let symbol = args.next().unwrap_or_else(|| "600519".to_string());
    let start_date = args.next().unwrap_or_else(|| "20230101".to_string());
    let end_date = args.next().unwrap_or_else(|| "20231231".to_string());

    let orchestrator = FetchOrchestrator::new(ProviderConfig::default());
    let series = orchestrator
        .historical_valuation(&symbol, &start_date, &end_date)
        .await?;

    println!("{}", serde_json::to_string_pretty(&series)?);
    Ok(())
}
