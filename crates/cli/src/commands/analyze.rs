//! `parley analyze` - One-off sentiment and intent reading.

use parley_agent::AiGateway;
use parley_config::AppConfig;

pub async fn run(text: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let provider = parley_providers::build_from_config(&config)?
        .ok_or("No API key configured. Set PARLEY_API_KEY or GEMINI_API_KEY.")?;
    let gateway = AiGateway::from_config(provider, &config);

    let analysis = gateway.classify(text).await;
    println!("{}", serde_json::to_string_pretty(&analysis)?);
    Ok(())
}
