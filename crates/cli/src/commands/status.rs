//! `parley status` - Show configuration status.

use parley_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    println!("🤖 Parley Status");
    println!("================");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!("  Provider:     {}", config.provider.name);
    println!("  Model:        {}", config.provider.model);
    println!("  Temperature:  {}", config.provider.temperature);
    println!("  Timeout:      {}s", config.provider.timeout_secs);
    println!("  API key:      {}", if config.has_api_key() { "configured" } else { "missing" });
    println!(
        "  History:      {} turns kept, {} per prompt",
        config.conversation.max_history, config.conversation.context_window
    );
    println!(
        "  Server:       {}",
        if config.server.enabled {
            format!("{}:{}", config.server.host, config.server.port)
        } else {
            "disabled".into()
        }
    );

    let mut enabled: Vec<&str> = config
        .channels
        .iter()
        .filter(|(_, c)| c.enabled)
        .map(|(name, _)| name.as_str())
        .collect();
    enabled.sort_unstable();
    println!(
        "  Channels:     {}",
        if enabled.is_empty() { "none".to_string() } else { enabled.join(", ") }
    );

    if AppConfig::config_path().exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file, using defaults");
    }

    Ok(())
}
