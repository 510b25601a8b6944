//! `parley doctor` - Diagnose configuration and backend health.

use parley_agent::AiGateway;
use parley_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Parley Doctor — System Diagnostics");
    println!("====================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_path();
    if config_path.exists() {
        println!("  ✅ Config file found: {}", config_path.display());
    } else {
        println!("  ⚠️  No config file at {}, using defaults", config_path.display());
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            config
        }
        Err(e) => {
            println!("  ❌ Configuration invalid: {e}");
            println!("\n  ⚠️  1 issue(s) found. Fix the config and run again.");
            return Ok(());
        }
    };

    match parley_providers::build_from_config(&config) {
        Ok(Some(provider)) => {
            let gateway = AiGateway::from_config(provider, &config);
            println!(
                "  ✅ Backend configured: {} ({})",
                gateway.provider_name(),
                config.provider.model
            );
            if gateway.health_check().await {
                println!("  ✅ Backend reachable");
            } else {
                println!("  ❌ Backend health check failed");
                issues += 1;
            }
        }
        Ok(None) => {
            println!("  ⚠️  No API key, AI replies disabled. Set PARLEY_API_KEY or GEMINI_API_KEY");
            issues += 1;
        }
        Err(e) => {
            println!("  ❌ Backend setup failed: {e}");
            issues += 1;
        }
    }

    if config.channels.values().any(|c| c.enabled) {
        println!("  ✅ At least one channel enabled");
    } else {
        println!("  ⚠️  No channels enabled, `parley run` will only serve status");
        issues += 1;
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
