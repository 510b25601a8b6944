//! `parley chat` - Interactive terminal conversation.
//!
//! Messages go through the same dispatcher as `parley run`, so commands,
//! conversation memory and failure fallbacks behave exactly as they do on
//! WhatsApp.

use std::io::Write;

use parley_agent::MessageDispatcher;
use parley_channels::CliChannel;
use parley_config::AppConfig;
use parley_core::channel::Channel;

pub async fn run(name: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let dispatcher = MessageDispatcher::from_config(&config)
        .map_err(|e| format!("Failed to set up dispatcher: {e}"))?;

    let display_name = name.unwrap_or_else(|| config.conversation.default_display_name.clone());

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║          Parley — Terminal Chat              ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Provider:  {}", config.provider.name);
    println!("  Model:     {}", config.provider.model);
    println!(
        "  AI:        {}",
        if dispatcher.ai_enabled() { "enabled" } else { "disabled (no API key)" }
    );
    println!("  You are:   {display_name}");
    println!();
    println!("  Type a message and press Enter. `!help` lists commands.");
    println!("  Start a line with /image, /document, /audio or /video to send media.");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    let channel = CliChannel::new().with_display_name(display_name);
    let mut rx = channel.start().await.map_err(|e| format!("Channel error: {e}"))?;

    print!("  You > ");
    std::io::stdout().flush()?;

    while let Some(result) = rx.recv().await {
        match result {
            Ok(msg) => {
                // Awaited inline so replies print in order.
                dispatcher.dispatch(&channel, &msg).await;
                print!("  You > ");
                std::io::stdout().flush()?;
            }
            Err(e) => {
                eprintln!("  [Channel Error] {e}");
                break;
            }
        }
    }

    println!();
    println!("  Goodbye! 👋");
    println!();
    Ok(())
}
