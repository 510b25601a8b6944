//! `parley run` - Channels, dispatcher and status server.

use std::sync::Arc;

use parley_agent::MessageDispatcher;
use parley_channels::ChannelRegistry;
use parley_config::AppConfig;
use parley_server::ServerState;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

pub async fn run(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if let Some(port) = port {
        config.server.port = port;
    }

    let dispatcher = Arc::new(
        MessageDispatcher::from_config(&config)
            .map_err(|e| format!("Failed to set up dispatcher: {e}"))?,
    );
    let channels = Arc::new(ChannelRegistry::from_config(&config));

    println!("🤖 Parley — Starting chatbot runtime");
    println!(
        "   AI service: {}",
        match dispatcher.gateway() {
            Some(gateway) => format!("enabled ({})", gateway.provider_name()),
            None => "disabled (no API key)".into(),
        }
    );
    println!("   Channels:   {}", channels.list().join(", "));
    if config.server.enabled {
        println!("   Server:     {}:{}", config.server.host, config.server.port);
    } else {
        println!("   Server:     disabled");
    }

    if !dispatcher.ai_enabled() {
        warn!("No API key configured, AI replies are disabled");
    }
    if channels.whatsapp().is_some() && !config.server.enabled {
        warn!("WhatsApp is enabled but the server is off, so no bridge can reach it");
    }

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = if config.server.enabled {
        let state = Arc::new(ServerState {
            dispatcher: dispatcher.clone(),
            channels: channels.clone(),
        });
        let server_config = config.server.clone();
        Some(tokio::spawn(async move {
            let shutdown = async {
                let _ = shutdown_rx.await;
            };
            if let Err(e) = parley_server::serve(&server_config, state, shutdown).await {
                error!(error = %e, "Status server stopped");
            }
        }))
    } else {
        None
    };

    if channels.is_empty() {
        warn!("No channels enabled; add a [channels.whatsapp] section with enabled = true");
        tokio::signal::ctrl_c().await?;
    } else {
        let mut rx = channels
            .start_all()
            .await
            .map_err(|e| format!("Failed to start channels: {e}"))?;

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                incoming = rx.recv() => {
                    let Some((name, result)) = incoming else {
                        info!("All channels closed");
                        break;
                    };
                    match result {
                        Ok(msg) => match channels.get(&name) {
                            Some(channel) => {
                                dispatcher.spawn_dispatch(channel.clone(), msg);
                            }
                            None => warn!(channel = %name, "Message from unregistered channel"),
                        },
                        Err(e) => warn!(channel = %name, error = %e, "Channel error"),
                    }
                }
                _ = &mut ctrl_c => {
                    info!("Shutdown requested");
                    break;
                }
            }
        }
    }

    channels.stop_all().await;
    let _ = shutdown_tx.send(());
    if let Some(server) = server {
        let _ = server.await;
    }

    println!("👋 Parley stopped");
    Ok(())
}
