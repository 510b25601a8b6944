//! Channel registry: the set of transports `parley run` serves.
//!
//! Inbound streams are merged into one receiver tagged with the channel name,
//! so the run loop can hand each message to the dispatcher together with the
//! channel its reply must go back through.

use std::collections::BTreeMap;
use std::sync::Arc;

use parley_config::AppConfig;
use parley_core::channel::{Channel, ChannelMessage};
use parley_core::error::ChannelError;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::whatsapp::{WhatsAppChannel, WhatsAppConfig};

/// An inbound item tagged with the name of the channel it came from.
pub type Tagged = (String, Result<ChannelMessage, ChannelError>);

const MERGED_BUFFER: usize = 256;

#[derive(Default)]
pub struct ChannelRegistry {
    channels: BTreeMap<String, Arc<dyn Channel>>,
    /// Typed handle for the bridge endpoints
    whatsapp: Option<Arc<WhatsAppChannel>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every channel enabled under `[channels.*]`. Unknown names are skipped.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut registry = Self::new();
        for (name, section) in config.channels.iter().filter(|(_, s)| s.enabled) {
            match name.as_str() {
                "whatsapp" => {
                    let whatsapp = WhatsAppConfig::from_channel_config(section);
                    debug!(?whatsapp, "WhatsApp channel configured");
                    registry.register_whatsapp(Arc::new(WhatsAppChannel::new(whatsapp)));
                }
                other => warn!(channel = %other, "Unknown channel in config, skipping"),
            }
        }
        registry
    }

    pub fn register(&mut self, channel: Arc<dyn Channel>) {
        let name = channel.name().to_string();
        info!(channel = %name, "Registered channel");
        self.channels.insert(name, channel);
    }

    pub fn register_whatsapp(&mut self, channel: Arc<WhatsAppChannel>) {
        self.register(channel.clone());
        self.whatsapp = Some(channel);
    }

    pub fn whatsapp(&self) -> Option<&Arc<WhatsAppChannel>> {
        self.whatsapp.as_ref()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Channel>> {
        self.channels.get(name)
    }

    /// Registered channel names, sorted.
    pub fn list(&self) -> Vec<String> {
        self.channels.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Start every channel and merge their streams.
    ///
    /// The merged receiver closes once every channel's stream has ended.
    pub async fn start_all(&self) -> Result<mpsc::Receiver<Tagged>, ChannelError> {
        let (merged_tx, merged_rx) = mpsc::channel(MERGED_BUFFER);
        for (name, channel) in &self.channels {
            let inbound = channel.start().await?;
            tokio::spawn(forward(name.clone(), inbound, merged_tx.clone()));
            info!(channel = %name, "Started channel");
        }
        Ok(merged_rx)
    }

    pub async fn stop_all(&self) {
        for (name, channel) in &self.channels {
            if let Err(e) = channel.stop().await {
                warn!(channel = %name, error = %e, "Failed to stop channel");
            }
        }
    }

    /// Whether every channel reports healthy. An empty registry is not ready.
    pub async fn all_ready(&self) -> bool {
        if self.channels.is_empty() {
            return false;
        }
        for channel in self.channels.values() {
            if !channel.health_check().await.unwrap_or(false) {
                return false;
            }
        }
        true
    }
}

async fn forward(
    name: String,
    mut inbound: mpsc::Receiver<Result<ChannelMessage, ChannelError>>,
    merged: mpsc::Sender<Tagged>,
) {
    while let Some(item) = inbound.recv().await {
        if merged.send((name.clone(), item)).await.is_err() {
            debug!(channel = %name, "Merged receiver dropped");
            return;
        }
    }
    debug!(channel = %name, "Channel stream ended");
}
