//! Local `!` commands, answered without involving the AI backend.

use std::sync::Arc;

use parley_core::channel::{Channel, ChannelMessage};
use parley_core::context::ContextStore;
use parley_core::error::MemoryError;
use tracing::info;

use crate::stats::RuntimeStats;

pub const PONG_REPLY: &str = "🏓 Pong! Bot is working!";
pub const CLEARED_REPLY: &str = "🗑️ Conversation context cleared!";

pub const HELP_TEXT: &str = "🤖 *WhatsApp AI Chatbot Commands:*\n\n\
• !ping - Test if bot is working\n\
• !help - Show this help message\n\
• !info - Get chat information\n\
• !time - Get current time\n\
• !clear - Clear conversation context\n\
• !status - Check AI service status\n\n\
💬 *Just send any message and I'll respond with AI!*";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Ping,
    Help,
    Info,
    Time,
    Clear,
    Status,
}

impl Command {
    /// Exact match after trimming and lowercasing. `"!ping please"` is not a command.
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_lowercase().as_str() {
            "!ping" => Some(Self::Ping),
            "!help" => Some(Self::Help),
            "!info" => Some(Self::Info),
            "!time" => Some(Self::Time),
            "!clear" => Some(Self::Clear),
            "!status" => Some(Self::Status),
            _ => None,
        }
    }
}

fn active_label(on: bool) -> &'static str {
    if on { "✅ Active" } else { "❌ Disabled" }
}

pub struct CommandRouter {
    store: Arc<dyn ContextStore>,
    stats: Arc<RuntimeStats>,
    ai_enabled: bool,
}

impl CommandRouter {
    pub fn new(store: Arc<dyn ContextStore>, stats: Arc<RuntimeStats>, ai_enabled: bool) -> Self {
        Self {
            store,
            stats,
            ai_enabled,
        }
    }

    /// Run `msg` as a command if it is one. `Ok(None)` means "not a command".
    pub async fn route(
        &self,
        msg: &ChannelMessage,
        channel: &dyn Channel,
    ) -> Result<Option<String>, MemoryError> {
        let Some(command) = Command::parse(&msg.content) else {
            return Ok(None);
        };
        info!(chat_id = %msg.chat_id, ?command, "Running command");
        self.execute(command, msg, channel).await.map(Some)
    }

    pub async fn execute(
        &self,
        command: Command,
        msg: &ChannelMessage,
        channel: &dyn Channel,
    ) -> Result<String, MemoryError> {
        let reply = match command {
            Command::Ping => PONG_REPLY.to_string(),
            Command::Help => HELP_TEXT.to_string(),
            Command::Info => self.info(msg),
            Command::Time => format!(
                "🕐 Current time: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
            ),
            Command::Clear => {
                self.store.clear(&msg.conversation_id()).await?;
                CLEARED_REPLY.to_string()
            }
            Command::Status => self.status(channel).await?,
        };
        Ok(reply)
    }

    fn info(&self, msg: &ChannelMessage) -> String {
        format!(
            "📊 *Chat Information:*\n\n\
             • Chat Name: {}\n\
             • Contact Name: {}\n\
             • Phone Number: {}\n\
             • Is Group: {}\n\
             • Message Type: {}\n\
             • AI Service: {}",
            msg.chat_name.as_deref().unwrap_or("N/A"),
            msg.sender_name.as_deref().unwrap_or("Unknown"),
            msg.sender_id,
            if msg.chat_kind.is_group() { "Yes" } else { "No" },
            msg.kind,
            active_label(self.ai_enabled),
        )
    }

    async fn status(&self, channel: &dyn Channel) -> Result<String, MemoryError> {
        let connected = channel.health_check().await.unwrap_or(false);
        let memory = match self.stats.resident_memory_mb() {
            Some(mb) => format!("{mb} MB"),
            None => "n/a".to_string(),
        };
        Ok(format!(
            "🔧 *Bot Status:*\n\n\
             • Chat Client ({}): {}\n\
             • AI Service: {}\n\
             • Server Uptime: {} seconds\n\
             • Memory Usage: {}\n\
             • Active Conversations: {}\n\
             • Messages Handled: {}",
            channel.name(),
            if connected { "✅ Connected" } else { "❌ Disconnected" },
            active_label(self.ai_enabled),
            self.stats.uptime_secs(),
            memory,
            self.store.count().await?,
            self.stats.messages_handled(),
        ))
    }
}
