//! CLI channel - interactive terminal-based chat.
//!
//! This is the simplest channel: reads from stdin, writes to stdout.
//! Used for `parley chat` interactive mode. Lines starting with `/image`,
//! `/document`, `/audio`, `/voice` or `/video` simulate a media message, the
//! rest of the line becoming its caption.

use async_trait::async_trait;
use parley_core::channel::{Channel, ChannelId, ChannelMessage, MessageKind};
use parley_core::error::ChannelError;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

pub const CLI_CHAT_ID: &str = "cli_session";
pub const CLI_SENDER_ID: &str = "local_user";

/// Interactive CLI channel for terminal-based chat.
pub struct CliChannel {
    id: ChannelId,
    display_name: String,
}

impl CliChannel {
    pub fn new() -> Self {
        Self {
            id: ChannelId("cli".into()),
            display_name: "User".into(),
        }
    }

    /// Use a different name for the local user's turns.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether a line ends the interactive session.
pub fn is_exit_command(line: &str) -> bool {
    matches!(line, "exit" | "quit" | "/exit" | "/quit" | ":q")
}

/// Turn one line of terminal input into an inbound message.
///
/// Returns `None` for blank lines.
pub fn parse_line(
    channel_id: &ChannelId,
    display_name: &str,
    line: &str,
) -> Option<ChannelMessage> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let (kind, content) = match line.strip_prefix('/') {
        Some(rest) => {
            let (word, caption) = rest.split_once(' ').unwrap_or((rest, ""));
            match MessageKind::from_wire(word) {
                MessageKind::Text | MessageKind::Other => (MessageKind::Text, line),
                media => (media, caption.trim()),
            }
        }
        None => (MessageKind::Text, line),
    };

    Some(ChannelMessage {
        channel_id: channel_id.clone(),
        message_id: uuid::Uuid::new_v4().to_string(),
        chat_id: CLI_CHAT_ID.into(),
        chat_name: Some("Terminal".into()),
        chat_kind: Default::default(),
        sender_id: CLI_SENDER_ID.into(),
        sender_name: Some(display_name.to_string()),
        from_self: false,
        kind,
        content: content.to_string(),
    })
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    fn id(&self) -> &ChannelId {
        &self.id
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        let (tx, rx) = mpsc::channel(32);
        let channel_id = self.id.clone();
        let display_name = self.display_name.clone();

        tokio::spawn(async move {
            let stdin = io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if is_exit_command(line.trim()) {
                            break;
                        }

                        let Some(msg) = parse_line(&channel_id, &display_name, &line) else {
                            continue;
                        };

                        if tx.send(Ok(msg)).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF (Ctrl+D)
                    Err(e) => {
                        let _ = tx.send(Err(ChannelError::ConnectionLost(e.to_string()))).await;
                        break;
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn send(
        &self,
        _chat_id: &str,
        content: &str,
        _reply_to: Option<&str>,
    ) -> Result<(), ChannelError> {
        println!("\n🤖 {content}\n");
        Ok(())
    }

    fn is_allowed(&self, _sender_id: &str) -> bool {
        true // CLI is always allowed (local user)
    }
}
