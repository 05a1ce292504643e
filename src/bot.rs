//! Chat command loop: long-polls the bot for messages and answers the
//! status and statistics commands for the authorized chat.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::monitor::StatusQueryService;
use crate::notify::{CommandSource, IncomingMessage, Notifier};

const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Status,
}

impl Command {
    /// Parses `/start`, `/status` and `/verificar`, with or without a
    /// `@botname` suffix. Anything after the first word is ignored.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?;
        let command = word.split('@').next().unwrap_or(word);
        match command {
            "/start" => Some(Self::Start),
            "/status" | "/verificar" => Some(Self::Status),
            _ => None,
        }
    }
}

pub struct CommandDispatcher {
    source: Arc<dyn CommandSource>,
    replies: Arc<dyn Notifier>,
    chat_id: i64,
    status: StatusQueryService,
}

impl CommandDispatcher {
    pub fn new(
        source: Arc<dyn CommandSource>,
        replies: Arc<dyn Notifier>,
        chat_id: i64,
        status: StatusQueryService,
    ) -> Self {
        Self {
            source,
            replies,
            chat_id,
            status,
        }
    }

    pub async fn run(self) {
        info!("Listening for chat commands");
        let mut offset = 0;
        loop {
            offset = self.poll_once(offset).await;
        }
    }

    /// Handles one batch of messages and returns the offset for the next poll.
    pub async fn poll_once(&self, offset: i64) -> i64 {
        match self.source.poll_messages(offset).await {
            Ok(messages) => {
                let mut next = offset;
                for message in messages {
                    next = next.max(message.update_id + 1);
                    self.handle(message).await;
                }
                next
            }
            Err(e) => {
                warn!("Unable to fetch chat updates: {e}");
                tokio::time::sleep(POLL_RETRY_DELAY).await;
                offset
            }
        }
    }

    async fn handle(&self, message: IncomingMessage) {
        if message.chat_id != self.chat_id {
            debug!("Ignoring message from unauthorized chat {}", message.chat_id);
            return;
        }
        let Some(command) = Command::parse(&message.text) else {
            return;
        };

        let reply = match command {
            Command::Start => self.status.render_stats().await,
            Command::Status => self.status.list_status().await,
        };
        if let Err(e) = self.replies.send_message(message.chat_id, &reply).await {
            error!("Failed to reply to {command:?}: {e}");
        }
    }
}
