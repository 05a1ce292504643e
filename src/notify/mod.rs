pub mod telegram;

use async_trait::async_trait;

pub use telegram::TelegramBot;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Telegram rejected the request: {0}")]
    Rejected(String),
}

/// A text message received from the chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub update_id: i64,
    pub chat_id: i64,
    pub text: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends `text` (Markdown) to `chat_id`.
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), NotifyError>;
}

#[async_trait]
pub trait CommandSource: Send + Sync {
    /// Waits for messages with an update id of at least `offset`.
    async fn poll_messages(&self, offset: i64) -> Result<Vec<IncomingMessage>, NotifyError>;
}
