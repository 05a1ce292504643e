//! Minimal Telegram Bot API client.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use super::{CommandSource, IncomingMessage, NotifyError, Notifier};
use crate::monitor::OPERATION_TIMEOUT;

const API_BASE: &str = "https://api.telegram.org";
/// Server side wait of a `getUpdates` long poll.
pub const LONG_POLL_SECS: u64 = 30;

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'a str,
}

#[derive(Serialize)]
struct GetUpdatesRequest<'a> {
    offset: i64,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
}

#[derive(Deserialize)]
struct Message {
    chat: Chat,
    text: Option<String>,
}

#[derive(Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Clone)]
pub struct TelegramBot {
    client: reqwest::Client,
    base_url: String,
}

impl TelegramBot {
    pub fn new(token: &str) -> Self {
        Self::with_api_base(API_BASE, token)
    }

    pub fn with_api_base(api_base: &str, token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: format!("{}/bot{}", api_base.trim_end_matches('/'), token),
        }
    }

    async fn call<B, T>(&self, method: &str, body: &B, timeout: Duration) -> Result<T, NotifyError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        // Errors carry the request url, which embeds the token.
        let response: ApiResponse<T> = self
            .client
            .post(format!("{}/{}", self.base_url, method))
            .json(body)
            .timeout(timeout)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?
            .json()
            .await
            .map_err(reqwest::Error::without_url)?;

        match response {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse { description, .. } => Err(NotifyError::Rejected(
                description.unwrap_or_else(|| format!("{method} failed")),
            )),
        }
    }
}

fn into_messages(updates: Vec<Update>) -> Vec<IncomingMessage> {
    updates
        .into_iter()
        .filter_map(|update| {
            let message = update.message?;
            Some(IncomingMessage {
                update_id: update.update_id,
                chat_id: message.chat.id,
                text: message.text?,
            })
        })
        .collect()
}

#[async_trait]
impl Notifier for TelegramBot {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), NotifyError> {
        let request = SendMessageRequest {
            chat_id,
            text,
            parse_mode: "Markdown",
        };
        let _sent: serde_json::Value = self
            .call("sendMessage", &request, OPERATION_TIMEOUT)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl CommandSource for TelegramBot {
    async fn poll_messages(&self, offset: i64) -> Result<Vec<IncomingMessage>, NotifyError> {
        let request = GetUpdatesRequest {
            offset,
            timeout: LONG_POLL_SECS,
            allowed_updates: &["message"],
        };
        let updates: Vec<Update> = self
            .call(
                "getUpdates",
                &request,
                Duration::from_secs(LONG_POLL_SECS) + OPERATION_TIMEOUT,
            )
            .await?;
        Ok(into_messages(updates))
    }
}
