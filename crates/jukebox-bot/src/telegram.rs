// Telegram Bot API client and the long-poll loop feeding inbound messages to
// the app.
//
// Only the two methods the game needs are wrapped: `getUpdates` for long
// polling and `sendMessage` for announcements and replies.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use jukebox_core::protocol::{ChatId, InboundMessage, ParticipantId};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// How long to wait before polling again after a failed `getUpdates`.
pub const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Extra time on top of the long-poll timeout before the HTTP request itself
/// is abandoned.
const HTTP_TIMEOUT_MARGIN: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Telegram API error: {description}")]
    Api { description: String },
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Envelope every Bot API response comes in.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

impl<T> ApiResponse<T> {
    fn into_result(self) -> Result<T, TelegramError> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(TelegramError::Api {
                description: self
                    .description
                    .unwrap_or_else(|| "no description".to_string()),
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Serialize)]
struct SendMessageBody<'a> {
    chat_id: i64,
    text: &'a str,
}

impl Update {
    /// The game only cares about text messages with a known sender.
    pub fn into_inbound(self) -> Option<InboundMessage> {
        let message = self.message?;
        let from = message.from?;
        let text = message.text?;
        Some(InboundMessage {
            text,
            sender_id: ParticipantId(from.id),
            username: from.username.unwrap_or_default(),
            first_name: from.first_name,
            chat_id: ChatId(message.chat.id),
        })
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// The chat operations the bot depends on.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>, TelegramError>;

    async fn send_message(&self, chat: ChatId, text: &str) -> Result<(), TelegramError>;
}

/// Bot API client over HTTPS.
pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
}

impl TelegramClient {
    /// Create a client for `https://<api_url>/bot<token>/...`.
    pub fn new(api_url: &str, token: &str, poll_timeout_secs: u64) -> Result<Self, TelegramError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(poll_timeout_secs) + HTTP_TIMEOUT_MARGIN)
            .build()?;
        Ok(Self {
            http,
            base_url: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }
}

#[async_trait]
impl Transport for TelegramClient {
    async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>, TelegramError> {
        let response: ApiResponse<Vec<Update>> = self
            .http
            .get(self.method_url("getUpdates"))
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", timeout_secs.to_string()),
                ("allowed_updates", "[\"message\"]".to_string()),
            ])
            .send()
            .await?
            .json()
            .await?;
        response.into_result()
    }

    async fn send_message(&self, chat: ChatId, text: &str) -> Result<(), TelegramError> {
        let response: ApiResponse<serde_json::Value> = self
            .http
            .post(self.method_url("sendMessage"))
            .json(&SendMessageBody {
                chat_id: chat.0,
                text,
            })
            .send()
            .await?
            .json()
            .await?;
        response.into_result().map(|_| ())
    }
}

// ---------------------------------------------------------------------------
// Long polling
// ---------------------------------------------------------------------------

/// Poll for updates forever, forwarding text messages through `tx`.
///
/// Each update is acknowledged by advancing the offset past it, whether or
/// not it carried anything the game can use. Failed polls are retried after
/// [`POLL_ERROR_BACKOFF`]. Returns once the receiver is dropped.
pub async fn poll_updates<T>(transport: Arc<T>, timeout_secs: u64, tx: mpsc::Sender<InboundMessage>)
where
    T: Transport + ?Sized,
{
    info!("Polling Telegram for updates");
    let mut offset = 0;

    loop {
        if tx.is_closed() {
            break;
        }

        let updates = match transport.get_updates(offset, timeout_secs).await {
            Ok(updates) => updates,
            Err(e) => {
                warn!("Failed to fetch updates: {}", e);
                tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            let Some(msg) = update.into_inbound() else {
                debug!("Skipping update without text or sender");
                continue;
            };
            if tx.send(msg).await.is_err() {
                info!("Inbound channel closed, stopping poller");
                return;
            }
        }
    }
}
