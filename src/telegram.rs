//! Telegram Bot API client.
//!
//! Only the handful of methods the bot needs: long-poll `getUpdates`,
//! `sendMessage` with an optional inline keyboard, `editMessageText` and
//! `answerCallbackQuery`. All text is sent with the legacy `Markdown` parse mode.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{Error, Result};

/// Telegram rejects messages longer than this many characters.
pub const MAX_MESSAGE_CHARS: usize = 4096;

const PARSE_MODE: &str = "Markdown";

// ---------------------------------------------------------------------------
// Update types (only the fields we read)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

// ---------------------------------------------------------------------------
// Outgoing messages
// ---------------------------------------------------------------------------

/// One inline keyboard button carrying callback data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Button {
    pub text: String,
    pub callback_data: String,
}

/// A reply produced by a handler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outgoing {
    pub text: String,
    /// Rows of buttons; empty means no keyboard.
    pub keyboard: Vec<Vec<Button>>,
}

impl Outgoing {
    pub fn text(text: impl Into<String>) -> Self {
        Outgoing { text: text.into(), keyboard: Vec::new() }
    }

    pub fn with_keyboard(text: impl Into<String>, keyboard: Vec<Vec<Button>>) -> Self {
        Outgoing { text: text.into(), keyboard }
    }
}

/// Split text into chunks of at most `limit` characters, preferring line breaks.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split('\n') {
        let line_len = line.chars().count();
        let needed = if current.is_empty() { line_len } else { line_len + 1 };
        if current_len + needed <= limit {
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
            current_len += needed;
            continue;
        }
        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        // A single line over the limit gets hard-split.
        let chars: Vec<char> = line.chars().collect();
        let mut pieces = chars.chunks(limit.max(1)).map(|c| c.iter().collect::<String>()).peekable();
        current_len = 0;
        while let Some(piece) = pieces.next() {
            if pieces.peek().is_some() {
                chunks.push(piece);
            } else {
                current_len = piece.chars().count();
                current = piece;
            }
        }
    }
    if !current.is_empty() || chunks.is_empty() {
        chunks.push(current);
    }
    chunks
}

// ---------------------------------------------------------------------------
// Messenger seam
// ---------------------------------------------------------------------------

/// Outbound side of the chat transport.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send a new message to a chat.
    async fn send(&self, chat_id: i64, message: &Outgoing) -> Result<()>;

    /// Replace the text of an earlier message (dropping its keyboard).
    async fn edit(&self, chat_id: i64, message_id: i64, text: &str) -> Result<()>;

    /// Acknowledge a button press so the client stops its spinner.
    async fn answer_callback(&self, callback_id: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// HTTP client
// ---------------------------------------------------------------------------

/// Bot API client bound to one bot token.
pub struct TelegramClient {
    token: String,
    base_url: String,
    client: reqwest::Client,
}

impl TelegramClient {
    pub fn new(token: &str, base_url: &str) -> Self {
        Self {
            token: token.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &'static str,
        body: &serde_json::Value,
        timeout: Option<Duration>,
    ) -> Result<T> {
        let mut request = self.client.post(self.method_url(method)).json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let response: ApiResponse<T> = request.send().await?.json().await?;
        match (response.ok, response.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(Error::Telegram {
                method,
                description: response.description.unwrap_or_else(|| "no result".to_string()),
            }),
        }
    }

    /// Long-poll for updates newer than `offset`.
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>> {
        let body = json!({
            "offset": offset,
            "timeout": timeout_secs,
            "allowed_updates": ["message", "callback_query"],
        });
        // Leave the server room to answer before our own timeout fires.
        let http_timeout = Duration::from_secs(timeout_secs + 10);
        self.call("getUpdates", &body, Some(http_timeout)).await
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send(&self, chat_id: i64, message: &Outgoing) -> Result<()> {
        let chunks = split_message(&message.text, MAX_MESSAGE_CHARS);
        let last = chunks.len() - 1;
        for (i, chunk) in chunks.into_iter().enumerate() {
            let mut body = json!({
                "chat_id": chat_id,
                "text": chunk,
                "parse_mode": PARSE_MODE,
            });
            if i == last && !message.keyboard.is_empty() {
                body["reply_markup"] = json!({ "inline_keyboard": message.keyboard });
            }
            let _: serde_json::Value = self.call("sendMessage", &body, None).await?;
        }
        Ok(())
    }

    async fn edit(&self, chat_id: i64, message_id: i64, text: &str) -> Result<()> {
        let body = json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": text,
            "parse_mode": PARSE_MODE,
        });
        let _: serde_json::Value = self.call("editMessageText", &body, None).await?;
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<()> {
        let body = json!({ "callback_query_id": callback_id });
        let _: serde_json::Value = self.call("answerCallbackQuery", &body, None).await?;
        Ok(())
    }
}
