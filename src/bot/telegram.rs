// =============================================================================
// Telegram Bot API Client — outbound messages and long-poll updates
// =============================================================================
//
// Plain HTTPS against api.telegram.org: sendMessage for alert dispatch and
// menu replies, getUpdates with a long-poll timeout for the command listener.
// Missing credentials are a fatal startup error; the monitor refuses to run
// without a notification channel.
// =============================================================================

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, instrument};

/// Outbound notification sink used by the cycle orchestrator.
///
/// Production sends through Telegram; tests record messages in memory.
/// Dispatch failures are logged by the caller and never retried.
pub trait Notifier: Send + Sync {
    async fn send_message(&self, text: &str) -> Result<()>;
}

/// One incoming message relevant to the command menu.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub update_id: i64,
    pub chat_id: i64,
    pub text: String,
}

#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    ok: bool,
    #[serde(default)]
    result: Vec<RawUpdate>,
}

#[derive(Debug, Deserialize)]
struct RawUpdate {
    update_id: i64,
    message: Option<RawMessage>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    text: Option<String>,
    chat: RawChat,
}

#[derive(Debug, Deserialize)]
struct RawChat {
    id: i64,
}

/// Telegram Bot API client bound to one bot token and one chat.
#[derive(Clone)]
pub struct TelegramClient {
    base_url: String,
    token: String,
    chat_id: String,
    client: reqwest::Client,
}

impl TelegramClient {
    /// Build from `TELEGRAM_BOT_TOKEN` / `TELEGRAM_CHAT_ID`.
    ///
    /// Either variable missing or empty is a configuration error and the
    /// caller is expected to treat it as fatal at startup.
    pub fn from_env() -> Result<Self> {
        let token = std::env::var("TELEGRAM_BOT_TOKEN")
            .ok()
            .filter(|t| !t.is_empty())
            .context("TELEGRAM_BOT_TOKEN is not set")?;
        let chat_id = std::env::var("TELEGRAM_CHAT_ID")
            .ok()
            .filter(|c| !c.is_empty())
            .context("TELEGRAM_CHAT_ID is not set")?;

        Ok(Self::new("https://api.telegram.org", token, chat_id))
    }

    /// Build against a custom base URL (tests run against a local stub).
    pub fn new(base_url: impl Into<String>, token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            chat_id: chat_id.into(),
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(40))
                .build()
                .expect("failed to build reqwest client"),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.base_url, self.token)
    }

    /// Send `text` to an explicit chat (used for menu replies, which answer
    /// whichever chat the command came from).
    #[instrument(skip(self, text), name = "telegram::send_to_chat")]
    pub async fn send_to_chat(&self, chat_id: i64, text: &str) -> Result<()> {
        let resp = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&serde_json::json!({ "chat_id": chat_id, "text": text }))
            .send()
            .await
            .context("sendMessage request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("telegram sendMessage returned {status}: {body}");
        }

        debug!(chat_id, chars = text.len(), "telegram message sent");
        Ok(())
    }

    /// Push the persistent reply keyboard with the command menu.
    #[instrument(skip(self), name = "telegram::send_menu")]
    pub async fn send_menu(&self) -> Result<()> {
        let keyboard = serde_json::json!({
            "keyboard": [
                ["📈 Top funding rates", "📉 Bottom funding rates"],
                ["📣 Recent alerts", "📊 Market sentiment"],
                ["⚡ Fastest movers", "🔥 Hot contracts"],
                ["🕓 Last check time", "🔄 Refresh now"]
            ],
            "resize_keyboard": true
        });

        let resp = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&serde_json::json!({
                "chat_id": self.chat_id,
                "text": "🤖 Pick a command 👇",
                "reply_markup": keyboard
            }))
            .send()
            .await
            .context("sendMessage (menu) request failed")?;

        if !resp.status().is_success() {
            anyhow::bail!("telegram menu message returned {}", resp.status());
        }
        Ok(())
    }

    /// Long-poll for updates after `offset`. Returns the parsed text
    /// messages; non-text updates are skipped.
    #[instrument(skip(self), name = "telegram::get_updates")]
    pub async fn get_updates(&self, offset: i64, timeout_secs: u32) -> Result<Vec<IncomingMessage>> {
        let url = format!(
            "{}?offset={offset}&timeout={timeout_secs}",
            self.method_url("getUpdates")
        );

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .context("getUpdates request failed")?;

        let status = resp.status();
        let body: UpdatesResponse = resp
            .json()
            .await
            .context("failed to parse getUpdates response")?;

        if !status.is_success() || !body.ok {
            anyhow::bail!("telegram getUpdates returned {status}");
        }

        let messages = body
            .result
            .into_iter()
            .filter_map(|u| {
                let msg = u.message?;
                Some(IncomingMessage {
                    update_id: u.update_id,
                    chat_id: msg.chat.id,
                    text: msg.text?,
                })
            })
            .collect();

        Ok(messages)
    }
}

impl Notifier for TelegramClient {
    /// Send to the configured alert chat.
    async fn send_message(&self, text: &str) -> Result<()> {
        let chat_id: i64 = self
            .chat_id
            .parse()
            .with_context(|| format!("TELEGRAM_CHAT_ID '{}' is not numeric", self.chat_id))?;
        self.send_to_chat(chat_id, text).await
    }
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .field("base_url", &self.base_url)
            .finish()
    }
}
