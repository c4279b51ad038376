//! # Discord Integration
//!
//! REST client and gateway connection for the link fixer bot.
//!
//! ## REST
//!
//! [`DiscordClient`] posts replies through `POST /channels/{id}/messages` and
//! looks up the gateway URL through `GET /gateway/bot`. Every request is
//! authorised with `Authorization: Bot <token>`.
//!
//! ## Gateway
//!
//! [`gateway::Gateway`] keeps a websocket session open and forwards
//! `MESSAGE_CREATE` dispatches to the bot as [`gateway::GatewayEvent`]s.
//!
//! ## Rate Limits
//!
//! Discord allows roughly 5 messages per 5 seconds per channel. The bot sends
//! at most one reply per incoming message and does not queue or retry; a
//! rejected reply is logged by the caller.

pub mod gateway;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::models::CreateMessage;
use crate::traits::MessageSink;

/// Discord API base URL (v10)
pub const API_BASE: &str = "https://discord.com/api/v10";

/// Used when `/gateway/bot` does not return a URL
pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg";

/// REST client for the Discord bot API.
///
/// ## Thread Safety
///
/// `Clone` is cheap: the underlying `reqwest::Client` is reference counted and
/// shares its connection pool across clones.
#[derive(Clone)]
pub struct DiscordClient {
    /// Reusable HTTP client for Discord API calls.
    client: Client,

    /// Raw bot token, without the `Bot ` prefix.
    bot_token: String,
}

impl DiscordClient {
    pub fn new(bot_token: &str) -> Self {
        Self {
            client: Client::new(),
            bot_token: bot_token.to_string(),
        }
    }

    pub fn bot_token(&self) -> &str {
        &self.bot_token
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.bot_token)
    }

    /// Resolves the websocket URL to connect to.
    ///
    /// Falls back to [`DEFAULT_GATEWAY_URL`] when the response has no `url`.
    pub async fn gateway_url(&self) -> Result<String> {
        let response: serde_json::Value = self
            .client
            .get(format!("{API_BASE}/gateway/bot"))
            .header("Authorization", self.auth_header())
            .send()
            .await
            .context("fetch Discord gateway URL")?
            .error_for_status()
            .context("Discord rejected gateway URL request")?
            .json()
            .await
            .context("parse Discord gateway response")?;

        Ok(response
            .get("url")
            .and_then(serde_json::Value::as_str)
            .unwrap_or(DEFAULT_GATEWAY_URL)
            .to_string())
    }
}

#[async_trait]
impl MessageSink for DiscordClient {
    async fn send_message(&self, channel_id: &str, content: &str) -> Result<()> {
        let response = self
            .client
            .post(format!("{API_BASE}/channels/{channel_id}/messages"))
            .header("Authorization", self.auth_header())
            .json(&CreateMessage { content })
            .send()
            .await
            .context("send Discord message request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read response body: {e}>"));
            bail!("Discord send message failed ({status}): {body}");
        }

        debug!("Message delivered to channel {}", channel_id);
        Ok(())
    }
}
