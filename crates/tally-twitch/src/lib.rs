//! Twitch Helix adapter for the tally bot.
//!
//! Implements the core [`ChatTransport`] port over the Helix REST API: app
//! access token management, outbound chat messages and the chatter listing.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{error, info};

use tally_core::{
    config::Config,
    domain::Chatter,
    ports::ChatTransport,
    util::epoch_secs,
    Error, Result,
};

const TWITCH_TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";
const TWITCH_HELIX_URL: &str = "https://api.twitch.tv/helix";

#[derive(Debug, serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, serde::Deserialize)]
struct HelixResponse<T> {
    data: Vec<T>,
}

#[derive(Debug, serde::Deserialize)]
struct HelixUser {
    id: String,
    login: String,
}

#[derive(Debug, serde::Deserialize)]
struct HelixChatter {
    user_id: String,
    user_login: String,
    user_name: String,
}

/// `ChatTransport` implementation backed by the Helix REST API.
///
/// Sends chat lines as the bot user and lists chatters for the configured
/// channel. The app access token is refreshed proactively in a background
/// task.
pub struct HelixTransport {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    token: RwLock<String>,
    broadcaster_id: String,
    moderator_id: String,
}

impl HelixTransport {
    /// Build the transport: fetch the first app token, resolve the channel
    /// and bot logins to user ids, and start the token refresh loop.
    pub async fn connect(cfg: &Config) -> Result<Arc<Self>> {
        if cfg.client_id.trim().is_empty() || cfg.client_secret.trim().is_empty() {
            return Err(Error::Config(
                "TALLY_CLIENT_ID and TALLY_CLIENT_SECRET are required for the Helix transport"
                    .to_string(),
            ));
        }

        let http = reqwest::Client::new();
        let first_token = fetch_token(&http, &cfg.client_id, &cfg.client_secret).await?;

        let channel_login = cfg.channel.trim_start_matches('#').to_lowercase();
        let bot_login = cfg.nickname.to_lowercase();
        let (broadcaster_id, moderator_id) = resolve_user_ids(
            &http,
            &cfg.client_id,
            &first_token.access_token,
            &channel_login,
            &bot_login,
        )
        .await?;

        let transport = Arc::new(Self {
            http,
            client_id: cfg.client_id.clone(),
            client_secret: cfg.client_secret.clone(),
            token: RwLock::new(first_token.access_token),
            broadcaster_id,
            moderator_id,
        });

        transport.clone().spawn_refresh_loop();
        Ok(transport)
    }

    async fn refresh_token(&self) -> Result<u64> {
        let token_resp = fetch_token(&self.http, &self.client_id, &self.client_secret).await?;
        let expires_in = token_resp.expires_in;
        *self.token.write().await = token_resp.access_token;
        info!(expires_in, "Twitch access token refreshed");
        Ok(expires_in)
    }

    fn spawn_refresh_loop(self: Arc<Self>) {
        tokio::spawn(async move {
            loop {
                // Refresh 5 minutes before expiry; on failure retry in 60s.
                let sleep_secs = match self.refresh_token().await {
                    Ok(expires_in) => expires_in.saturating_sub(300).max(60),
                    Err(e) => {
                        error!(error = %e, "failed to refresh Twitch token, retrying in 60s");
                        60
                    }
                };
                tokio::time::sleep(std::time::Duration::from_secs(sleep_secs)).await;
            }
        });
    }

}

async fn fetch_token(
    http: &reqwest::Client,
    client_id: &str,
    client_secret: &str,
) -> Result<TokenResponse> {
    let resp = http
        .post(TWITCH_TOKEN_URL)
        .form(&[
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("grant_type", "client_credentials"),
        ])
        .send()
        .await
        .map_err(|e| Error::Transport(format!("token request failed: {e}")))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Transport(format!(
            "token request returned {status}: {body}"
        )));
    }

    resp.json()
        .await
        .map_err(|e| Error::Transport(format!("failed to parse token response: {e}")))
}

async fn resolve_user_ids(
    http: &reqwest::Client,
    client_id: &str,
    token: &str,
    channel_login: &str,
    bot_login: &str,
) -> Result<(String, String)> {
    let resp = http
        .get(format!("{TWITCH_HELIX_URL}/users"))
        .query(&[("login", channel_login), ("login", bot_login)])
        .header("Client-Id", client_id)
        .header("Authorization", format!("Bearer {token}"))
        .send()
        .await
        .map_err(|e| Error::Transport(format!("users request failed: {e}")))?;

    let users: HelixResponse<HelixUser> = resp
        .json()
        .await
        .map_err(|e| Error::Transport(format!("failed to parse users response: {e}")))?;

    let find = |login: &str| {
        users
            .data
            .iter()
            .find(|u| u.login == login)
            .map(|u| u.id.clone())
            .ok_or_else(|| Error::Transport(format!("no Twitch user for login {login}")))
    };

    Ok((find(channel_login)?, find(bot_login)?))
}

#[async_trait]
impl ChatTransport for HelixTransport {
    async fn send(&self, text: &str) -> Result<()> {
        let token = self.token.read().await.clone();
        let resp = self
            .http
            .post(format!("{TWITCH_HELIX_URL}/chat/messages"))
            .header("Client-Id", &self.client_id)
            .header("Authorization", format!("Bearer {token}"))
            .json(&serde_json::json!({
                "broadcaster_id": self.broadcaster_id,
                "sender_id": self.moderator_id,
                "message": text,
            }))
            .send()
            .await
            .map_err(|e| Error::Transport(format!("chat send failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Transport(format!(
                "chat send returned {status}: {body}"
            )));
        }
        Ok(())
    }

    async fn fetch_chatters(&self) -> Result<Vec<Chatter>> {
        let token = self.token.read().await.clone();
        let resp = self
            .http
            .get(format!("{TWITCH_HELIX_URL}/chat/chatters"))
            .query(&[
                ("broadcaster_id", self.broadcaster_id.as_str()),
                ("moderator_id", self.moderator_id.as_str()),
                ("first", "1000"),
            ])
            .header("Client-Id", &self.client_id)
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .map_err(|e| Error::Transport(format!("chatters request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Transport(format!(
                "chatters request returned {status}: {body}"
            )));
        }

        let chatters: HelixResponse<HelixChatter> = resp
            .json()
            .await
            .map_err(|e| Error::Transport(format!("failed to parse chatters response: {e}")))?;

        let seen = epoch_secs();
        Ok(chatters
            .data
            .into_iter()
            .map(|c| Chatter {
                id: c.user_id,
                login: c.user_login,
                name: c.user_name,
                seen,
            })
            .collect())
    }
}
