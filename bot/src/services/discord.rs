use crate::config::Config;
use crate::error::{AnnouncerError, Result};
use crate::models::{CreateMessage, DiscordChannel, DiscordUser, Video};
use crate::utils::announcement_message;
use async_trait::async_trait;
use log::{error, info};
use reqwest::{Client, RequestBuilder};

/// `SUPPRESS_NOTIFICATIONS` message flag.
pub const SUPPRESS_NOTIFICATIONS: u64 = 1 << 12;

/// Delivers one announcement per new upload.
#[async_trait]
pub trait Announcer: Send + Sync {
    /// Returns `false` when delivery failed; never errors.
    async fn announce(&self, video: &Video) -> bool;
}

/// Authenticated REST session for the bot account.
#[derive(Clone)]
pub struct DiscordClient {
    client: Client,
    api_url: String,
    token: String,
    user: DiscordUser,
}

/// A destination channel resolved once at startup.
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    pub id: String,
    pub name: Option<String>,
}

impl DiscordClient {
    /// Verifies the bot token by fetching the bot's own user.
    pub async fn login(api_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let client = Client::new();
        let api_url = api_url.into().trim_end_matches('/').to_string();
        let token = token.into();

        let response = client
            .get(format!("{api_url}/users/@me"))
            .header("Authorization", format!("Bot {token}"))
            .send()
            .await
            .map_err(|e| AnnouncerError::Config(format!("Discord login failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnnouncerError::Config(format!(
                "Discord login failed with status {status}: {body}"
            )));
        }

        let user: DiscordUser = response
            .json()
            .await
            .map_err(|e| AnnouncerError::Config(format!("Invalid Discord user payload: {e}")))?;
        info!("Bot is ready! Logged in as {}", user.tag());

        Ok(DiscordClient {
            client,
            api_url,
            token,
            user,
        })
    }

    pub async fn from_config(config: &Config) -> Result<Self> {
        Self::login(&config.discord_api_url, &config.discord_bot_token).await
    }

    pub fn user(&self) -> &DiscordUser {
        &self.user
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header("Authorization", format!("Bot {}", self.token))
    }

    pub async fn resolve_channel(&self, channel_id: &str) -> Result<ChannelHandle> {
        let response = self
            .authorized(
                self.client
                    .get(format!("{}/channels/{channel_id}", self.api_url)),
            )
            .send()
            .await
            .map_err(|e| AnnouncerError::Config(format!("Cannot resolve channel: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnnouncerError::Config(format!(
                "Cannot resolve channel {channel_id} (status {status}): {body}"
            )));
        }

        let channel: DiscordChannel = response
            .json()
            .await
            .map_err(|e| AnnouncerError::Config(format!("Invalid Discord channel payload: {e}")))?;
        info!(
            "Resolved Discord channel {} ({}, type {})",
            channel.id,
            channel.name.as_deref().unwrap_or("unnamed"),
            channel.kind
        );

        Ok(ChannelHandle {
            id: channel.id,
            name: channel.name,
        })
    }

    pub async fn send_message(&self, channel: &ChannelHandle, content: &str) -> Result<()> {
        let body = CreateMessage {
            content,
            flags: SUPPRESS_NOTIFICATIONS,
        };

        let response = self
            .authorized(
                self.client
                    .post(format!("{}/channels/{}/messages", self.api_url, channel.id)),
            )
            .json(&body)
            .send()
            .await
            .map_err(|e| AnnouncerError::Announcement(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnnouncerError::Announcement(format!(
                "status {status}: {body}"
            )));
        }
        Ok(())
    }

    /// Ends the session. Nothing is kept open between requests, so this only logs.
    pub fn destroy(self) {
        info!("Discord session for {} closed.", self.user.tag());
    }
}

/// Posts announcements to a single channel, mentioning a fixed user.
pub struct DiscordAnnouncer {
    client: DiscordClient,
    channel: ChannelHandle,
    mention_user_id: String,
}

impl DiscordAnnouncer {
    pub fn new(
        client: DiscordClient,
        channel: ChannelHandle,
        mention_user_id: impl Into<String>,
    ) -> Self {
        DiscordAnnouncer {
            client,
            channel,
            mention_user_id: mention_user_id.into(),
        }
    }
}

#[async_trait]
impl Announcer for DiscordAnnouncer {
    async fn announce(&self, video: &Video) -> bool {
        let message = announcement_message(&self.mention_user_id, video);
        match self.client.send_message(&self.channel, &message).await {
            Ok(()) => {
                info!("Sent message to Discord channel: {message}");
                true
            }
            Err(e) => {
                error!(
                    "Error sending message to Discord channel for video {}: {e}",
                    video.video_id
                );
                false
            }
        }
    }
}
