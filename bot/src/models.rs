use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Only `youtube#searchListResponse` is accepted as a top-level kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchListKind {
    #[serde(rename = "youtube#searchListResponse")]
    SearchListResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchResultKind {
    #[serde(rename = "youtube#searchResult")]
    SearchResult,
}

// Documentation: https://developers.google.com/youtube/v3/docs/search/list
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchListResponse {
    pub kind: SearchListKind,
    pub etag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
    pub region_code: String,
    pub page_info: PageInfo,
    pub items: Vec<SearchResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub total_results: u64,
    pub results_per_page: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub kind: SearchResultKind,
    pub etag: String,
    pub id: ResourceId,
    pub snippet: Snippet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceId {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playlist_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    pub published_at: DateTime<Utc>,
    pub channel_id: String,
    pub title: String,
    pub description: String,
    pub thumbnails: HashMap<String, Thumbnail>,
    pub channel_title: String,
    pub live_broadcast_content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thumbnail {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

impl SearchResult {
    /// The video id, if this result is a video with a non-empty id.
    pub fn video_id(&self) -> Option<&str> {
        self.id.video_id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn to_video(&self) -> Option<Video> {
        let video_id = self.video_id()?;
        Some(Video {
            video_id: video_id.to_string(),
            published_at: self.snippet.published_at,
            title: self.snippet.title.clone(),
            description: self.snippet.description.clone(),
            channel_id: self.snippet.channel_id.clone(),
        })
    }
}

/// A newly discovered upload, ready to be announced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Video {
    pub video_id: String,
    pub published_at: DateTime<Utc>,
    pub title: String,
    pub description: String,
    pub channel_id: String,
}

/// Subset of the Discord user object returned by `GET /users/@me`.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub discriminator: Option<String>,
}

impl DiscordUser {
    pub fn tag(&self) -> String {
        match self.discriminator.as_deref() {
            Some(d) if d != "0" => format!("{}#{}", self.username, d),
            _ => self.username.clone(),
        }
    }
}

/// Subset of the Discord channel object returned by `GET /channels/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordChannel {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateMessage<'a> {
    pub content: &'a str,
    pub flags: u64,
}
