use crate::config::Config;
use crate::error::{AnnouncerError, Result};
use crate::models::SearchListResponse;
use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;

/// A paginated, date-descending source of search results.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, page_token: Option<&str>) -> Result<SearchListResponse>;
}

/// Issues `search.list` requests for the uploads of a single channel.
#[derive(Clone)]
pub struct SearchClient {
    client: Client,
    api_url: String,
    api_key: String,
    channel_id: String,
}

impl SearchClient {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        channel_id: impl Into<String>,
    ) -> Self {
        SearchClient {
            client: Client::new(),
            api_url: api_url.into(),
            api_key: api_key.into(),
            channel_id: channel_id.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.youtube_api_url,
            &config.youtube_api_key,
            &config.youtube_channel_id,
        )
    }

    fn search_url(&self) -> String {
        format!("{}/search", self.api_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl PageSource for SearchClient {
    async fn fetch_page(&self, page_token: Option<&str>) -> Result<SearchListResponse> {
        let mut query = vec![
            ("key", self.api_key.as_str()),
            ("channelId", self.channel_id.as_str()),
            ("part", "snippet"),
            ("order", "date"),
            ("type", "video"),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        debug!(
            "Requesting search page for channel {} (page token: {:?})",
            self.channel_id, page_token
        );

        let response = self
            .client
            .get(self.search_url())
            .query(&query)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let payload = match serde_json::from_str::<serde_json::Value>(&body) {
                Ok(json) => serde_json::to_string_pretty(&json).unwrap_or(body),
                Err(_) => body,
            };
            error!("Error fetching YouTube videos: {payload}");
            return Err(AnnouncerError::RemoteFetch { status, payload });
        }

        let page: SearchListResponse = serde_json::from_str(&body)?;
        debug!(
            "Fetched {} search results (total {}, next page: {})",
            page.items.len(),
            page.page_info.total_results,
            page.next_page_token.is_some()
        );
        Ok(page)
    }
}
