//! Fetch-ahead buffer over the paginated search results.
//!
//! Results arrive newest first. [`VideoPager::newer_than`] keeps pulling pages
//! while every loaded result is still newer than the watermark, so the
//! boundary between announced and unannounced uploads is always inside the
//! buffer before the answer is computed.

use crate::error::{AnnouncerError, Result};
use crate::models::{SearchListResponse, SearchResult, Video};
use crate::services::youtube::PageSource;
use chrono::{DateTime, Utc};
use log::{info, warn};

/// Upper bound on page fetches for a single `newer_than` call.
pub const MAX_PAGE_FETCHES: usize = 100;

pub struct VideoPager<'a, S: PageSource + ?Sized> {
    source: &'a S,
    videos: Vec<SearchResult>,
    total_results: u64,
    next_page_token: Option<String>,
}

impl<'a, S: PageSource + ?Sized> VideoPager<'a, S> {
    pub fn new(source: &'a S, first_page: SearchListResponse) -> Self {
        VideoPager {
            source,
            videos: first_page.items,
            total_results: first_page.page_info.total_results,
            next_page_token: first_page.next_page_token,
        }
    }

    pub fn has_more(&self) -> bool {
        (self.videos.len() as u64) < self.total_results && self.next_page_token.is_some()
    }

    pub fn loaded(&self) -> usize {
        self.videos.len()
    }

    async fn fetch_more(&mut self) -> Result<()> {
        let Some(token) = self.next_page_token.take() else {
            return Ok(());
        };

        let fetched = self.source.fetch_page(Some(token.as_str())).await;
        let page = match fetched {
            Ok(page) => page,
            Err(e) => {
                self.next_page_token = Some(token);
                return Err(e);
            }
        };
        self.next_page_token = page.next_page_token;
        self.videos.extend(page.items);
        Ok(())
    }

    /// Uploads published strictly after `date`, oldest first.
    pub async fn newer_than(&mut self, date: DateTime<Utc>) -> Result<Vec<Video>> {
        if self.total_results == 0 {
            return Ok(Vec::new());
        }

        let mut boundary = last_newer_index(&self.videos, date);
        let mut fetches = 0;

        while boundary.is_some_and(|i| i + 1 == self.videos.len()) && self.has_more() {
            if fetches == MAX_PAGE_FETCHES {
                warn!("Maximum page fetch count reached, stopping fetch.");
                return Err(AnnouncerError::PaginationLimitExceeded {
                    limit: MAX_PAGE_FETCHES,
                });
            }

            info!("Fetching more videos...");
            let start = self.videos.len();
            self.fetch_more().await?;
            fetches += 1;

            // Everything before `start` is already known to be newer.
            boundary = last_newer_index(&self.videos[start..], date)
                .map(|i| start + i)
                .or(boundary);
        }

        let Some(boundary) = boundary else {
            return Ok(Vec::new());
        };

        Ok(self.videos[..=boundary]
            .iter()
            .rev()
            .filter_map(SearchResult::to_video)
            .collect())
    }
}

fn last_newer_index(videos: &[SearchResult], date: DateTime<Utc>) -> Option<usize> {
    videos
        .iter()
        .rposition(|video| video.snippet.published_at > date)
}
