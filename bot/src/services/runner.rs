use crate::error::Result;
use crate::models::Video;
use crate::services::discord::Announcer;
use crate::services::pager::VideoPager;
use crate::services::watermark::WatermarkStore;
use crate::services::youtube::PageSource;
use anyhow::Context;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use log::{error, info};
use std::future::Future;
use std::time::Duration;

/// Outcome of a cycle that got as far as announcing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub found: usize,
    pub failed: usize,
    /// The new watermark, or `None` when some announcement failed.
    pub watermark: Option<DateTime<Utc>>,
}

/// Fetches the first page, loads the watermark and returns what is newer, oldest first.
pub async fn check_for_newer_videos<S>(source: &S, store: &WatermarkStore) -> Result<Vec<Video>>
where
    S: PageSource + ?Sized,
{
    let first_page = source.fetch_page(None).await?;
    let mut pager = VideoPager::new(source, first_page);
    let last_checked = store.load().await?;
    pager.newer_than(last_checked).await
}

/// Long-lived context driving the fetch, announce and persist cycle.
pub struct Runner<S, A> {
    source: S,
    announcer: A,
    store: WatermarkStore,
    interval: Duration,
    cycles: u64,
}

impl<S, A> Runner<S, A>
where
    S: PageSource,
    A: Announcer,
{
    pub fn new(source: S, announcer: A, store: WatermarkStore, interval: Duration) -> Self {
        Runner {
            source,
            announcer,
            store,
            interval,
            cycles: 0,
        }
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn store(&self) -> &WatermarkStore {
        &self.store
    }

    pub async fn run_cycle(&mut self) -> anyhow::Result<CycleReport> {
        self.cycles += 1;
        let started_at = Utc::now();

        let videos = check_for_newer_videos(&self.source, &self.store)
            .await
            .context("Failed to check for new videos")?;
        if !videos.is_empty() {
            info!("Found {} new video(s)", videos.len());
        }

        let results = join_all(videos.iter().map(|video| self.announcer.announce(video))).await;
        let failed = results.iter().filter(|sent| !**sent).count();

        let watermark = if failed == 0 {
            let advanced = self
                .store
                .advance(started_at)
                .await
                .context("Failed to update last checked date")?;
            Some(advanced)
        } else {
            error!("Some messages failed to send ({failed} of {}).", videos.len());
            None
        };

        Ok(CycleReport {
            found: videos.len(),
            failed,
            watermark,
        })
    }

    /// Runs cycles back to back, sleeping `interval` after each one settles.
    pub async fn run(&mut self) {
        loop {
            info!("Checking for new videos...");
            match self.run_cycle().await {
                Ok(report) => info!(
                    "Cycle {} finished: {} found, {} failed",
                    self.cycles, report.found, report.failed
                ),
                Err(e) => error!("Cycle {} failed: {e:?}", self.cycles),
            }
            tokio::time::sleep(self.interval).await;
        }
    }

    /// Runs until `shutdown` completes; an in-flight cycle is abandoned.
    pub async fn run_until<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            _ = self.run() => {}
            _ = shutdown => {
                info!("Shutdown requested after {} cycle(s).", self.cycles);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnnouncerError;
    use crate::models::{
        PageInfo, ResourceId, SearchListKind, SearchListResponse, SearchResult, SearchResultKind,
        Snippet,
    };
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    fn result(video_id: &str, published_at: DateTime<Utc>) -> SearchResult {
        SearchResult {
            kind: SearchResultKind::SearchResult,
            etag: "etag".to_string(),
            id: ResourceId {
                kind: "youtube#video".to_string(),
                video_id: Some(video_id.to_string()),
                channel_id: None,
                playlist_id: None,
            },
            snippet: Snippet {
                published_at,
                channel_id: "UC123".to_string(),
                title: video_id.to_uppercase(),
                description: String::new(),
                thumbnails: HashMap::new(),
                channel_title: "Channel".to_string(),
                live_broadcast_content: "none".to_string(),
            },
        }
    }

    fn date(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, day, 12, 0, 0).unwrap()
    }

    /// Always serves the same single page, or fails with a malformed body.
    struct StaticSource {
        items: Vec<SearchResult>,
        malformed: bool,
        calls: Arc<AtomicUsize>,
    }

    impl StaticSource {
        fn new(items: Vec<SearchResult>) -> Self {
            StaticSource {
                items,
                malformed: false,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl PageSource for StaticSource {
        async fn fetch_page(&self, _page_token: Option<&str>) -> Result<SearchListResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.malformed {
                let err = serde_json::from_str::<SearchListResponse>(r#"{"kind":"youtube#searchListResponse"}"#)
                    .unwrap_err();
                return Err(AnnouncerError::MalformedResponse(err));
            }
            Ok(SearchListResponse {
                kind: SearchListKind::SearchListResponse,
                etag: "etag".to_string(),
                next_page_token: None,
                region_code: "PL".to_string(),
                page_info: PageInfo {
                    total_results: self.items.len() as u64,
                    results_per_page: 5,
                },
                items: self.items.clone(),
            })
        }
    }

    /// Records announced ids and fails for the configured ones.
    #[derive(Clone, Default)]
    struct RecordingAnnouncer {
        failing: HashSet<String>,
        sent: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Announcer for RecordingAnnouncer {
        async fn announce(&self, video: &Video) -> bool {
            if self.failing.contains(&video.video_id) {
                return false;
            }
            self.sent.lock().unwrap().push(video.video_id.clone());
            true
        }
    }

    fn three_videos() -> Vec<SearchResult> {
        vec![
            result("c", date(5)),
            result("b", date(4)),
            result("a", date(3)),
        ]
    }

    #[tokio::test]
    async fn test_successful_cycle_announces_and_advances_watermark() {
        let dir = tempdir().unwrap();
        let store = WatermarkStore::new(dir.path().join("last_checked.txt"));
        store.save(date(3)).await.unwrap();

        let announcer = RecordingAnnouncer::default();
        let sent = announcer.sent.clone();
        let mut runner = Runner::new(
            StaticSource::new(three_videos()),
            announcer,
            store,
            Duration::from_secs(1800),
        );

        let before = Utc::now();
        let report = runner.run_cycle().await.unwrap();
        assert_eq!(report.found, 2);
        assert_eq!(report.failed, 0);

        let mut sent = sent.lock().unwrap().clone();
        sent.sort();
        assert_eq!(sent, vec!["b", "c"]);

        let watermark = runner.store().load().await.unwrap();
        assert!(watermark >= before - chrono::Duration::milliseconds(1));
        assert_eq!(report.watermark.map(|w| w.timestamp_millis()), Some(watermark.timestamp_millis()));
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_watermark() {
        let dir = tempdir().unwrap();
        let store = WatermarkStore::new(dir.path().join("last_checked.txt"));
        store.save(date(2)).await.unwrap();

        let announcer = RecordingAnnouncer {
            failing: HashSet::from(["b".to_string()]),
            ..Default::default()
        };
        let sent = announcer.sent.clone();
        let mut runner = Runner::new(
            StaticSource::new(three_videos()),
            announcer,
            store,
            Duration::from_secs(1800),
        );

        let report = runner.run_cycle().await.unwrap();
        assert_eq!(report.found, 3);
        assert_eq!(report.failed, 1);
        assert_eq!(report.watermark, None);
        assert_eq!(sent.lock().unwrap().len(), 2);
        assert_eq!(runner.store().load().await.unwrap(), date(2));

        // The next cycle starts from the same watermark and sees all three again.
        let report = runner.run_cycle().await.unwrap();
        assert_eq!(report.found, 3);
    }

    #[tokio::test]
    async fn test_nothing_new_still_advances_watermark() {
        let dir = tempdir().unwrap();
        let store = WatermarkStore::new(dir.path().join("last_checked.txt"));
        store.save(date(10)).await.unwrap();

        let mut runner = Runner::new(
            StaticSource::new(three_videos()),
            RecordingAnnouncer::default(),
            store,
            Duration::from_secs(1800),
        );

        let report = runner.run_cycle().await.unwrap();
        assert_eq!(report.found, 0);
        assert!(report.watermark.unwrap() > date(10));
    }

    #[tokio::test]
    async fn test_malformed_response_fails_cycle_without_touching_watermark() {
        let dir = tempdir().unwrap();
        let store = WatermarkStore::new(dir.path().join("last_checked.txt"));
        let mut source = StaticSource::new(three_videos());
        source.malformed = true;

        let mut runner = Runner::new(
            source,
            RecordingAnnouncer::default(),
            store,
            Duration::from_secs(1800),
        );

        let err = runner.run_cycle().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AnnouncerError>(),
            Some(AnnouncerError::MalformedResponse(_))
        ));
        assert!(!runner.store().path().exists());
    }

    #[tokio::test]
    async fn test_failed_cycles_are_rescheduled() {
        let dir = tempdir().unwrap();
        let store = WatermarkStore::new(dir.path().join("last_checked.txt"));
        let mut source = StaticSource::new(three_videos());
        source.malformed = true;
        let calls = source.calls.clone();

        let mut runner = Runner::new(
            source,
            RecordingAnnouncer::default(),
            store,
            Duration::from_millis(1),
        );

        let watched = calls.clone();
        runner
            .run_until(async move {
                while watched.load(Ordering::SeqCst) < 3 {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
            })
            .await;

        assert!(calls.load(Ordering::SeqCst) >= 3);
        assert!(runner.cycles() >= 3);
    }
}
