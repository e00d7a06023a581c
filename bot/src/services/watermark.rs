use crate::error::{AnnouncerError, Result};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use log::info;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Date used when no watermark has been written yet: nothing older gets announced.
pub fn bootstrap_date() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(2025, 8, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .unwrap_or_default()
}

/// Single-file store for the last successfully processed point in time.
#[derive(Debug, Clone)]
pub struct WatermarkStore {
    path: PathBuf,
}

impl WatermarkStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        WatermarkStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<DateTime<Utc>> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(bootstrap_date()),
            Err(e) => return Err(AnnouncerError::watermark(&self.path, e)),
        };

        DateTime::parse_from_rfc3339(data.trim())
            .map(|date| date.with_timezone(&Utc))
            .map_err(|e| AnnouncerError::watermark(&self.path, e))
    }

    /// Overwrites the file with `date` in RFC 3339 form, millisecond precision.
    pub async fn save(&self, date: DateTime<Utc>) -> Result<()> {
        let encoded = date.to_rfc3339_opts(SecondsFormat::Millis, true);
        tokio::fs::write(&self.path, encoded)
            .await
            .map_err(|e| AnnouncerError::watermark(&self.path, e))
    }

    /// Saves `now`, or the stored value if it is later, and returns what was written.
    pub async fn advance(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let current = self.load().await?;
        let next = now.max(current);
        self.save(next).await?;
        info!("Watermark advanced to {}", next.to_rfc3339());
        Ok(next)
    }
}
