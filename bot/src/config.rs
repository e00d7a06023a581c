use crate::error::{AnnouncerError, Result};
use env_logger::Builder;
use log::{info, LevelFilter};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_YOUTUBE_API_URL: &str = "https://www.googleapis.com/youtube/v3";
pub const DEFAULT_DISCORD_API_URL: &str = "https://discord.com/api/v10";
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 30 * 60;
pub const WATERMARK_FILE_NAME: &str = "last_checked.txt";

#[derive(Debug, Clone)]
pub struct Config {
    pub discord_bot_token: String,
    pub discord_channel_id: String,
    pub discord_user_id: String,
    pub youtube_api_key: String,
    pub youtube_channel_id: String,
    pub data_dir: Option<PathBuf>,
    pub check_interval: Duration,
    pub youtube_api_url: String,
    pub discord_api_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| -> Result<String> {
            match lookup(name) {
                Some(value) if !value.trim().is_empty() => Ok(value),
                Some(_) => Err(AnnouncerError::Config(format!("{name} must not be empty"))),
                None => Err(AnnouncerError::Config(format!(
                    "{name} environment variable must be set"
                ))),
            }
        };
        let optional = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let check_interval = match optional("CHECK_INTERVAL_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(AnnouncerError::Config(format!(
                        "CHECK_INTERVAL_SECS must be a positive number of seconds, got '{raw}'"
                    )))
                }
            },
            None => Duration::from_secs(DEFAULT_CHECK_INTERVAL_SECS),
        };

        Ok(Config {
            discord_bot_token: required("DISCORD_BOT_TOKEN")?,
            discord_channel_id: required("DISCORD_CHANNEL_ID")?,
            discord_user_id: required("DISCORD_USER_ID")?,
            youtube_api_key: required("YOUTUBE_API_KEY")?,
            youtube_channel_id: required("YOUTUBE_CHANNEL_ID")?,
            data_dir: optional("DATA_DIR").map(PathBuf::from),
            check_interval,
            youtube_api_url: optional("YOUTUBE_API_URL")
                .unwrap_or_else(|| DEFAULT_YOUTUBE_API_URL.to_string()),
            discord_api_url: optional("DISCORD_API_URL")
                .unwrap_or_else(|| DEFAULT_DISCORD_API_URL.to_string()),
        })
    }

    /// `<DATA_DIR or cwd>/last_checked.txt`
    pub fn watermark_path(&self) -> Result<PathBuf> {
        let dir = match &self.data_dir {
            Some(dir) => dir.clone(),
            None => env::current_dir().map_err(|e| {
                AnnouncerError::Config(format!("cannot determine working directory: {e}"))
            })?,
        };
        Ok(dir.join(WATERMARK_FILE_NAME))
    }
}

pub fn init_logger() {
    Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();
    info!("Starting upload announcer...");
}

pub fn load_environment() {
    dotenv::dotenv().ok();
}
