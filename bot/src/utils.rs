use crate::models::Video;
use url::Url;

const WATCH_URL: &str = "https://www.youtube.com/watch";

pub fn watch_url(video_id: &str) -> String {
    match Url::parse_with_params(WATCH_URL, &[("v", video_id)]) {
        Ok(url) => url.to_string(),
        Err(_) => format!("{WATCH_URL}?v={video_id}"),
    }
}

/// Announcement text posted for a new upload, mentioning `user_id`.
pub fn announcement_message(user_id: &str, video: &Video) -> String {
    format!(
        "🎥 **<@{user_id}> Wrzucił nowy film!**\n**{}**\n{}",
        video.title,
        watch_url(&video.video_id)
    )
}
