use serde::Serialize;

use crate::platforms::bilibili::BilibiliTvDownloader;
use crate::platforms::dailymotion::DailymotionDownloader;
use crate::platforms::tiktok::TikTokDownloader;
use crate::platforms::youtube::YouTubeDownloader;
use crate::platforms::Platform;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedUrl {
    pub platform: Platform,
    pub url: String,
    pub content_id: Option<String>,
}

pub fn parse_url(url_str: &str) -> Option<ParsedUrl> {
    let platform = Platform::from_url(url_str)?;

    let content_id = match platform {
        Platform::MediaFire => parse_mediafire(url_str),
        Platform::Bilibili => BilibiliTvDownloader::parse_url(url_str),
        Platform::Dailymotion => DailymotionDownloader::extract_video_id(url_str),
        Platform::TikTok => TikTokDownloader::extract_post_id(url_str),
        Platform::YouTube => YouTubeDownloader::extract_video_id(url_str),
    };

    Some(ParsedUrl {
        platform,
        url: url_str.to_string(),
        content_id,
    })
}

/// Quick key of `/file/<key>/...` and `/download/<key>/...` links.
fn parse_mediafire(url_str: &str) -> Option<String> {
    let parsed = url::Url::parse(url_str).ok()?;
    let segments: Vec<&str> = parsed.path().split('/').filter(|s| !s.is_empty()).collect();

    match segments.as_slice() {
        ["file" | "download" | "view", key, ..] => Some(key.to_string()),
        _ => None,
    }
}
