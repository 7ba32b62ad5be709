use std::collections::BTreeMap;
use std::sync::LazyLock;

use anyhow::anyhow;
use async_trait::async_trait;
use mediafetch_core::core::events::ProgressSnapshot;
use mediafetch_core::models::settings::{DailymotionSettings, ProxySettings};
use rand::RngExt;
use regex::Regex;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::core::{http_client, timed_text};
use crate::models::media::{
    DownloadOptions, DownloadResult, MediaInfo, MediaType, SubtitleTrack, VideoQuality,
};
use crate::platforms::traits::PlatformDownloader;

const VIEW_ID_CHARS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const VIEW_ID_LEN: usize = 18;

static ID_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"dailymotion\.com/video/([a-zA-Z0-9]+)",
        r"dai\.ly/([a-zA-Z0-9]+)",
        r"video/([a-zA-Z0-9]+)\.json",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    pub username: Option<String>,
    pub screenname: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub id: Option<String>,
    pub title: Option<String>,
    pub duration: Option<f64>,
    pub created_time: Option<i64>,
    pub url: Option<String>,
    pub video_url: Option<String>,
    pub thumbnails: Value,
    pub first_frames: Value,
    pub owner: Owner,
    pub tags: Value,
    pub channel: Value,
    pub language: Option<String>,
    pub aspect_ratio: Value,
    pub stream_formats: Value,
    pub subtitles: Option<BTreeMap<String, SubtitleTrack>>,
}

/// Result of a metadata fetch. Serializes as `{"success":true,"data":...}` or
/// `{"success":false,"error":"..."}`.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Success(Box<VideoInfo>),
    Failure(String),
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success(_))
    }

    pub fn into_result(self) -> anyhow::Result<VideoInfo> {
        match self {
            FetchOutcome::Success(info) => Ok(*info),
            FetchOutcome::Failure(error) => Err(anyhow!(error)),
        }
    }
}

impl Serialize for FetchOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("FetchOutcome", 2)?;
        match self {
            FetchOutcome::Success(data) => {
                s.serialize_field("success", &true)?;
                s.serialize_field("data", data)?;
            }
            FetchOutcome::Failure(error) => {
                s.serialize_field("success", &false)?;
                s.serialize_field("error", error)?;
            }
        }
        s.end()
    }
}

pub struct DailymotionDownloader {
    client: reqwest::Client,
    settings: DailymotionSettings,
}

impl Default for DailymotionDownloader {
    fn default() -> Self {
        Self::new()
    }
}

impl DailymotionDownloader {
    pub fn new() -> Self {
        Self::with_settings(DailymotionSettings::default(), None)
    }

    pub fn with_settings(settings: DailymotionSettings, proxy: Option<&ProxySettings>) -> Self {
        Self {
            client: http_client::build_client(&settings.http, proxy),
            settings,
        }
    }

    pub fn extract_video_id(url: &str) -> Option<String> {
        ID_PATTERNS
            .iter()
            .find_map(|re| re.captures(url))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    }

    pub fn build_api_url(&self, video_id: &str) -> anyhow::Result<String> {
        let mut url = url::Url::parse(&format!(
            "{}/video/{}.json",
            self.settings.geo_base.trim_end_matches('/'),
            video_id
        ))?;

        url.query_pairs_mut()
            .append_pair("legacy", "true")
            .append_pair("embedder", &self.settings.embedder)
            .append_pair("referer", &self.settings.referer)
            .append_pair("geo", "1")
            .append_pair("player-id", &self.settings.player_id)
            .append_pair("enableAds", "0")
            .append_pair("locale", "en-US")
            .append_pair("dmV1st", &uuid::Uuid::new_v4().to_string())
            .append_pair("dmTs", &truncated_timestamp())
            .append_pair("is_native_app", "0")
            .append_pair("app", "com.dailymotion.neon")
            .append_pair("client_type", "webapp")
            .append_pair("dmViewId", &generate_view_id())
            .append_pair("parallelCalls", "1");

        Ok(url.to_string())
    }

    /// Video metadata plus parsed subtitles for a watch URL. Never fails;
    /// problems are reported through [`FetchOutcome::Failure`].
    pub async fn fetch(&self, video_url: &str) -> FetchOutcome {
        let Some(video_id) = Self::extract_video_id(video_url) else {
            return FetchOutcome::Failure("video id not found".to_string());
        };

        match self.build_api_url(&video_id) {
            Ok(api_url) => self.fetch_metadata(&api_url).await,
            Err(e) => FetchOutcome::Failure(e.to_string()),
        }
    }

    pub async fn fetch_metadata(&self, api_url: &str) -> FetchOutcome {
        match self.try_fetch_metadata(api_url).await {
            Ok(info) => FetchOutcome::Success(Box::new(info)),
            Err(e) => {
                tracing::debug!("Dailymotion: metadata fetch failed: {}", e);
                FetchOutcome::Failure(e.to_string())
            }
        }
    }

    async fn try_fetch_metadata(&self, api_url: &str) -> anyhow::Result<VideoInfo> {
        let body = self.fetch_text(api_url).await?;
        let data: Value = serde_json::from_str(&body)?;

        let subtitles = match data.pointer("/subtitles/data") {
            Some(tracks) if !tracks.is_null() => self.fetch_subtitles(tracks).await,
            _ => None,
        };

        Ok(map_video_info(&data, subtitles))
    }

    async fn fetch_text(&self, url: &str) -> anyhow::Result<String> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(anyhow!("HTTP {}: {}", status.as_u16(), body));
        }
        Ok(body)
    }

    /// Fetches the first timed-text URL of every language. A language whose
    /// fetch fails is logged and left out.
    pub async fn fetch_subtitles(&self, tracks: &Value) -> Option<BTreeMap<String, SubtitleTrack>> {
        let tracks = tracks.as_object()?;
        let mut result = BTreeMap::new();

        for (lang, info) in tracks {
            let Some(srt_url) = info
                .get("urls")
                .and_then(|v| v.as_array())
                .and_then(|urls| urls.first())
                .and_then(|v| v.as_str())
            else {
                continue;
            };

            match self.fetch_text(srt_url).await {
                Ok(content) => {
                    result.insert(
                        lang.clone(),
                        SubtitleTrack {
                            language: lang.clone(),
                            label: info.get("label").and_then(|v| v.as_str()).map(String::from),
                            subtitles: timed_text::parse_srt(&content),
                        },
                    );
                }
                Err(e) => {
                    tracing::warn!("Dailymotion: error fetching subtitle for {}: {}", lang, e);
                }
            }
        }

        if result.is_empty() {
            None
        } else {
            Some(result)
        }
    }
}

fn map_video_info(data: &Value, subtitles: Option<BTreeMap<String, SubtitleTrack>>) -> VideoInfo {
    let text = |key: &str| data.get(key).and_then(|v| v.as_str()).map(String::from);
    let raw = |key: &str| data.get(key).cloned().unwrap_or(Value::Null);
    let owner = |key: &str| {
        data.pointer(&format!("/owner/{}", key))
            .and_then(|v| v.as_str())
            .map(String::from)
    };

    VideoInfo {
        id: text("id"),
        title: text("title"),
        duration: data.get("duration").and_then(|v| v.as_f64()),
        created_time: data.get("created_time").and_then(|v| v.as_i64()),
        url: text("url"),
        video_url: data
            .pointer("/qualities/auto/0/url")
            .and_then(|v| v.as_str())
            .map(String::from),
        thumbnails: raw("thumbnails"),
        first_frames: raw("first_frames"),
        owner: Owner {
            username: owner("username"),
            screenname: owner("screenname"),
            url: owner("url"),
        },
        tags: raw("tags"),
        channel: raw("channel"),
        language: text("language"),
        aspect_ratio: raw("aspect_ratio"),
        stream_formats: raw("stream_formats"),
        subtitles,
    }
}

/// First six digits of the epoch in milliseconds.
fn truncated_timestamp() -> String {
    chrono::Utc::now()
        .timestamp_millis()
        .to_string()
        .chars()
        .take(6)
        .collect()
}

fn generate_view_id() -> String {
    (0..VIEW_ID_LEN)
        .map(|_| VIEW_ID_CHARS[rand::rng().random_range(0..VIEW_ID_CHARS.len())] as char)
        .collect()
}

#[async_trait]
impl PlatformDownloader for DailymotionDownloader {
    fn name(&self) -> &str {
        "dailymotion"
    }

    fn can_handle(&self, url: &str) -> bool {
        if let Ok(parsed) = url::Url::parse(url) {
            if let Some(host) = parsed.host_str() {
                let host = host.to_lowercase();
                return host == "dailymotion.com"
                    || host.ends_with(".dailymotion.com")
                    || host == "dai.ly";
            }
        }
        false
    }

    async fn get_media_info(&self, url: &str) -> anyhow::Result<MediaInfo> {
        let info = self.fetch(url).await.into_result()?;

        let qualities = info
            .video_url
            .iter()
            .map(|u| VideoQuality {
                label: "auto".to_string(),
                url: u.clone(),
                backup_url: None,
                format: "hls".to_string(),
            })
            .collect();

        Ok(MediaInfo {
            title: info.title.clone().unwrap_or_else(|| "dailymotion_video".to_string()),
            author: info.owner.screenname.clone().unwrap_or_default(),
            platform: "dailymotion".to_string(),
            duration_seconds: info.duration,
            thumbnail_url: info
                .thumbnails
                .as_object()
                .and_then(|t| t.values().filter_map(|v| v.as_str()).last())
                .map(String::from),
            available_qualities: qualities,
            media_type: MediaType::Video,
        })
    }

    async fn download(
        &self,
        _info: &MediaInfo,
        _opts: &DownloadOptions,
        _progress: mpsc::Sender<ProgressSnapshot>,
    ) -> anyhow::Result<DownloadResult> {
        Err(anyhow!(
            "Dailymotion only exposes HLS playlists; use the video_url with an HLS-capable player"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_id_from_watch_url() {
        assert_eq!(
            DailymotionDownloader::extract_video_id("https://www.dailymotion.com/video/x9vak0w")
                .as_deref(),
            Some("x9vak0w")
        );
    }

    #[test]
    fn extracts_id_from_short_link() {
        assert_eq!(
            DailymotionDownloader::extract_video_id("https://dai.ly/x8abc12").as_deref(),
            Some("x8abc12")
        );
    }

    #[test]
    fn extracts_id_from_metadata_url() {
        assert_eq!(
            DailymotionDownloader::extract_video_id(
                "https://geo.dailymotion.com/video/x9vak0w.json?legacy=true"
            )
            .as_deref(),
            Some("x9vak0w")
        );
    }

    #[test]
    fn unsupported_url_has_no_id() {
        assert_eq!(
            DailymotionDownloader::extract_video_id("https://www.dailymotion.com/user/someone"),
            None
        );
        assert_eq!(DailymotionDownloader::extract_video_id(""), None);
    }

    #[test]
    fn view_id_shape() {
        let id = generate_view_id();
        assert_eq!(id.len(), 18);
        assert!(id.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn timestamp_is_six_digits() {
        let ts = truncated_timestamp();
        assert_eq!(ts.len(), 6);
        assert!(ts.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn api_url_carries_fixed_and_random_params() {
        let dl = DailymotionDownloader::new();
        let api = dl.build_api_url("x9vak0w").unwrap();
        let parsed = url::Url::parse(&api).unwrap();
        assert_eq!(parsed.host_str(), Some("geo.dailymotion.com"));
        assert_eq!(parsed.path(), "/video/x9vak0w.json");

        let params: BTreeMap<String, String> = parsed.query_pairs().into_owned().collect();
        assert_eq!(params["legacy"], "true");
        assert_eq!(params["player-id"], "x138o4");
        assert_eq!(params["app"], "com.dailymotion.neon");
        assert_eq!(params["client_type"], "webapp");
        assert_eq!(params["dmViewId"].len(), 18);
        assert!(uuid::Uuid::parse_str(&params["dmV1st"]).is_ok());
    }

    #[test]
    fn maps_metadata_fields() {
        let data = serde_json::json!({
            "id": "x9vak0w",
            "title": "Sample",
            "duration": 93,
            "created_time": 1700000000,
            "qualities": {"auto": [{"type": "application/x-mpegURL", "url": "https://cdn.example/m.m3u8"}]},
            "owner": {"username": "user1", "screenname": "User One"},
            "tags": ["a", "b"]
        });
        let info = map_video_info(&data, None);
        assert_eq!(info.id.as_deref(), Some("x9vak0w"));
        assert_eq!(info.duration, Some(93.0));
        assert_eq!(info.video_url.as_deref(), Some("https://cdn.example/m.m3u8"));
        assert_eq!(info.owner.screenname.as_deref(), Some("User One"));
        assert_eq!(info.owner.url, None);
        assert_eq!(info.tags, serde_json::json!(["a", "b"]));
        assert_eq!(info.channel, Value::Null);
    }

    #[test]
    fn outcome_serializes_tagged() {
        let failure = serde_json::to_value(FetchOutcome::Failure("nope".into())).unwrap();
        assert_eq!(failure, serde_json::json!({"success": false, "error": "nope"}));

        let info = map_video_info(&serde_json::json!({"id": "x1"}), None);
        let success = serde_json::to_value(FetchOutcome::Success(Box::new(info))).unwrap();
        assert_eq!(success["success"], true);
        assert_eq!(success["data"]["id"], "x1");
    }

    #[tokio::test]
    async fn fetch_with_bad_url_is_failure() {
        let dl = DailymotionDownloader::new();
        let outcome = dl.fetch("https://example.com/nothing").await;
        assert_eq!(outcome, FetchOutcome::Failure("video id not found".into()));
    }
}
