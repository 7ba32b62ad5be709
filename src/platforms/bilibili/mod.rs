use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::anyhow;
use async_trait::async_trait;
use mediafetch_core::core::events::ProgressSnapshot;
use mediafetch_core::models::settings::{BilibiliSettings, ProxySettings};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::mpsc;

use crate::core::{direct_downloader, http_client};
use crate::models::media::{
    DownloadOptions, DownloadResult, MediaInfo, MediaType, VideoQuality,
};
use crate::platforms::traits::PlatformDownloader;

pub const DEFAULT_PLAYURL_QUALITY: u32 = 64;

static ID_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)bilibili\.tv/(?:en|id|[a-z]{2})/video/(\d+)",
        r"(?i)bilibili\.tv/video/(\d+)",
        r"^(\d{10,})$",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// The API sends `null` where it has nothing; treat it like a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayUrlResponse {
    pub code: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(default)]
    pub data: Option<PlayUrlData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayUrlData {
    #[serde(default)]
    pub playurl: Option<PlayUrl>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayUrl {
    /// Milliseconds.
    #[serde(default)]
    pub duration: Option<u64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub video: Vec<VideoVariant>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoVariant {
    pub video_resource: VideoResource,
    pub stream_info: StreamInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoResource {
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub backup_url: Vec<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamInfo {
    pub quality: u32,
    #[serde(default)]
    pub desc_words: Option<String>,
}

impl PlayUrlResponse {
    /// Video variants of a successful response; API-level failures become
    /// errors carrying the API's message.
    pub fn into_variants(self) -> anyhow::Result<Vec<VideoVariant>> {
        if self.code != 0 {
            return Err(anyhow!("API Error: {}", self.message));
        }
        let videos = self
            .data
            .and_then(|d| d.playurl)
            .map(|p| p.video)
            .unwrap_or_default();
        if videos.is_empty() {
            return Err(anyhow!("No video found"));
        }
        Ok(videos)
    }

    fn duration_seconds(&self) -> Option<f64> {
        self.data
            .as_ref()
            .and_then(|d| d.playurl.as_ref())
            .and_then(|p| p.duration)
            .map(|ms| ms as f64 / 1000.0)
    }
}

/// Variant with the requested quality code, else the first one.
pub fn select_variant(variants: &[VideoVariant], quality: u32) -> Option<&VideoVariant> {
    variants
        .iter()
        .find(|v| v.stream_info.quality == quality)
        .or_else(|| variants.first())
}

/// Moves the variant with `quality` to the front so it becomes the default
/// pick; order is otherwise kept.
fn prefer_quality(mut variants: Vec<VideoVariant>, quality: u32) -> Vec<VideoVariant> {
    if let Some(pos) = variants.iter().position(|v| v.stream_info.quality == quality) {
        let preferred = variants.remove(pos);
        variants.insert(0, preferred);
    }
    variants
}

pub struct BilibiliTvDownloader {
    client: reqwest::Client,
    download_client: reqwest::Client,
    settings: BilibiliSettings,
}

impl Default for BilibiliTvDownloader {
    fn default() -> Self {
        Self::new()
    }
}

impl BilibiliTvDownloader {
    pub fn new() -> Self {
        Self::with_settings(BilibiliSettings::default(), None)
    }

    pub fn with_settings(settings: BilibiliSettings, proxy: Option<&ProxySettings>) -> Self {
        Self {
            client: http_client::build_client(&settings.http, proxy),
            download_client: http_client::build_download_client(&settings.http, proxy),
            settings,
        }
    }

    /// Video id from a watch URL (with or without a locale segment) or a bare
    /// id of at least ten digits.
    pub fn parse_url(input: &str) -> Option<String> {
        ID_PATTERNS
            .iter()
            .find_map(|re| re.captures(input))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    }

    pub async fn get_play_url(&self, aid: &str, qn: u32) -> anyhow::Result<PlayUrlResponse> {
        let url = format!("{}/intl/gateway/web/playurl", self.settings.api_base);
        let qn = qn.to_string();

        tracing::debug!("Bilibili: playurl aid={} qn={}", aid, qn);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("s_locale", "id_ID"),
                ("platform", "web"),
                ("aid", aid),
                ("qn", qn.as_str()),
                ("type", "0"),
                ("device", "wap"),
                ("tf", "0"),
                ("force_container", "2"),
                ("spm_id", "bstar-web.ugc-video-detail.0.0"),
                ("from_spm_id", "bstar-web.homepage.trending.all"),
            ])
            .send()
            .await?;

        // gzip/deflate/br bodies are decoded by reqwest from Content-Encoding.
        let body = response.bytes().await?;
        if body.is_empty() {
            return Err(anyhow!("Empty response from API"));
        }

        serde_json::from_slice(&body).map_err(|e| anyhow!("Failed to parse API response: {}", e))
    }

    /// Downloads `aid` at `quality` into `output_dir` as
    /// `bilibili_{aid}_{quality}.mp4`, retrying once on the backup URL.
    pub async fn download_video(
        &self,
        aid: &str,
        quality: u32,
        output_dir: &Path,
        progress: Option<&mpsc::Sender<ProgressSnapshot>>,
    ) -> anyhow::Result<PathBuf> {
        let variants = self.get_play_url(aid, quality).await?.into_variants()?;
        let video = select_variant(&variants, quality).ok_or_else(|| anyhow!("No video found"))?;

        tokio::fs::create_dir_all(output_dir).await?;
        let output = output_dir.join(format!("bilibili_{}_{}.mp4", aid, quality));

        direct_downloader::download_with_backup(
            &self.download_client,
            &video.video_resource.url,
            video.video_resource.backup_url.first().map(String::as_str),
            &output,
            progress,
            self.settings.max_redirects,
        )
        .await?;

        tracing::info!("Bilibili: saved {}", output.display());
        Ok(output)
    }

    pub fn default_quality(&self) -> u32 {
        self.settings.default_quality
    }
}

#[async_trait]
impl PlatformDownloader for BilibiliTvDownloader {
    fn name(&self) -> &str {
        "bilibili"
    }

    fn can_handle(&self, url: &str) -> bool {
        if let Ok(parsed) = url::Url::parse(url) {
            if let Some(host) = parsed.host_str() {
                let host = host.to_lowercase();
                return host == "bilibili.tv" || host.ends_with(".bilibili.tv");
            }
        }
        false
    }

    async fn get_media_info(&self, url: &str) -> anyhow::Result<MediaInfo> {
        let aid = Self::parse_url(url)
            .ok_or_else(|| anyhow!("Could not extract Bilibili video id"))?;

        let response = self.get_play_url(&aid, DEFAULT_PLAYURL_QUALITY).await?;
        let duration = response.duration_seconds();

        let variants = prefer_quality(response.into_variants()?, self.default_quality());

        let qualities: Vec<VideoQuality> = variants
            .into_iter()
            .filter(|v| !v.video_resource.url.is_empty())
            .map(|v| VideoQuality {
                label: v
                    .stream_info
                    .desc_words
                    .clone()
                    .unwrap_or_else(|| v.stream_info.quality.to_string()),
                url: v.video_resource.url,
                backup_url: v.video_resource.backup_url.into_iter().next(),
                format: "mp4".to_string(),
            })
            .collect();

        if qualities.is_empty() {
            return Err(anyhow!("No video found"));
        }

        Ok(MediaInfo {
            title: format!("bilibili_{}", aid),
            author: String::new(),
            platform: "bilibili".to_string(),
            duration_seconds: duration,
            thumbnail_url: None,
            available_qualities: qualities,
            media_type: MediaType::Video,
        })
    }

    async fn download(
        &self,
        info: &MediaInfo,
        opts: &DownloadOptions,
        progress: mpsc::Sender<ProgressSnapshot>,
    ) -> anyhow::Result<DownloadResult> {
        let selected = opts
            .pick(&info.available_qualities)
            .ok_or_else(|| anyhow!("No video URL available"))?;

        tokio::fs::create_dir_all(&opts.output_dir).await?;
        let filename = format!(
            "{}_{}.mp4",
            sanitize_filename::sanitize(&info.title),
            sanitize_filename::sanitize(&selected.label)
        );
        let output = opts.output_dir.join(filename);

        let bytes = direct_downloader::download_with_backup(
            &self.download_client,
            &selected.url,
            selected.backup_url.as_deref(),
            &output,
            Some(&progress),
            self.settings.max_redirects,
        )
        .await?;

        Ok(DownloadResult {
            file_path: output,
            file_size_bytes: bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(quality: u32, url: &str) -> VideoVariant {
        VideoVariant {
            video_resource: VideoResource {
                url: url.to_string(),
                backup_url: Vec::new(),
                size: None,
            },
            stream_info: StreamInfo {
                quality,
                desc_words: None,
            },
        }
    }

    #[test]
    fn parses_localized_url() {
        assert_eq!(
            BilibiliTvDownloader::parse_url("https://www.bilibili.tv/en/video/4797959484348416")
                .as_deref(),
            Some("4797959484348416")
        );
        assert_eq!(
            BilibiliTvDownloader::parse_url("https://www.bilibili.tv/id/video/2043422734?x=1")
                .as_deref(),
            Some("2043422734")
        );
    }

    #[test]
    fn parses_plain_video_url() {
        assert_eq!(
            BilibiliTvDownloader::parse_url("https://bilibili.tv/video/4797959484348416").as_deref(),
            Some("4797959484348416")
        );
    }

    #[test]
    fn parses_bare_id() {
        assert_eq!(
            BilibiliTvDownloader::parse_url("4797959484348416").as_deref(),
            Some("4797959484348416")
        );
    }

    #[test]
    fn rejects_unsupported_shapes() {
        assert_eq!(BilibiliTvDownloader::parse_url("123456789"), None);
        assert_eq!(BilibiliTvDownloader::parse_url("https://www.bilibili.com/video/BV1xx"), None);
        assert_eq!(BilibiliTvDownloader::parse_url(""), None);
    }

    #[test]
    fn id_extraction_is_deterministic() {
        let url = "https://www.bilibili.tv/en/video/4797959484348416";
        assert_eq!(
            BilibiliTvDownloader::parse_url(url),
            BilibiliTvDownloader::parse_url(url)
        );
    }

    #[test]
    fn selects_requested_quality() {
        let variants = vec![variant(16, "a"), variant(64, "b"), variant(80, "c")];
        assert_eq!(select_variant(&variants, 64).unwrap().video_resource.url, "b");
    }

    #[test]
    fn falls_back_to_first_variant() {
        let variants = vec![variant(16, "a"), variant(64, "b")];
        assert_eq!(select_variant(&variants, 112).unwrap().video_resource.url, "a");
        assert!(select_variant(&[], 64).is_none());
    }

    #[test]
    fn api_error_code_is_error() {
        let resp: PlayUrlResponse =
            serde_json::from_str(r#"{"code": -404, "message": "not found"}"#).unwrap();
        let err = resp.into_variants().unwrap_err();
        assert_eq!(err.to_string(), "API Error: not found");
    }

    #[test]
    fn empty_video_list_is_error() {
        let resp: PlayUrlResponse =
            serde_json::from_str(r#"{"code": 0, "message": "0", "data": {"playurl": {"video": []}}}"#)
                .unwrap();
        assert_eq!(resp.into_variants().unwrap_err().to_string(), "No video found");
    }

    #[test]
    fn parses_variants_and_duration() {
        let json = r#"{
            "code": 0,
            "message": "0",
            "data": {"playurl": {"duration": 125000, "video": [
                {"video_resource": {"url": "https://up.example/480.mp4", "backup_url": ["https://bk.example/480.mp4"]},
                 "stream_info": {"quality": 32, "desc_words": "480P"}}
            ]}}
        }"#;
        let resp: PlayUrlResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.duration_seconds(), Some(125.0));
        let variants = resp.into_variants().unwrap();
        assert_eq!(variants[0].stream_info.desc_words.as_deref(), Some("480P"));
        assert_eq!(variants[0].video_resource.backup_url[0], "https://bk.example/480.mp4");
    }

    #[test]
    fn null_fields_read_as_empty() {
        let json = r#"{
            "code": 0,
            "message": null,
            "data": {"playurl": {"duration": null, "video": [
                {"video_resource": {"url": "https://up.example/360.mp4", "backup_url": null},
                 "stream_info": {"quality": 16}},
                {"video_resource": {"url": null, "backup_url": null},
                 "stream_info": {"quality": 64, "desc_words": null}}
            ]}}
        }"#;
        let resp: PlayUrlResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.message, "");
        assert_eq!(resp.duration_seconds(), None);
        let variants = resp.into_variants().unwrap();
        assert!(variants[0].video_resource.backup_url.is_empty());
        assert_eq!(variants[1].video_resource.url, "");
    }

    #[test]
    fn null_video_list_is_no_video() {
        let resp: PlayUrlResponse =
            serde_json::from_str(r#"{"code": 0, "data": {"playurl": {"video": null}}}"#).unwrap();
        assert_eq!(resp.into_variants().unwrap_err().to_string(), "No video found");
    }

    #[test]
    fn preferred_quality_moves_to_front() {
        let variants = vec![variant(64, "a"), variant(32, "b"), variant(16, "c")];
        let ordered = prefer_quality(variants, 16);
        let urls: Vec<&str> = ordered.iter().map(|v| v.video_resource.url.as_str()).collect();
        assert_eq!(urls, vec!["c", "a", "b"]);

        let unchanged = prefer_quality(vec![variant(64, "a"), variant(32, "b")], 16);
        assert_eq!(unchanged[0].video_resource.url, "a");
    }

    #[test]
    fn handles_bilibili_tv_hosts_only() {
        let dl = BilibiliTvDownloader::new();
        assert!(dl.can_handle("https://www.bilibili.tv/en/video/4797959484348416"));
        assert!(!dl.can_handle("https://www.bilibili.com/video/BV1xx"));
    }
}
