use std::path::Path;

use anyhow::anyhow;
use async_trait::async_trait;
use mediafetch_core::core::events::ProgressSnapshot;
use mediafetch_core::models::settings::{ProxySettings, TikTokSettings};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::core::{direct_downloader, http_client};
use crate::models::media::{
    DownloadOptions, DownloadResult, MediaInfo, MediaType, VideoQuality,
};
use crate::platforms::traits::PlatformDownloader;

const MAX_REDIRECTS: u32 = 5;

/// A media entry as the aggregator returns it.
#[derive(Debug, Clone, Deserialize)]
struct RawMedia {
    #[serde(default)]
    quality: Option<String>,
    #[serde(default)]
    extension: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(flatten)]
    extra: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaVariant {
    pub quality: Option<String>,
    pub extension: String,
    pub url: Option<String>,
    /// Any further fields the aggregator attached (size, type, ...).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct AnalyzeResponse {
    #[serde(default)]
    error: Value,
    #[serde(default)]
    id: Value,
    title: Option<String>,
    #[serde(default)]
    author: Value,
    thumbnail: Option<String>,
    #[serde(default)]
    duration: Value,
    filename: Option<String>,
    #[serde(default)]
    medias: Vec<RawMedia>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoAnalysis {
    pub id: Value,
    pub title: Option<String>,
    pub author: Value,
    pub thumbnail: Option<String>,
    pub duration: Value,
    pub filename: Option<String>,
    pub medias: Vec<MediaVariant>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mp3Conversion {
    pub success: bool,
    pub download_url: String,
}

pub struct TikTokDownloader {
    client: reqwest::Client,
    download_client: reqwest::Client,
    settings: TikTokSettings,
}

impl Default for TikTokDownloader {
    fn default() -> Self {
        Self::new()
    }
}

impl TikTokDownloader {
    pub fn new() -> Self {
        Self::with_settings(TikTokSettings::default(), None)
    }

    pub fn with_settings(settings: TikTokSettings, proxy: Option<&ProxySettings>) -> Self {
        Self {
            client: http_client::build_client(&settings.http, proxy),
            download_client: http_client::build_download_client(&settings.http, proxy),
            settings,
        }
    }

    fn api(&self, path: &str) -> String {
        format!("{}/{}", self.settings.api_base.trim_end_matches('/'), path)
    }

    /// Numeric post id of a canonical `/@user/video/<id>` link. Short links
    /// (`vt.tiktok.com/...`) carry no id and yield `None`.
    pub fn extract_post_id(url: &str) -> Option<String> {
        let parsed = url::Url::parse(url).ok()?;
        let segments: Vec<&str> = parsed.path().split('/').filter(|s| !s.is_empty()).collect();

        if segments.len() >= 3
            && segments[0].starts_with('@')
            && (segments[1] == "video" || segments[1] == "photo")
        {
            let id = segments[2];
            if id.chars().all(|c| c.is_ascii_digit()) {
                return Some(id.to_string());
            }
        }

        None
    }

    pub async fn analyze_video(&self, share_url: &str) -> anyhow::Result<VideoAnalysis> {
        let form = [("url", share_url), ("sitename", self.settings.sitename.as_str())];
        let body = self
            .client
            .post(self.api("analyze"))
            .form(&form)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                tracing::warn!("TikTok: analyze request failed: {}", e);
                e
            })?
            .text()
            .await?;

        let data: AnalyzeResponse = serde_json::from_str(&body)
            .map_err(|e| anyhow!("Failed to parse analyze response: {}", e))?;

        if data.error == Value::Bool(true) {
            return Err(anyhow!("Failed to analyze video"));
        }

        tracing::debug!("TikTok: {} media entries for {}", data.medias.len(), share_url);

        Ok(VideoAnalysis {
            id: data.id,
            title: data.title,
            author: data.author,
            thumbnail: data.thumbnail,
            duration: data.duration,
            filename: data.filename,
            medias: prepare_medias(data.medias),
        })
    }

    pub async fn convert_to_mp3(
        &self,
        media_url: &str,
        video_id: &str,
    ) -> anyhow::Result<Mp3Conversion> {
        let form = [("url", media_url), ("id", video_id)];
        let data: Value = self
            .client
            .post(self.api("converter"))
            .form(&form)
            .send()
            .await?
            .json()
            .await?;

        if data.get("error") != Some(&Value::Bool(false)) {
            return Err(anyhow!("Conversion failed"));
        }

        let job = match data.get("url") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };

        Ok(Mp3Conversion {
            success: true,
            download_url: format!(
                "{}?id={}&site={}",
                self.api("downloader"),
                job,
                self.settings.sitename
            ),
        })
    }

    /// Aggregator proxy URL that serves `media_url` as an attachment.
    pub fn download_url(&self, media_url: &str) -> String {
        format!(
            "{}?url={}&sitename={}",
            self.api("download"),
            urlencoding::encode(media_url),
            self.settings.sitename
        )
    }

    pub async fn download_video(&self, media_url: &str, output: &Path) -> anyhow::Result<u64> {
        self.fetch_to_file(media_url, output, None).await
    }

    async fn fetch_to_file(
        &self,
        media_url: &str,
        output: &Path,
        progress: Option<&mpsc::Sender<ProgressSnapshot>>,
    ) -> anyhow::Result<u64> {
        let url = self.download_url(media_url);
        direct_downloader::download_direct(&self.download_client, &url, output, progress, MAX_REDIRECTS)
            .await
            .map_err(|e| {
                tracing::warn!("TikTok: download of {} failed: {}", media_url, e);
                e
            })
    }
}

pub fn format_quality(quality: &str) -> String {
    match quality {
        "hd_no_watermark" => "1080p".to_string(),
        "no_watermark" => "720p".to_string(),
        "audio" => "128kbps".to_string(),
        other => other.to_string(),
    }
}

/// Drops watermarked entries, normalizes labels and extensions, then reverses
/// the aggregator's order.
fn prepare_medias(medias: Vec<RawMedia>) -> Vec<MediaVariant> {
    let mut out: Vec<MediaVariant> = medias
        .into_iter()
        .filter(|m| m.quality.as_deref() != Some("watermark"))
        .map(|m| MediaVariant {
            quality: m.quality.as_deref().map(format_quality),
            extension: m
                .extension
                .filter(|e| !e.is_empty())
                .map(|e| e.to_uppercase())
                .unwrap_or_else(|| "MP4".to_string()),
            url: m.url,
            extra: m.extra,
        })
        .collect();
    out.reverse();
    out
}

#[async_trait]
impl PlatformDownloader for TikTokDownloader {
    fn name(&self) -> &str {
        "tiktok"
    }

    fn can_handle(&self, url: &str) -> bool {
        if let Ok(parsed) = url::Url::parse(url) {
            if let Some(host) = parsed.host_str() {
                let host = host.to_lowercase();
                return host == "tiktok.com" || host.ends_with(".tiktok.com");
            }
        }
        false
    }

    async fn get_media_info(&self, url: &str) -> anyhow::Result<MediaInfo> {
        let analysis = self.analyze_video(url).await?;

        let author = match &analysis.author {
            Value::String(s) => s.clone(),
            Value::Object(o) => o
                .get("nickname")
                .or_else(|| o.get("unique_id"))
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            _ => String::new(),
        };

        let available_qualities = analysis
            .medias
            .iter()
            .filter_map(|m| {
                Some(VideoQuality {
                    label: m.quality.clone().unwrap_or_default(),
                    url: m.url.clone()?,
                    backup_url: None,
                    format: m.extension.to_lowercase(),
                })
            })
            .collect();

        Ok(MediaInfo {
            title: analysis
                .title
                .or(analysis.filename)
                .unwrap_or_else(|| "tiktok_video".to_string()),
            author,
            platform: "tiktok".to_string(),
            duration_seconds: analysis.duration.as_f64(),
            thumbnail_url: analysis.thumbnail,
            available_qualities,
            media_type: MediaType::Video,
        })
    }

    async fn download(
        &self,
        info: &MediaInfo,
        opts: &DownloadOptions,
        progress: mpsc::Sender<ProgressSnapshot>,
    ) -> anyhow::Result<DownloadResult> {
        let media = opts
            .pick(&info.available_qualities)
            .ok_or_else(|| anyhow!("No media variant available"))?;

        let filename = sanitize_filename::sanitize(format!("{}.{}", info.title, media.format));
        let output = opts.output_dir.join(filename);

        let bytes = self.fetch_to_file(&media.url, &output, Some(&progress)).await?;

        Ok(DownloadResult {
            file_path: output,
            file_size_bytes: bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(quality: &str, extension: Option<&str>, url: &str) -> RawMedia {
        RawMedia {
            quality: Some(quality.into()),
            extension: extension.map(String::from),
            url: Some(url.into()),
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn quality_labels() {
        assert_eq!(format_quality("hd_no_watermark"), "1080p");
        assert_eq!(format_quality("no_watermark"), "720p");
        assert_eq!(format_quality("audio"), "128kbps");
        assert_eq!(format_quality("custom"), "custom");
    }

    #[test]
    fn medias_are_filtered_normalized_and_reversed() {
        let out = prepare_medias(vec![
            raw("watermark", Some("mp4"), "https://a/wm"),
            raw("no_watermark", Some("mp4"), "https://a/sd"),
            raw("hd_no_watermark", None, "https://a/hd"),
            raw("audio", Some("mp3"), "https://a/audio"),
        ]);

        let summary: Vec<(&str, &str, &str)> = out
            .iter()
            .map(|m| {
                (
                    m.quality.as_deref().unwrap_or_default(),
                    m.extension.as_str(),
                    m.url.as_deref().unwrap_or_default(),
                )
            })
            .collect();
        assert_eq!(
            summary,
            vec![
                ("128kbps", "MP3", "https://a/audio"),
                ("1080p", "MP4", "https://a/hd"),
                ("720p", "MP4", "https://a/sd"),
            ]
        );
    }

    #[test]
    fn extra_fields_survive() {
        let media: RawMedia = serde_json::from_value(serde_json::json!({
            "quality": "audio",
            "extension": "mp3",
            "url": "https://a/audio",
            "size": 12345
        }))
        .unwrap();
        let out = prepare_medias(vec![media]);
        assert_eq!(out[0].extra.get("size"), Some(&serde_json::json!(12345)));

        let json = serde_json::to_value(&out[0]).unwrap();
        assert_eq!(json["size"], 12345);
        assert_eq!(json["quality"], "128kbps");
    }

    #[test]
    fn null_quality_and_url_pass_through() {
        let medias: Vec<RawMedia> = serde_json::from_value(serde_json::json!([
            {"quality": null, "extension": "mp4", "url": null},
            {"quality": "no_watermark", "extension": null, "url": "https://a/sd"}
        ]))
        .unwrap();
        let out = prepare_medias(medias);

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].quality.as_deref(), Some("720p"));
        assert_eq!(out[1].quality, None);
        assert_eq!(out[1].url, None);
        assert_eq!(out[1].extension, "MP4");

        let json = serde_json::to_value(&out[1]).unwrap();
        assert_eq!(json["quality"], serde_json::Value::Null);
        assert_eq!(json["url"], serde_json::Value::Null);
    }

    #[test]
    fn download_url_percent_encodes_media() {
        let dl = TikTokDownloader::new();
        assert_eq!(
            dl.download_url("https://cdn.example/v.mp4?a=1&b=2"),
            "https://myapi.app/api/download?url=https%3A%2F%2Fcdn.example%2Fv.mp4%3Fa%3D1%26b%3D2&sitename=tikmate.cc"
        );
    }

    #[test]
    fn post_id_from_canonical_link() {
        assert_eq!(
            TikTokDownloader::extract_post_id("https://www.tiktok.com/@someone/video/7301234567890123456")
                .as_deref(),
            Some("7301234567890123456")
        );
        assert_eq!(TikTokDownloader::extract_post_id("https://vt.tiktok.com/ZSPrmoRNv/"), None);
    }

    #[test]
    fn handles_tiktok_hosts() {
        let dl = TikTokDownloader::new();
        assert!(dl.can_handle("https://vt.tiktok.com/ZSPrmoRNv/"));
        assert!(dl.can_handle("https://www.tiktok.com/@a/video/1"));
        assert!(!dl.can_handle("https://tiktok.example.com/"));
    }
}
