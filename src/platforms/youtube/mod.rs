use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use mediafetch_core::core::events::ProgressSnapshot;
use mediafetch_core::models::settings::{ProxySettings, YouTubeSettings};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::core::poller::{PollPolicy, PollStep};
use crate::core::{direct_downloader, http_client};
use crate::models::media::{
    DownloadOptions, DownloadResult, MediaInfo, MediaType, VideoQuality,
};
use crate::platforms::traits::PlatformDownloader;

pub const AUDIO_FORMATS: &[&str] = &["mp3", "m4a", "webm", "aac", "flac", "opus", "ogg", "wav"];
pub const VIDEO_FORMATS: &[&str] = &["4k", "1440", "1080", "720", "480", "320", "240", "144"];

const MAX_REDIRECTS: u32 = 5;

/// Handle for a conversion job queued on the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressTicket {
    pub progress_url: String,
    pub title: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YouTubeDownload {
    pub download_url: String,
    pub title: Option<String>,
    pub image: Option<String>,
}

pub struct YouTubeDownloader {
    client: reqwest::Client,
    download_client: reqwest::Client,
    settings: YouTubeSettings,
}

impl Default for YouTubeDownloader {
    fn default() -> Self {
        Self::new()
    }
}

impl YouTubeDownloader {
    pub fn new() -> Self {
        Self::with_settings(YouTubeSettings::default(), None)
    }

    pub fn with_settings(settings: YouTubeSettings, proxy: Option<&ProxySettings>) -> Self {
        Self {
            client: http_client::build_client(&settings.http, proxy),
            download_client: http_client::build_download_client(&settings.http, proxy),
            settings,
        }
    }

    pub fn extract_video_id(url: &str) -> Option<String> {
        let parsed = url::Url::parse(url).ok()?;
        let host = parsed.host_str()?.to_lowercase();
        let segments: Vec<&str> = parsed.path().split('/').filter(|s| !s.is_empty()).collect();

        if host == "youtu.be" {
            return segments.first().map(|s| s.to_string());
        }

        if host.contains("youtube.com") || host.contains("youtube-nocookie.com") {
            match segments.first() {
                Some(&"shorts") | Some(&"embed") | Some(&"live") => {
                    return segments.get(1).map(|s| s.to_string());
                }
                _ => {}
            }

            return parsed
                .query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| v.to_string());
        }

        None
    }

    /// Unknown format codes are only reported; the request still goes out.
    pub fn validate_format(format: &str) -> bool {
        if is_audio_format(format) || VIDEO_FORMATS.contains(&format) {
            return true;
        }
        tracing::warn!("YouTube: format '{}' may not be supported", format);
        false
    }

    pub fn default_format(&self) -> &str {
        &self.settings.default_format
    }

    fn poll_policy(&self) -> PollPolicy {
        PollPolicy::new(
            self.settings.poll_max_attempts,
            Duration::from_millis(self.settings.poll_interval_ms),
        )
    }

    pub async fn request_download(&self, video_url: &str, format: &str) -> Option<ProgressTicket> {
        Self::validate_format(format);

        let endpoint = format!(
            "{}/ajax/download.php",
            self.settings.base_url.trim_end_matches('/')
        );
        let params = [
            ("copyright", "0"),
            ("format", format),
            ("url", video_url),
            ("api", self.settings.api_key.as_str()),
        ];

        let data: Value = match self.get_json(&endpoint, &params).await {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!("YouTube: download request failed: {}", e);
                return None;
            }
        };

        let progress_url = data
            .get("progress_url")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())?;

        let info_field = |key: &str| {
            data.get("info")
                .and_then(|i| i.get(key))
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(String::from)
        };

        Some(ProgressTicket {
            progress_url: progress_url.to_string(),
            title: info_field("title"),
            image: info_field("image"),
        })
    }

    /// Polls the job until it yields a download URL, reports a failure, or
    /// the attempt budget runs out.
    pub async fn check_progress(&self, progress_url: &str) -> Option<String> {
        self.poll_policy()
            .run(|_| self.poll_once(progress_url))
            .await
    }

    async fn poll_once(&self, progress_url: &str) -> anyhow::Result<PollStep<String>> {
        let data = self.get_json(progress_url, &[]).await?;
        if let Some(p) = data.get("progress") {
            tracing::debug!("YouTube: conversion progress {}", p);
        }
        Ok(classify_progress(&data))
    }

    async fn get_json(&self, url: &str, params: &[(&str, &str)]) -> anyhow::Result<Value> {
        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    pub async fn download(&self, video_url: &str, format: &str) -> Option<YouTubeDownload> {
        let ticket = self.request_download(video_url, format).await?;
        let download_url = self.check_progress(&ticket.progress_url).await?;

        Some(YouTubeDownload {
            download_url,
            title: ticket.title,
            image: ticket.image,
        })
    }
}

pub fn is_audio_format(format: &str) -> bool {
    AUDIO_FORMATS.contains(&format)
}

/// File extension of the gateway's output for a format code.
pub fn output_extension(format: &str) -> &str {
    if is_audio_format(format) {
        format
    } else {
        "mp4"
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn classify_progress(data: &Value) -> PollStep<String> {
    if let Some(url) = data
        .get("download_url")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
    {
        return PollStep::Done(url.to_string());
    }

    let errored = data.get("error").is_some_and(is_truthy);
    let succeeded = data.get("success").is_some_and(is_truthy);
    let text = data.get("text").and_then(|v| v.as_str()).unwrap_or("");

    if errored || (!succeeded && text.to_lowercase().contains("error")) {
        let message = data
            .get("message")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("Unknown error");
        return PollStep::Failed(message.to_string());
    }

    PollStep::Pending
}

#[async_trait]
impl PlatformDownloader for YouTubeDownloader {
    fn name(&self) -> &str {
        "youtube"
    }

    fn can_handle(&self, url: &str) -> bool {
        if let Ok(parsed) = url::Url::parse(url) {
            if let Some(host) = parsed.host_str() {
                let host = host.to_lowercase();
                return host == "youtube.com"
                    || host.ends_with(".youtube.com")
                    || host == "youtu.be"
                    || host == "youtube-nocookie.com"
                    || host.ends_with(".youtube-nocookie.com");
            }
        }
        false
    }

    async fn get_media_info(&self, url: &str) -> anyhow::Result<MediaInfo> {
        let format = self.default_format().to_string();
        let result = self
            .download(url, &format)
            .await
            .ok_or_else(|| anyhow!("YouTube conversion did not produce a download link"))?;

        let title = result.title.clone().unwrap_or_else(|| {
            Self::extract_video_id(url).unwrap_or_else(|| "youtube_video".to_string())
        });

        Ok(MediaInfo {
            title,
            author: String::new(),
            platform: "youtube".to_string(),
            duration_seconds: None,
            thumbnail_url: result.image,
            available_qualities: vec![VideoQuality {
                label: format.clone(),
                url: result.download_url,
                backup_url: None,
                format: output_extension(&format).to_string(),
            }],
            media_type: if is_audio_format(&format) {
                MediaType::Audio
            } else {
                MediaType::Video
            },
        })
    }

    async fn download(
        &self,
        info: &MediaInfo,
        opts: &DownloadOptions,
        progress: mpsc::Sender<ProgressSnapshot>,
    ) -> anyhow::Result<DownloadResult> {
        let quality = opts
            .pick(&info.available_qualities)
            .ok_or_else(|| anyhow!("No download URL available"))?;

        let filename = sanitize_filename::sanitize(format!("{}.{}", info.title, quality.format));
        let output = opts.output_dir.join(filename);

        let bytes = direct_downloader::download_direct(
            &self.download_client,
            &quality.url,
            &output,
            Some(&progress),
            MAX_REDIRECTS,
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
    use serde_json::json;

    #[test]
    fn known_formats_validate() {
        assert!(YouTubeDownloader::validate_format("mp3"));
        assert!(YouTubeDownloader::validate_format("720"));
        assert!(YouTubeDownloader::validate_format("4k"));
        assert!(!YouTubeDownloader::validate_format("8k"));
    }

    #[test]
    fn extensions_follow_format_kind() {
        assert_eq!(output_extension("mp3"), "mp3");
        assert_eq!(output_extension("flac"), "flac");
        assert_eq!(output_extension("1080"), "mp4");
    }

    #[test]
    fn video_id_variants() {
        let cases = [
            ("https://www.youtube.com/watch?v=daQSMxfvelw", Some("daQSMxfvelw")),
            ("https://youtu.be/daQSMxfvelw", Some("daQSMxfvelw")),
            ("https://www.youtube.com/shorts/abc123", Some("abc123")),
            ("https://www.youtube.com/embed/xyz", Some("xyz")),
            ("https://example.com/watch?v=nope", None),
        ];
        for (url, expected) in cases {
            assert_eq!(YouTubeDownloader::extract_video_id(url).as_deref(), expected, "{}", url);
        }
    }

    #[test]
    fn download_url_is_done() {
        assert_eq!(
            classify_progress(&json!({"download_url": "https://x/y.mp4"})),
            PollStep::Done("https://x/y.mp4".into())
        );
    }

    #[test]
    fn blank_download_url_is_pending() {
        assert_eq!(
            classify_progress(&json!({"download_url": "   ", "progress": 10})),
            PollStep::Pending
        );
        assert_eq!(classify_progress(&json!({"progress": 50})), PollStep::Pending);
    }

    #[test]
    fn error_flag_is_terminal() {
        assert_eq!(
            classify_progress(&json!({"error": true, "message": "bad video"})),
            PollStep::Failed("bad video".into())
        );
    }

    #[test]
    fn error_text_without_success_is_terminal() {
        assert_eq!(
            classify_progress(&json!({"success": 0, "text": "Conversion ERROR"})),
            PollStep::Failed("Unknown error".into())
        );
    }

    #[test]
    fn error_text_with_success_keeps_polling() {
        assert_eq!(
            classify_progress(&json!({"success": 1, "text": "recovered from error"})),
            PollStep::Pending
        );
    }

    #[test]
    fn truthiness() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(is_truthy(&json!("x")));
        assert!(is_truthy(&json!(2)));
        assert!(is_truthy(&json!({})));
    }
}
