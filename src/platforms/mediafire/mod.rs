use std::sync::LazyLock;

use anyhow::anyhow;
use async_trait::async_trait;
use mediafetch_core::core::events::ProgressSnapshot;
use mediafetch_core::models::settings::{MediaFireSettings, ProxySettings};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::core::{direct_downloader, http_client, mime};
use crate::models::media::{
    DownloadOptions, DownloadResult, MediaInfo, MediaType, VideoQuality,
};
use crate::platforms::traits::PlatformDownloader;

const MAX_REDIRECTS: u32 = 5;

static FILE_SIZE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\(([0-9.]+\s*[KMGT]?B)\)").unwrap());

static OG_TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[property="og:title"]"#).unwrap());
static TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());

/// Download-button candidates, most specific first.
static BUTTON_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    ["#downloadButton", "a.input.popsok", ".download_link a.input"]
        .iter()
        .map(|s| Selector::parse(s).unwrap())
        .collect()
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    pub file_name: Option<String>,
    pub download_url: String,
    pub mimetype: Option<String>,
    pub file_size: Option<String>,
}

/// The anchor a strategy settled on.
#[derive(Debug, Clone, PartialEq)]
struct DownloadLink {
    href: String,
    text: String,
}

type LinkStrategy = Box<dyn Fn(&Html) -> Option<DownloadLink> + Send + Sync>;

fn link_strategies() -> Vec<LinkStrategy> {
    BUTTON_SELECTORS
        .iter()
        .map(|sel| -> LinkStrategy { Box::new(move |doc: &Html| first_link(doc, sel)) })
        .collect()
}

fn first_link(doc: &Html, selector: &Selector) -> Option<DownloadLink> {
    let el: ElementRef = doc.select(selector).next()?;
    let href = el.value().attr("href").filter(|h| !h.is_empty())?;
    Some(DownloadLink {
        href: href.to_string(),
        text: el.text().collect::<String>(),
    })
}

pub struct MediaFireDownloader {
    client: reqwest::Client,
    download_client: reqwest::Client,
}

impl Default for MediaFireDownloader {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaFireDownloader {
    pub fn new() -> Self {
        Self::with_settings(&MediaFireSettings::default(), None)
    }

    pub fn with_settings(settings: &MediaFireSettings, proxy: Option<&ProxySettings>) -> Self {
        Self {
            client: http_client::build_client(&settings.http, proxy),
            download_client: http_client::build_download_client(&settings.http, proxy),
        }
    }

    /// Scrapes a file page for its direct link. Every failure, from the
    /// request to a page without a download button, collapses to `None`.
    pub async fn extract_download_url(&self, page_url: &str) -> Option<FileInfo> {
        let html = match self.fetch_page(page_url).await {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!("MediaFire: failed to fetch {}: {}", page_url, e);
                return None;
            }
        };

        let info = Self::parse_page(&html);
        if info.is_none() {
            tracing::debug!("MediaFire: no download button on {}", page_url);
        }
        info
    }

    async fn fetch_page(&self, url: &str) -> anyhow::Result<String> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }

    pub fn parse_page(html: &str) -> Option<FileInfo> {
        let doc = Html::parse_document(html);

        let link = link_strategies()
            .iter()
            .fold(None, |found, strategy| found.or_else(|| strategy(&doc)))?;

        let download_url = normalize_link(&link.href);
        let file_name = extract_filename(&doc, &download_url);
        let mimetype = mime::mime_for_filename(file_name.as_deref()).map(str::to_string);

        Some(FileInfo {
            file_name,
            mimetype,
            file_size: extract_file_size(&link.text),
            download_url,
        })
    }
}

/// `//host/path` becomes `https://host/path`; anything else is returned as is.
pub fn normalize_link(href: &str) -> String {
    if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href.to_string()
    }
}

pub fn extract_file_size(text: &str) -> Option<String> {
    FILE_SIZE_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn extract_filename(doc: &Html, download_url: &str) -> Option<String> {
    if let Some(og) = doc
        .select(&OG_TITLE)
        .next()
        .and_then(|el| el.value().attr("content"))
        .filter(|c| !c.is_empty())
    {
        return Some(og.to_string());
    }

    if let Some(title) = doc.select(&TITLE).next() {
        let text = title.text().collect::<String>();
        let name = text.split(" - ").next().unwrap_or("").trim();
        if !name.is_empty() {
            return Some(name.to_string());
        }
    }

    filename_from_url(download_url)
}

fn filename_from_url(download_url: &str) -> Option<String> {
    let parsed = url::Url::parse(download_url).ok()?;
    parsed
        .path()
        .split('/')
        .rev()
        .find(|seg| !seg.is_empty() && seg.contains('.'))
        .map(|seg| {
            urlencoding::decode(seg)
                .map(|s| s.into_owned())
                .unwrap_or_else(|_| seg.to_string())
        })
}

#[async_trait]
impl PlatformDownloader for MediaFireDownloader {
    fn name(&self) -> &str {
        "mediafire"
    }

    fn can_handle(&self, url: &str) -> bool {
        if let Ok(parsed) = url::Url::parse(url) {
            if let Some(host) = parsed.host_str() {
                let host = host.to_lowercase();
                return host == "mediafire.com" || host.ends_with(".mediafire.com");
            }
        }
        false
    }

    async fn get_media_info(&self, url: &str) -> anyhow::Result<MediaInfo> {
        let info = self
            .extract_download_url(url)
            .await
            .ok_or_else(|| anyhow!("No download link found on MediaFire page"))?;

        let format = info
            .file_name
            .as_deref()
            .and_then(|n| n.rsplit_once('.'))
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_else(|| "bin".to_string());

        Ok(MediaInfo {
            title: info
                .file_name
                .clone()
                .unwrap_or_else(|| "mediafire_file".to_string()),
            author: String::new(),
            platform: "mediafire".to_string(),
            duration_seconds: None,
            thumbnail_url: None,
            available_qualities: vec![VideoQuality {
                label: info.file_size.unwrap_or_else(|| "original".to_string()),
                url: info.download_url,
                backup_url: None,
                format,
            }],
            media_type: MediaType::File,
        })
    }

    async fn download(
        &self,
        info: &MediaInfo,
        opts: &DownloadOptions,
        progress: mpsc::Sender<ProgressSnapshot>,
    ) -> anyhow::Result<DownloadResult> {
        let file = opts
            .pick(&info.available_qualities)
            .ok_or_else(|| anyhow!("No download URL available"))?;

        let output = opts
            .output_dir
            .join(sanitize_filename::sanitize(&info.title));

        let bytes = direct_downloader::download_direct(
            &self.download_client,
            &file.url,
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
