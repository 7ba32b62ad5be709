use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::fs_paths::{AppPaths, DesktopPaths};

const FIREFOX_UA: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:146.0) Gecko/20100101 Firefox/146.0";
const CHROME_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const ANDROID_UA: &str = "Mozilla/5.0 (Linux; Android 10; K) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/142.0.0.0 Mobile Safari/537.36";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    pub schema_version: u32,
    #[serde(default)]
    pub download: DownloadSettings,
    #[serde(default)]
    pub proxy: ProxySettings,
    #[serde(default)]
    pub mediafire: MediaFireSettings,
    #[serde(default)]
    pub bilibili: BilibiliSettings,
    #[serde(default)]
    pub dailymotion: DailymotionSettings,
    #[serde(default)]
    pub tiktok: TikTokSettings,
    #[serde(default)]
    pub youtube: YouTubeSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadSettings {
    #[serde(default = "default_output_dir")]
    pub default_output_dir: PathBuf,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            default_output_dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    DesktopPaths.downloads_dir()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProxySettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_proxy_type")]
    pub proxy_type: String,
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_proxy_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

fn default_proxy_type() -> String {
    "http".into()
}

fn default_proxy_port() -> u16 {
    8080
}

/// Request shape shared by every client: a static header set and an
/// optional whole-request timeout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HttpSettings {
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn headers(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaFireSettings {
    #[serde(default = "default_mediafire_http")]
    pub http: HttpSettings,
}

impl Default for MediaFireSettings {
    fn default() -> Self {
        Self {
            http: default_mediafire_http(),
        }
    }
}

fn default_mediafire_http() -> HttpSettings {
    HttpSettings {
        headers: headers(&[
            ("User-Agent", CHROME_UA),
            (
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
            ("Accept-Language", "en-US,en;q=0.5"),
            ("Upgrade-Insecure-Requests", "1"),
        ]),
        timeout_secs: Some(30),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BilibiliSettings {
    #[serde(default = "default_bilibili_api_base")]
    pub api_base: String,
    #[serde(default = "default_bilibili_http")]
    pub http: HttpSettings,
    #[serde(default = "default_bilibili_quality")]
    pub default_quality: u32,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: u32,
}

impl Default for BilibiliSettings {
    fn default() -> Self {
        Self {
            api_base: default_bilibili_api_base(),
            http: default_bilibili_http(),
            default_quality: default_bilibili_quality(),
            max_redirects: default_max_redirects(),
        }
    }
}

fn default_bilibili_api_base() -> String {
    "https://api.bilibili.tv".into()
}

fn default_bilibili_quality() -> u32 {
    16
}

fn default_max_redirects() -> u32 {
    5
}

fn default_bilibili_http() -> HttpSettings {
    HttpSettings {
        headers: headers(&[
            ("User-Agent", FIREFOX_UA),
            ("Accept", "*/*"),
            ("Accept-Language", "en-US,en;q=0.5"),
            ("Origin", "https://www.bilibili.tv"),
            ("Referer", "https://www.bilibili.tv/"),
            ("Sec-Fetch-Dest", "empty"),
            ("Sec-Fetch-Mode", "cors"),
            ("Sec-Fetch-Site", "cross-site"),
        ]),
        timeout_secs: None,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailymotionSettings {
    #[serde(default = "default_dailymotion_geo_base")]
    pub geo_base: String,
    #[serde(default = "default_dailymotion_embedder")]
    pub embedder: String,
    #[serde(default = "default_dailymotion_referer")]
    pub referer: String,
    #[serde(default = "default_dailymotion_player_id")]
    pub player_id: String,
    #[serde(default = "default_dailymotion_http")]
    pub http: HttpSettings,
}

impl Default for DailymotionSettings {
    fn default() -> Self {
        Self {
            geo_base: default_dailymotion_geo_base(),
            embedder: default_dailymotion_embedder(),
            referer: default_dailymotion_referer(),
            player_id: default_dailymotion_player_id(),
            http: default_dailymotion_http(),
        }
    }
}

fn default_dailymotion_geo_base() -> String {
    "https://geo.dailymotion.com".into()
}

fn default_dailymotion_embedder() -> String {
    "https://www.dailymotion.com/id".into()
}

fn default_dailymotion_referer() -> String {
    "https://cse.knospe.co".into()
}

fn default_dailymotion_player_id() -> String {
    "x138o4".into()
}

fn default_dailymotion_http() -> HttpSettings {
    HttpSettings {
        headers: headers(&[
            ("User-Agent", ANDROID_UA),
            ("Accept", "application/json, text/plain, */*"),
            ("Accept-Language", "en-US,en;q=0.9"),
            ("Referer", "https://cse.knospe.co"),
        ]),
        timeout_secs: Some(30),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TikTokSettings {
    #[serde(default = "default_tiktok_api_base")]
    pub api_base: String,
    #[serde(default = "default_tiktok_sitename")]
    pub sitename: String,
    #[serde(default)]
    pub http: HttpSettings,
}

impl Default for TikTokSettings {
    fn default() -> Self {
        Self {
            api_base: default_tiktok_api_base(),
            sitename: default_tiktok_sitename(),
            http: HttpSettings::default(),
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            headers: BTreeMap::new(),
            timeout_secs: None,
        }
    }
}

fn default_tiktok_api_base() -> String {
    "https://myapi.app/api".into()
}

fn default_tiktok_sitename() -> String {
    "tikmate.cc".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YouTubeSettings {
    #[serde(default = "default_youtube_base_url")]
    pub base_url: String,
    #[serde(default = "default_youtube_api_key")]
    pub api_key: String,
    #[serde(default = "default_youtube_format")]
    pub default_format: String,
    #[serde(default = "default_poll_max_attempts")]
    pub poll_max_attempts: u32,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_youtube_http")]
    pub http: HttpSettings,
}

impl Default for YouTubeSettings {
    fn default() -> Self {
        Self {
            base_url: default_youtube_base_url(),
            api_key: default_youtube_api_key(),
            default_format: default_youtube_format(),
            poll_max_attempts: default_poll_max_attempts(),
            poll_interval_ms: default_poll_interval_ms(),
            http: default_youtube_http(),
        }
    }
}

fn default_youtube_base_url() -> String {
    "https://p.savenow.to".into()
}

fn default_youtube_api_key() -> String {
    "dfcb6d76f2f6a9894gjkege8a4ab232222".into()
}

fn default_youtube_format() -> String {
    "720".into()
}

fn default_poll_max_attempts() -> u32 {
    60
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_youtube_http() -> HttpSettings {
    HttpSettings {
        headers: headers(&[
            ("User-Agent", FIREFOX_UA),
            ("Accept", "*/*"),
            ("Accept-Language", "en-US,en;q=0.5"),
            ("Referer", "https://y2down.cc/"),
            ("Origin", "https://y2down.cc"),
            ("Sec-Fetch-Dest", "empty"),
            ("Sec-Fetch-Mode", "cors"),
            ("Sec-Fetch-Site", "cross-site"),
            ("Priority", "u=4"),
            ("Pragma", "no-cache"),
            ("Cache-Control", "no-cache"),
        ]),
        timeout_secs: Some(30),
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            schema_version: 1,
            download: DownloadSettings::default(),
            proxy: ProxySettings::default(),
            mediafire: MediaFireSettings::default(),
            bilibili: BilibiliSettings::default(),
            dailymotion: DailymotionSettings::default(),
            tiktok: TikTokSettings::default(),
            youtube: YouTubeSettings::default(),
        }
    }
}
