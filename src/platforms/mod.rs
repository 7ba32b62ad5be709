pub mod bilibili;
pub mod dailymotion;
pub mod mediafire;
pub mod tiktok;
pub mod traits;
pub mod youtube;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    MediaFire,
    Bilibili,
    Dailymotion,
    TikTok,
    YouTube,
}

impl Platform {
    pub const ALL: [Platform; 5] = [
        Platform::MediaFire,
        Platform::Bilibili,
        Platform::Dailymotion,
        Platform::TikTok,
        Platform::YouTube,
    ];

    pub fn from_url(url: &str) -> Option<Self> {
        let parsed = url::Url::parse(url).ok()?;
        let host = parsed.host_str()?.to_lowercase();
        let host = host.strip_prefix("www.").unwrap_or(&host);

        let on = |domain: &str| host == domain || host.ends_with(&format!(".{}", domain));

        if on("mediafire.com") {
            Some(Platform::MediaFire)
        } else if on("bilibili.tv") {
            Some(Platform::Bilibili)
        } else if on("dailymotion.com") || host == "dai.ly" {
            Some(Platform::Dailymotion)
        } else if on("tiktok.com") {
            Some(Platform::TikTok)
        } else if on("youtube.com") || on("youtube-nocookie.com") || host == "youtu.be" {
            Some(Platform::YouTube)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::MediaFire => "mediafire",
            Platform::Bilibili => "bilibili",
            Platform::Dailymotion => "dailymotion",
            Platform::TikTok => "tiktok",
            Platform::YouTube => "youtube",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
