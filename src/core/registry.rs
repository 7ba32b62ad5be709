use mediafetch_core::models::settings::AppSettings;

use crate::platforms::bilibili::BilibiliTvDownloader;
use crate::platforms::dailymotion::DailymotionDownloader;
use crate::platforms::mediafire::MediaFireDownloader;
use crate::platforms::tiktok::TikTokDownloader;
use crate::platforms::traits::PlatformDownloader;
use crate::platforms::youtube::YouTubeDownloader;

pub struct PlatformRegistry {
    platforms: Vec<Box<dyn PlatformDownloader>>,
}

impl PlatformRegistry {
    pub fn new() -> Self {
        Self {
            platforms: Vec::new(),
        }
    }

    /// Registry holding every client, each built from its own settings section.
    pub fn from_settings(settings: &AppSettings) -> Self {
        let proxy = Some(&settings.proxy);
        let mut registry = Self::new();
        registry.register(Box::new(MediaFireDownloader::with_settings(
            &settings.mediafire,
            proxy,
        )));
        registry.register(Box::new(BilibiliTvDownloader::with_settings(
            settings.bilibili.clone(),
            proxy,
        )));
        registry.register(Box::new(DailymotionDownloader::with_settings(
            settings.dailymotion.clone(),
            proxy,
        )));
        registry.register(Box::new(TikTokDownloader::with_settings(
            settings.tiktok.clone(),
            proxy,
        )));
        registry.register(Box::new(YouTubeDownloader::with_settings(
            settings.youtube.clone(),
            proxy,
        )));
        registry
    }

    pub fn register(&mut self, platform: Box<dyn PlatformDownloader>) {
        self.platforms.push(platform);
    }

    pub fn find_platform(&self, url: &str) -> Option<&dyn PlatformDownloader> {
        self.platforms
            .iter()
            .find(|p| p.can_handle(url))
            .map(|p| p.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.platforms.iter().map(|p| p.name()).collect()
    }
}

impl Default for PlatformRegistry {
    fn default() -> Self {
        Self::new()
    }
}
