use std::path::PathBuf;

use clap::Parser;
use mediafetch_core::fs_paths;
use mediafetch_lib::core::registry::PlatformRegistry;
use mediafetch_lib::core::url_parser;
use mediafetch_lib::models::media::DownloadOptions;
use mediafetch_lib::storage::config;
use mediafetch_lib::ProgressSnapshot;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// Resolve direct media links for MediaFire, Bilibili TV, Dailymotion,
/// TikTok and YouTube.
///
/// Examples:
///   mediafetch https://www.mediafire.com/file/abc123/report.pdf/file
///   mediafetch https://www.bilibili.tv/id/video/2043422734 --download
///   mediafetch https://www.dailymotion.com/video/x9vak0w
///   mediafetch https://vt.tiktok.com/ZSPrmoRNv/
///   mediafetch "https://www.youtube.com/watch?v=daQSMxfvelw" --format mp3
#[derive(Parser, Debug)]
#[command(name = "mediafetch")]
#[command(author, version, about, long_about = None, verbatim_doc_comment)]
struct Cli {
    /// Page or share URL
    url: String,

    /// Quality label to download (defaults to the first available)
    #[arg(short, long)]
    quality: Option<String>,

    /// Gateway format code for YouTube (mp3, m4a, 720, 1080, ...)
    #[arg(short, long)]
    format: Option<String>,

    /// Download the file instead of only printing its metadata
    #[arg(short, long)]
    download: bool,

    /// Output directory for downloads
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Settings file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(value) => println!("{}", pretty(&value)),
        Err(e) => {
            println!(
                "{}",
                pretty(&serde_json::json!({ "error": true, "message": e.to_string() }))
            );
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<serde_json::Value> {
    let settings_path = cli.config.unwrap_or_else(fs_paths::settings_file);
    let mut settings = config::load_settings(&settings_path);
    if let Some(format) = cli.format {
        settings.youtube.default_format = format;
    }

    let parsed = url_parser::parse_url(&cli.url)
        .ok_or_else(|| anyhow::anyhow!("Unsupported URL: {}", cli.url))?;
    tracing::debug!("{} content id {:?}", parsed.platform, parsed.content_id);

    let registry = PlatformRegistry::from_settings(&settings);
    let downloader = registry
        .find_platform(&parsed.url)
        .ok_or_else(|| anyhow::anyhow!("No client for {}", parsed.platform))?;

    let info = downloader.get_media_info(&parsed.url).await?;

    if !cli.download {
        return Ok(serde_json::json!({ "source": parsed, "media": info }));
    }

    let opts = DownloadOptions {
        quality: cli.quality,
        output_dir: cli.output.unwrap_or(settings.download.default_output_dir),
    };

    let (tx, rx) = mpsc::channel::<ProgressSnapshot>(64);
    let reporter = log_progress(rx);

    let result = downloader.download(&info, &opts, tx).await;
    let _ = reporter.await;
    let result = result?;

    Ok(serde_json::json!({ "source": parsed, "media": info, "download": result }))
}

/// Logs each distinct percentage; returns how many lines were logged.
fn log_progress(mut rx: mpsc::Receiver<ProgressSnapshot>) -> tokio::task::JoinHandle<usize> {
    tokio::spawn(async move {
        let mut last = String::new();
        let mut logged = 0;
        while let Some(snapshot) = rx.recv().await {
            let Some(label) = snapshot.percent_label() else {
                continue;
            };
            if label != last {
                tracing::info!("{}% ({:.2} MB)", label, snapshot.downloaded_mb());
                last = label;
                logged += 1;
            }
        }
        logged
    })
}

fn pretty(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
