use std::path::Path;

use anyhow::anyhow;
use futures::StreamExt;
use mediafetch_core::core::events::ProgressSnapshot;
use reqwest::StatusCode;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

/// Streams `url` into `output`, following 301/302 by hand so that each hop
/// starts a fresh file. The client must be built with redirects disabled
/// (see `http_client::build_download_client`).
///
/// A snapshot is sent to `progress` for every received chunk once the
/// server announced a content-length. Sends are awaited, so a full channel
/// holds the download back until the receiver catches up.
///
/// On any error the partially written file is removed before the error is
/// returned.
pub async fn download_direct(
    client: &reqwest::Client,
    url: &str,
    output: &Path,
    progress: Option<&mpsc::Sender<ProgressSnapshot>>,
    max_redirects: u32,
) -> anyhow::Result<u64> {
    let mut current = url.to_string();
    let mut hops = 0u32;

    loop {
        let response = match client.get(&current).send().await {
            Ok(r) => r,
            Err(e) => {
                remove_partial(output).await;
                return Err(e.into());
            }
        };

        let status = response.status();
        if status == StatusCode::MOVED_PERMANENTLY || status == StatusCode::FOUND {
            remove_partial(output).await;
            if hops >= max_redirects {
                return Err(anyhow!("Too many redirects while downloading {}", url));
            }
            let location = response
                .headers()
                .get("location")
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| anyhow!("HTTP {} without Location header", status.as_u16()))?;
            let next = resolve_location(&current, location)?;
            tracing::debug!("[direct] {} redirected to {}", current, next);
            current = next;
            hops += 1;
            continue;
        }

        if status != StatusCode::OK {
            remove_partial(output).await;
            return Err(anyhow!("Failed to download: {}", status.as_u16()));
        }

        return match stream_to_file(response, output, progress).await {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                remove_partial(output).await;
                Err(e)
            }
        };
    }
}

/// Tries `primary`, then `backup` once if the first attempt failed and a
/// backup exists.
pub async fn download_with_backup(
    client: &reqwest::Client,
    primary: &str,
    backup: Option<&str>,
    output: &Path,
    progress: Option<&mpsc::Sender<ProgressSnapshot>>,
    max_redirects: u32,
) -> anyhow::Result<u64> {
    match download_direct(client, primary, output, progress, max_redirects).await {
        Ok(bytes) => Ok(bytes),
        Err(primary_err) => match backup {
            Some(backup_url) => {
                tracing::warn!(
                    "[direct] primary download failed ({}), trying backup URL",
                    primary_err
                );
                download_direct(client, backup_url, output, progress, max_redirects).await
            }
            None => Err(primary_err),
        },
    }
}

async fn stream_to_file(
    response: reqwest::Response,
    output: &Path,
    progress: Option<&mpsc::Sender<ProgressSnapshot>>,
) -> anyhow::Result<u64> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let total = response.content_length();
    let file = tokio::fs::File::create(output).await?;
    let mut file = tokio::io::BufWriter::with_capacity(256 * 1024, file);
    let mut downloaded = 0u64;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| anyhow!("Download stream error: {}", e))?;
        file.write_all(&chunk)
            .await
            .map_err(|e| anyhow!("Write error (disk full?): {}", e))?;
        downloaded += chunk.len() as u64;

        if let (Some(tx), Some(_)) = (progress, total) {
            let _ = tx.send(ProgressSnapshot::new(downloaded, total)).await;
        }
    }

    file.flush().await?;
    Ok(downloaded)
}

async fn remove_partial(output: &Path) {
    match tokio::fs::remove_file(output).await {
        Ok(()) => tracing::debug!("[direct] removed partial file {}", output.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("[direct] could not remove {}: {}", output.display(), e),
    }
}

fn resolve_location(current: &str, location: &str) -> anyhow::Result<String> {
    if location.starts_with("http://") || location.starts_with("https://") {
        return Ok(location.to_string());
    }
    let base = url::Url::parse(current)?;
    Ok(base.join(location)?.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_location_passthrough() {
        assert_eq!(
            resolve_location("https://a.example/v.mp4", "https://cdn.example/v.mp4").unwrap(),
            "https://cdn.example/v.mp4"
        );
    }

    #[test]
    fn relative_location_joins_base() {
        assert_eq!(
            resolve_location("https://a.example/path/v.mp4", "/other/v.mp4").unwrap(),
            "https://a.example/other/v.mp4"
        );
    }

    #[test]
    fn protocol_relative_location_keeps_scheme() {
        assert_eq!(
            resolve_location("https://a.example/v.mp4", "//cdn.example/v.mp4").unwrap(),
            "https://cdn.example/v.mp4"
        );
    }

    #[test]
    fn bad_base_is_error() {
        assert!(resolve_location("not a url", "/v.mp4").is_err());
    }

    #[tokio::test]
    async fn remove_partial_ignores_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        remove_partial(&dir.path().join("missing.mp4")).await;
    }
}
