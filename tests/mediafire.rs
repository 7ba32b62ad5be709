use mediafetch_lib::platforms::mediafire::{FileInfo, MediaFireDownloader};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn scrapes_link_from_last_fallback_selector() {
    let server = MockServer::start().await;
    let page = r#"<html><body>
        <div class="download_link">
            <a class="input" href="//cdn.example.com/f/report.pdf">report.pdf (2.1 MB)</a>
        </div>
    </body></html>"#;

    Mock::given(method("GET"))
        .and(path("/file/abc123/report.pdf/file"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(&server)
        .await;

    let dl = MediaFireDownloader::new();
    let info = dl
        .extract_download_url(&format!("{}/file/abc123/report.pdf/file", server.uri()))
        .await;

    assert_eq!(
        info,
        Some(FileInfo {
            file_name: Some("report.pdf".into()),
            download_url: "https://cdn.example.com/f/report.pdf".into(),
            mimetype: Some("application/pdf".into()),
            file_size: Some("2.1 MB".into()),
        })
    );
}

#[tokio::test]
async fn http_error_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dl = MediaFireDownloader::new();
    assert!(dl
        .extract_download_url(&format!("{}/file/gone", server.uri()))
        .await
        .is_none());
}

#[tokio::test]
async fn page_without_button_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>Removed</body></html>"))
        .mount(&server)
        .await;

    let dl = MediaFireDownloader::new();
    assert!(dl
        .extract_download_url(&format!("{}/file/removed", server.uri()))
        .await
        .is_none());
}
