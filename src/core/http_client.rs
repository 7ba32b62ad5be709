use std::time::Duration;

use mediafetch_core::models::settings::{HttpSettings, ProxySettings};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

pub fn proxy_url(proxy: &ProxySettings) -> Option<String> {
    if !proxy.enabled || proxy.host.is_empty() {
        return None;
    }
    let scheme = match proxy.proxy_type.as_str() {
        "socks5" => "socks5",
        "https" => "https",
        _ => "http",
    };
    if !proxy.username.is_empty() {
        Some(format!(
            "{}://{}:{}@{}:{}",
            scheme, proxy.username, proxy.password, proxy.host, proxy.port
        ))
    } else {
        Some(format!("{}://{}:{}", scheme, proxy.host, proxy.port))
    }
}

pub fn apply_proxy(
    builder: reqwest::ClientBuilder,
    proxy: &ProxySettings,
) -> reqwest::ClientBuilder {
    let Some(url) = proxy_url(proxy) else {
        return builder;
    };
    match reqwest::Proxy::all(&url) {
        Ok(p) => builder.proxy(p),
        Err(e) => {
            tracing::warn!("Invalid proxy URL: {}", e);
            builder
        }
    }
}

pub fn header_map(http: &HttpSettings) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in &http.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(n), Ok(v)) => {
                map.insert(n, v);
            }
            _ => tracing::warn!("Skipping invalid header {}: {}", name, value),
        }
    }
    map
}

/// Client carrying the static header set of one platform. Redirects are left
/// to reqwest's default policy.
pub fn build_client(http: &HttpSettings, proxy: Option<&ProxySettings>) -> reqwest::Client {
    build(http, proxy, reqwest::redirect::Policy::default())
}

/// Same as [`build_client`] but never follows redirects, for downloads that
/// handle 301/302 themselves.
pub fn build_download_client(
    http: &HttpSettings,
    proxy: Option<&ProxySettings>,
) -> reqwest::Client {
    build(http, proxy, reqwest::redirect::Policy::none())
}

fn build(
    http: &HttpSettings,
    proxy: Option<&ProxySettings>,
    redirect: reqwest::redirect::Policy,
) -> reqwest::Client {
    let mut builder = reqwest::Client::builder()
        .default_headers(header_map(http))
        .cookie_store(true)
        .redirect(redirect)
        .connect_timeout(Duration::from_secs(15));

    if let Some(secs) = http.timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    if let Some(proxy) = proxy {
        builder = apply_proxy(builder, proxy);
    }

    builder.build().unwrap_or_default()
}
