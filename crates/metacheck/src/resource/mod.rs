// ABOUTME: Page fetching for the pipeline: HTTP GET with guarded redirects, size limit and charset decoding.
// ABOUTME: Every failure maps to a request-level AnalyzeError (Fetch, Timeout or Ssrf).

use std::collections::HashMap;
use std::net::IpAddr;

use std::time::Duration;

use bytes::Bytes;
use ipnet::Ipv6Net;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{COOKIE, LOCATION, SET_COOKIE};
use url::Url;

use crate::error::AnalyzeError;

/// Maximum allowed content length (10 MB).
pub const MAX_CONTENT_LENGTH: usize = 10 * 1024 * 1024;

/// Redirect hops followed before giving up.
pub const MAX_REDIRECTS: usize = 10;

const OP: &str = "Fetch";

/// Options for fetching a resource.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub headers: HashMap<String, String>,
    pub allow_private_networks: bool,
    /// Upper bound for the whole fetch; `None` leaves only the HTTP client's own timeout.
    pub timeout: Option<Duration>,
}

/// Result of a successful fetch operation.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub status: u16,
    pub url: String,
    pub final_url: String,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl FetchResult {
    /// Decode the body using the response charset, falling back to detection.
    pub fn text(&self) -> String {
        decode_body(&self.body, self.content_type.as_deref())
    }
}

/// Loopback, RFC 1918, link-local, unspecified and IPv6 unique-local addresses.
pub fn is_private_ip(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V4(ip) => {
            ip.is_private() || ip.is_loopback() || ip.is_link_local() || ip.is_unspecified()
        }
        IpAddr::V6(ip) => {
            if let Some(mapped) = ip.to_ipv4_mapped() {
                return is_private_ip(&IpAddr::V4(mapped));
            }
            if ip.is_loopback() || ip.is_unspecified() {
                return true;
            }
            ["fc00::/7", "fe80::/10"]
                .iter()
                .filter_map(|net| net.parse::<Ipv6Net>().ok())
                .any(|net| net.contains(ip))
        }
    }
}

/// Reject `target` if its host is, or resolves to, a private address.
async fn guard_host(target: &Url, url: &str, what: &str) -> Result<(), AnalyzeError> {
    let Some(host) = target.host_str() else {
        return Ok(());
    };
    let host = host.trim_matches(['[', ']']);

    let blocked = || {
        AnalyzeError::ssrf(
            url,
            OP,
            Some(anyhow::anyhow!("{} resolves to a private network address", what)),
        )
    };

    if let Ok(ip) = host.parse::<IpAddr>() {
        return if is_private_ip(&ip) { Err(blocked()) } else { Ok(()) };
    }

    let port = target.port_or_known_default().unwrap_or(80);
    let addrs = tokio::net::lookup_host((host, port)).await.map_err(|e| {
        AnalyzeError::fetch(
            url,
            OP,
            Some(anyhow::anyhow!("DNS lookup failed for {}: {}", what, e)),
        )
    })?;

    for socket_addr in addrs {
        if is_private_ip(&socket_addr.ip()) {
            return Err(blocked());
        }
    }
    Ok(())
}

fn request_error(url: &str, context: &str, e: reqwest::Error) -> AnalyzeError {
    if e.is_timeout() {
        AnalyzeError::timeout(url, OP, Some(anyhow::anyhow!("{}: {}", context, e)))
    } else {
        AnalyzeError::fetch(url, OP, Some(anyhow::anyhow!("{}: {}", context, e)))
    }
}

/// Decode body bytes to a String using charset from content-type header or detection.
fn decode_body(body: &[u8], content_type: Option<&str>) -> String {
    if let Some(encoding) = content_type
        .and_then(extract_charset)
        .and_then(|cs| encoding_rs::Encoding::for_label(cs.as_bytes()))
    {
        let (decoded, _, _) = encoding.decode(body);
        return decoded.into_owned();
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(body, true);
    let encoding = detector.guess(None, true);
    let (decoded, _, _) = encoding.decode(body);
    decoded.into_owned()
}

/// Extract charset value from Content-Type header.
fn extract_charset(content_type: &str) -> Option<String> {
    content_type
        .to_lowercase()
        .split(';')
        .find_map(|part| {
            part.trim()
                .strip_prefix("charset=")
                .map(|cs| cs.trim_matches(|c| c == '"' || c == '\'').to_string())
        })
        .filter(|cs| !cs.is_empty())
}

/// Fetch the page at `url`. Any non-2xx status is a failure.
///
/// Redirects are followed here rather than by the HTTP client so that every
/// hop passes the private-network guard. `opts.timeout` bounds the whole
/// fetch, guard lookups and redirect hops included.
pub async fn fetch(
    client: &reqwest::Client,
    url: &str,
    opts: &FetchOptions,
) -> Result<FetchResult, AnalyzeError> {
    match opts.timeout {
        Some(limit) => tokio::time::timeout(limit, fetch_page(client, url, opts))
            .await
            .map_err(|_| {
                AnalyzeError::timeout(
                    url,
                    OP,
                    Some(anyhow::anyhow!("no complete response within {:?}", limit)),
                )
            })?,
        None => fetch_page(client, url, opts).await,
    }
}

async fn fetch_page(
    client: &reqwest::Client,
    url: &str,
    opts: &FetchOptions,
) -> Result<FetchResult, AnalyzeError> {
    let parsed_url = Url::parse(url).map_err(|e| {
        AnalyzeError::invalid_url(url, OP, Some(anyhow::anyhow!("invalid URL: {}", e)))
    })?;

    if !matches!(parsed_url.scheme(), "http" | "https") {
        return Err(AnalyzeError::invalid_url(
            url,
            OP,
            Some(anyhow::anyhow!("scheme must be http or https")),
        ));
    }

    let response = follow_redirects(client, url, parsed_url, opts).await?;

    let status = response.status();
    if !status.is_success() {
        return Err(AnalyzeError::fetch(
            url,
            OP,
            Some(anyhow::anyhow!("HTTP status {}", status.as_u16())),
        ));
    }

    if let Some(len) = response.content_length() {
        if len > MAX_CONTENT_LENGTH as u64 {
            return Err(AnalyzeError::fetch(
                url,
                OP,
                Some(anyhow::anyhow!("content too large: {} bytes", len)),
            ));
        }
    }

    let final_url = response.url().to_string();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_lowercase());

    let body = response
        .bytes()
        .await
        .map_err(|e| request_error(url, "failed to read body", e))?;

    if body.len() > MAX_CONTENT_LENGTH {
        return Err(AnalyzeError::fetch(
            url,
            OP,
            Some(anyhow::anyhow!("content too large: {} bytes", body.len())),
        ));
    }

    tracing::debug!(url, final_url = %final_url, bytes = body.len(), "fetched page");

    Ok(FetchResult {
        status: status.as_u16(),
        url: url.to_string(),
        final_url,
        content_type,
        body,
    })
}

/// Request `start` and walk its redirect chain, returning the first
/// non-redirect response. Cookies live only as long as this chain.
async fn follow_redirects(
    client: &reqwest::Client,
    url: &str,
    start: Url,
    opts: &FetchOptions,
) -> Result<reqwest::Response, AnalyzeError> {
    let jar = Jar::default();
    let mut current = start;
    let mut hops = 0;

    loop {
        if !opts.allow_private_networks {
            let what = if hops == 0 { "host" } else { "redirect target" };
            guard_host(&current, url, what).await?;
        }

        let mut request = client.get(current.clone());
        for (key, value) in &opts.headers {
            request = request.header(key, value);
        }
        if let Some(cookies) = jar.cookies(&current) {
            request = request.header(COOKIE, cookies);
        }

        tracing::debug!(url, target = %current, hops, "fetching page");
        let response = request
            .send()
            .await
            .map_err(|e| request_error(url, "request failed", e))?;

        let mut set_cookies = response.headers().get_all(SET_COOKIE).iter();
        jar.set_cookies(&mut set_cookies, &current);

        if !response.status().is_redirection() {
            return Ok(response);
        }
        let Some(location) = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
        else {
            return Ok(response);
        };

        hops += 1;
        if hops > MAX_REDIRECTS {
            return Err(AnalyzeError::fetch(
                url,
                OP,
                Some(anyhow::anyhow!("too many redirects (more than {})", MAX_REDIRECTS)),
            ));
        }

        let next = current.join(location).map_err(|e| {
            AnalyzeError::fetch(
                url,
                OP,
                Some(anyhow::anyhow!("bad redirect location {:?}: {}", location, e)),
            )
        })?;
        if !matches!(next.scheme(), "http" | "https") {
            return Err(AnalyzeError::fetch(
                url,
                OP,
                Some(anyhow::anyhow!("redirect to unsupported scheme {}", next.scheme())),
            ));
        }
        current = next;
    }
}
