// ABOUTME: Inbound URL canonicalization: trims input, supplies a missing scheme, validates host and scheme.
// ABOUTME: Returns the normalized string itself so the record echoes what the caller meant.

use url::{ParseError as UrlParseError, Url};

use crate::error::AnalyzeError;

const OP: &str = "NormalizeUrl";

/// Normalize a caller-supplied URL.
///
/// Bare hosts such as `example.com/x` become `http://example.com/x`. Only
/// `http` and `https` URLs with a non-empty host are accepted.
pub fn normalize_url(raw: &str) -> Result<String, AnalyzeError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AnalyzeError::invalid_url(
            raw,
            OP,
            Some(anyhow::anyhow!("empty URL")),
        ));
    }

    let candidate = match Url::parse(trimmed) {
        Err(UrlParseError::RelativeUrlWithoutBase) => format!("http://{}", trimmed),
        // `example.com:8080` parses with scheme "example.com"
        Ok(url) if !matches!(url.scheme(), "http" | "https") && looks_like_host_port(trimmed) => {
            format!("http://{}", trimmed)
        }
        _ => trimmed.to_string(),
    };

    let parsed = Url::parse(&candidate).map_err(|e| {
        AnalyzeError::invalid_url(raw, OP, Some(anyhow::anyhow!("malformed URL: {}", e)))
    })?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AnalyzeError::invalid_url(
            raw,
            OP,
            Some(anyhow::anyhow!(
                "unsupported scheme {:?}, expected http or https",
                parsed.scheme()
            )),
        ));
    }

    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(AnalyzeError::invalid_url(
            raw,
            OP,
            Some(anyhow::anyhow!("URL has no host")),
        ));
    }

    Ok(candidate)
}

/// The host of an already-normalized URL.
pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_matches(['[', ']']).to_string()))
        .filter(|h| !h.is_empty())
}

fn looks_like_host_port(s: &str) -> bool {
    s.split_once(':')
        .map(|(host, rest)| {
            host.contains('.') && rest.chars().next().map_or(false, |c| c.is_ascii_digit())
        })
        .unwrap_or(false)
}
