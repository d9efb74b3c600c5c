// ABOUTME: IP reputation lookup: resolves the page host and queries IPQualityScore for a compact summary.
// ABOUTME: Resolution and query failures are reported separately so the resolved address survives a failed query.

use std::net::IpAddr;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::time::Instant;

use crate::error::EnrichError;
use crate::record::ReputationSummary;

const SERVICE: &str = "reputation";

/// Resolve `host` to its addresses, deduplicated in resolver order.
///
/// With `prefer_ipv4` the IPv4 addresses move ahead of IPv6 ones; order
/// within each family is kept. IP literals resolve to themselves.
pub async fn resolve_ips(
    host: &str,
    prefer_ipv4: bool,
    timeout: Duration,
) -> Result<Vec<IpAddr>, EnrichError> {
    resolve_ips_until(host, prefer_ipv4, Instant::now() + timeout).await
}

async fn resolve_ips_until(
    host: &str,
    prefer_ipv4: bool,
    deadline: Instant,
) -> Result<Vec<IpAddr>, EnrichError> {
    let host = host.trim_matches(['[', ']']);
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(vec![ip]);
    }

    let resolved = tokio::time::timeout_at(deadline, tokio::net::lookup_host((host, 0)))
        .await
        .map_err(|_| EnrichError::Timeout("DNS resolution"))?
        .map_err(|e| EnrichError::Dns {
            host: host.to_string(),
            reason: e.to_string(),
        })?;

    let ips = order_addresses(resolved.map(|sa| sa.ip()), prefer_ipv4);
    if ips.is_empty() {
        return Err(EnrichError::NoAddress(host.to_string()));
    }
    Ok(ips)
}

fn order_addresses<I>(addrs: I, prefer_ipv4: bool) -> Vec<IpAddr>
where
    I: IntoIterator<Item = IpAddr>,
{
    let mut ips: Vec<IpAddr> = Vec::new();
    for ip in addrs {
        if !ips.contains(&ip) {
            ips.push(ip);
        }
    }
    if prefer_ipv4 {
        ips.sort_by_key(|ip| ip.is_ipv6());
    }
    ips
}

/// Map the upstream response onto the fixed summary shape.
///
/// Each key is taken verbatim when present, else from the first key equal to
/// it ignoring ASCII case; missing keys become `null`.
pub fn summarize(full: &Map<String, Value>, ip: &str) -> ReputationSummary {
    let pick = |key: &str| {
        full.get(key)
            .or_else(|| {
                full.iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(key))
                    .map(|(_, v)| v)
            })
            .cloned()
    };

    ReputationSummary {
        fraud_score: pick("fraud_score"),
        fraudulent: pick("fraudulent"),
        country_code: pick("country_code"),
        isp: pick("ISP"),
        asn: pick("ASN"),
        ip: ip.to_string(),
    }
}

/// The address that was queried and what the service said about it.
#[derive(Debug)]
pub struct ReputationReport {
    pub ip: IpAddr,
    pub summary: Result<ReputationSummary, EnrichError>,
}

/// Client for the IPQualityScore IP reputation API.
#[derive(Debug, Clone)]
pub struct ReputationClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    strict: bool,
    prefer_ipv4: bool,
    all_addresses: bool,
    timeout: Duration,
}

impl ReputationClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            strict: false,
            prefer_ipv4: true,
            all_addresses: false,
            timeout,
        }
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn prefer_ipv4(mut self, prefer: bool) -> Self {
        self.prefer_ipv4 = prefer;
        self
    }

    /// Query every resolved address instead of only the first.
    pub fn all_addresses(mut self, all: bool) -> Self {
        self.all_addresses = all;
        self
    }

    /// Resolve `host` and query the first address, or all of them.
    ///
    /// Resolution and queries share one deadline. An `Err` means no address
    /// was found; a failed query still reports its address with the error in
    /// `summary`. Reports come back in address order and are never empty.
    pub async fn lookup(&self, host: &str) -> Result<Vec<ReputationReport>, EnrichError> {
        let deadline = Instant::now() + self.timeout;
        let mut ips = resolve_ips_until(host, self.prefer_ipv4, deadline).await?;
        if ips.is_empty() {
            return Err(EnrichError::NoAddress(host.to_string()));
        }
        tracing::debug!(host, first = %ips[0], candidates = ips.len(), "resolved host");
        if !self.all_addresses {
            ips.truncate(1);
        }
        Ok(self.query_addresses(ips, deadline).await)
    }

    /// Query each address concurrently, keeping their order.
    async fn query_addresses(&self, ips: Vec<IpAddr>, deadline: Instant) -> Vec<ReputationReport> {
        futures::future::join_all(ips.into_iter().map(|ip| async move {
            let summary = self.query_until(&ip, deadline).await;
            ReputationReport { ip, summary }
        }))
        .await
    }

    /// Query the service for one address.
    pub async fn query(&self, ip: &IpAddr) -> Result<ReputationSummary, EnrichError> {
        self.query_until(ip, Instant::now() + self.timeout).await
    }

    async fn query_until(
        &self,
        ip: &IpAddr,
        deadline: Instant,
    ) -> Result<ReputationSummary, EnrichError> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(EnrichError::Timeout(SERVICE));
        }

        let url = format!(
            "{}/api/json/ip/{}/{}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(&self.api_key),
            ip
        );

        let mut request = self.http.get(&url).timeout(remaining);
        if self.strict {
            request = request.query(&[("strictness", "1")]);
        }

        let response = request.send().await.map_err(classify)?;
        let status = response.status();
        if !status.is_success() {
            return Err(EnrichError::Status {
                service: SERVICE,
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(classify)?;
        let value: Value = serde_json::from_slice(&body)
            .map_err(|e| EnrichError::malformed(SERVICE, format!("body is not JSON: {}", e)))?;
        let Value::Object(full) = value else {
            return Err(EnrichError::malformed(SERVICE, "expected a JSON object"));
        };

        if full.get("success").and_then(Value::as_bool) == Some(false) {
            let message = full
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("request unsuccessful");
            return Err(EnrichError::malformed(SERVICE, message));
        }

        Ok(summarize(&full, &ip.to_string()))
    }
}

fn classify(e: reqwest::Error) -> EnrichError {
    if e.is_timeout() {
        EnrichError::Timeout(SERVICE)
    } else {
        EnrichError::Http(e)
    }
}
