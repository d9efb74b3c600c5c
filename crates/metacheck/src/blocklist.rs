// ABOUTME: Domain blocklist check: looks the page host up in the Spamhaus DBL zone over DNS.
// ABOUTME: A listing answers inside 127.0.1.0/24; refusal codes and stray answers are stage failures.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::EnrichError;

const SERVICE: &str = "blocklist";

pub const DEFAULT_DBL_ZONE: &str = "dbl.spamhaus.org";

/// Whether a domain is on the blocklist, and with which return code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlocklistVerdict {
    pub domain: String,
    pub listed: bool,
    /// The listing's return code, e.g. `127.0.1.2` for a spam domain.
    pub code: Option<String>,
}

/// Interpret the addresses the zone returned for `domain`.
pub fn verdict(domain: &str, answer: &[IpAddr]) -> Result<BlocklistVerdict, EnrichError> {
    let v4: Vec<Ipv4Addr> = answer
        .iter()
        .filter_map(|ip| match ip {
            IpAddr::V4(v4) => Some(*v4),
            IpAddr::V6(_) => None,
        })
        .collect();

    if let Some(refusal) = v4.iter().find(|ip| ip.octets()[..3] == [127, 255, 255]) {
        return Err(EnrichError::malformed(
            SERVICE,
            format!("query refused with {}", refusal),
        ));
    }
    if let Some(code) = v4.iter().find(|ip| ip.octets()[..3] == [127, 0, 1]) {
        return Ok(BlocklistVerdict {
            domain: domain.to_string(),
            listed: true,
            code: Some(code.to_string()),
        });
    }
    if let Some(stray) = answer.first() {
        return Err(EnrichError::malformed(
            SERVICE,
            format!("unexpected answer {}", stray),
        ));
    }
    Ok(BlocklistVerdict {
        domain: domain.to_string(),
        listed: false,
        code: None,
    })
}

/// DNS-based domain blocklist client.
#[derive(Debug, Clone)]
pub struct BlocklistClient {
    zone: String,
    timeout: Duration,
}

impl BlocklistClient {
    pub fn new(zone: impl Into<String>, timeout: Duration) -> Self {
        Self {
            zone: zone.into(),
            timeout,
        }
    }

    /// The DNS name queried for `domain`.
    pub fn query_name(&self, domain: &str) -> String {
        format!(
            "{}.{}",
            domain.trim_end_matches('.'),
            self.zone.trim_matches('.')
        )
    }

    /// Look `host` up in the zone. Hosts that do not resolve in the zone are
    /// not listed.
    pub async fn check(&self, host: &str) -> Result<BlocklistVerdict, EnrichError> {
        let domain = host.trim_end_matches('.').to_ascii_lowercase();
        let name = self.query_name(&domain);

        let answer = tokio::time::timeout(self.timeout, tokio::net::lookup_host((name.as_str(), 0)))
            .await
            .map_err(|_| EnrichError::Timeout(SERVICE))?;

        let addrs: Vec<IpAddr> = match answer {
            Ok(addrs) => addrs.map(|sa| sa.ip()).collect(),
            Err(e) => {
                tracing::debug!(query = %name, error = %e, "no blocklist answer");
                Vec::new()
            }
        };
        verdict(&domain, &addrs)
    }
}
