// ABOUTME: Configuration options for the metacheck pipeline: timeouts, endpoints, credentials and fetch policy.
// ABOUTME: ClientBuilder provides a fluent API for constructing Client instances with custom settings.

use std::collections::HashMap;
use std::time::Duration;

use crate::blocklist::DEFAULT_DBL_ZONE;
use crate::client::Client;

/// Desktop Chrome User-Agent; some publishers refuse obvious bots.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub const DEFAULT_REGISTRY_BASE_URL: &str = "https://api.datacite.org/dois";
pub const DEFAULT_REPUTATION_BASE_URL: &str = "https://ipqualityscore.com";

/// Environment variable read by [`ClientBuilder::from_env`].
pub const API_KEY_ENV: &str = "IPQS_API_KEY";

/// Configuration options for the metacheck client.
#[derive(Debug, Clone)]
pub struct Options {
    /// Bounds the whole page fetch, redirects and private-network checks included.
    pub page_timeout: Duration,
    pub registry_timeout: Duration,
    /// One deadline shared by DNS resolution and every reputation query.
    pub reputation_timeout: Duration,
    pub user_agent: String,
    pub allow_private_networks: bool,
    /// Extra headers sent with the page request.
    pub headers: HashMap<String, String>,
    pub http_client: Option<reqwest::Client>,
    pub registry_base_url: String,
    pub reputation_base_url: String,
    /// Without a key the reputation stage is disabled.
    pub reputation_api_key: Option<String>,
    pub prefer_ipv4: bool,
    pub strict_reputation: bool,
    pub enable_registry: bool,
    /// Query every resolved address, not just the first.
    pub reputation_all_addresses: bool,
    pub check_blocklist: bool,
    pub blocklist_zone: String,
    pub blocklist_timeout: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            page_timeout: Duration::from_secs(30),
            registry_timeout: Duration::from_secs(6),
            reputation_timeout: Duration::from_secs(8),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            allow_private_networks: false,
            headers: HashMap::new(),
            http_client: None,
            registry_base_url: DEFAULT_REGISTRY_BASE_URL.to_string(),
            reputation_base_url: DEFAULT_REPUTATION_BASE_URL.to_string(),
            reputation_api_key: None,
            prefer_ipv4: true,
            strict_reputation: false,
            enable_registry: true,
            reputation_all_addresses: false,
            check_blocklist: false,
            blocklist_zone: DEFAULT_DBL_ZONE.to_string(),
            blocklist_timeout: Duration::from_secs(5),
        }
    }
}

impl Options {
    /// The configured key, ignoring blank values.
    pub fn api_key(&self) -> Option<&str> {
        self.reputation_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

/// Builder for constructing Client instances with custom configuration.
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    opts: Options,
}

impl ClientBuilder {
    /// Create a new ClientBuilder with default options.
    pub fn new() -> Self {
        Self {
            opts: Options::default(),
        }
    }

    /// Defaults plus the reputation key from `IPQS_API_KEY`, if set.
    pub fn from_env() -> Self {
        let mut builder = Self::new();
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            builder.opts.reputation_api_key = Some(key);
        }
        builder
    }

    /// Set the page fetch timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.opts.page_timeout = timeout;
        self
    }

    pub fn registry_timeout(mut self, timeout: Duration) -> Self {
        self.opts.registry_timeout = timeout;
        self
    }

    pub fn reputation_timeout(mut self, timeout: Duration) -> Self {
        self.opts.reputation_timeout = timeout;
        self
    }

    /// Set the User-Agent header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.opts.user_agent = user_agent.into();
        self
    }

    /// Allow or disallow requests to private networks.
    pub fn allow_private_networks(mut self, allow: bool) -> Self {
        self.opts.allow_private_networks = allow;
        self
    }

    /// Use a custom HTTP client for every outbound call.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.opts.http_client = Some(client);
        self
    }

    /// Add a custom header to page requests.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.opts.headers.insert(key.into(), value.into());
        self
    }

    pub fn registry_base_url(mut self, url: impl Into<String>) -> Self {
        self.opts.registry_base_url = url.into();
        self
    }

    pub fn reputation_base_url(mut self, url: impl Into<String>) -> Self {
        self.opts.reputation_base_url = url.into();
        self
    }

    /// Set (or clear) the IP reputation API key.
    pub fn api_key(mut self, key: Option<String>) -> Self {
        self.opts.reputation_api_key = key;
        self
    }

    /// Order resolved addresses IPv4-first.
    pub fn prefer_ipv4(mut self, prefer: bool) -> Self {
        self.opts.prefer_ipv4 = prefer;
        self
    }

    /// Ask the reputation service for its stricter scoring.
    pub fn strict(mut self, strict: bool) -> Self {
        self.opts.strict_reputation = strict;
        self
    }

    pub fn enable_registry(mut self, enable: bool) -> Self {
        self.opts.enable_registry = enable;
        self
    }

    /// Query the reputation of every resolved address.
    pub fn all_addresses(mut self, all: bool) -> Self {
        self.opts.reputation_all_addresses = all;
        self
    }

    /// Check the page host against the domain blocklist.
    pub fn check_blocklist(mut self, check: bool) -> Self {
        self.opts.check_blocklist = check;
        self
    }

    pub fn blocklist_zone(mut self, zone: impl Into<String>) -> Self {
        self.opts.blocklist_zone = zone.into();
        self
    }

    pub fn blocklist_timeout(mut self, timeout: Duration) -> Self {
        self.opts.blocklist_timeout = timeout;
        self
    }

    pub fn options(&self) -> &Options {
        &self.opts
    }

    /// Build the Client with the configured options.
    pub fn build(self) -> Client {
        Client::new(self.opts)
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
