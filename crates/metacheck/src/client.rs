// ABOUTME: The metacheck Client: fetches a page, extracts its metadata and runs the enrichment stages.
// ABOUTME: Provides async analyze() and analyze_html(); only URL validation and page fetch can fail a request.

use std::fmt;
use std::net::IpAddr;

use crate::blocklist::{BlocklistClient, BlocklistVerdict};
use crate::error::{AnalyzeError, EnrichError};
use crate::extractors::doi::bare_doi;
use crate::extractors::meta::extract_html;
use crate::input::{host_of, normalize_url};
use crate::options::{ClientBuilder, Options};
use crate::record::MetadataRecord;
use crate::registry::{overlay, RegistryClient, RegistryWork};
use crate::reputation::{ReputationClient, ReputationReport};
use crate::resource::{fetch, FetchOptions};

/// What happened to one best-effort enrichment stage.
#[derive(Debug)]
pub enum StageOutcome<T> {
    Applied(T),
    Skipped(&'static str),
    Failed(EnrichError),
}

impl<T> StageOutcome<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, StageOutcome::Applied(_))
    }
}

impl<T> fmt::Display for StageOutcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageOutcome::Applied(_) => write!(f, "applied"),
            StageOutcome::Skipped(reason) => write!(f, "skipped: {}", reason),
            StageOutcome::Failed(err) => write!(f, "failed: {}", err),
        }
    }
}

/// The main metacheck client. Immutable once built; share it freely.
#[derive(Debug, Clone)]
pub struct Client {
    opts: Options,
    http_client: reqwest::Client,
    registry: Option<RegistryClient>,
    reputation: Option<ReputationClient>,
    blocklist: Option<BlocklistClient>,
}

impl Client {
    /// Create a new ClientBuilder for configuring the client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Create a new Client with the given options.
    pub fn new(opts: Options) -> Self {
        let http_client = opts
            .http_client
            .clone()
            .unwrap_or_else(|| build_http_client(&opts));

        let registry = opts.enable_registry.then(|| {
            RegistryClient::new(
                http_client.clone(),
                opts.registry_base_url.clone(),
                opts.registry_timeout,
            )
        });

        let reputation = opts.api_key().map(|key| {
            ReputationClient::new(
                http_client.clone(),
                opts.reputation_base_url.clone(),
                key,
                opts.reputation_timeout,
            )
            .strict(opts.strict_reputation)
            .prefer_ipv4(opts.prefer_ipv4)
            .all_addresses(opts.reputation_all_addresses)
        });

        let blocklist = opts.check_blocklist.then(|| {
            BlocklistClient::new(opts.blocklist_zone.clone(), opts.blocklist_timeout)
        });

        Self {
            opts,
            http_client,
            registry,
            reputation,
            blocklist,
        }
    }

    pub fn options(&self) -> &Options {
        &self.opts
    }

    /// Fetch the page at `raw_url` and build its record.
    pub async fn analyze(&self, raw_url: &str) -> Result<MetadataRecord, AnalyzeError> {
        let url = normalize_url(raw_url)?;
        tracing::info!(url = %url, "analyzing page");

        let fetch_opts = FetchOptions {
            headers: self.opts.headers.clone(),
            allow_private_networks: self.opts.allow_private_networks,
            timeout: Some(self.opts.page_timeout),
        };
        let fetched = fetch(&self.http_client, &url, &fetch_opts).await?;
        let html = fetched.text();

        Ok(self.run_pipeline(&html, &url).await)
    }

    /// Build a record from already-fetched HTML. `raw_url` is the page's
    /// address; it is normalized exactly as in [`Client::analyze`].
    pub async fn analyze_html(
        &self,
        html: &str,
        raw_url: &str,
    ) -> Result<MetadataRecord, AnalyzeError> {
        let url = normalize_url(raw_url)?;
        tracing::info!(url = %url, bytes = html.len(), "analyzing supplied HTML");
        Ok(self.run_pipeline(html, &url).await)
    }

    async fn run_pipeline(&self, html: &str, url: &str) -> MetadataRecord {
        let mut record = extract_html(html, url);
        tracing::debug!(url, doi = ?record.doi, title = ?record.title, "extracted fields");

        let host = host_of(url);
        let (registry, reputation, blocklist) = futures::join!(
            self.registry_stage(record.doi.as_deref()),
            self.reputation_stage(host.as_deref()),
            self.blocklist_stage(host.as_deref()),
        );

        apply_registry(&mut record, registry, url);
        apply_reputation(&mut record, reputation, self.opts.reputation_all_addresses);
        apply_blocklist(&mut record, blocklist);

        tracing::info!(
            url,
            doi = ?record.doi,
            ip = ?record.ip_address,
            "analysis complete"
        );
        record
    }

    async fn registry_stage(&self, doi: Option<&str>) -> StageOutcome<RegistryWork> {
        let Some(registry) = self.registry.as_ref() else {
            return StageOutcome::Skipped("registry disabled");
        };
        let Some(bare) = doi.and_then(bare_doi) else {
            return StageOutcome::Skipped("no DOI");
        };
        match registry.lookup(&bare).await {
            Ok(work) => StageOutcome::Applied(work),
            Err(e) => StageOutcome::Failed(e),
        }
    }

    async fn reputation_stage(&self, host: Option<&str>) -> StageOutcome<Vec<ReputationReport>> {
        let Some(reputation) = self.reputation.as_ref() else {
            return StageOutcome::Skipped("no API key");
        };
        let Some(host) = host else {
            return StageOutcome::Skipped("no host");
        };
        match reputation.lookup(host).await {
            Ok(reports) => StageOutcome::Applied(reports),
            Err(e) => StageOutcome::Failed(e),
        }
    }

    async fn blocklist_stage(&self, host: Option<&str>) -> StageOutcome<BlocklistVerdict> {
        let Some(blocklist) = self.blocklist.as_ref() else {
            return StageOutcome::Skipped("blocklist disabled");
        };
        let Some(host) = host else {
            return StageOutcome::Skipped("no host");
        };
        if host.parse::<IpAddr>().is_ok() {
            return StageOutcome::Skipped("host is an IP address");
        }
        match blocklist.check(host).await {
            Ok(verdict) => StageOutcome::Applied(verdict),
            Err(e) => StageOutcome::Failed(e),
        }
    }
}

fn apply_registry(record: &mut MetadataRecord, outcome: StageOutcome<RegistryWork>, url: &str) {
    match outcome {
        StageOutcome::Applied(work) => {
            overlay(record, &work, url);
            tracing::debug!(doi = ?record.doi, "registry overlay applied");
        }
        StageOutcome::Skipped(reason) => tracing::debug!(reason, "registry skipped"),
        StageOutcome::Failed(err) => {
            tracing::warn!(doi = ?record.doi, error = %err, "registry lookup failed")
        }
    }
}

fn apply_reputation(
    record: &mut MetadataRecord,
    outcome: StageOutcome<Vec<ReputationReport>>,
    all_addresses: bool,
) {
    match outcome {
        StageOutcome::Applied(reports) => {
            for (index, report) in reports.into_iter().enumerate() {
                let ip = report.ip.to_string();
                if index == 0 {
                    record.ip_address = Some(ip.clone());
                }
                match report.summary {
                    Ok(summary) => {
                        if index == 0 {
                            record.reputation = Some(summary.clone());
                        }
                        if all_addresses {
                            record.reputations.push(summary);
                        }
                    }
                    Err(err) => tracing::warn!(ip = %ip, error = %err, "reputation query failed"),
                }
            }
        }
        StageOutcome::Skipped(reason) => tracing::debug!(reason, "reputation skipped"),
        StageOutcome::Failed(err) => {
            tracing::warn!(url = ?record.url, error = %err, "host resolution failed")
        }
    }
}

fn apply_blocklist(record: &mut MetadataRecord, outcome: StageOutcome<BlocklistVerdict>) {
    match outcome {
        StageOutcome::Applied(verdict) => {
            if verdict.listed {
                tracing::warn!(domain = %verdict.domain, code = ?verdict.code, "domain is blocklisted");
            }
            record.blocklist = Some(verdict);
        }
        StageOutcome::Skipped(reason) => tracing::debug!(reason, "blocklist skipped"),
        StageOutcome::Failed(err) => {
            tracing::warn!(url = ?record.url, error = %err, "blocklist check failed")
        }
    }
}

/// Shared HTTP client. Redirects are followed by `resource::fetch`, which
/// guards each hop, and no cookie store outlives a single fetch.
fn build_http_client(opts: &Options) -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .user_agent(&opts.user_agent)
        .timeout(opts.page_timeout)
        .gzip(true)
        .brotli(true)
        .deflate(true)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to default HTTP client");
            reqwest::Client::new()
        })
}
