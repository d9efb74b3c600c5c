// ABOUTME: CLI for metacheck: analyzes URLs or a saved HTML file and prints the metadata records as JSON.
// ABOUTME: Logs go to stderr through tracing-subscriber; stdout carries only the JSON output.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{anyhow, Context};
use clap::Parser;
use metacheck::{Client, ClientBuilder, MetadataRecord};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "metacheck")]
#[command(about = "Extract page metadata, verify it against DataCite and check host reputation")]
struct Args {
    /// URLs to analyze (fetch mode)
    #[arg()]
    urls: Vec<String>,

    /// HTML file to analyze instead of fetching (requires --url)
    #[arg(long = "html")]
    html: Option<PathBuf>,

    /// URL the HTML file was saved from (required with --html)
    #[arg(long = "url")]
    url: Option<String>,

    /// IPQualityScore API key; without one the reputation check is skipped
    #[arg(long = "api-key", env = "IPQS_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Request strict reputation scoring
    #[arg(long = "strict")]
    strict: bool,

    /// Query the reputation of every resolved address, not just the first
    #[arg(long = "all")]
    all: bool,

    /// Check the host against the Spamhaus domain blocklist
    #[arg(long = "dbl")]
    dbl: bool,

    /// Keep resolver order instead of putting IPv4 addresses first
    #[arg(long = "no-prefer-ipv4")]
    no_prefer_ipv4: bool,

    /// Reputation timeout in seconds (DNS and API call)
    #[arg(long = "timeout", default_value_t = 8)]
    timeout: u64,

    /// Skip the DataCite registry lookup
    #[arg(long = "no-registry")]
    no_registry: bool,

    /// Registry base URL
    #[arg(long = "registry-url", hide = true)]
    registry_url: Option<String>,

    /// Reputation service base URL
    #[arg(long = "reputation-url", hide = true)]
    reputation_url: Option<String>,

    /// Allow fetching from private/local networks
    #[arg(long = "allow-private-networks")]
    allow_private_networks: bool,

    /// Output compact JSON instead of pretty
    #[arg(long = "compact")]
    compact: bool,

    /// Output file path (default: stdout)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long = "log-json")]
    log_json: bool,
}

impl Args {
    fn validate(&self) -> anyhow::Result<()> {
        if self.html.is_some() && self.url.is_none() {
            return Err(anyhow!("--url is required when using --html"));
        }
        if self.html.is_none() && self.urls.is_empty() {
            return Err(anyhow!(
                "at least one URL is required, or use --html with --url"
            ));
        }
        if self.html.is_some() && !self.urls.is_empty() {
            return Err(anyhow!("cannot use both --html and positional URLs"));
        }
        Ok(())
    }

    fn client(&self) -> Client {
        let mut builder = ClientBuilder::new()
            .api_key(self.api_key.clone())
            .strict(self.strict)
            .prefer_ipv4(!self.no_prefer_ipv4)
            .all_addresses(self.all)
            .check_blocklist(self.dbl)
            .reputation_timeout(Duration::from_secs(self.timeout))
            .enable_registry(!self.no_registry)
            .allow_private_networks(self.allow_private_networks);
        if let Some(ref url) = self.registry_url {
            builder = builder.registry_base_url(url);
        }
        if let Some(ref url) = self.reputation_url {
            builder = builder.reputation_base_url(url);
        }
        builder.build()
    }
}

fn init_logging(verbose: u8, json: bool) -> anyhow::Result<()> {
    let default_filter = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
    result.map_err(|e| anyhow!("tracing setup failed: {e}"))
}

fn render(records: &[MetadataRecord], compact: bool) -> serde_json::Result<String> {
    match (records, compact) {
        ([single], true) => single.to_json(),
        ([single], false) => single.to_json_pretty(),
        (many, true) => serde_json::to_string(many),
        (many, false) => serde_json::to_string_pretty(many),
    }
}

async fn run(args: &Args, client: &Client) -> (Vec<MetadataRecord>, bool) {
    let mut records = Vec::new();
    let mut had_error = false;

    if let (Some(html_path), Some(url)) = (&args.html, &args.url) {
        let outcome = fs::read_to_string(html_path)
            .with_context(|| format!("reading {}", html_path.display()));
        match outcome {
            Ok(html) => match client.analyze_html(&html, url).await {
                Ok(record) => records.push(record),
                Err(e) => {
                    eprintln!("error analyzing {}: {}", url, e);
                    had_error = true;
                }
            },
            Err(e) => {
                eprintln!("error: {:#}", e);
                had_error = true;
            }
        }
        return (records, had_error);
    }

    for url in &args.urls {
        match client.analyze(url).await {
            Ok(record) => records.push(record),
            Err(e) => {
                eprintln!("error analyzing {}: {}", url, e);
                had_error = true;
            }
        }
    }
    (records, had_error)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = args.validate() {
        eprintln!("error: {}", e);
        return ExitCode::from(1);
    }

    if let Err(e) = init_logging(args.verbose, args.log_json) {
        eprintln!("warning: {}", e);
    }

    let client = args.client();
    tracing::debug!(
        urls = args.urls.len(),
        html = args.html.is_some(),
        reputation = client.options().api_key().is_some(),
        "starting"
    );
    let (records, mut had_error) = run(&args, &client).await;

    if !records.is_empty() {
        match render(&records, args.compact) {
            Ok(output) => {
                if let Some(ref path) = args.output {
                    if let Err(e) = fs::write(path, &output) {
                        eprintln!("error writing to {}: {}", path.display(), e);
                        had_error = true;
                    }
                } else {
                    println!("{}", output);
                }
            }
            Err(e) => {
                eprintln!("error serializing output: {}", e);
                had_error = true;
            }
        }
    }

    if had_error {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}
