// ABOUTME: Main library entry point for the metacheck page metadata analyzer.
// ABOUTME: Re-exports the public API: Client, ClientBuilder, MetadataRecord, AnalyzeError, ErrorCode, Options.

//! metacheck - extract and verify bibliographic metadata for a web page.
//!
//! The pipeline fetches a page, reads its `<meta>` tags into a
//! [`MetadataRecord`], resolves a DOI, overlays the DataCite registry entry
//! for that DOI and attaches an IP reputation summary for the page host
//! (optionally every resolved address, plus a Spamhaus DBL verdict). Only
//! URL validation and the page fetch can fail a request; every enrichment
//! failure just leaves the affected fields absent.
//!
//! # Example
//!
//! ```no_run
//! use metacheck::{AnalyzeError, ClientBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), AnalyzeError> {
//!     let client = ClientBuilder::from_env().build();
//!     let record = client.analyze("https://zenodo.org/records/123").await?;
//!     println!("{}", record.to_json_pretty().unwrap_or_default());
//!     Ok(())
//! }
//! ```

pub mod blocklist;
pub mod client;
pub mod date;
pub mod error;
pub mod extractors;
pub mod input;
pub mod options;
pub mod record;
pub mod registry;
pub mod reputation;
pub mod resource;

pub use crate::blocklist::BlocklistVerdict;
pub use crate::client::{Client, StageOutcome};
pub use crate::date::parse_date;
pub use crate::error::{AnalyzeError, EnrichError, ErrorCode};
pub use crate::extractors::doi::{bare_doi, canonicalize_doi};
pub use crate::extractors::meta::{extract_html, extract_record};
pub use crate::input::normalize_url;
pub use crate::options::{ClientBuilder, Options};
pub use crate::record::{MetadataRecord, ReputationSummary};
pub use crate::registry::{overlay, RegistryWork};
pub use crate::reputation::{resolve_ips, summarize};

/// Result type alias for metacheck operations.
pub type Result<T> = std::result::Result<T, AnalyzeError>;
