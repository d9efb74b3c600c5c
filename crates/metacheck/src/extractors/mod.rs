// ABOUTME: Extraction strategies that turn a parsed HTML document into a MetadataRecord.
// ABOUTME: Covers meta-tag fields, selector fallback chains and DOI resolution.

//! Extraction module.
//!
//! Submodules:
//! - `page`: one-pass flattened view of the document.
//! - `fields`: locator strategies and fallback chains.
//! - `meta`: per-field chains and record assembly.
//! - `doi`: identifier resolution and canonicalization.

pub mod doi;
pub mod fields;
pub mod meta;
pub mod page;

pub use doi::{bare_doi, canonicalize_doi, resolve_doi, DoiTier, ResolvedDoi};
pub use meta::{extract_html, extract_record};
pub use page::Page;
