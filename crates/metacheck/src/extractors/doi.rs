// ABOUTME: DOI resolution from the source URL, meta tags, anchor links and page text.
// ABOUTME: Canonical form is "doi:<bare>"; canonicalization strips any stack of prefixes so it is idempotent.

//! DOI resolution.
//!
//! Tiers are tried strictly in order and the first tier that produces a
//! non-empty identifier wins:
//!
//! 1. the source URL (`doi:` token, or a `doi.org` URL),
//! 2. identifier-bearing meta tags,
//! 3. `<a href>` links into `doi.org`,
//! 4. a pattern match over the visible page text.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::extractors::fields::Locator;
use crate::extractors::page::Page;

/// Prefix of the canonical identifier form.
pub const DOI_PREFIX: &str = "doi:";

/// Bytes that may precede a `doi:` token inside a URL.
const URL_TOKEN_BOUNDARIES: &[u8] = b"/?=&;:";

/// Hosts of the DOI resolver.
const DOI_HOSTS: &[&str] = &["doi.org", "dx.doi.org", "www.doi.org"];

/// Registry URL prefixes stripped during canonicalization.
const DOI_URL_PREFIXES: &[&str] = &[
    "https://doi.org/",
    "http://doi.org/",
    "https://dx.doi.org/",
    "http://dx.doi.org/",
    "https://www.doi.org/",
    "http://www.doi.org/",
];

/// Meta tags that only ever carry a DOI. Values are taken as-is.
const DOI_META_LOCATORS: &[Locator] = &[
    Locator::MetaName("citation_doi"),
    Locator::MetaName("dc.identifier"),
    Locator::MetaName("dc.identifier.doi"),
    Locator::MetaName("prism.doi"),
    Locator::MetaName("bepress_citation_doi"),
    Locator::MetaName("doi"),
    Locator::MetaProperty("og:doi"),
];

/// `dc.identifier` is also used for ISBNs, URNs and URLs.
const GENERIC_IDENTIFIER_LOCATOR: Locator = Locator::MetaName("dc.identifier");

static DOI_TEXT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"10\.\d{4,9}/[^\s"'<>]+"#).expect("valid DOI regex"));

/// Characters commonly glued to a DOI by surrounding prose.
const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', ')', ']', '}', '\'', '"'];

/// Where a DOI was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoiTier {
    SourceUrl,
    MetaTag,
    Anchor,
    PageText,
}

/// A DOI together with the tier that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDoi {
    pub doi: String,
    pub tier: DoiTier,
}

/// Resolve the page's DOI using the tiered precedence.
pub fn resolve_doi(page: &Page, source_url: &str) -> Option<ResolvedDoi> {
    let tagged = |tier: DoiTier| move |doi: String| ResolvedDoi { doi, tier };

    doi_from_url(source_url)
        .map(tagged(DoiTier::SourceUrl))
        .or_else(|| doi_from_meta(page).map(tagged(DoiTier::MetaTag)))
        .or_else(|| doi_from_anchors(page).map(tagged(DoiTier::Anchor)))
        .or_else(|| doi_from_text(&page.text).map(tagged(DoiTier::PageText)))
}

/// Canonicalize an identifier to `doi:<bare>`.
///
/// Registry URLs and any number of `doi:` prefixes are stripped first, so
/// `canonicalize_doi("doi:doi:10.1/x")` and `canonicalize_doi("10.1/x")` agree.
pub fn canonicalize_doi(raw: &str) -> Option<String> {
    bare_doi(raw).map(|bare| format!("{}{}", DOI_PREFIX, bare))
}

/// The identifier without prefix, as used in registry requests.
pub fn bare_doi(raw: &str) -> Option<String> {
    let mut s = raw.trim();
    loop {
        if let Some(rest) = DOI_URL_PREFIXES
            .iter()
            .find_map(|prefix| strip_prefix_ignore_case(s, prefix))
        {
            s = rest.trim_start();
            continue;
        }
        if let Some(rest) = strip_prefix_ignore_case(s, DOI_PREFIX) {
            s = rest.trim_start();
            continue;
        }
        break;
    }

    let s = s.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let n = prefix.len();
    if s.len() >= n && s.is_char_boundary(n) && s[..n].eq_ignore_ascii_case(prefix) {
        Some(&s[n..])
    } else {
        None
    }
}

fn looks_like_doi(value: &str) -> bool {
    bare_doi(value)
        .map(|bare| bare.starts_with("10.") && bare.contains('/'))
        .unwrap_or(false)
}

fn percent_decode(s: &str) -> Cow<'_, str> {
    urlencoding::decode(s).unwrap_or(Cow::Borrowed(s))
}

/// Path-derived DOI of a `doi.org` link, if `href` is one.
fn doi_from_resolver_link(href: &str) -> Option<String> {
    let href = href.trim();
    let absolute: Cow<'_, str> = if href.starts_with("//") {
        Cow::Owned(format!("https:{}", href))
    } else {
        Cow::Borrowed(href)
    };

    let parsed = Url::parse(&absolute).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    if !DOI_HOSTS.contains(&host.as_str()) {
        return None;
    }
    let path = parsed.path().trim_start_matches('/');
    canonicalize_doi(&percent_decode(path))
}

/// Tier 1: a `doi:` token embedded in the URL, or the URL itself on `doi.org`.
pub fn doi_from_url(source_url: &str) -> Option<String> {
    if let Some(doi) = doi_from_resolver_link(source_url) {
        return Some(doi);
    }

    let decoded = percent_decode(source_url);
    // ASCII lowercasing keeps byte offsets aligned with `decoded`.
    let lowered = decoded.to_ascii_lowercase();
    let start = lowered
        .match_indices(DOI_PREFIX)
        .map(|(i, _)| i)
        .find(|&i| i == 0 || URL_TOKEN_BOUNDARIES.contains(&lowered.as_bytes()[i - 1]))?;
    let token = &decoded[start..];
    let end = token.find(['&', '#']).unwrap_or(token.len());
    canonicalize_doi(&token[..end])
}

/// Tier 2: identifier-bearing meta tags.
pub fn doi_from_meta(page: &Page) -> Option<String> {
    DOI_META_LOCATORS.iter().find_map(|locator| {
        locator.values(page).into_iter().find_map(|value| {
            if *locator == GENERIC_IDENTIFIER_LOCATOR && !looks_like_doi(&value) {
                return None;
            }
            canonicalize_doi(&value)
        })
    })
}

/// Tier 3: anchors pointing into the DOI resolver.
pub fn doi_from_anchors(page: &Page) -> Option<String> {
    page.anchors
        .iter()
        .find_map(|href| doi_from_resolver_link(href))
}

/// Tier 4: first DOI-shaped token in the visible text.
pub fn doi_from_text(text: &str) -> Option<String> {
    let m = DOI_TEXT_RE.find(text)?;
    let candidate = m.as_str().trim_end_matches(TRAILING_PUNCTUATION);
    canonicalize_doi(candidate)
}
