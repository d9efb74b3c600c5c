// ABOUTME: Selector-fallback chains: Locator strategies over a Page and FieldChain ordering.
// ABOUTME: Single-valued fields take the first non-empty locator; multi-valued fields union and dedupe.

//! Generic field extraction utilities.
//!
//! Key behaviors:
//! - Locators in a chain are tried in order; first non-empty value wins.
//! - Within a locator, the first matching element in document order wins.
//! - Values are trimmed; empty-after-trim counts as no match.
//! - Meta attribute names (`name`, `property`, `http-equiv`, `itemprop`)
//!   match ASCII case-insensitively.

use std::collections::HashSet;

use crate::extractors::page::{MetaTag, Page};

/// One candidate location for a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locator {
    /// `<meta name="..." content>`
    MetaName(&'static str),
    /// `<meta property="..." content>`
    MetaProperty(&'static str),
    /// `<meta http-equiv="..." content>`
    MetaHttpEquiv(&'static str),
    /// `<meta itemprop="..." content>`
    MetaItemprop(&'static str),
    /// `<meta charset>`, rendered as an HTML content type.
    MetaCharset,
    /// Text of `<title>`.
    TitleText,
    /// `<html lang>`.
    HtmlLang,
    /// `<time datetime>`.
    TimeDatetime,
}

impl Locator {
    /// All non-empty values for this locator, in document order.
    pub fn values(&self, page: &Page) -> Vec<String> {
        match *self {
            Locator::MetaName(key) => meta_contents(page, key, |m| m.name.as_deref()),
            Locator::MetaProperty(key) => meta_contents(page, key, |m| m.property.as_deref()),
            Locator::MetaHttpEquiv(key) => meta_contents(page, key, |m| m.http_equiv.as_deref()),
            Locator::MetaItemprop(key) => meta_contents(page, key, |m| m.itemprop.as_deref()),
            Locator::MetaCharset => page
                .metas
                .iter()
                .filter_map(|m| m.charset.as_deref().and_then(trimmed))
                .map(|cs| format!("text/html; charset={}", cs))
                .collect(),
            Locator::TitleText => page.title.iter().filter_map(|t| trimmed(t)).collect(),
            Locator::HtmlLang => page.html_lang.iter().filter_map(|l| trimmed(l)).collect(),
            Locator::TimeDatetime => page
                .time_datetimes
                .iter()
                .filter_map(|d| trimmed(d))
                .collect(),
        }
    }

    /// The first non-empty value for this locator.
    pub fn first(&self, page: &Page) -> Option<String> {
        self.values(page).into_iter().next()
    }
}

fn meta_contents<F>(page: &Page, key: &str, attr: F) -> Vec<String>
where
    F: Fn(&MetaTag) -> Option<&str>,
{
    page.metas
        .iter()
        .filter(|m| {
            attr(m)
                .map(|v| v.trim().eq_ignore_ascii_case(key))
                .unwrap_or(false)
        })
        .filter_map(|m| m.content.as_deref().and_then(trimmed))
        .collect()
}

/// An ordered list of locators for one field.
#[derive(Debug, Clone, Copy)]
pub struct FieldChain {
    pub locators: &'static [Locator],
}

impl FieldChain {
    pub const fn new(locators: &'static [Locator]) -> Self {
        Self { locators }
    }

    /// Value of the first locator that yields anything.
    pub fn first(&self, page: &Page) -> Option<String> {
        self.locators.iter().find_map(|loc| loc.first(page))
    }

    /// Union of every locator's values, each split on `sep`, trimmed and
    /// deduplicated preserving first occurrence.
    pub fn union_split(&self, page: &Page, sep: char) -> Vec<String> {
        let parts = self.locators.iter().flat_map(|loc| {
            loc.values(page)
                .into_iter()
                .flat_map(|v| v.split(sep).filter_map(trimmed).collect::<Vec<_>>())
        });
        dedup_preserving_order(parts)
    }
}

/// Trim both ends, treating empty-after-trim as absent. Interior
/// whitespace is kept as written.
pub fn trimmed(value: &str) -> Option<String> {
    let t = value.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

/// Drop repeated values while keeping the first occurrence of each.
pub fn dedup_preserving_order<I>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
