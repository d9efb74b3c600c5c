// ABOUTME: MetaFieldExtractor: builds a MetadataRecord from a Page using ordered locator chains.
// ABOUTME: Every field resolves independently; missing tags just leave the field absent.

use chrono::{DateTime, Utc};

use crate::date::parse_date;
use crate::extractors::doi::resolve_doi;
use crate::extractors::fields::{FieldChain, Locator};
use crate::extractors::page::Page;
use crate::record::MetadataRecord;

pub const TITLE: FieldChain = FieldChain::new(&[
    Locator::MetaProperty("og:title"),
    Locator::MetaName("twitter:title"),
    Locator::TitleText,
]);

pub const AUTHOR: FieldChain = FieldChain::new(&[
    Locator::MetaName("author"),
    Locator::MetaProperty("article:author"),
    Locator::MetaProperty("og:author"),
]);

/// Every location an author name may appear; unioned, not ordered fallbacks.
pub const AUTHORS: FieldChain = FieldChain::new(&[
    Locator::MetaName("author"),
    Locator::MetaProperty("article:author"),
    Locator::MetaName("citation_author"),
    Locator::MetaName("dc.creator"),
]);

pub const DESCRIPTION: FieldChain = FieldChain::new(&[
    Locator::MetaName("description"),
    Locator::MetaProperty("og:description"),
    Locator::MetaName("twitter:description"),
]);

pub const KEYWORDS: FieldChain = FieldChain::new(&[
    Locator::MetaName("keywords"),
    Locator::MetaName("news_keywords"),
    Locator::MetaProperty("article:tag"),
]);

pub const PUBLISHER: FieldChain = FieldChain::new(&[
    Locator::MetaName("publisher"),
    Locator::MetaProperty("og:site_name"),
    Locator::MetaName("application-name"),
]);

pub const LANGUAGE: FieldChain = FieldChain::new(&[
    Locator::MetaHttpEquiv("content-language"),
    Locator::HtmlLang,
]);

pub const PUBLICATION_DATE: FieldChain = FieldChain::new(&[
    Locator::MetaProperty("article:published_time"),
    Locator::MetaName("publication_date"),
    Locator::MetaName("publish_date"),
    Locator::MetaName("date"),
    Locator::MetaProperty("og:published_time"),
    Locator::TimeDatetime,
]);

pub const MODIFICATION_DATE: FieldChain = FieldChain::new(&[
    Locator::MetaProperty("article:modified_time"),
    Locator::MetaName("last_modified"),
    Locator::MetaName("modification_date"),
    Locator::MetaProperty("og:updated_time"),
]);

pub const CONTENT_TYPE: FieldChain = FieldChain::new(&[
    Locator::MetaHttpEquiv("content-type"),
    Locator::MetaCharset,
]);

pub const GENERATOR: FieldChain = FieldChain::new(&[Locator::MetaName("generator")]);
pub const VIEWPORT: FieldChain = FieldChain::new(&[Locator::MetaName("viewport")]);
pub const ROBOTS: FieldChain = FieldChain::new(&[Locator::MetaName("robots")]);
pub const REFRESH: FieldChain = FieldChain::new(&[Locator::MetaHttpEquiv("refresh")]);

/// The first present candidate decides; if it does not parse the field is
/// absent rather than falling through to a later candidate.
fn extract_date(page: &Page, chain: &FieldChain) -> Option<DateTime<Utc>> {
    chain.first(page).and_then(|raw| parse_date(&raw))
}

/// Extract every supported field from `page`.
///
/// `source_url` becomes the record's `url` and is the first place a DOI is
/// looked for.
pub fn extract_record(page: &Page, source_url: &str) -> MetadataRecord {
    let mut record = MetadataRecord::new(source_url);

    record.title = TITLE.first(page);
    record.author = AUTHOR.first(page);
    record.authors = AUTHORS.union_split(page, ',');
    record.seed_authors();
    record.description = DESCRIPTION.first(page);
    record.keywords = KEYWORDS.union_split(page, ',');
    record.publisher = PUBLISHER.first(page);
    record.language = LANGUAGE.first(page);
    record.publication_date = extract_date(page, &PUBLICATION_DATE);
    record.last_modification_date = extract_date(page, &MODIFICATION_DATE);
    record.content_type = CONTENT_TYPE.first(page);
    record.generator = GENERATOR.first(page);
    record.viewport = VIEWPORT.first(page);
    record.robots = ROBOTS.first(page);
    record.refresh = REFRESH.first(page);
    record.doi = resolve_doi(page, source_url).map(|resolved| {
        tracing::debug!(doi = %resolved.doi, tier = ?resolved.tier, "resolved DOI");
        resolved.doi
    });

    record
}

/// Parse `html` and extract a record in one step.
pub fn extract_html(html: &str, source_url: &str) -> MetadataRecord {
    extract_record(&Page::parse(html), source_url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    const URL: &str = "https://example.com/article";

    const FULL_HTML: &str = r#"
        <!DOCTYPE html>
        <html lang="en-US">
        <head>
            <meta charset="utf-8">
            <title>Page Title | Site</title>
            <meta property="og:title" content="Open Graph Title">
            <meta name="twitter:title" content="Card Title">
            <meta name="author" content="Jane Doe, John Roe">
            <meta property="article:author" content="Jane Doe">
            <meta name="citation_author" content="Alex Poe">
            <meta name="description" content=" A page about things. ">
            <meta name="keywords" content="science, data">
            <meta name="news_keywords" content="data, news">
            <meta property="og:site_name" content="Example Site">
            <meta property="article:published_time" content="2024-01-15T10:00:00+01:00">
            <meta property="article:modified_time" content="2024-02-01">
            <meta name="generator" content="WordPress 6.4">
            <meta name="viewport" content="width=device-width, initial-scale=1">
            <meta name="robots" content="index, follow">
            <meta http-equiv="refresh" content="300">
            <meta name="citation_doi" content="10.1000/meta">
        </head>
        <body><p>Body text.</p></body>
        </html>
    "#;

    #[test]
    fn extracts_all_fields() {
        let record = extract_html(FULL_HTML, URL);

        assert_eq!(record.title.as_deref(), Some("Open Graph Title"));
        assert_eq!(record.author.as_deref(), Some("Jane Doe, John Roe"));
        assert_eq!(record.authors, vec!["Jane Doe", "John Roe", "Alex Poe"]);
        assert_eq!(record.description.as_deref(), Some("A page about things."));
        assert_eq!(record.keywords, vec!["science", "data", "news"]);
        assert_eq!(record.publisher.as_deref(), Some("Example Site"));
        assert_eq!(record.language.as_deref(), Some("en-US"));
        assert_eq!(
            record.publication_date,
            Some(Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap())
        );
        assert_eq!(
            record.last_modification_date,
            Some(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(record.content_type.as_deref(), Some("text/html; charset=utf-8"));
        assert_eq!(record.generator.as_deref(), Some("WordPress 6.4"));
        assert_eq!(
            record.viewport.as_deref(),
            Some("width=device-width, initial-scale=1")
        );
        assert_eq!(record.robots.as_deref(), Some("index, follow"));
        assert_eq!(record.refresh.as_deref(), Some("300"));
        assert_eq!(record.doi.as_deref(), Some("doi:10.1000/meta"));
        assert_eq!(record.url.as_deref(), Some(URL));
    }

    #[test]
    fn open_graph_title_beats_page_title() {
        let html = r#"<html><head><meta property="og:title" content="A"><title>B</title></head></html>"#;
        assert_eq!(extract_html(html, URL).title.as_deref(), Some("A"));
    }

    #[test]
    fn page_title_is_last_resort() {
        let html = "<html><head><title>  Only   Title </title></head></html>";
        assert_eq!(extract_html(html, URL).title.as_deref(), Some("Only Title"));
    }

    #[test]
    fn empty_document_yields_absent_fields() {
        let record = extract_html("", URL);
        assert_eq!(record, MetadataRecord::new(URL));
    }

    #[test]
    fn single_author_seeds_authors() {
        let html = r#"<meta property="og:author" content="Solo Writer">"#;
        let record = extract_html(html, URL);
        assert_eq!(record.author.as_deref(), Some("Solo Writer"));
        assert_eq!(record.authors, vec!["Solo Writer"]);
    }

    #[test]
    fn unparsable_date_is_dropped() {
        let html = r#"
            <meta property="article:published_time" content="sometime last week-ish">
            <meta name="date" content="2020-01-01">
        "#;
        let record = extract_html(html, URL);
        assert_eq!(record.publication_date, None);
    }

    #[test]
    fn time_element_is_date_fallback() {
        let html = r#"<body><time datetime="2023-12-01T12:00:00Z">Dec 1</time></body>"#;
        let record = extract_html(html, URL);
        assert_eq!(
            record.publication_date,
            Some(Utc.with_ymd_and_hms(2023, 12, 1, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn language_prefers_http_equiv() {
        let html = r#"<html lang="en"><head><meta http-equiv="content-language" content="de-AT"></head></html>"#;
        assert_eq!(extract_html(html, URL).language.as_deref(), Some("de-AT"));
    }

    #[test]
    fn content_type_prefers_http_equiv() {
        let html = r#"<meta charset="utf-8"><meta http-equiv="Content-Type" content="text/html; charset=iso-8859-1">"#;
        assert_eq!(
            extract_html(html, URL).content_type.as_deref(),
            Some("text/html; charset=iso-8859-1")
        );
    }

    #[test]
    fn keywords_and_authors_have_no_repeats() {
        let html = r#"
            <meta name="keywords" content="a, b, a, , c">
            <meta name="news_keywords" content="c, d">
            <meta property="article:tag" content="a">
            <meta name="author" content="X, Y">
            <meta name="citation_author" content="Y">
            <meta name="dc.creator" content="X">
        "#;
        let record = extract_html(html, URL);
        assert_eq!(record.keywords, vec!["a", "b", "c", "d"]);
        assert_eq!(record.authors, vec!["X", "Y"]);
    }
}
