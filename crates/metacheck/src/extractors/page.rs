// ABOUTME: Parsed-document abstraction used by every field extractor.
// ABOUTME: Page is built once from scraper::Html and exposes meta tags, title, anchors and visible text.

//! A flattened view of an HTML document.
//!
//! Field extraction never touches the DOM directly. `Page::parse` walks the
//! document once and records everything the extractors consult, so the
//! strategies in [`crate::extractors::fields`] are plain functions over owned
//! data and do not depend on the HTML parser.

use scraper::{ElementRef, Html, Node, Selector};

/// A single `<meta>` element. Attribute values are kept verbatim.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetaTag {
    pub name: Option<String>,
    pub property: Option<String>,
    pub http_equiv: Option<String>,
    pub itemprop: Option<String>,
    pub charset: Option<String>,
    pub content: Option<String>,
}

impl MetaTag {
    fn from_element(el: &ElementRef<'_>) -> Self {
        let attr = |name: &str| el.value().attr(name).map(str::to_string);
        Self {
            name: attr("name"),
            property: attr("property"),
            http_equiv: attr("http-equiv"),
            itemprop: attr("itemprop"),
            charset: attr("charset"),
            content: attr("content"),
        }
    }
}

/// Everything the extractors read from a document, in document order.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub metas: Vec<MetaTag>,
    /// Whitespace-normalized text of the first `<title>`.
    pub title: Option<String>,
    /// The `lang` attribute of the root `<html>` element.
    pub html_lang: Option<String>,
    /// `datetime` attributes of `<time>` elements.
    pub time_datetimes: Vec<String>,
    /// `href` attributes of `<a>` elements.
    pub anchors: Vec<String>,
    /// Visible body text (script, style and template contents excluded).
    pub text: String,
}

/// Elements whose text never renders.
const INVISIBLE_TAGS: &[&str] = &["script", "style", "noscript", "template", "head"];

impl Page {
    /// Parse an HTML string into a `Page`. Never fails; malformed markup just
    /// yields fewer entries.
    pub fn parse(html: &str) -> Self {
        let doc = Html::parse_document(html);
        Self::from_document(&doc)
    }

    pub fn from_document(doc: &Html) -> Self {
        let metas = select_all(doc, "meta")
            .map(|el| MetaTag::from_element(&el))
            .collect();

        let title = select_all(doc, "title")
            .map(|el| normalize_whitespace(&el.text().collect::<Vec<_>>().join(" ")))
            .find(|t| !t.is_empty());

        let html_lang = select_all(doc, "html")
            .next()
            .and_then(|el| el.value().attr("lang").map(str::to_string));

        let time_datetimes = select_all(doc, "time[datetime]")
            .filter_map(|el| el.value().attr("datetime").map(str::to_string))
            .collect();

        let anchors = select_all(doc, "a[href]")
            .filter_map(|el| el.value().attr("href").map(str::to_string))
            .collect();

        let text = select_all(doc, "body")
            .next()
            .map(|body| visible_text(&body))
            .unwrap_or_default();

        Self {
            metas,
            title,
            html_lang,
            time_datetimes,
            anchors,
            text,
        }
    }
}

fn select_all<'a>(doc: &'a Html, css: &str) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    let selector = Selector::parse(css).ok();
    selector
        .into_iter()
        .flat_map(move |sel| doc.select(&sel).collect::<Vec<_>>())
}

/// Collect text nodes below `root`, skipping invisible subtrees.
fn visible_text(root: &ElementRef<'_>) -> String {
    let mut parts = Vec::new();
    for node in root.descendants() {
        if let Node::Text(text) = node.value() {
            let hidden = node.ancestors().any(|a| {
                a.value()
                    .as_element()
                    .map(|el| INVISIBLE_TAGS.contains(&el.name()))
                    .unwrap_or(false)
            });
            if !hidden {
                let text: &str = text;
                parts.push(text.to_string());
            }
        }
    }
    normalize_whitespace(&parts.join(" "))
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE_HTML: &str = r#"
        <!DOCTYPE html>
        <html lang="en-GB">
        <head>
            <title>  Sample
                Page </title>
            <meta charset="utf-8">
            <meta name="author" content="Jane Doe">
            <meta property="og:title" content="OG Title">
            <meta http-equiv="refresh" content="30">
            <script>var hidden = "10.9999/script";</script>
        </head>
        <body>
            <p>Hello <b>world</b></p>
            <style>.x { color: red }</style>
            <a href="https://doi.org/10.1000/xyz">link</a>
            <a>no href</a>
            <time datetime="2023-12-01T12:00:00Z">December 1, 2023</time>
        </body>
        </html>
    "#;

    #[test]
    fn collects_meta_tags_in_document_order() {
        let page = Page::parse(SAMPLE_HTML);
        assert_eq!(page.metas.len(), 4);
        assert_eq!(page.metas[0].charset.as_deref(), Some("utf-8"));
        assert_eq!(page.metas[1].name.as_deref(), Some("author"));
        assert_eq!(page.metas[1].content.as_deref(), Some("Jane Doe"));
        assert_eq!(page.metas[2].property.as_deref(), Some("og:title"));
        assert_eq!(page.metas[3].http_equiv.as_deref(), Some("refresh"));
    }

    #[test]
    fn normalizes_title_and_reads_lang() {
        let page = Page::parse(SAMPLE_HTML);
        assert_eq!(page.title.as_deref(), Some("Sample Page"));
        assert_eq!(page.html_lang.as_deref(), Some("en-GB"));
    }

    #[test]
    fn collects_anchors_and_time_elements() {
        let page = Page::parse(SAMPLE_HTML);
        assert_eq!(page.anchors, vec!["https://doi.org/10.1000/xyz".to_string()]);
        assert_eq!(page.time_datetimes, vec!["2023-12-01T12:00:00Z".to_string()]);
    }

    #[test]
    fn visible_text_skips_scripts_and_styles() {
        let page = Page::parse(SAMPLE_HTML);
        assert!(page.text.contains("Hello world"));
        assert!(!page.text.contains("10.9999/script"));
        assert!(!page.text.contains("color: red"));
    }

    #[test]
    fn empty_document_is_all_absent() {
        let page = Page::parse("");
        assert!(page.metas.is_empty());
        assert!(page.title.is_none());
        assert!(page.html_lang.is_none());
        assert!(page.anchors.is_empty());
        assert_eq!(page.text, "");
    }
}
