// ABOUTME: MetadataRecord holding the pipeline output for one URL, plus the ReputationSummary shape.
// ABOUTME: Core fields always serialize (null or []); the opt-in reputations/blocklist fields only when set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::blocklist::BlocklistVerdict;
use crate::extractors::fields::dedup_preserving_order;

/// The structured metadata for one analyzed page.
///
/// Created empty, filled by HTML extraction, then overlaid by the registry and
/// the reputation lookup, in that order. Field names are part of the output
/// contract and never change between requests.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct MetadataRecord {
    pub title: Option<String>,
    pub author: Option<String>,
    pub authors: Vec<String>,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub publisher: Option<String>,
    pub language: Option<String>,
    pub publication_date: Option<DateTime<Utc>>,
    pub last_modification_date: Option<DateTime<Utc>>,
    pub content_type: Option<String>,
    pub generator: Option<String>,
    pub viewport: Option<String>,
    pub robots: Option<String>,
    pub refresh: Option<String>,
    pub doi: Option<String>,
    pub url: Option<String>,
    pub ip_address: Option<String>,
    pub reputation: Option<ReputationSummary>,
    /// Every successful summary when all resolved addresses were queried.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reputations: Vec<ReputationSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocklist: Option<BlocklistVerdict>,
}

impl MetadataRecord {
    /// An empty record for the given source URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }

    /// Seed `authors` with the single `author` when no list was found.
    pub fn seed_authors(&mut self) {
        if self.authors.is_empty() {
            if let Some(ref author) = self.author {
                self.authors.push(author.clone());
            }
        }
    }

    /// Append keywords, keeping the list free of repeats.
    pub fn push_keywords<I>(&mut self, keywords: I)
    where
        I: IntoIterator<Item = String>,
    {
        let existing = std::mem::take(&mut self.keywords);
        self.keywords = dedup_preserving_order(existing.into_iter().chain(keywords));
    }

    /// Replace the author list, deduplicated, and make its head the primary author.
    pub fn replace_authors(&mut self, authors: Vec<String>) {
        self.authors = dedup_preserving_order(authors);
        if let Some(first) = self.authors.first() {
            self.author = Some(first.clone());
        }
    }

    pub fn has_doi(&self) -> bool {
        self.doi.as_ref().map_or(false, |d| !d.is_empty())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Pretty JSON with two-space indentation.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Compact IP reputation signals. Every key is always present; signals the
/// upstream response lacked are `null`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ReputationSummary {
    pub fraud_score: Option<Value>,
    pub fraudulent: Option<Value>,
    pub country_code: Option<Value>,
    #[serde(rename = "ISP")]
    pub isp: Option<Value>,
    #[serde(rename = "ASN")]
    pub asn: Option<Value>,
    #[serde(rename = "_ip")]
    pub ip: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn empty_record_serializes_every_field() {
        let value = serde_json::to_value(MetadataRecord::default()).unwrap();
        assert_eq!(
            value,
            json!({
                "title": null,
                "author": null,
                "authors": [],
                "description": null,
                "keywords": [],
                "publisher": null,
                "language": null,
                "publication_date": null,
                "last_modification_date": null,
                "content_type": null,
                "generator": null,
                "viewport": null,
                "robots": null,
                "refresh": null,
                "doi": null,
                "url": null,
                "ip_address": null,
                "reputation": null
            })
        );
    }

    #[test]
    fn dates_serialize_as_iso8601() {
        let record = MetadataRecord {
            publication_date: Some(Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()),
            ..Default::default()
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["publication_date"], json!("2024-06-15T12:00:00Z"));
    }

    #[test]
    fn reputation_shape_is_stable() {
        let summary = ReputationSummary {
            fraud_score: Some(json!(0)),
            ip: "93.184.216.34".to_string(),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&summary).unwrap(),
            json!({
                "fraud_score": 0,
                "fraudulent": null,
                "country_code": null,
                "ISP": null,
                "ASN": null,
                "_ip": "93.184.216.34"
            })
        );
    }

    #[test]
    fn opt_in_fields_serialize_only_when_set() {
        let record = MetadataRecord {
            reputations: vec![ReputationSummary {
                ip: "203.0.113.1".into(),
                ..Default::default()
            }],
            blocklist: Some(BlocklistVerdict {
                domain: "example.com".into(),
                listed: false,
                code: None,
            }),
            ..Default::default()
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["reputations"][0]["_ip"], json!("203.0.113.1"));
        assert_eq!(
            value["blocklist"],
            json!({"domain": "example.com", "listed": false, "code": null})
        );
    }

    #[test]
    fn seed_authors_only_when_empty() {
        let mut record = MetadataRecord {
            author: Some("Jane".into()),
            ..Default::default()
        };
        record.seed_authors();
        assert_eq!(record.authors, vec!["Jane".to_string()]);

        let mut record = MetadataRecord {
            author: Some("Jane".into()),
            authors: vec!["Bob".into()],
            ..Default::default()
        };
        record.seed_authors();
        assert_eq!(record.authors, vec!["Bob".to_string()]);
    }

    #[test]
    fn push_keywords_dedupes() {
        let mut record = MetadataRecord {
            keywords: vec!["a".into(), "b".into()],
            ..Default::default()
        };
        record.push_keywords(vec!["b".to_string(), "c".to_string(), "a".to_string()]);
        assert_eq!(record.keywords, vec!["a", "b", "c"]);
    }

    #[test]
    fn replace_authors_sets_primary() {
        let mut record = MetadataRecord {
            author: Some("Old".into()),
            authors: vec!["Old".into(), "Other".into()],
            ..Default::default()
        };
        record.replace_authors(vec!["New".into(), "Second".into(), "New".into()]);
        assert_eq!(record.author.as_deref(), Some("New"));
        assert_eq!(record.authors, vec!["New", "Second"]);
    }

    #[test]
    fn new_sets_url() {
        let record = MetadataRecord::new("http://example.com/x");
        assert_eq!(record.url.as_deref(), Some("http://example.com/x"));
        assert!(!record.has_doi());
    }

    #[test]
    fn pretty_json_round_trips() {
        let record = MetadataRecord {
            title: Some("T".into()),
            keywords: vec!["k".into()],
            ..Default::default()
        };
        let text = record.to_json_pretty().unwrap();
        assert!(text.contains("\n  \"title\": \"T\""));
        let back: MetadataRecord = serde_json::from_str(&text).unwrap();
        assert_eq!(back, record);
    }
}
