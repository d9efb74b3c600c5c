// ABOUTME: DataCite registry enrichment: DOI lookup, lenient payload parsing into RegistryWork, record overlay.
// ABOUTME: The overlay is a pure function so each precedence rule is testable without a network.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::date::parse_date;
use crate::error::EnrichError;
use crate::extractors::doi::canonicalize_doi;
use crate::record::MetadataRecord;

const SERVICE: &str = "registry";
const ACCEPT: &str = "application/vnd.api+json";

/// HTTP client for the DataCite REST API.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl RegistryClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            timeout,
        }
    }

    /// `<base>/<bare doi>`, each DOI path segment percent-encoded.
    pub fn work_url(&self, bare_doi: &str) -> String {
        let path = bare_doi
            .split('/')
            .map(|seg| urlencoding::encode(seg).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Fetch and parse the registry entry for `bare_doi`.
    pub async fn lookup(&self, bare_doi: &str) -> Result<RegistryWork, EnrichError> {
        let url = self.work_url(bare_doi);
        tracing::debug!(url = %url, "querying registry");

        let response = self
            .http
            .get(&url)
            .header(reqwest::header::ACCEPT, ACCEPT)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(EnrichError::Status {
                service: SERVICE,
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(classify)?;
        let value: Value = serde_json::from_slice(&body)
            .map_err(|e| EnrichError::malformed(SERVICE, format!("body is not JSON: {}", e)))?;

        RegistryWork::from_json(&value)
    }
}

fn classify(e: reqwest::Error) -> EnrichError {
    if e.is_timeout() {
        EnrichError::Timeout(SERVICE)
    } else {
        EnrichError::Http(e)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistryDescription {
    pub text: String,
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistryDate {
    pub date: String,
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelatedIdentifier {
    pub identifier: String,
    pub kind: Option<String>,
}

/// The fields of a DataCite work that the overlay consults.
///
/// Every field is optional; a payload missing a field (or carrying it with an
/// unexpected shape) just leaves it empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistryWork {
    pub doi: Option<String>,
    pub titles: Vec<String>,
    pub descriptions: Vec<RegistryDescription>,
    pub publisher: Option<String>,
    pub dates: Vec<RegistryDate>,
    pub creators: Vec<String>,
    pub subjects: Vec<String>,
    pub contributors: Vec<String>,
    pub related_identifiers: Vec<RelatedIdentifier>,
    pub url: Option<String>,
    pub landing_page: Option<String>,
    pub content_urls: Vec<String>,
    pub locations: Vec<String>,
    pub publication_year: Option<String>,
    pub resource_type: Option<String>,
}

impl RegistryWork {
    /// Parse a registry response. Only the envelope is strict: the payload
    /// must carry a `data.attributes` object.
    pub fn from_json(v: &Value) -> Result<Self, EnrichError> {
        let attrs = v
            .get("data")
            .and_then(|d| d.get("attributes"))
            .filter(|a| a.is_object())
            .ok_or_else(|| EnrichError::malformed(SERVICE, "missing data.attributes object"))?;

        let doi = text(&attrs["doi"]).or_else(|| v["data"].get("id").and_then(text));

        let titles = items(attrs, "titles")
            .filter_map(|t| t.get("title").and_then(text))
            .collect();

        let descriptions = items(attrs, "descriptions")
            .filter_map(|d| {
                d.get("description").and_then(text).map(|text| RegistryDescription {
                    text,
                    kind: d.get("descriptionType").and_then(self::text),
                })
            })
            .collect();

        let publisher = text(&attrs["publisher"])
            .or_else(|| attrs["publisher"].get("name").and_then(text));

        let dates = items(attrs, "dates")
            .filter_map(|d| {
                d.get("date").and_then(text).map(|date| RegistryDate {
                    date,
                    kind: d.get("dateType").and_then(self::text),
                })
            })
            .collect();

        let subjects = items(attrs, "subjects")
            .filter_map(|s| s.get("subject").and_then(text))
            .collect();

        let related_identifiers = items(attrs, "relatedIdentifiers")
            .filter_map(|r| {
                r.get("relatedIdentifier").and_then(text).map(|identifier| RelatedIdentifier {
                    identifier,
                    kind: r.get("relatedIdentifierType").and_then(self::text),
                })
            })
            .collect();

        let landing_page = text(&attrs["landingPage"])
            .or_else(|| attrs["landingPage"].get("url").and_then(text));

        let content_urls = match &attrs["contentUrl"] {
            Value::Array(urls) => urls.iter().filter_map(text).collect(),
            other => text(other).into_iter().collect(),
        };

        let locations = items(attrs, "locations")
            .filter_map(|l| l.get("url").and_then(text))
            .collect();

        let publication_year = match &attrs["publicationYear"] {
            Value::Number(n) => Some(n.to_string()),
            other => text(other),
        };

        let types = &attrs["types"];
        let resource_type = ["resourceTypeGeneral", "citeproc", "ris"]
            .iter()
            .find_map(|key| types.get(*key).and_then(text));

        Ok(Self {
            doi,
            titles,
            descriptions,
            publisher,
            dates,
            creators: names(attrs, "creators"),
            subjects,
            contributors: names(attrs, "contributors"),
            related_identifiers,
            url: text(&attrs["url"]),
            landing_page,
            content_urls,
            locations,
            publication_year,
            resource_type,
        })
    }

    /// The abstract if one is labelled, else the first description.
    pub fn description(&self) -> Option<&str> {
        self.descriptions
            .iter()
            .find(|d| kind_is(&d.kind, "abstract"))
            .or_else(|| self.descriptions.first())
            .map(|d| d.text.as_str())
    }

    /// First non-empty URL among `url`, `landingPage`, `contentUrl`, `locations`.
    pub fn fallback_url(&self) -> Option<&str> {
        self.url
            .as_deref()
            .or(self.landing_page.as_deref())
            .or_else(|| self.content_urls.first().map(String::as_str))
            .or_else(|| self.locations.first().map(String::as_str))
    }
}

/// Trimmed non-empty string value.
fn text(v: &Value) -> Option<String> {
    v.as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn items<'a>(attrs: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> + 'a {
    attrs
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

/// Person names from `creators` / `contributors`: `name`, else `givenName familyName`.
fn names(attrs: &Value, key: &str) -> Vec<String> {
    items(attrs, key)
        .filter_map(|p| {
            p.get("name").and_then(text).or_else(|| {
                let parts: Vec<String> = ["givenName", "familyName"]
                    .iter()
                    .filter_map(|k| p.get(*k).and_then(text))
                    .collect();
                (!parts.is_empty()).then(|| parts.join(" "))
            })
        })
        .collect()
}

fn kind_is(kind: &Option<String>, expected: &str) -> bool {
    kind.as_deref()
        .map_or(false, |k| k.trim().eq_ignore_ascii_case(expected))
}

/// Overlay authoritative registry values onto `record`.
///
/// Only non-empty registry values are applied. `original_url` is the URL the
/// record was extracted from; a related URL replaces the record's `url` only
/// while it still holds that value.
pub fn overlay(record: &mut MetadataRecord, work: &RegistryWork, original_url: &str) {
    if let Some(title) = work.titles.first() {
        record.title = Some(title.clone());
    }
    if let Some(description) = work.description() {
        record.description = Some(description.to_string());
    }
    if let Some(ref publisher) = work.publisher {
        record.publisher = Some(publisher.clone());
    }

    for entry in &work.dates {
        let Some(parsed) = parse_date(&entry.date) else {
            tracing::debug!(date = %entry.date, "skipping unparsable registry date");
            continue;
        };
        apply_date(record, &entry.kind, parsed);
    }

    if !work.creators.is_empty() {
        record.replace_authors(work.creators.clone());
    }
    if !work.subjects.is_empty() {
        record.keywords = Vec::new();
        record.push_keywords(work.subjects.iter().cloned());
    }
    if !work.contributors.is_empty() {
        record.push_keywords(work.contributors.iter().cloned());
    }

    if let Some(doi) = work.doi.as_deref().and_then(canonicalize_doi) {
        record.doi = Some(doi);
    }

    for related in &work.related_identifiers {
        if kind_is(&related.kind, "url") {
            if record.url.as_deref() == Some(original_url) {
                record.url = Some(related.identifier.clone());
            }
        } else if kind_is(&related.kind, "doi") && !record.has_doi() {
            record.doi = canonicalize_doi(&related.identifier);
        }
    }

    if record.url.is_none() {
        record.url = work.fallback_url().map(str::to_string);
    }

    if record.publication_date.is_none() {
        record.publication_date = work.publication_year.as_deref().and_then(parse_date);
    }

    if let Some(ref resource_type) = work.resource_type {
        record.content_type = Some(resource_type.clone());
    }
}

fn apply_date(record: &mut MetadataRecord, kind: &Option<String>, date: DateTime<Utc>) {
    if kind_is(kind, "issued") {
        record.publication_date = Some(date);
    } else if kind_is(kind, "updated") {
        record.last_modification_date = Some(date);
    } else if kind_is(kind, "available") && record.publication_date.is_none() {
        record.publication_date = Some(date);
    }
}
