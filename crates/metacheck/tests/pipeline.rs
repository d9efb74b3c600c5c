// ABOUTME: End-to-end tests for the metacheck pipeline against mock page, registry and reputation servers.
// ABOUTME: Exercises the public API only: ClientBuilder, Client::analyze and the serialized record.

use httpmock::prelude::*;
use metacheck::{canonicalize_doi, Client, ClientBuilder, MetadataRecord};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

const LANDING_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Ocean Temperatures 1990-2020 | Data Portal</title>
    <meta property="og:title" content="Ocean Temperatures 1990-2020">
    <meta name="description" content="Monthly sea surface temperature grids.">
    <meta name="citation_author" content="Rivera, Ana">
    <meta name="keywords" content="oceans, climate">
    <meta property="article:published_time" content="2021-06-01T00:00:00Z">
    <meta name="robots" content="index, follow">
</head>
<body>
    <p>Cite as <a href="https://doi.org/10.5072/ocean.temps">doi</a>.</p>
</body>
</html>"#;

fn registry_payload() -> Value {
    json!({
        "data": {
            "id": "10.5072/ocean.temps",
            "attributes": {
                "doi": "10.5072/OCEAN.TEMPS",
                "titles": [{"title": "Global Ocean Temperatures, 1990-2020"}],
                "descriptions": [{"description": "Gridded SST.", "descriptionType": "Abstract"}],
                "publisher": "Example Data Center",
                "creators": [
                    {"givenName": "Ana", "familyName": "Rivera"},
                    {"name": "Chen, Wei"}
                ],
                "dates": [
                    {"date": "2021-07-01", "dateType": "Available"},
                    {"date": "2021-05-20", "dateType": "Issued"},
                    {"date": "2023-02-02", "dateType": "Updated"}
                ],
                "subjects": [{"subject": "Oceanography"}],
                "types": {"resourceTypeGeneral": "Dataset"}
            }
        }
    })
}

fn builder(server: &MockServer) -> ClientBuilder {
    Client::builder()
        .allow_private_networks(true)
        .registry_base_url(server.url("/dois"))
        .reputation_base_url(server.base_url())
}

#[tokio::test]
async fn full_pipeline_produces_enriched_record() {
    let server = MockServer::start();
    let page = server.mock(|when, then| {
        when.method(GET).path("/dataset/42");
        then.status(200)
            .header("content-type", "text/html; charset=utf-8")
            .body(LANDING_PAGE);
    });
    let registry = server.mock(|when, then| {
        when.method(GET).path("/dois/10.5072/ocean.temps");
        then.status(200).json_body(registry_payload());
    });
    let reputation = server.mock(|when, then| {
        when.method(GET).path("/api/json/ip/k3y/127.0.0.1");
        then.status(200).json_body(json!({
            "success": true,
            "fraud_score": 0,
            "fraudulent": false,
            "country_code": "N/A",
            "isp": "Local",
            "ASN": 0
        }));
    });

    let client = builder(&server).api_key(Some("k3y".into())).build();
    let url = server.url("/dataset/42");
    let record = client.analyze(&url).await.unwrap();

    page.assert();
    registry.assert();
    reputation.assert();

    let value = serde_json::to_value(&record).unwrap();
    assert_eq!(
        value,
        json!({
            "title": "Global Ocean Temperatures, 1990-2020",
            "author": "Ana Rivera",
            "authors": ["Ana Rivera", "Chen, Wei"],
            "description": "Gridded SST.",
            "keywords": ["Oceanography"],
            "publisher": "Example Data Center",
            "language": "en",
            "publication_date": "2021-05-20T00:00:00Z",
            "last_modification_date": "2023-02-02T00:00:00Z",
            "content_type": "Dataset",
            "generator": null,
            "viewport": null,
            "robots": "index, follow",
            "refresh": null,
            "doi": "doi:10.5072/OCEAN.TEMPS",
            "url": url,
            "ip_address": "127.0.0.1",
            "reputation": {
                "fraud_score": 0,
                "fraudulent": false,
                "country_code": "N/A",
                "ISP": "Local",
                "ASN": 0,
                "_ip": "127.0.0.1"
            }
        })
    );
}

#[tokio::test]
async fn unreachable_registry_keeps_html_values() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/dataset/42");
        then.status(200).body(LANDING_PAGE);
    });
    server.mock(|when, then| {
        when.method(GET).path("/dois/10.5072/ocean.temps");
        then.status(200).body("not json at all");
    });

    let url = server.url("/dataset/42");
    let record = builder(&server).build().analyze(&url).await.unwrap();

    assert_eq!(record.title.as_deref(), Some("Ocean Temperatures 1990-2020"));
    assert_eq!(record.authors, vec!["Rivera, Ana"]);
    assert_eq!(record.keywords, vec!["oceans", "climate"]);
    assert_eq!(record.doi.as_deref(), Some("doi:10.5072/ocean.temps"));
    assert_eq!(
        record.publication_date.map(|d| d.to_rfc3339()),
        Some("2021-06-01T00:00:00+00:00".to_string())
    );
}

#[tokio::test]
async fn doi_in_query_string_wins_over_page() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/view");
        then.status(200).body(LANDING_PAGE);
    });

    let url = format!("{}?id=doi:10.1/x&lang=en", server.url("/view"));
    let record = builder(&server)
        .enable_registry(false)
        .build()
        .analyze(&url)
        .await
        .unwrap();
    assert_eq!(record.doi.as_deref(), Some("doi:10.1/x"));
}

#[tokio::test]
async fn analyze_html_matches_fetch_path() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/same");
        then.status(200).body(LANDING_PAGE);
    });

    let client = builder(&server).enable_registry(false).build();
    let url = server.url("/same");
    let fetched = client.analyze(&url).await.unwrap();
    let supplied = client.analyze_html(LANDING_PAGE, &url).await.unwrap();
    assert_eq!(fetched, supplied);
}

#[tokio::test]
async fn empty_page_yields_all_absent_record() {
    let client = Client::builder().enable_registry(false).build();
    let record = client
        .analyze_html("", "https://example.com/empty")
        .await
        .unwrap();
    assert_eq!(record, MetadataRecord::new("https://example.com/empty"));
    let value: Value = serde_json::from_str(&record.to_json().unwrap()).unwrap();
    assert_eq!(value["authors"], json!([]));
    assert_eq!(value["keywords"], json!([]));
    assert_eq!(value["reputation"], Value::Null);
}

#[test]
fn canonicalization_is_idempotent() {
    for raw in [
        "10.1000/xyz",
        "doi:10.1000/xyz",
        "DOI: 10.1000/xyz",
        "https://doi.org/10.1000/xyz",
        "https://doi.org/doi:10.1000/xyz",
        "http://dx.doi.org/https://doi.org/10.1000/xyz",
    ] {
        let once = canonicalize_doi(raw);
        assert_eq!(once.as_deref(), Some("doi:10.1000/xyz"), "{}", raw);
        assert_eq!(once.as_deref().and_then(canonicalize_doi), once);
    }
}
