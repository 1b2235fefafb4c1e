//! GitHub releases adapter against a mock API.

mod common;

use httpmock::prelude::*;
use serde_json::json;

use bh::model::{Source, SourceKind};
use bh::sources::{BundleSource, GitHubSource};

use common::manifest_yaml;

fn release_json(server: &MockServer) -> serde_json::Value {
    json!([
        {
            "id": 1,
            "tag_name": "v1.0.0",
            "html_url": "https://github.com/octo/bundles/releases/tag/v1.0.0",
            "published_at": "2026-02-01T12:00:00Z",
            "assets": [
                {
                    "id": 11,
                    "name": "deployment-manifest.yml",
                    "size": 512,
                    "url": server.url("/assets/11"),
                },
                {
                    "id": 12,
                    "name": "pack-1.0.0.zip",
                    "size": 2048,
                    "url": server.url("/assets/12"),
                },
            ],
        },
        {
            "id": 2,
            "tag_name": "v0.9.0",
            "html_url": "https://github.com/octo/bundles/releases/tag/v0.9.0",
            "published_at": "2026-01-01T12:00:00Z",
            "assets": [
                {
                    "id": 21,
                    "name": "pack-0.9.0.zip",
                    "size": 1024,
                    "url": server.url("/assets/21"),
                },
            ],
        },
        {
            "id": 3,
            "tag_name": "v0.8.0",
            "html_url": "https://github.com/octo/bundles/releases/tag/v0.8.0",
            "published_at": "2025-12-01T12:00:00Z",
            "assets": [
                {
                    "id": 31,
                    "name": "deployment-manifest.yml",
                    "size": 512,
                    "url": server.url("/assets/31"),
                },
            ],
        },
    ])
}

fn adapter(server: &MockServer) -> GitHubSource {
    let source = Source::new("gh-test", SourceKind::GitHub, "octo/bundles")
        .with_token(Some("tok".to_string()));
    GitHubSource::with_api_base(source, &server.base_url()).unwrap()
}

async fn seed(server: &MockServer) -> httpmock::Mock<'_> {
    let listing = server
        .mock_async(|when, then| {
            when.method(GET).path("/repos/octo/bundles/releases");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(release_json(server));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/assets/11");
            then.status(200)
                .header("content-type", "application/octet-stream")
                .body(manifest_yaml("pack"));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/assets/12");
            then.status(200)
                .header("content-type", "application/octet-stream")
                .body("PK-fake-zip-bytes");
        })
        .await;
    listing
}

#[tokio::test]
async fn release_with_both_assets_yields_exactly_one_bundle() {
    let server = MockServer::start_async().await;
    seed(&server).await;

    let adapter = adapter(&server);
    let bundles = adapter.list_bundles().await.unwrap();

    // Releases missing the manifest or the archive yield nothing.
    assert_eq!(bundles.len(), 1);
    let bundle = &bundles[0];
    assert_eq!(bundle.id, "pack-1.0.0");
    assert_eq!(bundle.version, "1.0.0");
    assert_eq!(bundle.name, "Test Pack");
    assert_eq!(bundle.size, "2.0 KB");
    assert_eq!(bundle.source_id, "gh-test");
    assert_eq!(bundle.tags, vec!["testing".to_string()]);
    assert_eq!(bundle.license, "MIT");
    assert_eq!(bundle.last_updated, "2026-02-01T12:00:00Z");
    assert!(bundle.manifest_url.ends_with("/assets/11"));
    assert!(bundle.download_url.ends_with("/assets/12"));
}

#[tokio::test]
async fn listing_is_cached_for_subsequent_calls() {
    let server = MockServer::start_async().await;
    let listing = seed(&server).await;

    let adapter = adapter(&server);
    adapter.list_bundles().await.unwrap();
    adapter.list_bundles().await.unwrap();
    adapter.get_bundle("pack-1.0.0").await.unwrap();

    assert_eq!(listing.hits_async().await, 1);
}

#[tokio::test]
async fn download_returns_archive_asset_bytes() {
    let server = MockServer::start_async().await;
    seed(&server).await;

    let adapter = adapter(&server);
    let bundles = adapter.list_bundles().await.unwrap();
    let bytes = adapter.download_bundle(&bundles[0]).await.unwrap();
    assert_eq!(bytes, b"PK-fake-zip-bytes");
}

#[tokio::test]
async fn broken_manifest_asset_skips_that_release_only() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/repos/octo/bundles/releases");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!([
                    {
                        "id": 1,
                        "tag_name": "v1.0.0",
                        "html_url": "",
                        "published_at": null,
                        "assets": [
                            {"id": 11, "name": "deployment-manifest.yml", "size": 10, "url": server.url("/assets/broken")},
                            {"id": 12, "name": "pack.zip", "size": 10, "url": server.url("/assets/12")},
                        ],
                    },
                ]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/assets/broken");
            then.status(200)
                .header("content-type", "application/octet-stream")
                .body("id: [not: valid");
        })
        .await;

    let adapter = adapter(&server);
    let bundles = adapter.list_bundles().await.unwrap();
    assert!(bundles.is_empty());

    let validation = adapter.validate().await;
    assert!(validation.valid);
    assert_eq!(validation.bundle_count, Some(0));
    assert!(!validation.warnings.is_empty());
}

#[tokio::test]
async fn unreachable_listing_fails_validation() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/repos/octo/bundles/releases");
            then.status(500)
                .header("content-type", "application/json")
                .body(r#"{"message":"boom"}"#);
        })
        .await;

    let adapter = adapter(&server);
    assert!(adapter.list_bundles().await.is_err());
    let validation = adapter.validate().await;
    assert!(!validation.valid);
    assert!(validation.errors[0].contains("octo/bundles"));
}
