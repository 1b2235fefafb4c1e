//! Fetch and download behavior against a mock HTTP server.

mod common;

use httpmock::prelude::*;

use bh::auth::MAX_AUTH_ATTEMPTS;
use bh::fetch::{http_client, AuthScheme, Downloader, Fetcher, TrustDomains, MAX_REDIRECTS};
use bh::BhError;

use common::{explicit_resolver, resolver_with, CountingProvider};

fn fetcher(resolver: std::sync::Arc<bh::auth::AuthResolver>) -> Fetcher {
    Fetcher::new(http_client().unwrap(), resolver, AuthScheme::Bearer)
}

fn downloader(
    resolver: std::sync::Arc<bh::auth::AuthResolver>,
    trust: TrustDomains,
) -> Downloader {
    Downloader::new(http_client().unwrap(), resolver, AuthScheme::Bearer, trust)
}

fn local_trust(server: &MockServer) -> TrustDomains {
    TrustDomains::new(server.address().ip().to_string(), &["127.0.0.1"])
}

#[tokio::test]
async fn html_pages_are_rejected_regardless_of_status() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/listing");
            then.status(200)
                .header("content-type", "text/html; charset=utf-8")
                .body("<html><body><h1>Sign in to continue</h1><script>x()</script></body></html>");
        })
        .await;

    let fetcher = fetcher(explicit_resolver("tok"));
    let err = fetcher
        .get_json(&server.url("/listing"))
        .await
        .unwrap_err();

    match err {
        BhError::ResponseShape { detail, .. } => {
            assert!(detail.contains("Sign in to continue"), "detail: {detail}");
            assert!(!detail.contains("<h1>"));
            assert!(!detail.contains("x()"));
        }
        other => panic!("expected ResponseShape, got {other}"),
    }
}

#[tokio::test]
async fn unexpected_content_type_is_rejected() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/listing");
            then.status(200)
                .header("content-type", "text/plain")
                .body("hello");
        })
        .await;

    let fetcher = fetcher(explicit_resolver("tok"));
    let err = fetcher.get_json(&server.url("/listing")).await.unwrap_err();
    assert!(err.to_string().contains("unexpected content type"));
}

#[tokio::test]
async fn malformed_json_is_reported_distinctly() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/listing");
            then.status(200)
                .header("content-type", "application/json")
                .body("{not json");
        })
        .await;

    let fetcher = fetcher(explicit_resolver("tok"));
    let err = fetcher.get_json(&server.url("/listing")).await.unwrap_err();
    assert!(err.to_string().contains("invalid JSON"));
}

#[tokio::test]
async fn auth_failure_triggers_one_invalidate_retry_cycle() {
    let server = MockServer::start_async().await;
    let rejected = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/listing")
                .header("authorization", "Bearer bad");
            then.status(401)
                .header("content-type", "application/json")
                .body(r#"{"message":"Bad credentials"}"#);
        })
        .await;
    let accepted = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/listing")
                .header("authorization", "Bearer good");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"[{"ok":true}]"#);
        })
        .await;

    let session = CountingProvider::empty();
    let cli = CountingProvider::yielding("good");
    let resolver = resolver_with(Some("bad"), session.clone(), cli.clone());
    let fetcher = fetcher(resolver.clone());

    let value = fetcher.get_json(&server.url("/listing")).await.unwrap();
    assert!(value.is_array());

    // Exactly one invalidate-then-retry cycle, no duplicate probing.
    assert_eq!(rejected.hits_async().await, 1);
    assert_eq!(accepted.hits_async().await, 1);
    assert_eq!(cli.calls(), 1);
    assert_eq!(resolver.attempted_count().await, 1);
}

#[tokio::test]
async fn auth_retries_stop_after_provider_ceiling() {
    let server = MockServer::start_async().await;
    let rejected = server
        .mock_async(|when, then| {
            when.method(GET).path("/listing");
            then.status(401)
                .header("content-type", "application/json")
                .body(r#"{"message":"Bad credentials"}"#);
        })
        .await;

    let session = CountingProvider::yielding("session-tok");
    let cli = CountingProvider::yielding("cli-tok");
    let resolver = resolver_with(Some("explicit-tok"), session, cli);
    let fetcher = fetcher(resolver.clone());

    let err = fetcher.get_json(&server.url("/listing")).await.unwrap_err();
    match err {
        BhError::Auth(message) => {
            assert!(message.contains("invalid or expired"), "message: {message}");
            assert!(message.contains("explicit-config"), "message: {message}");
            assert!(message.contains("external-cli"), "message: {message}");
        }
        other => panic!("expected Auth, got {other}"),
    }

    // Initial request plus one retry per discarded provider.
    assert_eq!(rejected.hits_async().await, MAX_AUTH_ATTEMPTS + 1);
    assert_eq!(resolver.attempted_count().await, MAX_AUTH_ATTEMPTS);
}

#[tokio::test]
async fn not_found_hints_at_authentication() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/listing");
            then.status(404)
                .header("content-type", "application/json")
                .body(r#"{"message":"Not Found"}"#);
        })
        .await;

    let fetcher = fetcher(explicit_resolver("tok"));
    let err = fetcher.get_json(&server.url("/listing")).await.unwrap_err();
    match err {
        BhError::NotFound(message) => {
            assert!(message.contains("check authentication"));
        }
        other => panic!("expected NotFound, got {other}"),
    }
}

#[tokio::test]
async fn network_errors_are_not_retried() {
    // Nothing listens on port 1.
    let fetcher = Fetcher::new(
        http_client().unwrap(),
        explicit_resolver("tok"),
        AuthScheme::Bearer,
    );
    let err = fetcher.get_json("http://127.0.0.1:1/listing").await.unwrap_err();
    assert!(matches!(err, BhError::Network(_)));
}

#[tokio::test]
async fn redirects_are_followed_to_the_payload() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/start");
            then.status(302).header("location", "/hop");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/hop");
            then.status(302).header("location", "/final");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/final");
            then.status(200)
                .header("content-type", "application/octet-stream")
                .body("payload-bytes");
        })
        .await;

    let downloader = downloader(explicit_resolver("tok"), local_trust(&server));
    let bytes = downloader.download(&server.url("/start")).await.unwrap();
    assert_eq!(bytes, b"payload-bytes");
}

#[tokio::test]
async fn the_eleventh_redirect_is_terminal() {
    let server = MockServer::start_async().await;
    let looping = server
        .mock_async(|when, then| {
            when.method(GET).path("/loop");
            then.status(302).header("location", "/loop");
        })
        .await;

    let downloader = downloader(explicit_resolver("tok"), local_trust(&server));
    let err = downloader.download(&server.url("/loop")).await.unwrap_err();
    match err {
        BhError::RedirectDepthExceeded { limit, .. } => assert_eq!(limit, MAX_REDIRECTS),
        other => panic!("expected RedirectDepthExceeded, got {other}"),
    }
    // The original request plus MAX_REDIRECTS follows; the next redirect
    // response is rejected without another request.
    assert_eq!(looping.hits_async().await, (MAX_REDIRECTS + 1) as usize);
}

#[tokio::test]
async fn credentials_reach_trusted_hosts() {
    let server = MockServer::start_async().await;
    let with_auth = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/asset")
                .header("authorization", "Bearer tok");
            then.status(200)
                .header("content-type", "application/octet-stream")
                .body("bytes");
        })
        .await;

    let downloader = downloader(explicit_resolver("tok"), local_trust(&server));
    let bytes = downloader.download(&server.url("/asset")).await.unwrap();
    assert_eq!(bytes, b"bytes");
    assert_eq!(with_auth.hits_async().await, 1);
}

#[tokio::test]
async fn credentials_never_leak_to_untrusted_hosts() {
    let server = MockServer::start_async().await;
    // The only mock requires the auth header; an unauthenticated request
    // falls through to httpmock's 404.
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/asset")
                .header("authorization", "Bearer tok");
            then.status(200)
                .header("content-type", "application/octet-stream")
                .body("bytes");
        })
        .await;

    let untrusting = TrustDomains::github("api.github.com");
    let downloader = downloader(explicit_resolver("tok"), untrusting);
    let err = downloader.download(&server.url("/asset")).await.unwrap_err();
    match err {
        BhError::Download { status, method, .. } => {
            assert_eq!(status, 404);
            assert_eq!(method, "explicit-config");
        }
        other => panic!("expected Download, got {other}"),
    }
}

#[tokio::test]
async fn download_failures_skip_the_auth_retry_dance() {
    let server = MockServer::start_async().await;
    let forbidden = server
        .mock_async(|when, then| {
            when.method(GET).path("/asset");
            then.status(403)
                .header("content-type", "application/json")
                .body(r#"{"message":"forbidden"}"#);
        })
        .await;

    let session = CountingProvider::empty();
    let cli = CountingProvider::yielding("cli-tok");
    let resolver = resolver_with(None, session, cli.clone());
    let downloader = downloader(resolver.clone(), local_trust(&server));

    let err = downloader.download(&server.url("/asset")).await.unwrap_err();
    assert!(matches!(err, BhError::Download { status: 403, .. }));
    // One request, one probing pass, no invalidation.
    assert_eq!(forbidden.hits_async().await, 1);
    assert_eq!(cli.calls(), 1);
    assert_eq!(resolver.attempted_count().await, 0);
}
