// Each integration test binary compiles this module; not all of them use
// every helper.
#![allow(dead_code)]

//! Shared fixtures for integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use bh::auth::{AuthResolver, CliTokenSource, NoSession, SessionTokenSource};
use bh::Result;

/// Deterministic provider fake that counts how often it is probed.
pub struct CountingProvider {
    token: Option<String>,
    calls: AtomicUsize,
}

impl CountingProvider {
    pub fn yielding(token: &str) -> Arc<Self> {
        Arc::new(Self {
            token: Some(token.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn empty() -> Arc<Self> {
        Arc::new(Self {
            token: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionTokenSource for CountingProvider {
    async fn session_token(&self) -> Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.token.clone())
    }
}

#[async_trait]
impl CliTokenSource for CountingProvider {
    async fn cli_token(&self) -> Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.token.clone())
    }
}

/// Resolver wired with counting fakes.
pub fn resolver_with(
    explicit: Option<&str>,
    session: Arc<CountingProvider>,
    cli: Arc<CountingProvider>,
) -> Arc<AuthResolver> {
    Arc::new(AuthResolver::new(explicit.map(str::to_string), session, cli))
}

/// Resolver that can only ever use the explicit token.
pub fn explicit_resolver(token: &str) -> Arc<AuthResolver> {
    Arc::new(AuthResolver::new(
        Some(token.to_string()),
        Arc::new(NoSession),
        Arc::new(bh::auth::NoCliToken),
    ))
}

/// Sample deployment manifest YAML served as a release asset.
pub fn manifest_yaml(id: &str) -> String {
    format!(
        "
id: {id}
version: 1.0.0
name: Test Pack
metadata:
  manifest_version: '1.0'
  description: A pack for tests
  author: Tester
  last_updated: '2026-01-01T00:00:00Z'
  repository:
    type: git
    url: https://github.com/octo/bundles
    directory: ''
  license: MIT
  keywords: [testing]
bundle_settings:
  include_common_in_environment_bundles: true
  create_common_bundle: true
  compression: zip
  naming:
    common_bundle: '{{id}}-{{version}}'
prompts: []
"
    )
}
