//! Credential resolution for backend adapters.
//!
//! Each adapter owns one [`AuthResolver`]. A resolver walks a fixed provider
//! chain (explicit config token, interactive host session, external CLI) and
//! memoizes the outcome for the adapter's lifetime. Tokens live in process
//! memory only; nothing is persisted.

pub mod providers;

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::Result;

pub use providers::{CliTokenSource, NoCliToken, NoSession, ProcessTokenSource, SessionTokenSource};

/// Total providers a resolver may discard before giving up for good.
pub const MAX_AUTH_ATTEMPTS: usize = 3;

/// Which provider produced the current token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AuthMethod {
    /// No credential resolved
    None,
    /// Token configured on the source
    Explicit,
    /// Token from the interactive host session
    Session,
    /// Token read from an external CLI helper
    Cli,
}

impl AuthMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthMethod::None => "none",
            AuthMethod::Explicit => "explicit-config",
            AuthMethod::Session => "interactive-session",
            AuthMethod::Cli => "external-cli",
        }
    }
}

impl std::fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a resolution, shared verbatim by all concurrent callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAuth {
    pub token: Option<String>,
    pub method: AuthMethod,
}

impl ResolvedAuth {
    pub fn none() -> Self {
        Self {
            token: None,
            method: AuthMethod::None,
        }
    }
}

/// Per-generation resolution state.
///
/// `resolved` marks that a probing pass completed this generation, so a
/// cached "no credential" outcome is returned without re-probing. Only
/// [`AuthResolver::invalidate`] can start a new generation, and only when a
/// real provider was discarded.
#[derive(Debug, Default)]
struct AuthState {
    token: Option<String>,
    method: Option<AuthMethod>,
    attempted: BTreeSet<AuthMethod>,
    resolved: bool,
}

impl AuthState {
    fn current(&self) -> ResolvedAuth {
        ResolvedAuth {
            token: self.token.clone(),
            method: self.method.unwrap_or(AuthMethod::None),
        }
    }
}

/// Resolves a bearer credential by walking the provider chain.
///
/// Single-flight: the state mutex is held across a probing pass, so of N
/// concurrent `resolve()` calls exactly one runs the providers; the rest
/// wait on the lock and observe the memoized outcome. This matters because
/// the session provider may prompt a human and must not fire once per
/// in-flight request.
pub struct AuthResolver {
    explicit: Option<String>,
    session: Arc<dyn SessionTokenSource>,
    cli: Arc<dyn CliTokenSource>,
    state: Mutex<AuthState>,
}

impl AuthResolver {
    pub fn new(
        explicit: Option<String>,
        session: Arc<dyn SessionTokenSource>,
        cli: Arc<dyn CliTokenSource>,
    ) -> Self {
        Self {
            explicit,
            session,
            cli,
            state: Mutex::new(AuthState::default()),
        }
    }

    /// Resolver with no session broker and no CLI helper; only an explicit
    /// token can ever resolve.
    pub fn explicit_only(token: Option<String>) -> Self {
        Self::new(token, Arc::new(NoSession), Arc::new(NoCliToken))
    }

    /// Produce the current credential, probing providers at most once per
    /// generation.
    pub async fn resolve(&self) -> ResolvedAuth {
        let mut state = self.state.lock().await;

        if state.resolved {
            return state.current();
        }
        if state.attempted.len() >= MAX_AUTH_ATTEMPTS {
            tracing::debug!(
                attempted = state.attempted.len(),
                "auth providers exhausted, resolving to no credential"
            );
            state.resolved = true;
            return state.current();
        }

        let skip = state.attempted.clone();
        let outcome = self.probe(&skip).await;
        state.token = outcome.token.clone();
        state.method = Some(outcome.method);
        state.resolved = true;
        outcome
    }

    /// Discard the cached credential after a server-side auth failure.
    ///
    /// The discarded provider joins the attempted set so it is not retried
    /// this generation. Invalidating an already-empty outcome is a no-op;
    /// the cached "none" stands and no provider is re-probed.
    pub async fn invalidate(&self, reason: &str) {
        let mut state = self.state.lock().await;
        match state.method {
            Some(method) if method != AuthMethod::None => {
                tracing::info!(%method, reason, "invalidating cached credential");
                state.attempted.insert(method);
                state.token = None;
                state.method = Some(AuthMethod::None);
                state.resolved = false;
            }
            _ => {
                tracing::debug!(reason, "invalidate with no cached credential, ignoring");
            }
        }
    }

    /// Number of providers discarded this generation.
    pub async fn attempted_count(&self) -> usize {
        self.state.lock().await.attempted.len()
    }

    /// Names of providers discarded this generation, for diagnostics.
    pub async fn attempted_providers(&self) -> Vec<&'static str> {
        self.state
            .lock()
            .await
            .attempted
            .iter()
            .map(|method| method.as_str())
            .collect()
    }

    async fn probe(&self, skip: &BTreeSet<AuthMethod>) -> ResolvedAuth {
        if !skip.contains(&AuthMethod::Explicit) {
            if let Some(token) = self.explicit.as_deref() {
                let token = token.trim();
                if !token.is_empty() {
                    tracing::debug!("resolved credential from explicit config");
                    return ResolvedAuth {
                        token: Some(token.to_string()),
                        method: AuthMethod::Explicit,
                    };
                }
            }
        }

        if !skip.contains(&AuthMethod::Session) {
            match self.session.session_token().await {
                Ok(Some(token)) if !token.trim().is_empty() => {
                    tracing::debug!("resolved credential from host session");
                    return ResolvedAuth {
                        token: Some(token.trim().to_string()),
                        method: AuthMethod::Session,
                    };
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(error = %err, "session token provider failed");
                }
            }
        }

        if !skip.contains(&AuthMethod::Cli) {
            match self.cli.cli_token().await {
                Ok(Some(token)) if !token.trim().is_empty() => {
                    tracing::debug!("resolved credential from external CLI");
                    return ResolvedAuth {
                        token: Some(token.trim().to_string()),
                        method: AuthMethod::Cli,
                    };
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(error = %err, "CLI token provider failed");
                }
            }
        }

        tracing::debug!("no auth provider yielded a credential");
        ResolvedAuth::none()
    }
}

impl std::fmt::Debug for AuthResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthResolver")
            .field("has_explicit", &self.explicit.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;

    /// Counting fake for both provider seams.
    struct FakeProvider {
        token: Option<String>,
        calls: AtomicUsize,
    }

    impl FakeProvider {
        fn yielding(token: &str) -> Self {
            Self {
                token: Some(token.to_string()),
                calls: AtomicUsize::new(0),
            }
        }

        fn empty() -> Self {
            Self {
                token: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SessionTokenSource for FakeProvider {
        async fn session_token(&self) -> Result<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.token.clone())
        }
    }

    #[async_trait]
    impl CliTokenSource for FakeProvider {
        async fn cli_token(&self) -> Result<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.token.clone())
        }
    }

    fn resolver(
        explicit: Option<&str>,
        session: Arc<FakeProvider>,
        cli: Arc<FakeProvider>,
    ) -> AuthResolver {
        AuthResolver::new(explicit.map(str::to_string), session, cli)
    }

    #[tokio::test]
    async fn explicit_token_wins_without_probing_others() {
        let session = Arc::new(FakeProvider::yielding("session-token"));
        let cli = Arc::new(FakeProvider::yielding("cli-token"));
        let resolver = resolver(Some("explicit-token"), session.clone(), cli.clone());

        let auth = resolver.resolve().await;
        assert_eq!(auth.method, AuthMethod::Explicit);
        assert_eq!(auth.token.as_deref(), Some("explicit-token"));
        assert_eq!(session.calls(), 0);
        assert_eq!(cli.calls(), 0);
    }

    #[tokio::test]
    async fn blank_explicit_token_falls_through() {
        let session = Arc::new(FakeProvider::empty());
        let cli = Arc::new(FakeProvider::yielding("cli-token"));
        let resolver = resolver(Some("   "), session.clone(), cli.clone());

        let auth = resolver.resolve().await;
        assert_eq!(auth.method, AuthMethod::Cli);
        assert_eq!(session.calls(), 1);
        assert_eq!(cli.calls(), 1);
    }

    #[tokio::test]
    async fn concurrent_resolves_share_one_probing_pass() {
        let session = Arc::new(FakeProvider::empty());
        let cli = Arc::new(FakeProvider::yielding("cli-token"));
        let resolver = Arc::new(resolver(None, session.clone(), cli.clone()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let resolver = resolver.clone();
            handles.push(tokio::spawn(async move { resolver.resolve().await }));
        }
        let mut outcomes = Vec::new();
        for handle in handles {
            outcomes.push(handle.await.unwrap());
        }

        assert_eq!(session.calls(), 1);
        assert_eq!(cli.calls(), 1);
        let first = &outcomes[0];
        assert!(outcomes.iter().all(|outcome| outcome == first));
        assert_eq!(first.method, AuthMethod::Cli);
    }

    #[tokio::test]
    async fn cached_outcome_skips_reprobing() {
        let session = Arc::new(FakeProvider::empty());
        let cli = Arc::new(FakeProvider::yielding("cli-token"));
        let resolver = resolver(None, session.clone(), cli.clone());

        resolver.resolve().await;
        resolver.resolve().await;
        resolver.resolve().await;
        assert_eq!(cli.calls(), 1);
    }

    #[tokio::test]
    async fn invalidate_walks_the_chain() {
        let session = Arc::new(FakeProvider::yielding("session-token"));
        let cli = Arc::new(FakeProvider::yielding("cli-token"));
        let resolver = resolver(Some("explicit-token"), session.clone(), cli.clone());

        assert_eq!(resolver.resolve().await.method, AuthMethod::Explicit);

        resolver.invalidate("401 from listing").await;
        assert_eq!(resolver.resolve().await.method, AuthMethod::Session);

        resolver.invalidate("401 again").await;
        assert_eq!(resolver.resolve().await.method, AuthMethod::Cli);

        resolver.invalidate("401 a third time").await;
        let auth = resolver.resolve().await;
        assert_eq!(auth.method, AuthMethod::None);
        assert!(auth.token.is_none());
        assert_eq!(resolver.attempted_count().await, MAX_AUTH_ATTEMPTS);
    }

    #[tokio::test]
    async fn exhausted_generation_makes_no_provider_calls() {
        let session = Arc::new(FakeProvider::yielding("session-token"));
        let cli = Arc::new(FakeProvider::yielding("cli-token"));
        let resolver = resolver(Some("explicit-token"), session.clone(), cli.clone());

        for reason in ["first", "second", "third"] {
            resolver.resolve().await;
            resolver.invalidate(reason).await;
        }
        let session_calls = session.calls();
        let cli_calls = cli.calls();

        for _ in 0..5 {
            let auth = resolver.resolve().await;
            assert_eq!(auth.method, AuthMethod::None);
        }
        assert_eq!(session.calls(), session_calls);
        assert_eq!(cli.calls(), cli_calls);
    }

    #[tokio::test]
    async fn invalidate_without_credential_keeps_cached_none() {
        let session = Arc::new(FakeProvider::empty());
        let cli = Arc::new(FakeProvider::empty());
        let resolver = resolver(None, session.clone(), cli.clone());

        let auth = resolver.resolve().await;
        assert_eq!(auth.method, AuthMethod::None);
        assert_eq!(cli.calls(), 1);

        resolver.invalidate("401 with nothing cached").await;
        let auth = resolver.resolve().await;
        assert_eq!(auth.method, AuthMethod::None);
        // No second probing pass: the empty outcome stayed cached.
        assert_eq!(session.calls(), 1);
        assert_eq!(cli.calls(), 1);
        assert_eq!(resolver.attempted_count().await, 0);
    }

    #[tokio::test]
    async fn provider_errors_are_soft() {
        struct FailingSession;

        #[async_trait]
        impl SessionTokenSource for FailingSession {
            async fn session_token(&self) -> Result<Option<String>> {
                Err(crate::error::BhError::Config("broker offline".to_string()))
            }
        }

        let cli = Arc::new(FakeProvider::yielding("cli-token"));
        let resolver = AuthResolver::new(None, Arc::new(FailingSession), cli.clone());
        let auth = resolver.resolve().await;
        assert_eq!(auth.method, AuthMethod::Cli);
    }
}
