#![warn(missing_docs)]
//! # warden-session
//!
//! ## Purpose
//! Acquires, persists, refreshes, and validates the console's credential and
//! resolves the active identity behind it.
//!
//! ## Responsibilities
//! - Exchange username/password or a refresh token at the token endpoint.
//! - Persist the credential triple through the vault, all fields together.
//! - Coordinate concurrent refreshes so only one exchange is in flight.
//! - Resolve the active identity from the token subject, with an
//!   administrative-directory fallback.
//! - Tear the session down and redirect to login when it is unrecoverable.
//!
//! ## Data flow
//! Login UI calls [`SessionManager::acquire`]; the request guard calls
//! [`SessionManager::has_valid_user`] before every backend call and
//! [`SessionManager::token`] to attach the bearer value; the policy layer
//! reads [`SessionManager::active_identity`].
//!
//! ## Ownership and lifetimes
//! `SessionManager` is a cheap `Arc` handle. Collaborators (transport,
//! directory, navigator, clock) are injected trait objects so tests drive
//! the lifecycle without any real I/O.
//!
//! ## Error model
//! Missing configuration degrades acquire/refresh to silent no-ops.
//! Transport failures from `acquire` surface as [`SessionError`] with stored
//! state untouched. Refresh failures resolve `false` and leave teardown to
//! the caller. Identity-resolution failures clear the identity so permission
//! checks fail closed.
//!
//! ## Security and privacy notes
//! Credentials, tokens, and passwords never appear in log output. The
//! password grant carries base64-encoded credentials per the backend
//! contract; encoding is not a confidentiality measure.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;
use warden_core::{
    ACCESS_TOKEN_EXPIRE_KEY, ACCESS_TOKEN_KEY, Credential, Identity, REFRESH_TOKEN_KEY,
    subject_from_access_token,
};
use warden_vault::Vault;

/// Login route used for teardown redirects when no configuration is loaded.
pub const DEFAULT_LOGIN_ROUTE: &str = "/login";

/// Backend endpoints and identifiers the session layer needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Token-exchange endpoint receiving grant requests.
    pub token_url: Url,
    /// Client identifier sent with every grant.
    pub client_id: String,
    /// Route navigated to on session teardown.
    pub login_route: String,
}

impl SessionConfig {
    /// Creates a validated configuration.
    ///
    /// # Errors
    /// Returns [`SessionError::InvalidConfiguration`] when the token URL does
    /// not parse or does not use HTTPS.
    pub fn new(
        token_url: &str,
        client_id: impl Into<String>,
        login_route: impl Into<String>,
    ) -> Result<Self, SessionError> {
        let token_url = Url::parse(token_url)
            .map_err(|error| SessionError::InvalidConfiguration(format!("token url: {error}")))?;
        if token_url.scheme() != "https" {
            return Err(SessionError::InvalidConfiguration(
                "token url must use https".to_string(),
            ));
        }

        Ok(Self {
            token_url,
            client_id: client_id.into(),
            login_route: login_route.into(),
        })
    }
}

/// Grant request sent to the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenGrant {
    /// Password grant exchanging user credentials for a fresh session.
    Password {
        /// Account username.
        username: String,
        /// Account password or secret.
        password: String,
    },
    /// Refresh grant exchanging the stored refresh token.
    Refresh {
        /// Previously issued refresh token.
        refresh_token: String,
    },
}

impl TokenGrant {
    /// Returns the `grant_type` wire value.
    pub fn grant_type(&self) -> &'static str {
        match self {
            Self::Password { .. } => "password",
            Self::Refresh { .. } => "refresh_token",
        }
    }

    /// Encodes the grant as a url-form-encoded request body.
    ///
    /// Username and password travel base64-encoded per the backend contract.
    pub fn form_body(&self, client_id: &str) -> String {
        let mut form = url::form_urlencoded::Serializer::new(String::new());
        form.append_pair("grant_type", self.grant_type());
        match self {
            Self::Password { username, password } => {
                form.append_pair("username", &STANDARD.encode(username));
                form.append_pair("password", &STANDARD.encode(password));
            }
            Self::Refresh { refresh_token } => {
                form.append_pair("refresh_token", refresh_token);
            }
        }
        form.append_pair("client_id", client_id);
        form.finish()
    }
}

/// Token endpoint response payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Issued access token.
    pub access_token: String,
    /// Token type, `bearer` for this backend.
    pub token_type: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
    /// Replacement refresh token, when the endpoint rotates it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Granted scope, when the endpoint reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Transport posting grant bodies to the token endpoint.
#[async_trait]
pub trait TokenTransport: Send + Sync {
    /// Posts a url-form-encoded grant body and parses the response.
    async fn exchange(&self, token_url: &Url, body: &str) -> Result<TokenResponse, SessionError>;
}

/// Identity lookups backing active-identity resolution.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// Resolves an ordinary console identity by subject id.
    async fn resolve_ordinary(&self, id: &str) -> Result<Identity, DirectoryError>;
    /// Resolves an administrative identity by subject id.
    async fn resolve_administrative(&self, id: &str) -> Result<Identity, DirectoryError>;
}

/// Navigation sink used for session-teardown redirects.
pub trait LoginNavigator: Send + Sync {
    /// Navigates the console to `route`.
    fn navigate_to(&self, route: &str);
}

/// Time source in Unix epoch milliseconds.
pub trait Clock: Send + Sync {
    /// Returns the current time in epoch milliseconds.
    fn now_ms(&self) -> u64;
}

/// Wall-clock [`Clock`] implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Errors surfaced by session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Configuration values violate session requirements.
    #[error("invalid session configuration: {0}")]
    InvalidConfiguration(String),
    /// The token endpoint could not be reached.
    #[error("token endpoint transport failure: {0}")]
    Transport(String),
    /// The token endpoint rejected the grant.
    #[error("token endpoint rejected the grant: {0}")]
    Rejected(String),
    /// The token endpoint response violated the wire contract.
    #[error("invalid token response: {0}")]
    InvalidResponse(String),
}

/// Errors surfaced by identity directory lookups.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The directory has no identity for the given id.
    #[error("no such identity: {0}")]
    NotFound(String),
    /// The directory backend failed.
    #[error("directory backend failure: {0}")]
    Backend(String),
}

type RefreshFuture = Shared<BoxFuture<'static, bool>>;

struct SessionInner {
    config: Option<SessionConfig>,
    vault: Vault,
    transport: Arc<dyn TokenTransport>,
    directory: Arc<dyn IdentityDirectory>,
    navigator: Arc<dyn LoginNavigator>,
    clock: Arc<dyn Clock>,
    identity: Mutex<Option<Identity>>,
    resolving: AtomicBool,
    pending_refresh: Mutex<Option<RefreshFuture>>,
}

impl SessionInner {
    fn identity_slot(&self) -> MutexGuard<'_, Option<Identity>> {
        self.identity.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn refresh_slot(&self) -> MutexGuard<'_, Option<RefreshFuture>> {
        self.pending_refresh
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Owner of the credential lifecycle and the active identity.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

impl SessionManager {
    /// Creates a session manager on the system clock.
    pub fn new(
        config: Option<SessionConfig>,
        vault: Vault,
        transport: Arc<dyn TokenTransport>,
        directory: Arc<dyn IdentityDirectory>,
        navigator: Arc<dyn LoginNavigator>,
    ) -> Self {
        Self::with_clock(
            config,
            vault,
            transport,
            directory,
            navigator,
            Arc::new(SystemClock),
        )
    }

    /// Creates a session manager with an injected clock.
    pub fn with_clock(
        config: Option<SessionConfig>,
        vault: Vault,
        transport: Arc<dyn TokenTransport>,
        directory: Arc<dyn IdentityDirectory>,
        navigator: Arc<dyn LoginNavigator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                config,
                vault,
                transport,
                directory,
                navigator,
                clock,
                identity: Mutex::new(None),
                resolving: AtomicBool::new(false),
                pending_refresh: Mutex::new(None),
            }),
        }
    }

    /// Exchanges username/password for a fresh credential.
    ///
    /// On success the credential triple is stored and identity resolution is
    /// triggered. Without configuration the call is a silent no-op that
    /// never contacts the backend.
    ///
    /// # Errors
    /// Propagates the transport/backend failure; stored state is untouched.
    pub async fn acquire(&self, username: &str, password: &str) -> Result<(), SessionError> {
        let Some(config) = &self.inner.config else {
            tracing::debug!("no session configuration; login request dropped");
            return Ok(());
        };

        let grant = TokenGrant::Password {
            username: username.to_string(),
            password: password.to_string(),
        };
        let response = self
            .inner
            .transport
            .exchange(&config.token_url, &grant.form_body(&config.client_id))
            .await?;

        store_credential(&self.inner, response, None);
        tracing::debug!("credential acquired");
        self.ensure_identity().await;
        Ok(())
    }

    /// Exchanges the stored refresh token for a fresh credential.
    ///
    /// Resolves `false` without any network call when configuration or the
    /// refresh token is absent. Concurrent callers share a single in-flight
    /// exchange and observe its result.
    pub async fn refresh(&self) -> bool {
        if self.inner.config.is_none() {
            return false;
        }
        let Some(refresh_token) = self.inner.vault.get(REFRESH_TOKEN_KEY) else {
            return false;
        };

        self.start_or_join_refresh(refresh_token).await
    }

    /// Returns whether a usable session exists, refreshing transparently.
    ///
    /// `false` immediately (no network) when any credential field is absent.
    /// An unexpired credential triggers identity resolution as a side effect
    /// and yields `true`; an expired one delegates to [`Self::refresh`].
    pub async fn has_valid_user(&self) -> bool {
        let Some(credential) = self.load_credential() else {
            return false;
        };

        if !credential.is_expired(self.inner.clock.now_ms()) {
            self.ensure_identity().await;
            return true;
        }

        self.refresh().await
    }

    /// Reads the stored access token without validation or refresh.
    ///
    /// Callers needing a guaranteed-fresh token must go through
    /// [`Self::has_valid_user`] instead.
    pub fn token(&self) -> Option<String> {
        self.inner.vault.get(ACCESS_TOKEN_KEY)
    }

    /// Removes the credential, clears the identity, and redirects to login.
    ///
    /// Terminal "session is dead" action; fire-and-forget with no failure
    /// mode of its own.
    pub fn clear_and_redirect(&self) {
        let vault = &self.inner.vault;
        vault.remove(ACCESS_TOKEN_KEY);
        vault.remove(ACCESS_TOKEN_EXPIRE_KEY);
        vault.remove(REFRESH_TOKEN_KEY);
        self.inner.identity_slot().take();

        let route = self
            .inner
            .config
            .as_ref()
            .map(|config| config.login_route.as_str())
            .unwrap_or(DEFAULT_LOGIN_ROUTE);
        tracing::info!(route, "session cleared; redirecting to login");
        self.inner.navigator.navigate_to(route);
    }

    /// Returns a snapshot of the resolved active identity, if any.
    pub fn active_identity(&self) -> Option<Identity> {
        self.inner.identity_slot().clone()
    }

    fn load_credential(&self) -> Option<Credential> {
        let vault = &self.inner.vault;
        Credential::from_parts(
            vault.get(ACCESS_TOKEN_KEY),
            vault.get(ACCESS_TOKEN_EXPIRE_KEY),
            vault.get(REFRESH_TOKEN_KEY),
        )
    }

    fn start_or_join_refresh(&self, refresh_token: String) -> RefreshFuture {
        let mut pending = self.inner.refresh_slot();
        if let Some(in_flight) = pending.as_ref() {
            return in_flight.clone();
        }

        let inner = Arc::clone(&self.inner);
        let future = async move {
            let refreshed = run_refresh_exchange(&inner, refresh_token).await;
            // Single-flight marker is cleared exactly once, on settlement.
            inner.refresh_slot().take();
            refreshed
        }
        .boxed()
        .shared();

        *pending = Some(future.clone());
        future
    }

    /// Resolves the active identity from the stored token subject.
    ///
    /// Idempotent: an already-resolved identity or an in-flight resolution
    /// drops the request rather than queueing a duplicate lookup.
    async fn ensure_identity(&self) {
        if self.inner.identity_slot().is_some() {
            return;
        }
        if self.inner.resolving.swap(true, Ordering::SeqCst) {
            return;
        }

        self.resolve_identity().await;
        self.inner.resolving.store(false, Ordering::SeqCst);
    }

    async fn resolve_identity(&self) {
        let Some(access_token) = self.inner.vault.get(ACCESS_TOKEN_KEY) else {
            return;
        };
        let Some(subject) = subject_from_access_token(&access_token) else {
            tracing::debug!("access token has no readable subject; resolution skipped");
            return;
        };

        match self.inner.directory.resolve_ordinary(&subject).await {
            Ok(identity) => {
                *self.inner.identity_slot() = Some(identity);
            }
            Err(DirectoryError::NotFound(_)) => {
                match self.inner.directory.resolve_administrative(&subject).await {
                    Ok(identity) => {
                        *self.inner.identity_slot() = Some(identity);
                    }
                    Err(error) => {
                        tracing::warn!(%error, "identity unknown to both directories");
                        self.inner.identity_slot().take();
                    }
                }
            }
            Err(error) => {
                tracing::warn!(%error, "identity resolution failed");
                self.inner.identity_slot().take();
            }
        }
    }
}

fn store_credential(inner: &SessionInner, response: TokenResponse, prior_refresh: Option<String>) {
    let expiry_ms = inner
        .clock
        .now_ms()
        .saturating_add(response.expires_in.saturating_mul(1_000));
    // Endpoints that do not rotate the refresh token omit it; the prior one
    // stays valid in that case.
    let refresh_token = response
        .refresh_token
        .or(prior_refresh)
        .unwrap_or_default();

    let vault = &inner.vault;
    vault.put(ACCESS_TOKEN_KEY, &response.access_token);
    vault.put(ACCESS_TOKEN_EXPIRE_KEY, &expiry_ms.to_string());
    vault.put(REFRESH_TOKEN_KEY, &refresh_token);
}

async fn run_refresh_exchange(inner: &SessionInner, refresh_token: String) -> bool {
    let Some(config) = &inner.config else {
        return false;
    };

    let grant = TokenGrant::Refresh {
        refresh_token: refresh_token.clone(),
    };
    match inner
        .transport
        .exchange(&config.token_url, &grant.form_body(&config.client_id))
        .await
    {
        Ok(response) => {
            store_credential(inner, response, Some(refresh_token));
            tracing::debug!("credential refreshed");
            true
        }
        Err(error) => {
            tracing::warn!(%error, "credential refresh failed");
            false
        }
    }
}
