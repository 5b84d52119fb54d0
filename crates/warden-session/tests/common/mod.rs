//! Shared mock collaborators for session integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use url::Url;
use warden_core::{ACCESS_TOKEN_EXPIRE_KEY, ACCESS_TOKEN_KEY, Identity, REFRESH_TOKEN_KEY};
use warden_session::{
    Clock, DirectoryError, IdentityDirectory, LoginNavigator, SessionConfig, SessionError,
    SessionManager, TokenResponse, TokenTransport,
};
use warden_vault::{MemorySecretStore, Vault};

/// Fixed "now" used by most scenarios, far from zero to allow backdating.
pub const NOW_MS: u64 = 1_700_000_000_000;

/// Test clock with a settable instant.
pub struct MockClock {
    now_ms: Mutex<u64>,
}

impl MockClock {
    pub fn new(now_ms: u64) -> Self {
        Self {
            now_ms: Mutex::new(now_ms),
        }
    }

    pub fn set(&self, now_ms: u64) {
        *self.now_ms.lock().expect("clock lock should work") = now_ms;
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        *self.now_ms.lock().expect("clock lock should work")
    }
}

/// Token transport replaying scripted outcomes and counting exchanges.
pub struct ScriptedTransport {
    calls: AtomicU32,
    delay_ms: u64,
    bodies: Mutex<Vec<String>>,
    outcomes: Mutex<VecDeque<Result<TokenResponse, String>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            calls: AtomicU32::new(0),
            delay_ms: 0,
            bodies: Mutex::new(Vec::new()),
            outcomes: Mutex::new(VecDeque::new()),
        }
    }

    /// Adds an artificial in-flight delay so tests can overlap callers.
    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn script_ok(&self, response: TokenResponse) {
        self.outcomes
            .lock()
            .expect("outcome lock should work")
            .push_back(Ok(response));
    }

    pub fn script_failure(&self, message: &str) {
        self.outcomes
            .lock()
            .expect("outcome lock should work")
            .push_back(Err(message.to_string()));
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn recorded_bodies(&self) -> Vec<String> {
        self.bodies.lock().expect("body lock should work").clone()
    }
}

#[async_trait]
impl TokenTransport for ScriptedTransport {
    async fn exchange(&self, _token_url: &Url, body: &str) -> Result<TokenResponse, SessionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.bodies
            .lock()
            .expect("body lock should work")
            .push(body.to_string());

        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }

        match self
            .outcomes
            .lock()
            .expect("outcome lock should work")
            .pop_front()
        {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(SessionError::Transport(message)),
            None => Err(SessionError::Transport("unscripted exchange".to_string())),
        }
    }
}

/// Directory with per-lookup identity maps and call counters.
pub struct ScriptedDirectory {
    ordinary: Mutex<HashMap<String, Identity>>,
    administrative: Mutex<HashMap<String, Identity>>,
    ordinary_backend_failure: AtomicBool,
    ordinary_calls: AtomicU32,
    administrative_calls: AtomicU32,
}

impl ScriptedDirectory {
    pub fn new() -> Self {
        Self {
            ordinary: Mutex::new(HashMap::new()),
            administrative: Mutex::new(HashMap::new()),
            ordinary_backend_failure: AtomicBool::new(false),
            ordinary_calls: AtomicU32::new(0),
            administrative_calls: AtomicU32::new(0),
        }
    }

    pub fn add_ordinary(&self, identity: Identity) {
        self.ordinary
            .lock()
            .expect("directory lock should work")
            .insert(identity.id.clone(), identity);
    }

    pub fn add_administrative(&self, identity: Identity) {
        self.administrative
            .lock()
            .expect("directory lock should work")
            .insert(identity.id.clone(), identity);
    }

    pub fn fail_ordinary_with_backend_error(&self) {
        self.ordinary_backend_failure.store(true, Ordering::SeqCst);
    }

    pub fn ordinary_calls(&self) -> u32 {
        self.ordinary_calls.load(Ordering::SeqCst)
    }

    pub fn administrative_calls(&self) -> u32 {
        self.administrative_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityDirectory for ScriptedDirectory {
    async fn resolve_ordinary(&self, id: &str) -> Result<Identity, DirectoryError> {
        self.ordinary_calls.fetch_add(1, Ordering::SeqCst);
        if self.ordinary_backend_failure.load(Ordering::SeqCst) {
            return Err(DirectoryError::Backend("directory offline".to_string()));
        }
        self.ordinary
            .lock()
            .expect("directory lock should work")
            .get(id)
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound(id.to_string()))
    }

    async fn resolve_administrative(&self, id: &str) -> Result<Identity, DirectoryError> {
        self.administrative_calls.fetch_add(1, Ordering::SeqCst);
        self.administrative
            .lock()
            .expect("directory lock should work")
            .get(id)
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound(id.to_string()))
    }
}

/// Navigator recording every redirect target.
#[derive(Default)]
pub struct RecordingNavigator {
    routes: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn routes(&self) -> Vec<String> {
        self.routes.lock().expect("route lock should work").clone()
    }
}

impl LoginNavigator for RecordingNavigator {
    fn navigate_to(&self, route: &str) {
        self.routes
            .lock()
            .expect("route lock should work")
            .push(route.to_string());
    }
}

/// Fully wired session under test plus handles to every collaborator.
pub struct SessionFixture {
    pub session: SessionManager,
    pub store: Arc<MemorySecretStore>,
    pub vault: Vault,
    pub transport: Arc<ScriptedTransport>,
    pub directory: Arc<ScriptedDirectory>,
    pub navigator: Arc<RecordingNavigator>,
    pub clock: Arc<MockClock>,
}

pub fn fixture() -> SessionFixture {
    fixture_with_transport(ScriptedTransport::new())
}

pub fn fixture_with_transport(transport: ScriptedTransport) -> SessionFixture {
    build_fixture(
        Some(
            SessionConfig::new("https://backend.test/oauth/token", "console", "/login")
                .expect("test config should validate"),
        ),
        transport,
    )
}

pub fn fixture_without_config() -> SessionFixture {
    build_fixture(None, ScriptedTransport::new())
}

fn build_fixture(config: Option<SessionConfig>, transport: ScriptedTransport) -> SessionFixture {
    let store = Arc::new(MemorySecretStore::new());
    let vault = Vault::new(
        Arc::clone(&store) as Arc<dyn warden_vault::SecretStore>,
        Some("device-secret"),
    );
    let transport = Arc::new(transport);
    let directory = Arc::new(ScriptedDirectory::new());
    let navigator = Arc::new(RecordingNavigator::new());
    let clock = Arc::new(MockClock::new(NOW_MS));

    let session = SessionManager::with_clock(
        config,
        vault.clone(),
        Arc::clone(&transport) as Arc<dyn TokenTransport>,
        Arc::clone(&directory) as Arc<dyn IdentityDirectory>,
        Arc::clone(&navigator) as Arc<dyn LoginNavigator>,
        Arc::clone(&clock) as Arc<dyn Clock>,
    );

    SessionFixture {
        session,
        store,
        vault,
        transport,
        directory,
        navigator,
        clock,
    }
}

/// Builds a three-part access token whose claims carry `subject`.
pub fn access_token_for(subject: &str) -> String {
    let claims = format!(r#"{{"sub":"{subject}","exp":9999999999}}"#);
    format!(
        "header.{}.signature",
        URL_SAFE_NO_PAD.encode(claims.as_bytes())
    )
}

/// Canonical successful token endpoint response.
pub fn token_response(subject: &str, expires_in_s: u64, refresh_token: &str) -> TokenResponse {
    TokenResponse {
        access_token: access_token_for(subject),
        token_type: "bearer".to_string(),
        expires_in: expires_in_s,
        refresh_token: Some(refresh_token.to_string()),
        scope: None,
    }
}

/// Seeds a stored credential directly through the vault.
pub fn seed_credential(fixture: &SessionFixture, subject: &str, expiry_ms: u64) {
    fixture.vault.put(ACCESS_TOKEN_KEY, &access_token_for(subject));
    fixture
        .vault
        .put(ACCESS_TOKEN_EXPIRE_KEY, &expiry_ms.to_string());
    fixture.vault.put(REFRESH_TOKEN_KEY, "refresh-1");
}
