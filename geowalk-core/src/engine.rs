//! Engine lifecycle
//!
//! The engine owns the credentials and the HTTP client every network
//! operation goes through. `Lifecycle` is the owner-side state machine
//! (Uninitialized -> Ready -> Disposed); `EngineHandle` is what the map view
//! and geocoders hold, and it fails fast once the engine is gone.

use crate::error::{EngineError, InitializationError};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Access key pair for the mapping/search service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_key_id: String,
    pub access_key_secret: String,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, access_key_secret: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            access_key_secret: access_key_secret.into(),
        }
    }

    fn validate(&self) -> Result<(), InitializationError> {
        check_key("access key id", &self.access_key_id)?;
        check_key("access key secret", &self.access_key_secret)
    }
}

fn check_key(what: &str, value: &str) -> Result<(), InitializationError> {
    if value.is_empty() {
        return Err(InitializationError::InvalidCredentials(format!(
            "{} is empty",
            what
        )));
    }
    if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(InitializationError::InvalidCredentials(format!(
            "{} contains whitespace or control characters",
            what
        )));
    }
    Ok(())
}

/// Everything needed to bring an engine up
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub credentials: Credentials,
    pub user_agent: String,
    pub request_timeout: Duration,
}

impl EngineOptions {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            user_agent: default_user_agent(),
            request_timeout: Duration::from_secs(5),
        }
    }
}

pub fn default_user_agent() -> String {
    format!("Geowalk/{}", env!("CARGO_PKG_VERSION"))
}

struct EngineShared {
    credentials: Credentials,
    http: reqwest::blocking::Client,
    disposed: AtomicBool,
}

/// An initialized engine. Dropping it disposes it.
pub struct Engine {
    shared: Arc<EngineShared>,
}

impl Engine {
    /// Validate credentials and allocate the engine's resources
    pub fn create(options: EngineOptions) -> Result<Self, InitializationError> {
        options.credentials.validate()?;

        let http = reqwest::blocking::Client::builder()
            .user_agent(options.user_agent.clone())
            .timeout(options.request_timeout)
            .build()
            .map_err(InitializationError::Resources)?;

        log::info!(
            "Engine initialized (key id {}, timeout {:?})",
            options.credentials.access_key_id,
            options.request_timeout
        );

        Ok(Self {
            shared: Arc::new(EngineShared {
                credentials: options.credentials,
                http,
                disposed: AtomicBool::new(false),
            }),
        })
    }

    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Release the engine. Outstanding handles report `Disposed` afterwards.
    pub fn dispose(self) {
        self.release();
    }

    fn release(&self) {
        if !self.shared.disposed.swap(true, Ordering::SeqCst) {
            log::info!("Engine disposed");
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.release();
    }
}

/// Shared reference onto an engine; checks liveness on every use
#[derive(Clone)]
pub struct EngineHandle {
    shared: Arc<EngineShared>,
}

impl EngineHandle {
    pub fn ensure_ready(&self) -> Result<(), EngineError> {
        if self.shared.disposed.load(Ordering::SeqCst) {
            Err(EngineError::Disposed)
        } else {
            Ok(())
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ensure_ready().is_ok()
    }

    pub fn credentials(&self) -> Result<&Credentials, EngineError> {
        self.ensure_ready()?;
        Ok(&self.shared.credentials)
    }

    /// HTTP client for network-backed operations
    pub fn http_client(&self) -> Result<reqwest::blocking::Client, EngineError> {
        self.ensure_ready()?;
        Ok(self.shared.http.clone())
    }
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("ready", &self.is_ready())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Ready,
    Disposed,
}

/// Owner of the engine for one application session
pub struct Lifecycle {
    state: LifecycleState,
    engine: Option<Engine>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: LifecycleState::Uninitialized,
            engine: None,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Bring the engine up. Only valid once, from Uninitialized.
    pub fn initialize(&mut self, options: EngineOptions) -> Result<EngineHandle, InitializationError> {
        match self.state {
            LifecycleState::Ready => return Err(InitializationError::AlreadyInitialized),
            LifecycleState::Disposed => return Err(InitializationError::Disposed),
            LifecycleState::Uninitialized => {}
        }

        let engine = Engine::create(options)?;
        let handle = engine.handle();
        self.engine = Some(engine);
        self.state = LifecycleState::Ready;
        Ok(handle)
    }

    pub fn handle(&self) -> Result<EngineHandle, EngineError> {
        match (&self.state, &self.engine) {
            (LifecycleState::Ready, Some(engine)) => Ok(engine.handle()),
            (LifecycleState::Disposed, _) => Err(EngineError::Disposed),
            _ => Err(EngineError::NotInitialized),
        }
    }

    /// Idempotent. A never-initialized lifecycle also ends up Disposed.
    pub fn dispose(&mut self) {
        if let Some(engine) = self.engine.take() {
            engine.dispose();
        }
        self.state = LifecycleState::Disposed;
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Lifecycle {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> EngineOptions {
        EngineOptions::new(Credentials::new("foo", "bar"))
    }

    #[test]
    fn test_rejects_invalid_credentials() {
        let empty = EngineOptions::new(Credentials::new("", "bar"));
        assert!(matches!(
            Engine::create(empty),
            Err(InitializationError::InvalidCredentials(_))
        ));

        let spaced = EngineOptions::new(Credentials::new("foo", "b ar"));
        assert!(matches!(
            Engine::create(spaced),
            Err(InitializationError::InvalidCredentials(_))
        ));
    }

    #[test]
    fn test_handle_fails_after_dispose() {
        let engine = Engine::create(options()).unwrap();
        let handle = engine.handle();
        assert!(handle.ensure_ready().is_ok());
        assert!(handle.http_client().is_ok());

        engine.dispose();
        assert_eq!(handle.ensure_ready(), Err(EngineError::Disposed));
        assert!(handle.http_client().is_err());
        assert!(handle.credentials().is_err());
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.state(), LifecycleState::Uninitialized);
        assert_eq!(lifecycle.handle().unwrap_err(), EngineError::NotInitialized);

        let handle = lifecycle.initialize(options()).unwrap();
        assert_eq!(lifecycle.state(), LifecycleState::Ready);
        assert!(matches!(
            lifecycle.initialize(options()),
            Err(InitializationError::AlreadyInitialized)
        ));

        lifecycle.dispose();
        lifecycle.dispose();
        assert_eq!(lifecycle.state(), LifecycleState::Disposed);
        assert_eq!(handle.ensure_ready(), Err(EngineError::Disposed));
        assert_eq!(lifecycle.handle().unwrap_err(), EngineError::Disposed);
        assert!(matches!(
            lifecycle.initialize(options()),
            Err(InitializationError::Disposed)
        ));
    }

    #[test]
    fn test_failed_initialize_stays_uninitialized() {
        let mut lifecycle = Lifecycle::new();
        let bad = EngineOptions::new(Credentials::new("foo", ""));
        assert!(lifecycle.initialize(bad).is_err());
        assert_eq!(lifecycle.state(), LifecycleState::Uninitialized);
        assert!(lifecycle.initialize(options()).is_ok());
    }

    #[test]
    fn test_drop_disposes() {
        let handle = {
            let mut lifecycle = Lifecycle::new();
            lifecycle.initialize(options()).unwrap()
        };
        assert_eq!(handle.ensure_ready(), Err(EngineError::Disposed));
    }
}
