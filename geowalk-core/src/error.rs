//! Error taxonomy shared across the engine, map, geocoding and walker modules.
//!
//! Every error is handled where it occurs: initialization failures are fatal
//! to the caller, everything else is logged or surfaced as a notice.

use crate::map::MapScheme;
use crate::permissions::Permission;

/// Engine or geocoder construction failed
#[derive(Debug, thiserror::Error)]
pub enum InitializationError {
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),
    #[error("failed to allocate HTTP client: {0}")]
    Resources(#[source] reqwest::Error),
    #[error("geocoder setup failed: {0}")]
    Geocoder(String),
    #[error("engine is already initialized")]
    AlreadyInitialized,
    #[error("engine was disposed and cannot be initialized again")]
    Disposed,
}

/// Use of an engine handle outside the Ready state
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("engine is not initialized")]
    NotInitialized,
    #[error("engine has been disposed")]
    Disposed,
}

/// The user declined at least one required permission
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("permissions denied: {}", format_permissions(.denied))]
pub struct PermissionDeniedError {
    pub denied: Vec<Permission>,
}

fn format_permissions(permissions: &[Permission]) -> String {
    permissions
        .iter()
        .map(|p| p.name())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SceneLoadError {
    #[error("no style is registered for map scheme {0}")]
    UnknownScheme(MapScheme),
    #[error("tile template for {scheme} is invalid: {template}")]
    InvalidTemplate { scheme: MapScheme, template: String },
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// A reverse geocoding request failed
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LookupError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("request failed: {0}")]
    Transport(String),
    #[error("geocoding API returned status: {0}")]
    Status(u16),
    #[error("failed to parse geocoding response: {0}")]
    Parse(String),
    #[error("no address found")]
    NoResults,
}

/// The walker refused a trigger or a completion
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WalkError {
    #[error("a lookup for index {0} is still in flight")]
    Busy(usize),
    #[error("trigger is disabled until permissions are granted")]
    TriggerDisabled,
    #[error("max_items must be at least 1")]
    InvalidOptions,
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("completion for index {got} does not match the pending lookup ({expected:?})")]
    UnexpectedCompletion { expected: Option<usize>, got: usize },
}
