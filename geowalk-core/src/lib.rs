//! geowalk core
//!
//! Engine lifecycle, map scene loading and a sequential reverse-geocoding
//! walker over a fixed route. Front ends build a [`MapSession`] from an
//! [`AppConfig`], ask for permissions, then call [`MapSession::trigger`]
//! and pump the session on their own thread.

// Internal modules
mod coord;
mod dispatch;
mod error;
mod permissions;
mod search;
mod walker;

pub mod config;
pub mod engine;
pub mod geocoding;
pub mod map;
pub mod session;

// Re-export public types
pub use config::AppConfig;
pub use coord::{format_location, parse_coordinate_list, Coordinate, CoordinateError, DEFAULT_ROUTE};
pub use dispatch::{DispatchHandle, Dispatcher};
pub use engine::{Credentials, EngineHandle, Lifecycle, LifecycleState};
pub use error::{
    EngineError, InitializationError, LookupError, PermissionDeniedError, SceneLoadError, WalkError,
};
pub use geocoding::{Geocoder, LookupCallback, NominatimGeocoder, OfflineGeocoder};
pub use map::{MapMeasure, MapScheme, MapView, SceneState};
pub use permissions::{AutoGrant, Permission, PermissionPrompt, PermissionsRequestor};
pub use search::{Address, GeoPoint, LanguageCode, Place, SearchOptions};
pub use session::{MapSession, Notice, NoticeLevel};
pub use walker::{ErrorPolicy, GeocodeWalker, Resolution, Step, WalkEvent, WalkState};
