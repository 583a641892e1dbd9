use crate::coord::{Coordinate, DEFAULT_ROUTE};
use crate::engine::{default_user_agent, Credentials, EngineOptions};
use crate::geocoding::nominatim::NominatimOptions;
use crate::map::{MapScheme, StyleCatalog};
use crate::search::SearchOptions;
use crate::walker::ErrorPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const ENV_ACCESS_KEY_ID: &str = "GEOWALK_ACCESS_KEY_ID";
pub const ENV_ACCESS_KEY_SECRET: &str = "GEOWALK_ACCESS_KEY_SECRET";

/// Application configuration, persisted as JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub credentials: Credentials,
    pub search: SearchOptions,
    pub walk: WalkSettings,
    pub map: MapSettings,
    pub geocoder: GeocoderSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkSettings {
    /// Route walked by the trigger, in order
    pub coordinates: Vec<Coordinate>,
    pub on_error: ErrorPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapSettings {
    pub scheme: MapScheme,
    /// Camera viewing distance once the scene is loaded
    pub camera_distance_m: f64,
    /// Extra or replacement tile templates per scheme
    pub tile_templates: HashMap<MapScheme, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocoderSettings {
    pub endpoint: String,
    /// Send the access key secret as `api_key`
    pub send_api_key: bool,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub cache_ttl_secs: u64,
    pub min_interval_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            credentials: Credentials::new("foo", "bar"),
            search: SearchOptions::default(),
            walk: WalkSettings::default(),
            map: MapSettings::default(),
            geocoder: GeocoderSettings::default(),
        }
    }
}

impl Default for WalkSettings {
    fn default() -> Self {
        Self {
            coordinates: DEFAULT_ROUTE.to_vec(),
            on_error: ErrorPolicy::Halt,
        }
    }
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            scheme: MapScheme::NormalDay,
            camera_distance_m: 10_000.0,
            tile_templates: HashMap::new(),
        }
    }
}

impl Default for GeocoderSettings {
    fn default() -> Self {
        let nominatim = NominatimOptions::default();
        Self {
            endpoint: nominatim.endpoint,
            send_api_key: nominatim.send_api_key,
            user_agent: default_user_agent(),
            timeout_secs: 5,
            cache_ttl_secs: nominatim.cache_ttl.as_secs(),
            min_interval_ms: nominatim.min_interval.as_millis() as u64,
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: AppConfig = serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise use defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Save configuration to disk
    pub fn save(&self, path: &Path) -> Result<()> {
        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data)?;
        Ok(())
    }

    /// Override credentials from GEOWALK_ACCESS_KEY_ID / GEOWALK_ACCESS_KEY_SECRET
    pub fn apply_env(&mut self) {
        self.apply_credentials_from(|key| std::env::var(key).ok());
    }

    fn apply_credentials_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(id) = lookup(ENV_ACCESS_KEY_ID) {
            log::debug!("Using access key id from {}", ENV_ACCESS_KEY_ID);
            self.credentials.access_key_id = id;
        }
        if let Some(secret) = lookup(ENV_ACCESS_KEY_SECRET) {
            log::debug!("Using access key secret from {}", ENV_ACCESS_KEY_SECRET);
            self.credentials.access_key_secret = secret;
        }
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            credentials: self.credentials.clone(),
            user_agent: self.geocoder.user_agent.clone(),
            request_timeout: Duration::from_secs(self.geocoder.timeout_secs.max(1)),
        }
    }

    pub fn nominatim_options(&self) -> NominatimOptions {
        NominatimOptions {
            endpoint: self.geocoder.endpoint.clone(),
            send_api_key: self.geocoder.send_api_key,
            cache_ttl: Duration::from_secs(self.geocoder.cache_ttl_secs),
            min_interval: Duration::from_millis(self.geocoder.min_interval_ms),
        }
    }

    pub fn style_catalog(&self) -> StyleCatalog {
        let mut catalog = StyleCatalog::default();
        for (scheme, template) in &self.map.tile_templates {
            catalog.register(*scheme, template.clone());
        }
        catalog
    }
}
