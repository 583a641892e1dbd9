//! Map scene and camera
//!
//! Rendering happens elsewhere. This module tracks which scene is loaded,
//! where its tiles come from and what the camera looks at.

use crate::coord::Coordinate;
use crate::engine::EngineHandle;
use crate::error::SceneLoadError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::f64::consts::PI;
use std::fmt;

/// Equatorial circumference in metres
const EARTH_CIRCUMFERENCE_M: f64 = 40_075_016.686;
pub const MAX_ZOOM: f64 = 19.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MapScheme {
    #[serde(rename = "normal.day")]
    NormalDay,
    #[serde(rename = "normal.night")]
    NormalNight,
    #[serde(rename = "satellite")]
    Satellite,
    #[serde(rename = "hybrid.day")]
    HybridDay,
    #[serde(rename = "hybrid.night")]
    HybridNight,
    #[serde(rename = "terrain.day")]
    TerrainDay,
}

impl MapScheme {
    pub fn identifier(&self) -> &'static str {
        match self {
            MapScheme::NormalDay => "normal.day",
            MapScheme::NormalNight => "normal.night",
            MapScheme::Satellite => "satellite",
            MapScheme::HybridDay => "hybrid.day",
            MapScheme::HybridNight => "hybrid.night",
            MapScheme::TerrainDay => "terrain.day",
        }
    }

    pub fn all() -> &'static [MapScheme] {
        &[
            MapScheme::NormalDay,
            MapScheme::NormalNight,
            MapScheme::Satellite,
            MapScheme::HybridDay,
            MapScheme::HybridNight,
            MapScheme::TerrainDay,
        ]
    }
}

impl Default for MapScheme {
    fn default() -> Self {
        MapScheme::NormalDay
    }
}

impl fmt::Display for MapScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

impl std::str::FromStr for MapScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('_', ".");
        MapScheme::all()
            .iter()
            .copied()
            .find(|scheme| scheme.identifier() == wanted)
            .ok_or_else(|| format!("unknown map scheme: {}", s))
    }
}

/// Scheme -> tile URL template with `{z}`, `{x}` and `{y}` placeholders
#[derive(Debug, Clone)]
pub struct StyleCatalog {
    templates: HashMap<MapScheme, String>,
}

impl StyleCatalog {
    pub fn empty() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    pub fn register(&mut self, scheme: MapScheme, template: impl Into<String>) {
        self.templates.insert(scheme, template.into());
    }

    pub fn resolve(&self, scheme: MapScheme) -> Result<Scene, SceneLoadError> {
        let template = self
            .templates
            .get(&scheme)
            .ok_or(SceneLoadError::UnknownScheme(scheme))?;

        if !["{z}", "{x}", "{y}"].iter().all(|p| template.contains(p)) {
            return Err(SceneLoadError::InvalidTemplate {
                scheme,
                template: template.clone(),
            });
        }

        Ok(Scene {
            scheme,
            tile_url_template: template.clone(),
        })
    }
}

impl Default for StyleCatalog {
    fn default() -> Self {
        let mut catalog = Self::empty();
        catalog.register(
            MapScheme::NormalDay,
            "https://tile.openstreetmap.org/{z}/{x}/{y}.png",
        );
        catalog.register(
            MapScheme::NormalNight,
            "https://basemaps.cartocdn.com/dark_all/{z}/{x}/{y}.png",
        );
        catalog.register(
            MapScheme::TerrainDay,
            "https://tile.opentopomap.org/{z}/{x}/{y}.png",
        );
        catalog
    }
}

/// A loaded map scene
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub scheme: MapScheme,
    pub tile_url_template: String,
}

impl Scene {
    pub fn tile_url(&self, tile: &TileId) -> String {
        self.tile_url_template
            .replace("{z}", &tile.zoom.to_string())
            .replace("{x}", &tile.x.to_string())
            .replace("{y}", &tile.y.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SceneState {
    Blank,
    Loading(MapScheme),
    Loaded(Scene),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasureKind {
    /// Viewing distance in metres
    Distance,
    Zoom,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapMeasure {
    pub kind: MeasureKind,
    pub value: f64,
}

impl MapMeasure {
    pub fn distance(metres: f64) -> Self {
        Self {
            kind: MeasureKind::Distance,
            value: metres,
        }
    }

    pub fn zoom(level: f64) -> Self {
        Self {
            kind: MeasureKind::Zoom,
            value: level,
        }
    }
}

/// Slippy-map tile address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileId {
    pub zoom: u8,
    pub x: u32,
    pub y: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub target: Coordinate,
    pub measure: MapMeasure,
}

impl Camera {
    pub fn look_at(target: Coordinate, measure: MapMeasure) -> Self {
        Self { target, measure }
    }

    /// Zoom level at which one 256px tile spans the viewing distance
    pub fn zoom_level(&self) -> f64 {
        let zoom = match self.measure.kind {
            MeasureKind::Zoom => self.measure.value,
            MeasureKind::Distance => {
                let span = EARTH_CIRCUMFERENCE_M * self.target.latitude().to_radians().cos();
                if self.measure.value <= 0.0 || span <= 0.0 {
                    MAX_ZOOM
                } else {
                    (span / self.measure.value).log2()
                }
            }
        };
        zoom.clamp(0.0, MAX_ZOOM)
    }

    /// Tile under the camera target
    pub fn tile(&self) -> TileId {
        let zoom = self.zoom_level().floor() as u8;
        let n = 2f64.powi(zoom as i32);
        let max_index = (n as u32).saturating_sub(1);

        let x = ((self.target.longitude() + 180.0) / 360.0 * n).floor();
        // Web Mercator is undefined at the poles, clamp to its limit
        let lat = self.target.latitude().clamp(-85.051_128_78, 85.051_128_78).to_radians();
        let y = ((1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * n).floor();

        TileId {
            zoom,
            x: (x.max(0.0) as u32).min(max_index),
            y: (y.max(0.0) as u32).min(max_index),
        }
    }
}

/// Scene and camera state of one map view
pub struct MapView {
    catalog: StyleCatalog,
    state: SceneState,
    camera: Option<Camera>,
}

impl MapView {
    pub fn new(catalog: StyleCatalog) -> Self {
        Self {
            catalog,
            state: SceneState::Blank,
            camera: None,
        }
    }

    pub fn state(&self) -> &SceneState {
        &self.state
    }

    pub fn scene(&self) -> Option<&Scene> {
        match &self.state {
            SceneState::Loaded(scene) => Some(scene),
            _ => None,
        }
    }

    pub fn camera(&self) -> Option<&Camera> {
        self.camera.as_ref()
    }

    /// Start loading `scheme`. The outcome goes to `on_complete` and must be
    /// handed back through `finish_scene_load` on the owning thread.
    pub fn load_scene<F>(&mut self, handle: &EngineHandle, scheme: MapScheme, on_complete: F)
    where
        F: FnOnce(Result<Scene, SceneLoadError>),
    {
        if let Err(e) = handle.ensure_ready() {
            on_complete(Err(SceneLoadError::Engine(e)));
            return;
        }

        log::debug!("Loading map scene {}", scheme);
        self.state = SceneState::Loading(scheme);
        on_complete(self.catalog.resolve(scheme));
    }

    /// Apply a load outcome. Returns the scheme now shown.
    pub fn finish_scene_load(&mut self, outcome: Result<Scene, SceneLoadError>) -> Result<MapScheme, SceneLoadError> {
        match outcome {
            Ok(scene) => {
                let scheme = scene.scheme;
                log::info!("Map scene {} loaded", scheme);
                self.state = SceneState::Loaded(scene);
                Ok(scheme)
            }
            Err(e) => {
                self.state = SceneState::Blank;
                Err(e)
            }
        }
    }

    pub fn look_at(&mut self, target: Coordinate, measure: MapMeasure) -> &Camera {
        self.camera.insert(Camera::look_at(target, measure))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Credentials, Engine, EngineOptions};
    use crate::error::EngineError;

    fn engine() -> Engine {
        Engine::create(EngineOptions::new(Credentials::new("foo", "bar"))).unwrap()
    }

    #[test]
    fn test_scheme_parsing() {
        assert_eq!("normal.day".parse::<MapScheme>(), Ok(MapScheme::NormalDay));
        assert_eq!("NORMAL_NIGHT".parse::<MapScheme>(), Ok(MapScheme::NormalNight));
        assert!("blueprint".parse::<MapScheme>().is_err());
    }

    #[test]
    fn test_load_scene() {
        let engine = engine();
        let mut view = MapView::new(StyleCatalog::default());
        let mut outcome = None;

        view.load_scene(&engine.handle(), MapScheme::NormalDay, |r| outcome = Some(r));
        assert_eq!(view.state(), &SceneState::Loading(MapScheme::NormalDay));

        let scheme = view.finish_scene_load(outcome.unwrap()).unwrap();
        assert_eq!(scheme, MapScheme::NormalDay);
        let scene = view.scene().unwrap().clone();
        assert_eq!(scene.scheme, MapScheme::NormalDay);
        assert_eq!(view.scene(), Some(&scene));
        assert_eq!(
            scene.tile_url(&TileId { zoom: 11, x: 1063, y: 719 }),
            "https://tile.openstreetmap.org/11/1063/719.png"
        );
    }

    #[test]
    fn test_unknown_scheme_leaves_view_blank() {
        let engine = engine();
        let mut view = MapView::new(StyleCatalog::default());
        let mut outcome = None;

        view.load_scene(&engine.handle(), MapScheme::Satellite, |r| outcome = Some(r));
        let err = view.finish_scene_load(outcome.unwrap()).unwrap_err();
        assert_eq!(err, SceneLoadError::UnknownScheme(MapScheme::Satellite));
        assert_eq!(view.state(), &SceneState::Blank);
    }

    #[test]
    fn test_invalid_template() {
        let mut catalog = StyleCatalog::empty();
        catalog.register(MapScheme::Satellite, "https://tiles.example.com/{z}.png");
        assert!(matches!(
            catalog.resolve(MapScheme::Satellite),
            Err(SceneLoadError::InvalidTemplate { .. })
        ));
    }

    #[test]
    fn test_load_scene_after_dispose() {
        let engine = engine();
        let handle = engine.handle();
        engine.dispose();

        let mut view = MapView::new(StyleCatalog::default());
        let mut outcome = None;
        view.load_scene(&handle, MapScheme::NormalDay, |r| outcome = Some(r));
        assert_eq!(
            outcome.unwrap(),
            Err(SceneLoadError::Engine(EngineError::Disposed))
        );
        assert_eq!(view.state(), &SceneState::Blank);
    }

    #[test]
    fn test_camera_zoom_from_distance() {
        let target = Coordinate::new(47.0517107724, 6.9769611437).unwrap();
        let camera = Camera::look_at(target, MapMeasure::distance(10_000.0));
        let zoom = camera.zoom_level();
        assert!(zoom > 11.0 && zoom < 12.0, "zoom was {}", zoom);

        let closer = Camera::look_at(target, MapMeasure::distance(1_000.0));
        assert!(closer.zoom_level() > zoom);

        let explicit = Camera::look_at(target, MapMeasure::zoom(25.0));
        assert_eq!(explicit.zoom_level(), MAX_ZOOM);
    }

    #[test]
    fn test_camera_tile() {
        let origin = Coordinate::new(0.0, 0.0).unwrap();
        let camera = Camera::look_at(origin, MapMeasure::zoom(1.0));
        assert_eq!(camera.tile(), TileId { zoom: 1, x: 1, y: 1 });

        let target = Coordinate::new(47.0517107724, 6.9769611437).unwrap();
        let camera = Camera::look_at(target, MapMeasure::distance(10_000.0));
        assert_eq!(camera.tile(), TileId { zoom: 11, x: 1063, y: 719 });
    }

    #[test]
    fn test_look_at_updates_camera() {
        let mut view = MapView::new(StyleCatalog::default());
        assert!(view.camera().is_none());
        let target = Coordinate::new(46.99, 6.93).unwrap();
        view.look_at(target, MapMeasure::distance(10_000.0));
        assert_eq!(view.camera().map(|c| c.target), Some(target));
    }
}
