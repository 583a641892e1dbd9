//! Application session
//!
//! `MapSession` owns the engine lifecycle, the map view, the geocoder and
//! the walker, and drives the walker from its dispatch queue. Front ends
//! call `trigger` for a button press and `pump` (or `run_until_idle`) on
//! their own thread; nothing else mutates session state.

use crate::config::AppConfig;
use crate::coord::{Coordinate, DEFAULT_ROUTE};
use crate::dispatch::Dispatcher;
use crate::engine::{EngineHandle, Lifecycle, LifecycleState};
use crate::error::{InitializationError, LookupError, PermissionDeniedError, SceneLoadError, WalkError};
use crate::geocoding::{Geocoder, NominatimGeocoder, OfflineGeocoder};
use crate::map::{MapMeasure, MapScheme, MapView, Scene};
use crate::permissions::{PermissionPrompt, PermissionsRequestor};
use crate::search::{Place, SearchOptions};
use crate::walker::{GeocodeWalker, Step, WalkEvent};
use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Events posted back to the session's thread
#[derive(Debug)]
pub enum SessionEvent {
    SceneLoaded(Result<Scene, SceneLoadError>),
    LookupCompleted {
        index: usize,
        outcome: Result<Vec<Place>, LookupError>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Short-lived user-facing message (a toast)
#[derive(Debug, Clone)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    /// Route index the notice is about
    pub index: Option<usize>,
    pub at: DateTime<Local>,
}

impl Notice {
    fn new(level: NoticeLevel, message: String, index: Option<usize>) -> Self {
        Self {
            level,
            message,
            index,
            at: Local::now(),
        }
    }
}

pub struct MapSession {
    geocoder: Box<dyn Geocoder>,
    walker: GeocodeWalker,
    map: MapView,
    dispatcher: Dispatcher<SessionEvent>,
    notices: VecDeque<Notice>,
    search: SearchOptions,
    scheme: MapScheme,
    camera_distance_m: f64,
    trigger_enabled: bool,
    scene_pending: bool,
    handle: EngineHandle,
    // Declared last so the engine outlives everything that uses it
    lifecycle: Lifecycle,
}

impl MapSession {
    /// Session backed by the Nominatim-compatible geocoder from `config`
    pub fn create(config: AppConfig) -> Result<Self, InitializationError> {
        Self::with_geocoder(config, |handle, config| {
            let geocoder = NominatimGeocoder::new(handle.clone(), config.nominatim_options())?;
            Ok(Box::new(geocoder))
        })
    }

    /// Session that resolves coordinates locally
    pub fn offline(config: AppConfig) -> Result<Self, InitializationError> {
        Self::with_geocoder(config, |handle, _| Ok(Box::new(OfflineGeocoder::new(handle.clone()))))
    }

    pub fn with_geocoder<F>(config: AppConfig, factory: F) -> Result<Self, InitializationError>
    where
        F: FnOnce(&EngineHandle, &AppConfig) -> Result<Box<dyn Geocoder>, InitializationError>,
    {
        let mut lifecycle = Lifecycle::new();
        let handle = lifecycle.initialize(config.engine_options())?;
        let geocoder = factory(&handle, &config)?;

        log::info!(
            "Session ready: {} coordinates, geocoder {}, scheme {}",
            config.walk.coordinates.len(),
            geocoder.name(),
            config.map.scheme
        );

        Ok(Self {
            geocoder,
            walker: GeocodeWalker::new(config.walk.coordinates.clone(), config.walk.on_error),
            map: MapView::new(config.style_catalog()),
            dispatcher: Dispatcher::new(),
            notices: VecDeque::new(),
            search: config.search.clone(),
            scheme: config.map.scheme,
            camera_distance_m: config.map.camera_distance_m,
            trigger_enabled: false,
            scene_pending: false,
            handle,
            lifecycle,
        })
    }

    pub fn walker(&self) -> &GeocodeWalker {
        &self.walker
    }

    pub fn map(&self) -> &MapView {
        &self.map
    }

    pub fn engine_state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn geocoder_name(&self) -> &str {
        self.geocoder.name()
    }

    pub fn trigger_enabled(&self) -> bool {
        self.trigger_enabled
    }

    pub fn search_options(&self) -> &SearchOptions {
        &self.search
    }

    /// Takes effect on the next trigger; a running chain keeps its options
    pub fn set_search_options(&mut self, options: SearchOptions) {
        self.search = options;
    }

    /// True while a lookup or a scene load is outstanding
    pub fn is_busy(&self) -> bool {
        self.walker.is_awaiting() || self.scene_pending
    }

    pub fn request_permissions<P: PermissionPrompt>(
        &mut self,
        requestor: &mut PermissionsRequestor<P>,
    ) -> Result<(), PermissionDeniedError> {
        match requestor.check() {
            Ok(()) => {
                self.on_permissions_granted();
                Ok(())
            }
            Err(e) => {
                self.on_permissions_denied(&e);
                Err(e)
            }
        }
    }

    pub fn on_permissions_granted(&mut self) {
        log::info!("Permissions granted");
        self.load_scene();
        self.trigger_enabled = true;
    }

    pub fn on_permissions_denied(&mut self, error: &PermissionDeniedError) {
        log::error!("Permissions denied by user: {}", error);
        self.trigger_enabled = false;
    }

    /// Button press: start or resume the walk
    pub fn trigger(&mut self) -> Result<(), WalkError> {
        if !self.trigger_enabled {
            return Err(WalkError::TriggerDisabled);
        }
        self.handle.ensure_ready()?;

        let step = self.walker.start(self.search.clone())?;
        self.drive(step);
        Ok(())
    }

    /// Replace the route; refused while a lookup is in flight
    pub fn set_coordinates(&mut self, points: Vec<Coordinate>) -> Result<(), WalkError> {
        self.walker.replace_points(points)?;
        log::info!("Route replaced ({} coordinates)", self.walker.len());
        Ok(())
    }

    /// Handle every queued event without blocking. Returns how many were handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.dispatcher.try_next() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Block until nothing is outstanding. Returns false on timeout.
    pub fn run_until_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.pump();
            if !self.is_busy() {
                return true;
            }

            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            if let Some(event) = self.dispatcher.next_timeout(deadline - now) {
                self.handle_event(event);
            }
        }
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    /// Tear the engine down. Later triggers fail with `EngineError::Disposed`.
    pub fn dispose(&mut self) {
        if self.walker.is_awaiting() {
            log::warn!("Disposing engine while a lookup is in flight");
        }
        self.trigger_enabled = false;
        self.lifecycle.dispose();
    }

    /// Wait up to `grace` for outstanding work, then dispose
    pub fn shutdown(mut self, grace: Duration) {
        if self.is_busy() && !self.run_until_idle(grace) {
            log::warn!("Shutdown grace period elapsed with work outstanding");
        }
        self.dispose();
    }

    fn load_scene(&mut self) {
        let post = self.dispatcher.handle();
        self.scene_pending = true;
        self.map.load_scene(&self.handle, self.scheme, move |outcome| {
            post.post(SessionEvent::SceneLoaded(outcome));
        });
    }

    fn drive(&mut self, step: Step) {
        match step {
            Step::Lookup {
                index,
                coordinate,
                options,
            } => {
                let post = self.dispatcher.handle();

                if let Err(e) = self.handle.ensure_ready() {
                    post.post(SessionEvent::LookupCompleted {
                        index,
                        outcome: Err(LookupError::Engine(e)),
                    });
                    return;
                }

                log::debug!(
                    "Reverse geocoding #{} ({}) via {}",
                    index,
                    coordinate,
                    self.geocoder.name()
                );
                self.geocoder.reverse_lookup(
                    coordinate,
                    &options,
                    Box::new(move |outcome| {
                        if !post.post(SessionEvent::LookupCompleted { index, outcome }) {
                            log::debug!("Lookup #{} finished after the session closed", index);
                        }
                    }),
                );
            }
            Step::Finished => {
                log::info!("Reached end of route, cursor reset");
            }
            Step::Halted { cursor } => {
                log::warn!("Walk halted at {}/{}", cursor, self.walker.len());
            }
        }
    }

    fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::SceneLoaded(outcome) => {
                self.scene_pending = false;
                match self.map.finish_scene_load(outcome) {
                    Ok(_) => {
                        let target = self
                            .walker
                            .points()
                            .first()
                            .copied()
                            .unwrap_or(DEFAULT_ROUTE[0]);
                        let camera = self
                            .map
                            .look_at(target, MapMeasure::distance(self.camera_distance_m));
                        log::debug!("Camera at {} (zoom {:.1})", camera.target, camera.zoom_level());
                    }
                    Err(e) => {
                        log::warn!("Loading map failed: {}", e);
                    }
                }
            }
            SessionEvent::LookupCompleted { index, outcome } => {
                match self.walker.complete(index, outcome) {
                    Ok(completion) => {
                        self.report(completion.event);
                        self.drive(completion.next);
                    }
                    Err(e) => {
                        log::warn!("Ignoring lookup completion: {}", e);
                    }
                }
            }
        }
    }

    fn report(&mut self, event: WalkEvent) {
        let notice = match event {
            WalkEvent::Resolved(resolution) => {
                let altitude = resolution
                    .altitude
                    .map(|a| format!("{:.1} m", a))
                    .unwrap_or_else(|| "n/a".to_string());
                let message = format!("address: {}\naltitude: {}", resolution.address, altitude);
                log::info!("#{} {}", resolution.index, message.replace('\n', ", "));
                Notice::new(NoticeLevel::Info, message, Some(resolution.index))
            }
            WalkEvent::Failed {
                index,
                coordinate,
                error,
            } => {
                log::warn!("Reverse geocoding #{} ({}) failed: {}", index, coordinate, error);
                Notice::new(
                    NoticeLevel::Error,
                    format!("Reverse geocoding Error: {}", error),
                    Some(index),
                )
            }
        };
        self.notices.push_back(notice);
    }
}

impl Drop for MapSession {
    fn drop(&mut self) {
        if self.walker.is_awaiting() {
            log::warn!("Session dropped while a lookup is in flight");
        }
    }
}
