use eframe::egui;
use geowalk_core::{
    parse_coordinate_list, AppConfig, AutoGrant, Coordinate, MapSession, Notice, NoticeLevel,
    Permission, PermissionsRequestor, SceneState, WalkState,
};
use std::collections::HashMap;
use std::time::Duration;

const TOAST_LIFETIME_SECS: i64 = 4;

#[derive(Debug, Clone, PartialEq)]
enum PointStatus {
    Resolved(String),
    Failed(String),
}

pub struct GeowalkApp {
    session: Option<MapSession>,

    // Per route index, filled from session notices
    statuses: HashMap<usize, PointStatus>,
    toasts: Vec<Notice>,

    // UI state
    permission_dialog_open: bool,
    error_message: Option<String>,
    status_message: Option<String>,
}

impl GeowalkApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, config: AppConfig) -> Self {
        let (session, error_message) = match MapSession::create(config) {
            Ok(session) => (Some(session), None),
            Err(e) => {
                log::error!("Initialization of engine failed: {}", e);
                (None, Some(format!("Initialization of engine failed: {}", e)))
            }
        };

        Self {
            permission_dialog_open: session.is_some(),
            session,
            statuses: HashMap::new(),
            toasts: Vec::new(),
            error_message,
            status_message: None,
        }
    }

    fn answer_permissions(&mut self, allow: bool) {
        self.permission_dialog_open = false;
        let Some(session) = self.session.as_mut() else {
            return;
        };

        let outcome = if allow {
            session.request_permissions(&mut PermissionsRequestor::new(AutoGrant))
        } else {
            session.request_permissions(&mut PermissionsRequestor::new(|_: Permission| false))
        };
        if let Err(e) = outcome {
            log::warn!("Reverse geocoding disabled: {}", e);
        }
    }

    fn trigger(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.walker().cursor() == 0 {
            self.statuses.clear();
        }
        match session.trigger() {
            Ok(()) => self.error_message = None,
            Err(e) => self.error_message = Some(e.to_string()),
        }
    }

    fn load_coordinates(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("Coordinates", &["txt", "csv"])
            .pick_file()
        else {
            return;
        };
        let Some(session) = self.session.as_mut() else {
            return;
        };

        let loaded = std::fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|text| parse_coordinate_list(&text).map_err(|e| e.to_string()))
            .and_then(|points| {
                let count = points.len();
                session
                    .set_coordinates(points)
                    .map(|_| count)
                    .map_err(|e| e.to_string())
            });

        match loaded {
            Ok(count) => {
                self.statuses.clear();
                self.error_message = None;
                self.status_message = Some(format!("Loaded {} coordinates from {}", count, path.display()));
            }
            Err(e) => {
                self.error_message = Some(format!("Failed to load {}: {}", path.display(), e));
            }
        }
    }

    /// Apply queued session events and collect notices
    fn pump_session(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.pump();

        for notice in session.drain_notices() {
            if let Some(index) = notice.index {
                let status = match notice.level {
                    NoticeLevel::Info => PointStatus::Resolved(notice.message.clone()),
                    NoticeLevel::Error => PointStatus::Failed(notice.message.clone()),
                };
                self.statuses.insert(index, status);
            }
            self.toasts.push(notice);
        }

        let now = chrono::Local::now();
        let lifetime = chrono::Duration::seconds(TOAST_LIFETIME_SECS);
        self.toasts.retain(|toast| now - toast.at < lifetime);
    }

    fn render_controls(&mut self, ui: &mut egui::Ui) {
        let (can_trigger, idle, needs_permissions) = match &self.session {
            Some(session) => (
                session.trigger_enabled() && !session.walker().is_awaiting(),
                !session.walker().is_awaiting(),
                !session.trigger_enabled() && !self.permission_dialog_open,
            ),
            None => (false, false, false),
        };

        ui.horizontal(|ui| {
            if ui
                .add_enabled(can_trigger, egui::Button::new("📍 Reverse Geocode"))
                .on_hover_text("Resolve the route from the current position")
                .clicked()
            {
                self.trigger();
            }

            ui.separator();

            if ui
                .add_enabled(idle, egui::Button::new("📂 Load Coordinates"))
                .clicked()
            {
                self.load_coordinates();
            }

            if needs_permissions && ui.button("🔑 Permissions").clicked() {
                self.permission_dialog_open = true;
            }
        });
    }

    fn render_permission_dialog(&mut self, ctx: &egui::Context) {
        if !self.permission_dialog_open {
            return;
        }

        let mut answer = None;
        egui::Window::new("Permissions")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label("geowalk needs the following permissions:");
                ui.add_space(6.0);
                for permission in [Permission::Network, Permission::Location] {
                    ui.label(format!("• {}: {}", permission.name(), permission.description()));
                }
                ui.add_space(6.0);
                ui.horizontal(|ui| {
                    if ui.button("Allow").clicked() {
                        answer = Some(true);
                    }
                    if ui.button("Deny").clicked() {
                        answer = Some(false);
                    }
                });
            });

        if let Some(allow) = answer {
            self.answer_permissions(allow);
        }
    }

    fn render_route(&self, ui: &mut egui::Ui) {
        let Some(session) = &self.session else {
            return;
        };
        let points = session.walker().points();
        let pending = match session.walker().state() {
            WalkState::AwaitingLookup(index) => Some(index),
            _ => None,
        };

        let size = egui::vec2(ui.available_width(), 260.0);
        let (response, painter) = ui.allocate_painter(size, egui::Sense::hover());
        let rect = response.rect;
        painter.rect_filled(rect, 4.0, ui.visuals().extreme_bg_color);

        let Some(bounds) = RouteBounds::of(points) else {
            painter.text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                "No coordinates loaded",
                egui::FontId::proportional(14.0),
                egui::Color32::GRAY,
            );
            return;
        };

        let screen: Vec<egui::Pos2> = points
            .iter()
            .map(|c| {
                let (u, v) = bounds.project(c);
                egui::pos2(
                    rect.left() + 20.0 + u * (rect.width() - 40.0),
                    rect.top() + 20.0 + v * (rect.height() - 40.0),
                )
            })
            .collect();

        for pair in screen.windows(2) {
            painter.line_segment([pair[0], pair[1]], egui::Stroke::new(1.5, egui::Color32::DARK_GRAY));
        }

        for (index, pos) in screen.iter().enumerate() {
            let color = match self.statuses.get(&index) {
                Some(PointStatus::Resolved(_)) => egui::Color32::GREEN,
                Some(PointStatus::Failed(_)) => egui::Color32::RED,
                None => egui::Color32::LIGHT_GRAY,
            };
            painter.circle_filled(*pos, 5.0, color);

            if index == session.walker().cursor() {
                painter.circle_stroke(*pos, 9.0, egui::Stroke::new(2.0, egui::Color32::from_rgb(255, 165, 0)));
            }
            if pending == Some(index) {
                painter.circle_stroke(*pos, 13.0, egui::Stroke::new(1.0, egui::Color32::LIGHT_BLUE));
            }
            painter.text(
                *pos + egui::vec2(8.0, -8.0),
                egui::Align2::LEFT_BOTTOM,
                index.to_string(),
                egui::FontId::proportional(11.0),
                egui::Color32::GRAY,
            );
        }
    }

    fn render_point_list(&self, ui: &mut egui::Ui) {
        let Some(session) = &self.session else {
            return;
        };

        egui::ScrollArea::vertical().show(ui, |ui| {
            egui::Grid::new("point_grid")
                .num_columns(3)
                .spacing([10.0, 4.0])
                .striped(true)
                .show(ui, |ui| {
                    ui.strong("#");
                    ui.strong("Coordinate");
                    ui.strong("Address");
                    ui.end_row();

                    for (index, coordinate) in session.walker().points().iter().enumerate() {
                        ui.label(index.to_string());
                        ui.monospace(coordinate.to_string());
                        match self.statuses.get(&index) {
                            Some(PointStatus::Resolved(text)) => {
                                ui.colored_label(egui::Color32::LIGHT_BLUE, text.replace('\n', ", "))
                            }
                            Some(PointStatus::Failed(text)) => ui.colored_label(egui::Color32::RED, text),
                            None => ui.colored_label(egui::Color32::GRAY, "(not resolved)"),
                        };
                        ui.end_row();
                    }
                });
        });
    }

    fn render_toasts(&self, ctx: &egui::Context) {
        if self.toasts.is_empty() {
            return;
        }

        egui::Area::new(egui::Id::new("toasts"))
            .anchor(egui::Align2::RIGHT_BOTTOM, [-12.0, -40.0])
            .show(ctx, |ui| {
                for toast in &self.toasts {
                    egui::Frame::popup(ui.style()).show(ui, |ui| {
                        let color = match toast.level {
                            NoticeLevel::Info => ui.visuals().text_color(),
                            NoticeLevel::Error => egui::Color32::RED,
                        };
                        ui.small(toast.at.format("%H:%M:%S").to_string());
                        ui.colored_label(color, &toast.message);
                    });
                }
            });
    }

    fn render_status_bar(&self, ui: &mut egui::Ui) {
        ui.separator();
        ui.horizontal(|ui| {
            let Some(session) = &self.session else {
                ui.colored_label(egui::Color32::RED, "Engine not initialized");
                return;
            };

            ui.label(format!("⚙ Engine: {:?}", session.engine_state()));
            ui.separator();

            let scene = match session.map().state() {
                SceneState::Blank => "blank".to_string(),
                SceneState::Loading(scheme) => format!("loading {}", scheme),
                SceneState::Loaded(scene) => scene.scheme.to_string(),
            };
            ui.label(format!("🗺 Scene: {}", scene));
            ui.separator();

            if let Some(camera) = session.map().camera() {
                let tile = camera.tile();
                ui.label(format!("🎥 {} z{}/{}/{}", camera.target, tile.zoom, tile.x, tile.y));
                ui.separator();
            }

            ui.label(format!("🔎 {}", session.geocoder_name()));
            ui.separator();
            ui.label(format!(
                "📍 {}/{}",
                session.walker().cursor(),
                session.walker().len()
            ));

            if session.is_busy() {
                ui.separator();
                ui.spinner();
            }
        });
    }
}

impl eframe::App for GeowalkApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.pump_session();

        if self.session.as_ref().is_some_and(|s| s.is_busy()) {
            ctx.request_repaint(); // Keep refreshing while a lookup is in flight
        } else if !self.toasts.is_empty() {
            ctx.request_repaint_after(Duration::from_millis(250));
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("geowalk - Reverse Geocoding");
            ui.add_space(10.0);

            self.render_controls(ui);
            ui.add_space(10.0);

            if let Some(error) = &self.error_message {
                ui.colored_label(egui::Color32::RED, format!("❌ {}", error));
                ui.add_space(10.0);
            }
            if let Some(status) = &self.status_message {
                ui.colored_label(egui::Color32::GREEN, format!("ℹ️ {}", status));
                ui.add_space(10.0);
            }

            if self.session.is_some() {
                self.render_route(ui);
                ui.add_space(10.0);
                self.render_point_list(ui);
            }
        });

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            self.render_status_bar(ui);
        });

        self.render_permission_dialog(ctx);
        self.render_toasts(ctx);
    }
}

/// Lat/lon box of a route, for fitting it into the canvas
#[derive(Debug, Clone, Copy, PartialEq)]
struct RouteBounds {
    min_lat: f64,
    max_lat: f64,
    min_lon: f64,
    max_lon: f64,
}

impl RouteBounds {
    fn of(points: &[Coordinate]) -> Option<Self> {
        let first = points.first()?;
        let mut bounds = Self {
            min_lat: first.latitude(),
            max_lat: first.latitude(),
            min_lon: first.longitude(),
            max_lon: first.longitude(),
        };
        for point in &points[1..] {
            bounds.min_lat = bounds.min_lat.min(point.latitude());
            bounds.max_lat = bounds.max_lat.max(point.latitude());
            bounds.min_lon = bounds.min_lon.min(point.longitude());
            bounds.max_lon = bounds.max_lon.max(point.longitude());
        }
        Some(bounds)
    }

    /// Normalised (x, y) in 0..=1 with north at the top
    fn project(&self, point: &Coordinate) -> (f32, f32) {
        let span = |min: f64, max: f64, value: f64| {
            if max - min < f64::EPSILON {
                0.5
            } else {
                (value - min) / (max - min)
            }
        };
        let x = span(self.min_lon, self.max_lon, point.longitude());
        let y = 1.0 - span(self.min_lat, self.max_lat, point.latitude());
        (x as f32, y as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geowalk_core::DEFAULT_ROUTE;

    #[test]
    fn test_route_bounds_projection() {
        let bounds = RouteBounds::of(&DEFAULT_ROUTE).unwrap();
        for point in DEFAULT_ROUTE.iter() {
            let (x, y) = bounds.project(point);
            assert!((0.0..=1.0).contains(&x));
            assert!((0.0..=1.0).contains(&y));
        }

        let north = Coordinate::new(bounds.max_lat, bounds.min_lon).unwrap();
        assert_eq!(bounds.project(&north), (0.0, 0.0));
    }

    #[test]
    fn test_single_point_is_centered() {
        let point = Coordinate::new(47.0, 7.0).unwrap();
        let bounds = RouteBounds::of(&[point]).unwrap();
        assert_eq!(bounds.project(&point), (0.5, 0.5));
        assert!(RouteBounds::of(&[]).is_none());
    }
}
