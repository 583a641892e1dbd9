// Disable console window on Windows in release builds
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod app;

use app::GeowalkApp;
use eframe::egui;
use geowalk_core::AppConfig;
use std::path::PathBuf;

fn load_config() -> AppConfig {
    let path = std::env::args().nth(1).map(PathBuf::from);
    let mut config = match AppConfig::load_or_default(path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{:#}. Using defaults.", e);
            AppConfig::default()
        }
    };
    config.apply_env();
    config
}

fn main() -> eframe::Result<()> {
    env_logger::init(); // Initialize logging

    let config = load_config();

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1000.0, 720.0])
            .with_min_inner_size([640.0, 480.0])
            .with_title("geowalk - Reverse Geocoding"),
        ..Default::default()
    };

    eframe::run_native(
        "geowalk",
        native_options,
        Box::new(|cc| Ok(Box::new(GeowalkApp::new(cc, config)))),
    )
}
