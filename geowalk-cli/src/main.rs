use anyhow::{Context, Result};
use geowalk_core::{
    parse_coordinate_list, AppConfig, AutoGrant, MapSession, NoticeLevel, Permission,
    PermissionPrompt, PermissionsRequestor,
};
use std::io::{BufRead, Write};
use std::time::Duration;

mod cli;

/// Asks on the terminal, defaulting to yes
struct StdinPrompt;

impl PermissionPrompt for StdinPrompt {
    fn ask(&mut self, permission: Permission) -> bool {
        print!(
            "Allow {} access ({})? [Y/n]: ",
            permission.name(),
            permission.description()
        );
        if std::io::stdout().flush().is_err() {
            return false;
        }

        let mut response = String::new();
        if std::io::stdin().read_line(&mut response).is_err() {
            return false;
        }
        let response = response.trim().to_lowercase();
        response.is_empty() || response == "y" || response == "yes"
    }
}

fn request_permissions<P: PermissionPrompt>(session: &mut MapSession, prompt: P) -> bool {
    session
        .request_permissions(&mut PermissionsRequestor::new(prompt))
        .is_ok()
}

fn build_config(args: &cli::Args) -> Result<AppConfig> {
    let mut config = AppConfig::load_or_default(args.config.as_deref())?;
    config.apply_env();

    if let Some(path) = &args.coordinates {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read coordinates {}", path.display()))?;
        config.walk.coordinates = parse_coordinate_list(&text)
            .with_context(|| format!("Failed to parse coordinates {}", path.display()))?;
    }
    if let Some(language) = args.language {
        config.search.language = language;
    }
    if let Some(max_items) = args.max_items {
        config.search.max_items = max_items;
    }
    if let Some(policy) = args.on_error {
        config.walk.on_error = policy;
    }
    if let Some(scheme) = args.scheme {
        config.map.scheme = scheme;
    }
    if let Some(timeout) = args.timeout_secs {
        config.geocoder.timeout_secs = timeout;
    }

    Ok(config)
}

/// Generous upper bound for one pass over the route
fn walk_budget(config: &AppConfig) -> Duration {
    let per_lookup = Duration::from_secs(config.geocoder.timeout_secs.max(1))
        + Duration::from_millis(config.geocoder.min_interval_ms);
    per_lookup * (config.walk.coordinates.len() as u32 + 1)
}

fn print_notices(session: &mut MapSession) {
    for notice in session.drain_notices() {
        match notice.level {
            NoticeLevel::Info => println!("{}", notice.message),
            NoticeLevel::Error => eprintln!("{}", notice.message),
        }
    }
}

fn press_trigger(session: &mut MapSession, budget: Duration) {
    if let Err(e) = session.trigger() {
        log::warn!("Trigger ignored: {}", e);
        return;
    }
    if !session.run_until_idle(budget) {
        log::warn!("Walk still running after {:?}", budget);
    }
    print_notices(session);
    log::info!(
        "Cursor at {}/{}",
        session.walker().cursor(),
        session.walker().len()
    );
}

fn main() -> Result<()> {
    let args = cli::parse_args();

    // Initialize logger with appropriate level based on verbose flag
    if std::env::var("RUST_LOG").is_err() {
        if args.verbose {
            std::env::set_var("RUST_LOG", "debug");
        } else {
            std::env::set_var("RUST_LOG", "info");
        }
    }
    env_logger::init();

    let config = build_config(&args)?;
    let budget = walk_budget(&config);

    let mut session = if args.offline {
        MapSession::offline(config)
    } else {
        MapSession::create(config)
    }
    .context("Failed to initialize engine")?;

    let granted = if args.yes {
        request_permissions(&mut session, AutoGrant)
    } else {
        request_permissions(&mut session, StdinPrompt)
    };
    if !granted {
        log::warn!("Reverse geocoding stays disabled until permissions are granted");
    }

    // Let the scene load settle before the first walk
    session.run_until_idle(Duration::from_secs(5));
    if let Some(scene) = session.map().scene() {
        log::info!("Map scene {} ready", scene.scheme);
    }

    match args.triggers {
        Some(count) => {
            for _ in 0..count {
                press_trigger(&mut session, budget);
            }
        }
        None => {
            println!("Press Enter to reverse geocode the route, 'q' to quit.");
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let line = line?;
                match line.trim() {
                    "q" | "quit" => break,
                    _ => press_trigger(&mut session, budget),
                }
            }
        }
    }

    session.shutdown(budget);
    log::info!("Done");

    Ok(())
}
