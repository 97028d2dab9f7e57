// In src/main.rs

// Declare modules
pub mod config;
pub mod display;
pub mod error;
pub mod font;
pub mod os;
pub mod platform;
pub mod rasterizer;
pub mod surface;

use crate::{
    config::Config,
    platform::{KeyWait, WaylandDisplay},
};

// Logging
use anyhow::Context;
use log::{error, info};
use std::path::PathBuf;

/// Main entry point for `pictureframe`.
fn main() {
    // Default filter is "info" if RUST_LOG is not set.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_micros()
        .init();

    info!("Starting pictureframe...");

    if let Err(e) = run() {
        error!("pictureframe failed: {:#}", e);
        std::process::exit(-1);
    }

    info!("pictureframe exited successfully.");
}

fn run() -> anyhow::Result<()> {
    // --- Configuration ---
    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => {
            let config = Config::load(&path)?;
            info!("Configuration loaded from {}", path.display());
            config
        }
        None => {
            info!("Configuration loaded (using default).");
            Config::default()
        }
    };

    let font = font::builtin_mono(config.text.font_scale);
    let mut display =
        WaylandDisplay::connect(&config, font).context("Failed to initialize Wayland display")?;

    // --- Main Loop ---
    // One character per wake-up until the message is out, then idle.
    let text = &config.text;
    let mut message = text.message.bytes();
    let mut pending = message.next();
    let mut pen_x = text.origin_x;
    loop {
        let timeout = if pending.is_some() {
            config.timing.poll_seconds
        } else {
            config.timing.idle_poll_seconds
        };

        match display.wait_for_key(timeout)? {
            KeyWait::Key(key) => {
                info!("Keycode: {}", key);
                break;
            }
            KeyWait::Quit => break,
            KeyWait::TimedOut => {}
        }

        if let Some(code) = pending {
            let advance = display.draw_char(pen_x, text.origin_y, code);
            pen_x = rasterizer::advance_pen(pen_x, advance, text.spacing);
            pending = message.next();

            // Push the new glyph out now rather than on the next wait.
            if let Some(key) = display.check_for_key()? {
                info!("Keycode: {}", key);
                break;
            }
        }
    }

    info!("Quitting...");
    if display.anomalies() > 0 {
        info!("{} consistency anomalies seen", display.anomalies());
    }
    display.teardown();
    Ok(())
}
