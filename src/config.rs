// src/config.rs

//! Configuration for the `pictureframe` window.
//!
//! Every field has a default, so the program runs without any file. A JSON
//! file can override any subset:
//!
//! ```json
//! { "window": { "title": "frame" }, "text": { "message": "Hi", "font_scale": 3 } }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root of the configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub text: TextConfig,
    pub timing: TimingConfig,
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Invalid configuration JSON")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("In config file {}", path.display()))
    }
}

// --- Window ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    /// Surface width in pixels. Fixed for the lifetime of the window.
    pub width: u32,
    pub height: u32,
    /// Byte the whole surface is filled with before anything is drawn.
    pub background: u8,
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig {
            title: "pictureframe".to_string(),
            width: 640,
            height: 480,
            background: 128,
        }
    }
}

// --- Text ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TextConfig {
    /// Drawn one character per wake-up.
    pub message: String,
    pub origin_x: u32,
    /// Pen y; glyph tops are measured down from here.
    pub origin_y: u32,
    /// Extra pixels between glyph advances.
    pub spacing: u32,
    /// Integer scale applied to the built-in 8x8 font.
    pub font_scale: u32,
}

impl Default for TextConfig {
    fn default() -> Self {
        TextConfig {
            message: "Hello world!".to_string(),
            origin_x: 100,
            origin_y: 240,
            spacing: 1,
            font_scale: 2,
        }
    }
}

// --- Timing ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimingConfig {
    /// Key wait per tick while the message is still being drawn.
    pub poll_seconds: u64,
    /// Key wait per tick once the whole message is on screen.
    pub idle_poll_seconds: u64,
    /// Upper bound on a single readiness wait.
    pub dispatch_slice_ms: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig {
            poll_seconds: 1,
            idle_poll_seconds: 10,
            dispatch_slice_ms: 1000,
        }
    }
}
