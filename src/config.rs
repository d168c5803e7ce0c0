/*
 *  config.rs
 *
 *  StatusPane - worth a glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Layered configuration: defaults, YAML file, command line
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use std::collections::HashMap;
use std::time::Duration;
use std::{fs, path::{Path, PathBuf}};

use clap::{ArgAction, Parser, ValueHint};
use dirs_next::home_dir;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::display::scheduler::SchedulerConfig;
use crate::display::{ColorDepth, DisplayCapabilities, FrameTarget};

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Top-level app configuration. Every section falls back to its defaults
/// field by field, so a YAML file only needs what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: String,            // e.g., "info" | "debug"
    pub state_file: Option<PathBuf>,  // persisted now playing state
    pub display: DisplayConfig,
    pub render: RenderConfig,
    pub animation: AnimationConfig,
    pub pipeline: PipelineConfig,
    pub polling: PollingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            state_file: None,
            display: DisplayConfig::default(),
            render: RenderConfig::default(),
            animation: AnimationConfig::default(),
            pipeline: PipelineConfig::default(),
            polling: PollingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
    pub rotate_deg: u16,
    pub color_depth: ColorDepth,
    /// framebuffer device or file; none renders headless
    pub sink_path: Option<PathBuf>,
    /// e-paper: partial refreshes between full ones
    pub partial_refresh_budget: Option<u32>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 128,
            height: 64,
            rotate_deg: 0,
            color_depth: ColorDepth::Monochrome,
            sink_path: None,
            partial_refresh_budget: None,
        }
    }
}

impl DisplayConfig {
    /// Panel geometry after rotation; composition happens in this space.
    pub fn logical_size(&self) -> (u32, u32) {
        match self.rotate_deg {
            90 | 270 => (self.height, self.width),
            _ => (self.width, self.height),
        }
    }

    pub fn capabilities(&self) -> DisplayCapabilities {
        DisplayCapabilities {
            width: self.width,
            height: self.height,
            color_depth: self.color_depth,
            partial_refresh_budget: self.partial_refresh_budget,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub weather_interval_ms: u64,
    pub now_playing_interval_ms: u64,
    pub clock_interval_ms: u64,
    pub tick_ms: u64,
    pub sleep_timeout_secs: u64,
    pub auto_switch: bool,
    pub start_screen: FrameTarget,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            weather_interval_ms: 30_000,
            now_playing_interval_ms: 500,
            clock_interval_ms: 1_000,
            tick_ms: 50,
            sleep_timeout_secs: 300,
            auto_switch: true,
            start_screen: FrameTarget::Clock,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    pub fps: u32,
    pub scroll_fps: u32,
    pub min_fps: u32,
    pub speed: f64,
    pub load_threshold: f64,
    pub load_sample_secs: u64,
    pub album_size: u32,
    pub portrait_size: u32,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            fps: 30,
            scroll_fps: 20,
            min_fps: 5,
            speed: 1.0,
            load_threshold: 0.75,
            load_sample_secs: 10,
            album_size: 48,
            portrait_size: 24,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// 0 runs transforms on the coordinator thread
    pub workers: usize,
    pub queue_capacity: usize,
    pub resized_cache: usize,
    pub dithered_cache: usize,
    pub background_cache: usize,
    /// 1-bit album art; defaults to on for monochrome panels
    pub dither: Option<bool>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_capacity: 5,
            resized_cache: 4,
            dithered_cache: 3,
            background_cache: 3,
            dither: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub media_path: Option<PathBuf>,
    pub weather_path: Option<PathBuf>,
    pub base_secs: u64,
    pub cap_secs: u64,
    pub idle_secs: u64,
    pub idle_after: u32,
    pub weather_interval_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            media_path: None,
            weather_path: None,
            base_secs: 10,
            cap_secs: 60,
            idle_secs: 30,
            idle_after: 3,
            weather_interval_secs: 600,
        }
    }
}

impl Config {
    pub fn scheduler(&self) -> SchedulerConfig {
        let r = &self.render;
        SchedulerConfig {
            intervals: HashMap::from([
                (FrameTarget::Weather, Duration::from_millis(r.weather_interval_ms)),
                (FrameTarget::NowPlaying, Duration::from_millis(r.now_playing_interval_ms)),
                (FrameTarget::Clock, Duration::from_millis(r.clock_interval_ms)),
            ]),
            tick: Duration::from_millis(r.tick_ms),
            sleep_timeout: Duration::from_secs(r.sleep_timeout_secs),
            rotate_deg: self.display.rotate_deg,
        }
    }

    pub fn dither(&self) -> bool {
        self.pipeline.dither.unwrap_or(self.display.color_depth == ColorDepth::Monochrome)
    }

    /// Explicit path, else the per-user data dir.
    pub fn state_path(&self) -> Option<PathBuf> {
        self.state_file
            .clone()
            .or_else(|| dirs_next::data_dir().map(|d| d.join("statuspane/state.json")))
    }
}

fn parse_yaml_value<T: serde::de::DeserializeOwned>(s: &str) -> Result<T, String> {
    serde_yaml::from_str(s).map_err(|e| e.to_string())
}

/// CLI overrides. All fields are Options so we can layer them over YAML.
#[derive(Debug, Parser, Clone)]
#[command(name = "statuspane", about = "StatusPane - now playing, weather and clock display", version)]
pub struct Cli {
    /// Path to a YAML config file (overrides search)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub log_level: Option<String>,
    #[arg(long)]
    pub display_width: Option<u32>,
    #[arg(long)]
    pub display_height: Option<u32>,
    #[arg(long)]
    pub display_rotate_deg: Option<u16>,
    /// monochrome | gray4 | rgb565 | rgb888
    #[arg(long, value_parser = parse_yaml_value::<ColorDepth>)]
    pub color_depth: Option<ColorDepth>,
    /// Framebuffer device or file to write frames to
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub sink: Option<PathBuf>,
    /// JSON file with the current track
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub media: Option<PathBuf>,
    /// JSON file with the current weather
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub weather: Option<PathBuf>,
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub state_file: Option<PathBuf>,
    #[arg(long)]
    pub workers: Option<usize>,
    /// weather | now_playing | clock
    #[arg(long, value_parser = parse_yaml_value::<FrameTarget>)]
    pub start_screen: Option<FrameTarget>,
    #[arg(long, action = ArgAction::Set)]
    pub auto_switch: Option<bool>,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
}

/// Public entry point: parse CLI, read YAML, merge, validate.
pub fn load() -> Result<Config, ConfigError> {
    let cli = Cli::parse();
    let cfg = load_with(&cli)?;

    if cli.dump_config {
        // Pretty YAML of effective config (nice for debugging)
        let s = serde_yaml::to_string(&cfg)?;
        println!("{s}");
        std::process::exit(0);
    }

    Ok(cfg)
}

pub fn load_with(cli: &Cli) -> Result<Config, ConfigError> {
    // 1) defaults, 2) YAML file (explicit path or search)
    let mut cfg = if let Some(p) = cli.config.as_ref() {
        if p.exists() {
            read_yaml(p)?
        } else {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
    } else if let Some(p) = find_config_file() {
        read_yaml(&p)?
    } else {
        Config::default()
    };

    // 3) CLI overrides (highest precedence)
    apply_cli_overrides(&mut cfg, cli);

    // 4) Validate
    validate(&cfg)?;
    Ok(cfg)
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    // XDG-style: ~/.config/statuspane/config.yaml
    if let Some(home) = home_dir() {
        let p = home.join(".config/statuspane/config.yaml");
        if p.exists() { return Some(p) }
        let p = home.join(".config/statuspane.yaml");
        if p.exists() { return Some(p) }
    }
    // project local
    for candidate in &["statuspane.yaml", "config/statuspane.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() { return Some(p) }
    }
    None
}

fn read_yaml(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    from_yaml_str(&s)
}

pub fn from_yaml_str(s: &str) -> Result<Config, ConfigError> {
    if s.trim().is_empty() {
        return Ok(Config::default());
    }
    Ok(serde_yaml::from_str(s)?)
}

fn apply_cli_overrides(cfg: &mut Config, cli: &Cli) {
    if let Some(v) = &cli.log_level          { cfg.log_level = v.clone(); }
    if let Some(v) = cli.display_width       { cfg.display.width = v; }
    if let Some(v) = cli.display_height      { cfg.display.height = v; }
    if let Some(v) = cli.display_rotate_deg  { cfg.display.rotate_deg = v; }
    if let Some(v) = cli.color_depth         { cfg.display.color_depth = v; }
    if let Some(v) = &cli.sink               { cfg.display.sink_path = Some(v.clone()); }
    if let Some(v) = &cli.media              { cfg.polling.media_path = Some(v.clone()); }
    if let Some(v) = &cli.weather            { cfg.polling.weather_path = Some(v.clone()); }
    if let Some(v) = &cli.state_file         { cfg.state_file = Some(v.clone()); }
    if let Some(v) = cli.workers             { cfg.pipeline.workers = v; }
    if let Some(v) = cli.start_screen        { cfg.render.start_screen = v; }
    if let Some(v) = cli.auto_switch         { cfg.render.auto_switch = v; }
}

/// Put any invariants here (required fields, ranges, etc.)
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    let invalid = |msg: &str| Err(ConfigError::Validation(msg.into()));
    let d = &cfg.display;
    if d.width == 0 || d.height == 0 {
        return invalid("display width/height must be > 0");
    }
    match d.rotate_deg {
        0 | 90 | 180 | 270 => {}
        _ => return invalid("display rotate_deg must be 0|90|180|270"),
    }
    if d.partial_refresh_budget == Some(0) {
        return invalid("display partial_refresh_budget must be > 0 when set");
    }
    let p = &cfg.pipeline;
    for (name, bound) in [("resized", p.resized_cache), ("dithered", p.dithered_cache), ("background", p.background_cache)] {
        if !(3..=6).contains(&bound) {
            return Err(ConfigError::Validation(format!("pipeline {name}_cache must be 3..=6, got {bound}")));
        }
    }
    if p.queue_capacity == 0 {
        return invalid("pipeline queue_capacity must be > 0");
    }
    let a = &cfg.animation;
    if a.fps == 0 || a.scroll_fps == 0 {
        return invalid("animation fps and scroll_fps must be > 0");
    }
    if !(a.speed.is_finite() && a.speed > 0.0) {
        return invalid("animation speed must be a positive number");
    }
    if !(a.load_threshold.is_finite() && a.load_threshold > 0.0) {
        return invalid("animation load_threshold must be a positive number");
    }
    let (w, h) = d.logical_size();
    if a.album_size == 0 || a.album_size > w.min(h) || a.portrait_size == 0 || a.portrait_size > w.min(h) {
        return invalid("animation album_size/portrait_size must fit on the display");
    }
    let poll = &cfg.polling;
    if poll.base_secs == 0 || poll.cap_secs < poll.base_secs {
        return invalid("polling base_secs must be > 0 and cap_secs >= base_secs");
    }
    if cfg.render.tick_ms == 0 {
        return invalid("render tick_ms must be > 0");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        let mut full = vec!["statuspane"];
        full.extend_from_slice(args);
        Cli::try_parse_from(full).unwrap()
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let cfg = from_yaml_str("display:\n  width: 320\n  height: 240\n  color_depth: rgb565\n").unwrap();
        assert_eq!(cfg.display.width, 320);
        assert_eq!(cfg.display.color_depth, ColorDepth::Rgb565);
        assert_eq!(cfg.pipeline.queue_capacity, 5);
        assert_eq!(cfg.render.now_playing_interval_ms, 500);
        assert!(!cfg.dither());
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(from_yaml_str("  \n").unwrap(), Config::default());
        assert!(validate(&Config::default()).is_ok());
        assert!(Config::default().dither());
    }

    #[test]
    fn test_cli_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.yaml");
        fs::write(&path, "log_level: debug\npipeline:\n  workers: 4\n").unwrap();
        let c = cli(&[
            "--config", path.to_str().unwrap(),
            "--workers", "0",
            "--color-depth", "gray4",
            "--start-screen", "now_playing",
        ]);
        let cfg = load_with(&c).unwrap();
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.pipeline.workers, 0);
        assert_eq!(cfg.display.color_depth, ColorDepth::Gray4);
        assert_eq!(cfg.render.start_screen, FrameTarget::NowPlaying);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let c = cli(&["--config", "/definitely/not/here.yaml"]);
        assert!(matches!(load_with(&c), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_validation_rules() {
        let mut cfg = Config::default();
        cfg.display.rotate_deg = 45;
        assert!(validate(&cfg).is_err());

        let mut cfg = Config::default();
        cfg.pipeline.background_cache = 9;
        assert!(validate(&cfg).is_err());

        let mut cfg = Config::default();
        cfg.animation.album_size = 100;
        assert!(validate(&cfg).is_err());

        let mut cfg = Config::default();
        cfg.polling.cap_secs = 5;
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn test_rotation_swaps_logical_size() {
        let mut d = DisplayConfig::default();
        d.rotate_deg = 90;
        assert_eq!(d.logical_size(), (64, 128));
    }

    #[test]
    fn test_scheduler_intervals() {
        let s = Config::default().scheduler();
        assert_eq!(s.intervals[&FrameTarget::Weather], Duration::from_secs(30));
        assert_eq!(s.intervals[&FrameTarget::Clock], Duration::from_secs(1));
    }
}
