use crate::{dispatch, Error, Result};
use std::path::Path;
use std::time::Duration;

pub mod loader;

pub const DEFAULT_PINS: [u8; 5] = [26, 19, 13, 6, 5];
pub const DEFAULT_VIDEO_DIR: &str = "/home/pi/Videos";
pub const DEFAULT_VIDEO_EXTENSION: &str = ".mp4";
pub const DEFAULT_TITLE_IMAGE: &str = "/home/pi/Pictures/title.jpg";
pub const DEFAULT_VIEWER_COMMAND: &str = "fbi";
pub const DEFAULT_VIEWER_ARGS: [&str; 1] = ["--noverbose"];
pub const DEFAULT_PLAYER_COMMAND: &str = "omxplayer";
pub const DEFAULT_PLAYER_ARGS: [&str; 1] = ["-b"];
pub const DEFAULT_SHUTDOWN_COMMAND: [&str; 2] = ["sudo", "halt"];
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(20);
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(2);
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(1);
const CONFIG_DIR_NAME: &str = ".videoctrl";
const CONFIG_FILE_NAME: &str = "config.toml";

/// User-supplied settings loaded from the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// BCM pin numbers; the first is the shutdown button.
    pub pins: Vec<u8>,
    pub video_dir: String,
    pub video_extension: String,
    pub title_image: String,
    pub viewer_command: String,
    pub viewer_args: Vec<String>,
    pub player_command: String,
    pub player_args: Vec<String>,
    pub shutdown_command: Vec<String>,
    pub poll_interval: Duration,
    /// Zero waits for a stopped child without bound.
    pub stop_timeout: Duration,
    pub event_log: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pins: DEFAULT_PINS.to_vec(),
            video_dir: DEFAULT_VIDEO_DIR.to_string(),
            video_extension: DEFAULT_VIDEO_EXTENSION.to_string(),
            title_image: DEFAULT_TITLE_IMAGE.to_string(),
            viewer_command: DEFAULT_VIEWER_COMMAND.to_string(),
            viewer_args: to_strings(&DEFAULT_VIEWER_ARGS),
            player_command: DEFAULT_PLAYER_COMMAND.to_string(),
            player_args: to_strings(&DEFAULT_PLAYER_ARGS),
            shutdown_command: to_strings(&DEFAULT_SHUTDOWN_COMMAND),
            poll_interval: DEFAULT_POLL_INTERVAL,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            event_log: None,
        }
    }
}

impl Config {
    pub fn load_or_default() -> Result<Self> {
        loader::load_or_default()
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        loader::load_from_path(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        loader::save_to_path(self, path)
    }
}

pub(crate) fn validate(cfg: &Config) -> Result<()> {
    dispatch::validate_pins(&cfg.pins)?;
    if cfg.video_extension.is_empty() {
        return Err(Error::InvalidArgs("video_extension must not be empty".into()));
    }
    if cfg.viewer_command.trim().is_empty() {
        return Err(Error::InvalidArgs("viewer_command must not be empty".into()));
    }
    if cfg.player_command.trim().is_empty() {
        return Err(Error::InvalidArgs("player_command must not be empty".into()));
    }
    if cfg.shutdown_command.is_empty() {
        return Err(Error::InvalidArgs(
            "shutdown_command must name a program".into(),
        ));
    }
    if cfg.poll_interval > MAX_POLL_INTERVAL {
        return Err(Error::InvalidArgs(format!(
            "poll_interval must be at most {}",
            humantime::format_duration(MAX_POLL_INTERVAL)
        )));
    }
    Ok(())
}

/// Parse `[26, 19, 13]` or a bare `26,19,13`.
pub fn parse_pin_list(raw: &str) -> std::result::Result<Vec<u8>, String> {
    let trimmed = raw.trim();
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(trimmed);
    inner
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.parse::<u8>()
                .map_err(|_| format!("'{item}' is not a GPIO number"))
        })
        .collect()
}

pub fn parse_duration(raw: &str) -> std::result::Result<Duration, String> {
    humantime::parse_duration(raw.trim()).map_err(|e| format!("{e} (e.g. \"20ms\", \"2s\")"))
}

fn format_pin_list(pins: &[u8]) -> String {
    let items = pins.iter().map(|p| p.to_string()).collect::<Vec<_>>();
    format!("[{}]", items.join(", "))
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}
