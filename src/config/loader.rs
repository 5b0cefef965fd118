use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{Error, Result};

use super::{Config, CONFIG_DIR_NAME, CONFIG_FILE_NAME};

pub fn load_or_default() -> Result<Config> {
    let path = default_config_path()?;
    if !path.exists() {
        let cfg = Config::default();
        cfg.save_to_path(&path)?;
        super::validate(&cfg)?;
        return Ok(cfg);
    }
    load_from_path(&path)
}

pub fn load_from_path(path: &Path) -> Result<Config> {
    if !path.exists() {
        let cfg = Config::default();
        super::validate(&cfg)?;
        return Ok(cfg);
    }

    let raw = fs::read_to_string(path)?;
    parse(&raw)
}

pub fn save_to_path(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let contents = format!(
        "# videoctrl config\n\
# first pin shuts the system down, the rest start videos 1..N\n\
pins = {}\n\
video_dir = \"{}\"\n\
video_extension = \"{}\"\n\
title_image = \"{}\"\n\
viewer_command = \"{}\"\n\
viewer_args = {}\n\
player_command = \"{}\"\n\
player_args = {}\n\
shutdown_command = {}\n\
poll_interval = \"{}\"\n\
stop_timeout = \"{}\"\n\
event_log = {}\n",
        super::format_pin_list(&config.pins),
        config.video_dir,
        config.video_extension,
        config.title_image,
        config.viewer_command,
        format_string_array(&config.viewer_args),
        config.player_command,
        format_string_array(&config.player_args),
        format_string_array(&config.shutdown_command),
        humantime::format_duration(config.poll_interval),
        humantime::format_duration(config.stop_timeout),
        config
            .event_log
            .as_ref()
            .map(|p| format!("\"{p}\""))
            .unwrap_or_else(|| "null".into()),
    );
    fs::write(path, contents)?;
    Ok(())
}

pub fn parse(raw: &str) -> Result<Config> {
    let mut cfg = Config::default();

    for (idx, line) in raw.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let (key, value) = trimmed.split_once('=').ok_or_else(|| {
            Error::InvalidArgs(format!("invalid config line {}: '{}'", idx + 1, line))
        })?;

        let key = key.trim();
        let value = value.trim().trim_matches('"');
        match key {
            "pins" => {
                cfg.pins = super::parse_pin_list(value).map_err(|e| {
                    Error::InvalidArgs(format!("invalid pins on line {}: {e}", idx + 1))
                })?;
            }
            "video_dir" => cfg.video_dir = value.to_string(),
            "video_extension" => cfg.video_extension = value.to_string(),
            "title_image" => cfg.title_image = value.to_string(),
            "viewer_command" => cfg.viewer_command = value.to_string(),
            "player_command" => cfg.player_command = value.to_string(),
            "viewer_args" => {
                cfg.viewer_args = parse_string_array(value).map_err(|e| {
                    Error::InvalidArgs(format!("invalid viewer_args on line {}: {e}", idx + 1))
                })?;
            }
            "player_args" => {
                cfg.player_args = parse_string_array(value).map_err(|e| {
                    Error::InvalidArgs(format!("invalid player_args on line {}: {e}", idx + 1))
                })?;
            }
            "shutdown_command" => {
                cfg.shutdown_command = parse_string_array(value).map_err(|e| {
                    Error::InvalidArgs(format!(
                        "invalid shutdown_command on line {}: {e}",
                        idx + 1
                    ))
                })?;
            }
            "poll_interval" => {
                cfg.poll_interval = super::parse_duration(value).map_err(|e| {
                    Error::InvalidArgs(format!("invalid poll_interval on line {}: {e}", idx + 1))
                })?;
            }
            "stop_timeout" => {
                cfg.stop_timeout = super::parse_duration(value).map_err(|e| {
                    Error::InvalidArgs(format!("invalid stop_timeout on line {}: {e}", idx + 1))
                })?;
            }
            "event_log" => {
                if value == "null" || value.is_empty() {
                    cfg.event_log = None;
                } else {
                    cfg.event_log = Some(value.to_string());
                }
            }
            other => {
                return Err(Error::InvalidArgs(format!(
                    "unknown config key '{}' on line {}",
                    other,
                    idx + 1
                )));
            }
        }
    }

    super::validate(&cfg)?;
    Ok(cfg)
}

pub fn default_config_path() -> Result<PathBuf> {
    let home = std::env::var_os("HOME")
        .map(PathBuf::from)
        .ok_or_else(|| Error::InvalidArgs("HOME not set; cannot locate config directory".into()))?;
    Ok(home.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

fn parse_string_array(value: &str) -> std::result::Result<Vec<String>, String> {
    let trimmed = value.trim();
    if !trimmed.starts_with('[') || !trimmed.ends_with(']') {
        return Err("expected array literal (e.g., [\"sudo\", \"halt\"])".into());
    }
    let inner = &trimmed[1..trimmed.len() - 1];
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    let mut entries = Vec::new();
    for part in inner.split(',') {
        let item = part.trim();
        if item.is_empty() {
            continue;
        }
        let cleaned = if item.len() >= 2
            && ((item.starts_with('"') && item.ends_with('"'))
                || (item.starts_with('\'') && item.ends_with('\'')))
        {
            &item[1..item.len() - 1]
        } else {
            item
        };
        if cleaned.trim().is_empty() {
            return Err("entries must not be empty".into());
        }
        entries.push(cleaned.to_string());
    }
    Ok(entries)
}

fn format_string_array(values: &[String]) -> String {
    if values.is_empty() {
        return "[]".into();
    }
    let quoted = values
        .iter()
        .map(|value| format!("\"{value}\""))
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{quoted}]")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn temp_path(dir: &tempfile::TempDir, name: &str) -> PathBuf {
        dir.path().join(name)
    }

    #[test]
    fn loads_default_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_from_path(&temp_path(&dir, "missing.toml")).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn parses_valid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "parse.toml");
        let contents = r#"
            # buttons on the front panel
            pins = [21, 20, 16]
            video_dir = "/srv/videos"
            video_extension = ".mkv"
            title_image = "/srv/title.png"
            viewer_command = "feh"
            viewer_args = ["-F", "-Z"]
            player_command = "mpv"
            player_args = ["--fs"]
            shutdown_command = ["systemctl", "poweroff"]
            poll_interval = "50ms"
            stop_timeout = "0s"
            event_log = "/var/log/videoctrl-events.jsonl"
        "#;
        fs::write(&path, contents).unwrap();
        let cfg = load_from_path(&path).unwrap();
        assert_eq!(cfg.pins, vec![21, 20, 16]);
        assert_eq!(cfg.video_dir, "/srv/videos");
        assert_eq!(cfg.video_extension, ".mkv");
        assert_eq!(cfg.title_image, "/srv/title.png");
        assert_eq!(cfg.viewer_command, "feh");
        assert_eq!(cfg.viewer_args, vec!["-F", "-Z"]);
        assert_eq!(cfg.player_command, "mpv");
        assert_eq!(cfg.player_args, vec!["--fs"]);
        assert_eq!(cfg.shutdown_command, vec!["systemctl", "poweroff"]);
        assert_eq!(cfg.poll_interval, Duration::from_millis(50));
        assert_eq!(cfg.stop_timeout, Duration::ZERO);
        assert_eq!(
            cfg.event_log.as_deref(),
            Some("/var/log/videoctrl-events.jsonl")
        );
    }

    #[test]
    fn rejects_unknown_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "unknown.toml");
        fs::write(&path, "nope = 1").unwrap();
        let err = load_from_path(&path).unwrap_err();
        assert!(format!("{err}").contains("unknown config key 'nope' on line 1"));
    }

    #[test]
    fn rejects_duplicate_pins() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "dupes.toml");
        fs::write(&path, "pins = [26, 19, 19]").unwrap();
        let err = load_from_path(&path).unwrap_err();
        assert!(format!("{err}").contains("unique"));
    }

    #[test]
    fn rejects_shutdown_pin_without_videos() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "single.toml");
        fs::write(&path, "pins = [26]").unwrap();
        let err = load_from_path(&path).unwrap_err();
        assert!(format!("{err}").contains("video pin"));
    }

    #[test]
    fn rejects_bad_duration() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "duration.toml");
        fs::write(&path, "stop_timeout = \"whenever\"").unwrap();
        let err = load_from_path(&path).unwrap_err();
        assert!(format!("{err}").contains("stop_timeout on line 1"));
    }

    #[test]
    fn rejects_invalid_array_literal() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "array.toml");
        fs::write(&path, "shutdown_command = halt").unwrap();
        let err = load_from_path(&path).unwrap_err();
        assert!(format!("{err}").contains("shutdown_command"));
    }

    #[test]
    fn saves_and_loads_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let cfg = Config {
            pins: vec![4, 17, 27, 22],
            video_dir: "/media/usb".into(),
            poll_interval: Duration::from_millis(5),
            stop_timeout: Duration::from_millis(1500),
            event_log: Some("/tmp/events.jsonl".into()),
            ..Config::default()
        };
        save_to_path(&cfg, &path).unwrap();
        let loaded = load_from_path(&path).unwrap();
        assert_eq!(cfg, loaded);
    }
}
