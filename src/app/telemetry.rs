use super::controller::Transition;
use serde::Serialize;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Serialize)]
struct EventEntry<'a> {
    ts_ms: u128,
    event: &'static str,
    #[serde(flatten)]
    transition: &'a Transition,
}

/// Optional JSON-lines record of every cycle that changed something.
#[derive(Default)]
pub struct EventLog {
    file: Option<File>,
}

impl EventLog {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn open(path: Option<&str>) -> io::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::disabled());
        };
        let path = Path::new(path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self { file: Some(file) })
    }

    pub fn is_enabled(&self) -> bool {
        self.file.is_some()
    }

    pub fn record(&mut self, transition: &Transition) -> io::Result<()> {
        let Some(file) = self.file.as_mut() else {
            return Ok(());
        };
        let entry = EventEntry {
            ts_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis(),
            event: "transition",
            transition,
        };
        let line = serde_json::to_string(&entry).map_err(io::Error::other)?;
        writeln!(file, "{line}")
    }
}
