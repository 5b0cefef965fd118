use crate::{Error, Result};
use serde::Serialize;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

/// Ordered BCM pin list: index 0 is the shutdown button, every later index is a video button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinAssignment {
    pins: Vec<u8>,
}

impl PinAssignment {
    pub fn new(pins: Vec<u8>) -> Result<Self> {
        validate_pins(&pins)?;
        Ok(Self { pins })
    }

    pub fn pins(&self) -> &[u8] {
        &self.pins
    }

    pub fn shutdown_pin(&self) -> u8 {
        self.pins[0]
    }

    /// Video buttons in scan order, paired with the video they trigger.
    pub fn video_pins(&self) -> impl Iterator<Item = (VideoId, u8)> + '_ {
        self.pins
            .iter()
            .enumerate()
            .skip(1)
            .filter_map(|(idx, pin)| VideoId::from_index(idx).map(|id| (id, *pin)))
    }
}

pub(crate) fn validate_pins(pins: &[u8]) -> Result<()> {
    if pins.len() < 2 {
        return Err(Error::InvalidArgs(
            "pins must list a shutdown pin followed by at least one video pin".into(),
        ));
    }
    for (idx, pin) in pins.iter().enumerate() {
        if pins[..idx].contains(pin) {
            return Err(Error::InvalidArgs(format!(
                "pins must be unique; GPIO {pin} appears more than once"
            )));
        }
    }
    Ok(())
}

/// Video number derived from the position of its button in the pin list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct VideoId(NonZeroUsize);

impl VideoId {
    /// Index 0 belongs to the shutdown button and never names a video.
    pub fn from_index(index: usize) -> Option<Self> {
        NonZeroUsize::new(index).map(Self)
    }

    pub fn get(self) -> usize {
        self.0.get()
    }

    /// `<video_dir>/<id><extension>`, e.g. `/home/pi/Videos/2.mp4`.
    pub fn path_in(self, video_dir: &Path, extension: &str) -> PathBuf {
        video_dir.join(format!("{}{}", self.0, extension))
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The single decision taken from one poll cycle's samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "video")]
pub enum Intent {
    Shutdown,
    PlayVideo(VideoId),
    Idle,
}

/// Map one cycle of samples (`true` = pressed) to an intent.
///
/// The shutdown pin wins outright. Video pins are scanned forward and each
/// pressed pin overwrites the previous choice, so the highest pressed index
/// wins. Samples are taken as-is; there is no debounce filtering.
pub fn decide(samples: &[bool]) -> Intent {
    if samples.first().copied().unwrap_or(false) {
        return Intent::Shutdown;
    }

    let mut selected = None;
    for (idx, pressed) in samples.iter().enumerate().skip(1) {
        if *pressed {
            selected = VideoId::from_index(idx);
        }
    }

    match selected {
        Some(id) => Intent::PlayVideo(id),
        None => Intent::Idle,
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Intent::Shutdown => f.write_str("shutdown"),
            Intent::PlayVideo(id) => write!(f, "play video {id}"),
            Intent::Idle => f.write_str("idle"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(idx: usize) -> Intent {
        Intent::PlayVideo(VideoId::from_index(idx).unwrap())
    }

    #[test]
    fn shutdown_pin_overrides_everything() {
        assert_eq!(decide(&[true, false, false]), Intent::Shutdown);
        assert_eq!(decide(&[true, true, true, true]), Intent::Shutdown);
        assert_eq!(decide(&[true]), Intent::Shutdown);
    }

    #[test]
    fn highest_pressed_video_pin_wins() {
        assert_eq!(decide(&[false, true, false, true, false]), video(3));
        assert_eq!(decide(&[false, true, true, true, true]), video(4));
        assert_eq!(decide(&[false, true, false, false, false]), video(1));
    }

    #[test]
    fn nothing_pressed_is_idle() {
        assert_eq!(decide(&[false, false, false, false, false]), Intent::Idle);
        assert_eq!(decide(&[]), Intent::Idle);
    }

    #[test]
    fn video_path_uses_id_and_extension() {
        let id = VideoId::from_index(2).unwrap();
        assert_eq!(
            id.path_in(Path::new("/home/pi/Videos"), ".mp4"),
            PathBuf::from("/home/pi/Videos/2.mp4")
        );
    }

    #[test]
    fn index_zero_is_not_a_video() {
        assert!(VideoId::from_index(0).is_none());
    }

    #[test]
    fn assignment_rejects_duplicates_and_short_lists() {
        let err = PinAssignment::new(vec![26]).unwrap_err();
        assert!(format!("{err}").contains("at least one video pin"));
        let err = PinAssignment::new(vec![26, 19, 26]).unwrap_err();
        assert!(format!("{err}").contains("GPIO 26"));
    }

    #[test]
    fn assignment_maps_video_pins_in_order() {
        let assignment = PinAssignment::new(vec![26, 19, 13, 6, 5]).unwrap();
        assert_eq!(assignment.shutdown_pin(), 26);
        let mapped: Vec<(usize, u8)> = assignment
            .video_pins()
            .map(|(id, pin)| (id.get(), pin))
            .collect();
        assert_eq!(mapped, vec![(1, 19), (2, 13), (3, 6), (4, 5)]);
    }

    #[test]
    fn intent_serializes_with_tag() {
        let raw = serde_json::to_string(&video(2)).unwrap();
        assert_eq!(raw, r#"{"kind":"play_video","video":2}"#);
        let raw = serde_json::to_string(&Intent::Idle).unwrap();
        assert_eq!(raw, r#"{"kind":"idle"}"#);
    }
}
