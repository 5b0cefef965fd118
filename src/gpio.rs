use crate::dispatch::PinAssignment;
#[cfg(not(target_os = "linux"))]
use crate::Error;
use crate::Result;
use std::collections::VecDeque;

/// Reads every configured button once per poll cycle.
pub trait InputSampler {
    /// One entry per configured pin, in assignment order; `true` means pressed.
    fn sample(&mut self) -> Vec<bool>;

    /// Give the pins back before exit.
    fn release(&mut self) {}
}

/// Active-low buttons on pull-up inputs, read through rppal; stubbed on non-Linux platforms.
#[cfg(target_os = "linux")]
pub struct GpioSampler {
    pins: Vec<rppal::gpio::InputPin>,
}

#[cfg(target_os = "linux")]
impl GpioSampler {
    /// Claims every pin up front, so a bad pin number or missing device fails before the loop starts.
    pub fn new(assignment: &PinAssignment) -> Result<Self> {
        let gpio = rppal::gpio::Gpio::new().map_err(|e| crate::Error::Gpio(e.to_string()))?;
        let mut pins = Vec::with_capacity(assignment.pins().len());
        for pin in assignment.pins() {
            let input = gpio
                .get(*pin)
                .map_err(|e| crate::Error::Gpio(format!("GPIO {pin}: {e}")))?
                .into_input_pullup();
            pins.push(input);
        }
        Ok(Self { pins })
    }
}

#[cfg(target_os = "linux")]
impl InputSampler for GpioSampler {
    fn sample(&mut self) -> Vec<bool> {
        self.pins.iter().map(|pin| pin.is_low()).collect()
    }

    fn release(&mut self) {
        // rppal restores the previous pin mode and bias when an InputPin drops.
        self.pins.clear();
    }
}

#[cfg(not(target_os = "linux"))]
pub struct GpioSampler;

#[cfg(not(target_os = "linux"))]
impl GpioSampler {
    pub fn new(_assignment: &PinAssignment) -> Result<Self> {
        Err(Error::Gpio("GPIO input unsupported on this platform".into()))
    }
}

#[cfg(not(target_os = "linux"))]
impl InputSampler for GpioSampler {
    fn sample(&mut self) -> Vec<bool> {
        Vec::new()
    }
}

/// Replays a fixed list of sample vectors; used by tests to script button presses.
///
/// Once the script runs out every pin reads as released.
#[derive(Debug, Default)]
pub struct ScriptedSampler {
    width: usize,
    script: VecDeque<Vec<bool>>,
    released: bool,
}

impl ScriptedSampler {
    pub fn new(width: usize, script: Vec<Vec<bool>>) -> Self {
        Self {
            width,
            script: script.into(),
            released: false,
        }
    }

    /// Script built from pressed pin indices per cycle, e.g. `&[&[], &[2]]`.
    pub fn from_presses(width: usize, cycles: &[&[usize]]) -> Self {
        let script = cycles
            .iter()
            .map(|pressed| (0..width).map(|idx| pressed.contains(&idx)).collect())
            .collect();
        Self::new(width, script)
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl InputSampler for ScriptedSampler {
    fn sample(&mut self) -> Vec<bool> {
        self.script
            .pop_front()
            .unwrap_or_else(|| vec![false; self.width])
    }

    fn release(&mut self) {
        self.released = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_sampler_replays_then_reads_released() {
        let mut sampler = ScriptedSampler::from_presses(3, &[&[1], &[0, 2]]);
        assert_eq!(sampler.sample(), vec![false, true, false]);
        assert_eq!(sampler.sample(), vec![true, false, true]);
        assert_eq!(sampler.remaining(), 0);
        assert_eq!(sampler.sample(), vec![false, false, false]);
    }

    #[test]
    fn scripted_sampler_tracks_release() {
        let mut sampler = ScriptedSampler::new(2, Vec::new());
        assert!(!sampler.is_released());
        sampler.release();
        assert!(sampler.is_released());
    }
}
