use std::f32::consts::TAU;

use clap::ValueEnum;
use level_meter_core::LevelSample;

/// Synthetic stereo programme used to exercise a meter without an audio device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Signal {
    /// Alternating loud and quiet bursts, offset between channels.
    Burst,
    /// Slow sine swell on the left, faster and quieter on the right.
    Sine,
    Silence,
    /// Steady programme with a single over on the left channel.
    Clip,
}

impl Signal {
    /// Level reading at `seconds` into the programme.
    pub fn sample_at(self, seconds: f32) -> LevelSample {
        match self {
            Signal::Burst => {
                let left = if seconds.fract() < 0.5 { 0.8 } else { 0.05 };
                let right = if (seconds + 0.25).fract() < 0.5 { 0.6 } else { 0.02 };
                LevelSample::new(left, right).with_rms(left * 0.5, right * 0.5)
            }
            Signal::Sine => {
                let left = 0.5 + 0.45 * (TAU * 0.25 * seconds).sin();
                let right = 0.25 + 0.2 * (TAU * 1.5 * seconds).sin();
                LevelSample::new(left, right).with_rms(left * 0.707, right * 0.707)
            }
            Signal::Silence => LevelSample::SILENT,
            Signal::Clip => {
                let left = if (1.0..1.05).contains(&seconds) { 1.3 } else { 0.5 };
                LevelSample::new(left, 0.4).with_rms(0.3, 0.25)
            }
        }
    }
}
