use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{MeterError, Result};

/// Default gate below which a smoothed level snaps to silence (about -80 dBFS).
pub const DEFAULT_NOISE_FLOOR: f32 = 0.0001;
/// Default linear delta under which a redraw is suppressed (about 0.08 dB).
pub const DEFAULT_REDRAW_EPSILON: f32 = 0.001;

/// Display range and ballistics constants for a meter instance.
///
/// A config is validated when it is bound to a [`LevelMeter`](crate::LevelMeter)
/// and is never mutated afterwards. The `with_*` helpers return modified
/// copies so custom variants can be derived from a preset before binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BallisticsConfig {
    pub min_db: f32,
    pub max_db: f32,
    /// How long a peak is held before it starts to decay. Zero disables
    /// peak hold; the marker then tracks the input directly.
    pub peak_hold_ms: f32,
    pub peak_decay_db_per_sec: f32,
    pub attack_ms: f32,
    pub release_ms: f32,
    /// Cell count used by the segmented style.
    pub segments: u32,
    pub show_rms: bool,
    pub show_scale: bool,
    /// Scale positions in dB, strictly ascending.
    pub scale_marks: Vec<f32>,
    pub noise_floor: f32,
    pub redraw_epsilon: f32,
}

impl Default for BallisticsConfig {
    fn default() -> Self {
        Preset::Peak.config()
    }
}

impl BallisticsConfig {
    /// Parses a JSON document and validates the result. Missing fields are
    /// taken from the Peak preset.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations that would produce undefined geometry or
    /// non-finite ballistics.
    pub fn validate(&self) -> Result<()> {
        if !self.min_db.is_finite() || !self.max_db.is_finite() || self.max_db <= self.min_db {
            return Err(MeterError::InvalidRange {
                min_db: self.min_db,
                max_db: self.max_db,
            });
        }

        if self.segments == 0 {
            return Err(MeterError::InvalidSegments);
        }

        for (field, value) in [
            ("peak_hold_ms", self.peak_hold_ms),
            ("peak_decay_db_per_sec", self.peak_decay_db_per_sec),
            ("attack_ms", self.attack_ms),
            ("release_ms", self.release_ms),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(MeterError::InvalidTiming { field, value });
            }
        }

        for (field, value) in [
            ("noise_floor", self.noise_floor),
            ("redraw_epsilon", self.redraw_epsilon),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(MeterError::InvalidThreshold { field, value });
            }
        }

        if let Some(mark) = self.scale_marks.iter().find(|mark| !mark.is_finite()) {
            return Err(MeterError::InvalidScale(format!(
                "mark {mark} is not a finite dB value"
            )));
        }

        if let Some(pair) = self.scale_marks.windows(2).find(|pair| pair[1] <= pair[0]) {
            return Err(MeterError::InvalidScale(format!(
                "marks must be strictly ascending, found {} after {}",
                pair[1], pair[0]
            )));
        }

        Ok(())
    }

    /// Width of the display range in dB. Always positive for a validated config.
    pub fn range_db(&self) -> f32 {
        self.max_db - self.min_db
    }

    /// Whether peak hold is active; a zero hold time makes the marker track the input.
    pub fn peak_hold_enabled(&self) -> bool {
        self.peak_hold_ms > 0.0
    }

    pub fn with_range(self, min_db: f32, max_db: f32) -> Self {
        Self {
            min_db,
            max_db,
            ..self
        }
    }

    pub fn with_peak_hold(self, peak_hold_ms: f32, peak_decay_db_per_sec: f32) -> Self {
        Self {
            peak_hold_ms,
            peak_decay_db_per_sec,
            ..self
        }
    }

    pub fn with_time_constants(self, attack_ms: f32, release_ms: f32) -> Self {
        Self {
            attack_ms,
            release_ms,
            ..self
        }
    }

    pub fn with_segments(self, segments: u32) -> Self {
        Self { segments, ..self }
    }

    pub fn with_rms(self, show_rms: bool) -> Self {
        Self { show_rms, ..self }
    }

    pub fn with_scale(self, show_scale: bool, scale_marks: Vec<f32>) -> Self {
        Self {
            show_scale,
            scale_marks,
            ..self
        }
    }

    pub fn with_thresholds(self, noise_floor: f32, redraw_epsilon: f32) -> Self {
        Self {
            noise_floor,
            redraw_epsilon,
            ..self
        }
    }
}

/// Named ballistics bundles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// Digital sample-peak meter: instant attack, long hold, 26 dB/s fall.
    Peak,
    /// Quasi-peak programme meter with a narrower range.
    Ppm,
    /// Averaging VU meter driven by the RMS measure.
    Vu,
}

impl Preset {
    pub const ALL: [Preset; 3] = [Preset::Peak, Preset::Ppm, Preset::Vu];

    pub fn name(self) -> &'static str {
        match self {
            Preset::Peak => "peak",
            Preset::Ppm => "ppm",
            Preset::Vu => "vu",
        }
    }

    pub fn config(self) -> BallisticsConfig {
        match self {
            Preset::Peak => BallisticsConfig {
                min_db: -60.0,
                max_db: 6.0,
                peak_hold_ms: 1500.0,
                peak_decay_db_per_sec: 26.0,
                attack_ms: 0.0,
                release_ms: 300.0,
                segments: 33,
                show_rms: false,
                show_scale: true,
                scale_marks: vec![-60.0, -48.0, -36.0, -24.0, -18.0, -12.0, -6.0, -3.0, 0.0, 6.0],
                noise_floor: DEFAULT_NOISE_FLOOR,
                redraw_epsilon: DEFAULT_REDRAW_EPSILON,
            },
            Preset::Ppm => BallisticsConfig {
                min_db: -40.0,
                max_db: 6.0,
                peak_hold_ms: 1000.0,
                peak_decay_db_per_sec: 12.0,
                attack_ms: 10.0,
                release_ms: 600.0,
                segments: 23,
                show_rms: false,
                show_scale: true,
                scale_marks: vec![-40.0, -30.0, -24.0, -18.0, -12.0, -6.0, -3.0, 0.0, 6.0],
                noise_floor: DEFAULT_NOISE_FLOOR,
                redraw_epsilon: DEFAULT_REDRAW_EPSILON,
            },
            Preset::Vu => BallisticsConfig {
                min_db: -30.0,
                max_db: 3.0,
                peak_hold_ms: 0.0,
                peak_decay_db_per_sec: 26.0,
                attack_ms: 300.0,
                release_ms: 300.0,
                segments: 22,
                show_rms: true,
                show_scale: true,
                scale_marks: vec![-30.0, -20.0, -10.0, -7.0, -5.0, -3.0, 0.0, 3.0],
                noise_floor: DEFAULT_NOISE_FLOOR,
                redraw_epsilon: DEFAULT_REDRAW_EPSILON,
            },
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = MeterError;

    fn from_str(value: &str) -> Result<Self> {
        Preset::ALL
            .into_iter()
            .find(|preset| preset.name().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| MeterError::UnknownPreset(value.to_string()))
    }
}
