use serde::{Deserialize, Serialize};

use crate::{
    scale::{db_to_linear, linear_to_db},
    BallisticsConfig, FrameTime, LevelSample,
};

/// Shortest frame interval the ballistics accept.
pub const MIN_FRAME_DELTA_MS: f64 = 1.0;
/// Longest frame interval the ballistics accept. Anything longer is treated
/// as a pause and skipped.
pub const MAX_FRAME_DELTA_MS: f64 = 100.0;
/// Floor for attack and release so a zero time constant stays finite.
pub const MIN_TIME_CONSTANT_MS: f32 = 0.01;
/// Linear level at or above which a channel latches its clip indicator.
pub const CLIP_LEVEL: f32 = 1.0;

/// Ballistic state of one channel.
///
/// Values are linear amplitudes. Copies of this struct are handed to the
/// renderer and to the host; only [`BallisticsProcessor`] advances the live one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelBallisticsState {
    pub smoothed_level: f32,
    pub peak_hold_level: f32,
    pub peak_hold_timestamp_ms: f64,
    pub clip_latched: bool,
    /// Smoothed RMS, driven only while the source supplies an RMS measure.
    pub rms_level: f32,
    pub has_rms: bool,
    /// Unsmoothed peak of the latest accepted frame.
    pub instant_level: f32,
}

struct ChannelInput {
    peak: f32,
    rms: Option<f32>,
    clipped: bool,
}

impl ChannelBallisticsState {
    fn advance(&mut self, config: &BallisticsConfig, frame: FrameTime, input: ChannelInput) {
        let delta_ms = frame.delta_ms as f32;

        self.instant_level = input.peak;
        self.smoothed_level = smooth(self.smoothed_level, input.peak, delta_ms, config);

        match input.rms {
            Some(rms) => {
                self.rms_level = smooth(self.rms_level, rms, delta_ms, config);
                self.has_rms = true;
            }
            None => {
                self.rms_level = 0.0;
                self.has_rms = false;
            }
        }

        if !config.peak_hold_enabled() {
            self.peak_hold_level = input.peak;
            self.peak_hold_timestamp_ms = frame.now_ms;
        } else if input.peak > self.peak_hold_level {
            self.peak_hold_level = input.peak;
            self.peak_hold_timestamp_ms = frame.now_ms;
        } else if frame.now_ms - self.peak_hold_timestamp_ms > config.peak_hold_ms as f64 {
            self.peak_hold_level = decay_peak(self.peak_hold_level, delta_ms, config);
        }

        if input.peak >= CLIP_LEVEL || input.clipped {
            self.clip_latched = true;
        }
    }

    fn reset(&mut self) {
        self.clip_latched = false;
        self.peak_hold_level = 0.0;
    }
}

/// One-pole smoothing whose time constant does not depend on the frame rate.
fn smooth(current: f32, target: f32, delta_ms: f32, config: &BallisticsConfig) -> f32 {
    let tau = if target > current {
        config.attack_ms
    } else {
        config.release_ms
    }
    .max(MIN_TIME_CONSTANT_MS);

    let coef = 1.0 - (-delta_ms / tau).exp();
    let next = current + (target - current) * coef;

    if next < config.noise_floor {
        0.0
    } else {
        next
    }
}

/// Linear fall in the dB domain. Reaching `min_db` snaps the peak to silence.
fn decay_peak(level: f32, delta_ms: f32, config: &BallisticsConfig) -> f32 {
    if level <= 0.0 {
        return 0.0;
    }

    let db = linear_to_db(level) - config.peak_decay_db_per_sec * delta_ms / 1000.0;
    if db <= config.min_db {
        0.0
    } else {
        db_to_linear(db)
    }
}

/// Whether a frame interval is usable. Rejects first frames, pauses and
/// non-finite or backwards time.
pub fn accepts_delta(delta_ms: f64) -> bool {
    (MIN_FRAME_DELTA_MS..=MAX_FRAME_DELTA_MS).contains(&delta_ms)
}

/// Immutable copy of both channels at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MeterSnapshot {
    pub left: ChannelBallisticsState,
    pub right: ChannelBallisticsState,
}

impl MeterSnapshot {
    pub fn channels(&self) -> [&ChannelBallisticsState; 2] {
        [&self.left, &self.right]
    }

    /// True when any tracked value moved by at least `epsilon` or a clip
    /// indicator changed.
    pub fn differs_from(&self, other: &MeterSnapshot, epsilon: f32) -> bool {
        self.channels()
            .into_iter()
            .zip(other.channels())
            .any(|(a, b)| {
                a.clip_latched != b.clip_latched
                    || a.has_rms != b.has_rms
                    || (a.smoothed_level - b.smoothed_level).abs() >= epsilon
                    || (a.peak_hold_level - b.peak_hold_level).abs() >= epsilon
                    || (a.rms_level - b.rms_level).abs() >= epsilon
                    || (a.instant_level - b.instant_level).abs() >= epsilon
            })
    }
}

/// Per-frame state transition for a stereo meter.
#[derive(Debug, Clone, Default)]
pub struct BallisticsProcessor {
    left: ChannelBallisticsState,
    right: ChannelBallisticsState,
}

impl BallisticsProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MeterSnapshot {
        MeterSnapshot {
            left: self.left,
            right: self.right,
        }
    }

    /// Advances both channels by one frame. Returns `false` and leaves the
    /// state untouched when the frame interval is rejected.
    pub fn process(
        &mut self,
        config: &BallisticsConfig,
        frame: FrameTime,
        sample: &LevelSample,
    ) -> bool {
        if !accepts_delta(frame.delta_ms) {
            tracing::debug!(
                frame = frame.index,
                delta_ms = frame.delta_ms,
                "skipping frame outside the accepted interval"
            );
            return false;
        }

        let sample = sample.sanitized();
        self.left.advance(
            config,
            frame,
            ChannelInput {
                peak: sample.peak_l,
                rms: sample.rms_l,
                clipped: sample.clipped,
            },
        );
        self.right.advance(
            config,
            frame,
            ChannelInput {
                peak: sample.peak_r,
                rms: sample.rms_r,
                clipped: sample.clipped,
            },
        );
        true
    }

    /// Clears both clip latches and peak holds.
    pub fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
    }
}
