use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc,
    },
};

use serde::{Deserialize, Serialize};

use crate::{MeterError, Result};

/// Instantaneous stereo reading produced by the audio engine.
///
/// Levels are linear amplitudes where 1.0 is full scale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelSample {
    pub peak_l: f32,
    pub peak_r: f32,
    #[serde(default)]
    pub rms_l: Option<f32>,
    #[serde(default)]
    pub rms_r: Option<f32>,
    #[serde(default)]
    pub clipped: bool,
}

impl LevelSample {
    pub const SILENT: LevelSample = LevelSample {
        peak_l: 0.0,
        peak_r: 0.0,
        rms_l: None,
        rms_r: None,
        clipped: false,
    };

    pub fn new(peak_l: f32, peak_r: f32) -> Self {
        Self {
            peak_l,
            peak_r,
            ..Self::SILENT
        }
    }

    pub fn with_rms(self, rms_l: f32, rms_r: f32) -> Self {
        Self {
            rms_l: Some(rms_l),
            rms_r: Some(rms_r),
            ..self
        }
    }

    pub fn with_clip(self, clipped: bool) -> Self {
        Self { clipped, ..self }
    }

    /// Coerces every level to a finite, non-negative amplitude.
    pub fn sanitized(self) -> Self {
        Self {
            peak_l: sanitize_level(self.peak_l),
            peak_r: sanitize_level(self.peak_r),
            rms_l: self.rms_l.map(sanitize_level),
            rms_r: self.rms_r.map(sanitize_level),
            clipped: self.clipped,
        }
    }
}

impl From<(f32, f32)> for LevelSample {
    fn from((peak_l, peak_r): (f32, f32)) -> Self {
        Self::new(peak_l, peak_r)
    }
}

/// NaN, infinite and negative inputs become silence.
pub fn sanitize_level(value: f32) -> f32 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Non-blocking pull contract invoked once per display frame.
///
/// Implementations run on the render thread at display cadence, so they must
/// not block or allocate.
pub trait LevelSource {
    fn pull(&mut self) -> Result<LevelSample>;
}

impl<F> LevelSource for F
where
    F: FnMut() -> Result<LevelSample>,
{
    fn pull(&mut self) -> Result<LevelSample> {
        self()
    }
}

/// Normalises pulled and pushed readings into one per-frame target.
pub struct SourceAdapter {
    pull: Option<Box<dyn LevelSource>>,
    last: LevelSample,
    muted: bool,
    failing: bool,
}

impl SourceAdapter {
    /// Adapter fed only through [`SourceAdapter::push`].
    pub fn pushed() -> Self {
        Self {
            pull: None,
            last: LevelSample::SILENT,
            muted: false,
            failing: false,
        }
    }

    /// Adapter that pulls the freshest reading on every frame.
    pub fn pulling<S>(source: S) -> Self
    where
        S: LevelSource + 'static,
    {
        Self {
            pull: Some(Box::new(source)),
            ..Self::pushed()
        }
    }

    /// Adapter pulling from a closure.
    pub fn from_fn<F>(pull: F) -> Self
    where
        F: FnMut() -> Result<LevelSample> + 'static,
    {
        Self::pulling(pull)
    }

    /// Replaces the fallback snapshot.
    pub fn push(&mut self, sample: LevelSample) {
        self.last = sample.sanitized();
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn has_pull(&self) -> bool {
        self.pull.is_some()
    }

    /// Drops the pull source. Later reads return the last snapshot.
    pub fn release(&mut self) {
        self.pull = None;
        self.failing = false;
    }

    /// Last known good reading, either pushed or pulled.
    pub fn last_sample(&self) -> LevelSample {
        self.last
    }

    /// Produces this frame's target. Pull failures fall back to the last
    /// known snapshot for this frame only and are never returned.
    pub fn read(&mut self) -> LevelSample {
        if let Some(source) = self.pull.as_mut() {
            match source.pull() {
                Ok(sample) => {
                    if self.failing {
                        tracing::debug!("level source recovered");
                        self.failing = false;
                    }
                    self.last = sample.sanitized();
                }
                Err(err) => {
                    if self.failing {
                        tracing::trace!(%err, "level source still failing");
                    } else {
                        tracing::warn!(%err, "level source failed, using last snapshot");
                        self.failing = true;
                    }
                }
            }
        }

        if self.muted {
            LevelSample::SILENT
        } else {
            self.last
        }
    }
}

impl fmt::Debug for SourceAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceAdapter")
            .field("pull", &self.pull.is_some())
            .field("last", &self.last)
            .field("muted", &self.muted)
            .field("failing", &self.failing)
            .finish()
    }
}

const NO_RMS: u32 = u32::MAX;
/// Pending-peak cell value meaning "no block published since the last read".
const NO_BLOCK: u32 = 0;

#[derive(Debug)]
struct TapCells {
    /// Highest peak since the last read, stored as `bits + 1` so that
    /// [`NO_BLOCK`] stays distinct from a published silence.
    peak_l: AtomicU32,
    peak_r: AtomicU32,
    rms_l: AtomicU32,
    rms_r: AtomicU32,
    clipped: AtomicBool,
    closed: AtomicBool,
}

/// Creates a lock-free bridge between the audio thread and the render thread.
///
/// The writer keeps the highest peak seen since the last frame and a sticky
/// clip flag, so short transients between two frames are not lost. A frame
/// that lands between two audio blocks reads the previous level again.
pub fn level_tap() -> (LevelTap, TapReader) {
    let cells = Arc::new(TapCells {
        peak_l: AtomicU32::new(NO_BLOCK),
        peak_r: AtomicU32::new(NO_BLOCK),
        rms_l: AtomicU32::new(NO_RMS),
        rms_r: AtomicU32::new(NO_RMS),
        clipped: AtomicBool::new(false),
        closed: AtomicBool::new(false),
    });

    (
        LevelTap {
            cells: cells.clone(),
        },
        TapReader {
            cells,
            last_l: 0.0,
            last_r: 0.0,
        },
    )
}

/// Audio-thread half of [`level_tap`].
#[derive(Debug)]
pub struct LevelTap {
    cells: Arc<TapCells>,
}

impl LevelTap {
    pub fn publish(&self, sample: LevelSample) {
        let sample = sample.sanitized();
        // Non-negative finite floats order the same as their bit patterns,
        // and stay below u32::MAX after the offset.
        self.cells
            .peak_l
            .fetch_max(sample.peak_l.to_bits() + 1, Ordering::Relaxed);
        self.cells
            .peak_r
            .fetch_max(sample.peak_r.to_bits() + 1, Ordering::Relaxed);
        self.cells
            .rms_l
            .store(sample.rms_l.map_or(NO_RMS, f32::to_bits), Ordering::Relaxed);
        self.cells
            .rms_r
            .store(sample.rms_r.map_or(NO_RMS, f32::to_bits), Ordering::Relaxed);
        if sample.clipped {
            self.cells.clipped.store(true, Ordering::Relaxed);
        }
    }
}

impl Drop for LevelTap {
    fn drop(&mut self) {
        self.cells.closed.store(true, Ordering::Release);
    }
}

/// Render-thread half of [`level_tap`].
#[derive(Debug)]
pub struct TapReader {
    cells: Arc<TapCells>,
    last_l: f32,
    last_r: f32,
}

fn take_peak(cell: &AtomicU32, last: &mut f32) -> f32 {
    match cell.swap(NO_BLOCK, Ordering::Relaxed) {
        NO_BLOCK => *last,
        bits => {
            *last = f32::from_bits(bits - 1);
            *last
        }
    }
}

impl LevelSource for TapReader {
    fn pull(&mut self) -> Result<LevelSample> {
        if self.cells.closed.load(Ordering::Acquire) {
            return Err(MeterError::pull_failed("level tap writer was dropped"));
        }

        let rms = |cell: &AtomicU32| match cell.load(Ordering::Relaxed) {
            NO_RMS => None,
            bits => Some(f32::from_bits(bits)),
        };

        Ok(LevelSample {
            peak_l: take_peak(&self.cells.peak_l, &mut self.last_l),
            peak_r: take_peak(&self.cells.peak_r, &mut self.last_r),
            rms_l: rms(&self.cells.rms_l),
            rms_r: rms(&self.cells.rms_r),
            clipped: self.cells.clipped.swap(false, Ordering::Relaxed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_non_finite_and_negative_levels() {
        let sample = LevelSample::new(f32::NAN, -0.5).with_rms(f32::INFINITY, 0.25);
        let clean = sample.sanitized();
        assert_eq!(clean.peak_l, 0.0);
        assert_eq!(clean.peak_r, 0.0);
        assert_eq!(clean.rms_l, Some(0.0));
        assert_eq!(clean.rms_r, Some(0.25));
    }

    #[test]
    fn pushed_snapshot_is_returned_until_replaced() {
        let mut adapter = SourceAdapter::pushed();
        assert_eq!(adapter.read(), LevelSample::SILENT);

        adapter.push(LevelSample::new(0.5, 0.25));
        assert_eq!(adapter.read(), LevelSample::new(0.5, 0.25));
        assert_eq!(adapter.read(), LevelSample::new(0.5, 0.25));
    }

    #[test]
    fn mute_forces_silence() {
        let mut adapter = SourceAdapter::from_fn(|| Ok(LevelSample::new(0.8, 0.8).with_clip(true)));
        adapter.set_muted(true);
        assert_eq!(adapter.read(), LevelSample::SILENT);

        adapter.set_muted(false);
        assert_eq!(adapter.read().peak_l, 0.8);
    }

    #[test]
    fn pull_failure_falls_back_for_one_frame() {
        let mut calls = 0;
        let mut adapter = SourceAdapter::from_fn(move || {
            calls += 1;
            match calls {
                1 => Ok(LevelSample::new(0.3, 0.4)),
                2 => Err(MeterError::pull_failed("device busy")),
                _ => Ok(LevelSample::new(0.6, 0.7)),
            }
        });

        assert_eq!(adapter.read(), LevelSample::new(0.3, 0.4));
        assert_eq!(adapter.read(), LevelSample::new(0.3, 0.4));
        assert_eq!(adapter.read(), LevelSample::new(0.6, 0.7));
    }

    #[test]
    fn pull_failure_uses_pushed_snapshot_when_nothing_was_pulled() {
        let mut adapter = SourceAdapter::from_fn(|| Err(MeterError::pull_failed("offline")));
        adapter.push(LevelSample::new(0.2, 0.1));
        assert_eq!(adapter.read(), LevelSample::new(0.2, 0.1));
    }

    #[test]
    fn release_drops_pull_source() {
        let mut calls = 0;
        let mut adapter = SourceAdapter::from_fn(move || {
            calls += 1;
            Ok(LevelSample::new(0.1 * calls as f32, 0.0))
        });
        adapter.read();
        adapter.release();

        assert!(!adapter.has_pull());
        let kept = adapter.read();
        assert!((kept.peak_l - 0.1).abs() < 1e-6);
    }

    #[test]
    fn tap_keeps_highest_peak_between_reads() {
        let (tap, mut reader) = level_tap();
        tap.publish(LevelSample::new(0.2, 0.9));
        tap.publish(LevelSample::new(0.7, 0.1).with_rms(0.3, 0.05).with_clip(true));
        tap.publish(LevelSample::new(0.1, 0.1).with_rms(0.2, 0.04));

        let sample = reader.pull().unwrap();
        assert_eq!(sample.peak_l, 0.7);
        assert_eq!(sample.peak_r, 0.9);
        assert_eq!(sample.rms_l, Some(0.2));
        assert!(sample.clipped);

        tap.publish(LevelSample::new(0.3, 0.0));
        let next = reader.pull().unwrap();
        assert_eq!(next.peak_l, 0.3);
        assert_eq!(next.peak_r, 0.0);
        assert!(!next.clipped);
    }

    #[test]
    fn tap_repeats_steady_level_without_new_block() {
        let (tap, mut reader) = level_tap();
        assert_eq!(reader.pull().unwrap().peak_l, 0.0);

        tap.publish(LevelSample::new(0.5, 0.25).with_rms(0.35, 0.2));
        for _ in 0..3 {
            let sample = reader.pull().unwrap();
            assert_eq!(sample.peak_l, 0.5);
            assert_eq!(sample.peak_r, 0.25);
            assert_eq!(sample.rms_r, Some(0.2));
            assert!(!sample.clipped);
        }

        // Published silence replaces the held level.
        tap.publish(LevelSample::SILENT);
        assert_eq!(reader.pull().unwrap().peak_l, 0.0);
        assert_eq!(reader.pull().unwrap().peak_l, 0.0);
    }

    #[test]
    fn tap_reports_dropped_writer() {
        let (tap, mut reader) = level_tap();
        drop(tap);
        assert!(matches!(reader.pull(), Err(MeterError::Source(_))));
    }
}
