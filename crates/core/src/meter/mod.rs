use serde::{Deserialize, Serialize};

use crate::{
    ballistics::{BallisticsProcessor, MeterSnapshot},
    render::{render, DrawList, Point, RedrawGate, Surface},
    BallisticsConfig, FrameClock, FrameTime, LevelSample, Preset, RepaintChannel, Result,
    SourceAdapter,
};

/// Running counters for one meter instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterStats {
    pub frames: u64,
    /// Frames rejected by the delta guard.
    pub skipped: u64,
    pub painted: u64,
    pub suppressed: u64,
}

/// One stereo level meter: source, ballistics, clock and repaint signal.
///
/// The host keeps this value and drives it from its frame callback with
/// [`LevelMeter::on_frame`], then draws with [`LevelMeter::paint`] when the
/// repaint channel fires. Ballistic state is only reachable as a
/// [`MeterSnapshot`] copy.
#[derive(Debug)]
pub struct LevelMeter {
    config: BallisticsConfig,
    source: SourceAdapter,
    processor: BallisticsProcessor,
    clock: FrameClock,
    repaint: RepaintChannel,
    gate: RedrawGate,
    stats: MeterStats,
}

impl LevelMeter {
    /// Binds a validated configuration to a source. The config cannot be
    /// changed afterwards; build a new meter instead.
    pub fn new(config: BallisticsConfig, source: SourceAdapter) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            source,
            processor: BallisticsProcessor::new(),
            clock: FrameClock::new(),
            repaint: RepaintChannel::new(),
            gate: RedrawGate::new(),
            stats: MeterStats::default(),
        })
    }

    pub fn with_preset(preset: Preset, source: SourceAdapter) -> Result<Self> {
        Self::new(preset.config(), source)
    }

    pub fn config(&self) -> &BallisticsConfig {
        &self.config
    }

    pub fn stats(&self) -> MeterStats {
        self.stats
    }

    pub fn snapshot(&self) -> MeterSnapshot {
        self.processor.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.clock.is_running()
    }

    /// Activates the frame clock.
    pub fn start(&mut self) -> Result<()> {
        if !self.clock.is_running() {
            self.clock.start()?;
            tracing::info!(
                min_db = self.config.min_db,
                max_db = self.config.max_db,
                "level meter started"
            );
        }
        Ok(())
    }

    /// Frame callback with the host timestamp in milliseconds. Returns whether
    /// a repaint was signalled.
    pub fn on_frame(&mut self, now_ms: f64) -> bool {
        match self.clock.tick(now_ms) {
            Some(frame) => self.advance(frame),
            None => false,
        }
    }

    /// Frame callback for hosts that report elapsed time instead of timestamps.
    pub fn on_elapsed(&mut self, delta_ms: f64) -> bool {
        match self.clock.tick_elapsed(delta_ms) {
            Some(frame) => self.advance(frame),
            None => false,
        }
    }

    fn advance(&mut self, frame: FrameTime) -> bool {
        self.stats.frames += 1;
        let sample = self.source.read();
        if !self.processor.process(&self.config, frame, &sample) {
            self.stats.skipped += 1;
        }
        self.repaint.notify(frame.index)
    }

    /// Replaces the pushed snapshot used when no pull source is available.
    pub fn push(&mut self, sample: LevelSample) {
        if !self.repaint.is_closed() {
            self.source.push(sample);
        }
    }

    pub fn set_muted(&mut self, muted: bool) {
        if !self.repaint.is_closed() {
            self.source.set_muted(muted);
        }
    }

    pub fn is_muted(&self) -> bool {
        self.source.is_muted()
    }

    /// Clears clip indicators and peak holds on both channels.
    pub fn reset(&mut self) {
        if self.repaint.is_closed() {
            return;
        }
        self.processor.reset();
        self.gate.invalidate();
        tracing::debug!("peaks and clip indicators reset");
    }

    /// Pointer or tap handler: resets when `point` falls on the surface.
    pub fn on_tap(&mut self, point: Point, surface: &Surface) -> bool {
        if self.repaint.is_closed() || !surface.bounds().contains(point) {
            return false;
        }
        self.reset();
        true
    }

    /// Installs the single repaint subscriber.
    pub fn subscribe_repaint<F>(&mut self, subscriber: F)
    where
        F: FnMut(u64) + 'static,
    {
        self.repaint.subscribe(subscriber);
    }

    /// Consumes the pending repaint flag for polling hosts.
    pub fn take_repaint(&mut self) -> bool {
        self.repaint.take_pending()
    }

    /// Draws the current state unless it is indistinguishable from the last
    /// painted frame on the same surface.
    pub fn paint(&mut self, surface: &Surface) -> Option<DrawList> {
        if self.repaint.is_closed() {
            return None;
        }

        let snapshot = self.processor.snapshot();
        if self
            .gate
            .should_draw(&snapshot, surface, self.config.redraw_epsilon)
        {
            self.stats.painted += 1;
            Some(render(&snapshot, &self.config, surface))
        } else {
            self.stats.suppressed += 1;
            None
        }
    }

    /// Draws the current state unconditionally.
    pub fn render(&self, surface: &Surface) -> DrawList {
        render(&self.processor.snapshot(), &self.config, surface)
    }

    /// Tears the meter down. No state changes or notifications happen
    /// afterwards. Idempotent.
    pub fn stop(&mut self) {
        if self.repaint.is_closed() {
            return;
        }
        self.clock.stop();
        self.repaint.close();
        self.source.release();
        tracing::info!(
            frames = self.stats.frames,
            skipped = self.stats.skipped,
            "level meter stopped"
        );
    }
}

impl Drop for LevelMeter {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::{
        level_tap,
        render::{Orientation, Size, VisualStyle},
        MeterError,
    };

    fn surface() -> Surface {
        Surface::new(
            Size::new(60.0, 300.0),
            VisualStyle::Continuous,
            Orientation::Vertical,
        )
    }

    fn running(preset: Preset, source: SourceAdapter) -> LevelMeter {
        let mut meter = LevelMeter::with_preset(preset, source).unwrap();
        meter.start().unwrap();
        meter
    }

    #[test]
    fn rejects_invalid_config() {
        let config = Preset::Peak.config().with_range(0.0, -10.0);
        let err = LevelMeter::new(config, SourceAdapter::pushed()).unwrap_err();
        assert!(matches!(err, MeterError::InvalidRange { .. }));
    }

    #[test]
    fn drives_ballistics_from_pull_source() {
        let mut meter = running(
            Preset::Peak,
            SourceAdapter::from_fn(|| Ok(LevelSample::new(0.5, 0.25))),
        );

        assert!(meter.on_frame(0.0));
        assert!(meter.on_frame(16.0));

        let snapshot = meter.snapshot();
        assert!((snapshot.left.smoothed_level - 0.5).abs() < 1e-4);
        assert!((snapshot.right.smoothed_level - 0.25).abs() < 1e-4);
        assert_eq!(meter.stats().frames, 2);
        assert_eq!(meter.stats().skipped, 1);
    }

    #[test]
    fn idle_meter_ignores_frames() {
        let mut meter = LevelMeter::with_preset(Preset::Peak, SourceAdapter::pushed()).unwrap();
        assert!(!meter.on_frame(0.0));
        assert_eq!(meter.stats().frames, 0);
    }

    #[test]
    fn pull_errors_never_stop_the_clock() {
        let mut calls = 0;
        let mut meter = running(
            Preset::Peak,
            SourceAdapter::from_fn(move || {
                calls += 1;
                if calls % 2 == 0 {
                    Err(MeterError::pull_failed("glitch"))
                } else {
                    Ok(LevelSample::new(0.4, 0.4))
                }
            }),
        );

        for i in 0..20 {
            assert!(meter.on_frame(i as f64 * 16.0));
        }
        assert!(meter.is_running());
        assert!((meter.snapshot().left.smoothed_level - 0.4).abs() < 1e-4);
    }

    #[test]
    fn pushed_snapshot_and_mute() {
        let mut meter = running(Preset::Peak, SourceAdapter::pushed());
        meter.push(LevelSample::new(0.7, 0.7));
        meter.on_frame(0.0);
        meter.on_frame(10.0);
        assert!(meter.snapshot().left.smoothed_level > 0.69);

        meter.set_muted(true);
        for i in 2..600 {
            meter.on_frame(i as f64 * 10.0);
        }
        assert_eq!(meter.snapshot().left.smoothed_level, 0.0);
    }

    #[test]
    fn notifies_once_per_frame() {
        let count = Rc::new(RefCell::new(0));
        let mut meter = running(Preset::Ppm, SourceAdapter::pushed());
        let sink = count.clone();
        meter.subscribe_repaint(move |_| *sink.borrow_mut() += 1);

        for i in 0..10 {
            meter.on_frame(i as f64 * 16.0);
        }
        assert_eq!(*count.borrow(), 10);
        assert!(meter.take_repaint());
        assert!(!meter.take_repaint());
    }

    #[test]
    fn paint_suppresses_static_frames() {
        let mut meter = running(Preset::Peak, SourceAdapter::pushed());
        meter.push(LevelSample::new(0.5, 0.5));
        let surface = surface();

        meter.on_frame(0.0);
        meter.on_frame(16.0);
        assert!(meter.paint(&surface).is_some());

        meter.on_frame(32.0);
        assert!(meter.paint(&surface).is_none());
        assert_eq!(meter.stats().painted, 1);
        assert_eq!(meter.stats().suppressed, 1);
    }

    #[test]
    fn tap_resets_clip_and_peaks() {
        let mut meter = running(Preset::Peak, SourceAdapter::pushed());
        let surface = surface();
        meter.push(LevelSample::new(1.2, 0.3));
        meter.on_frame(0.0);
        meter.on_frame(10.0);
        meter.push(LevelSample::SILENT);
        for i in 2..1002 {
            meter.on_frame(i as f64 * 10.0);
        }
        assert!(meter.snapshot().left.clip_latched);

        assert!(!meter.on_tap(Point::new(-5.0, 10.0), &surface));
        assert!(meter.snapshot().left.clip_latched);

        assert!(meter.on_tap(Point::new(10.0, 10.0), &surface));
        let once = meter.snapshot();
        assert!(!once.left.clip_latched);
        assert_eq!(once.left.peak_hold_level, 0.0);

        meter.reset();
        assert_eq!(meter.snapshot(), once);
    }

    #[test]
    fn stop_freezes_state_and_is_idempotent() {
        let count = Rc::new(RefCell::new(0));
        let held = Rc::new(());
        let captured = held.clone();
        let mut meter = running(
            Preset::Peak,
            SourceAdapter::from_fn(move || {
                let _ = &captured;
                Ok(LevelSample::new(1.5, 1.5))
            }),
        );
        let sink = count.clone();
        meter.subscribe_repaint(move |_| *sink.borrow_mut() += 1);
        meter.on_frame(0.0);
        meter.on_frame(10.0);
        let frozen = meter.snapshot();
        let notified = *count.borrow();
        assert_eq!(Rc::strong_count(&held), 2);

        meter.stop();
        meter.stop();
        assert_eq!(Rc::strong_count(&held), 1);

        meter.push(LevelSample::SILENT);
        meter.set_muted(true);
        meter.reset();
        assert!(!meter.is_muted());
        assert!(!meter.on_frame(20.0));
        assert!(meter.paint(&surface()).is_none());
        assert_eq!(meter.snapshot(), frozen);
        assert_eq!(*count.borrow(), notified);
        assert!(matches!(meter.start(), Err(MeterError::ClockStopped)));
    }

    #[test]
    fn reset_forces_next_paint() {
        let mut meter = running(Preset::Peak, SourceAdapter::pushed());
        let surface = surface();
        meter.on_frame(0.0);
        meter.on_frame(16.0);
        assert!(meter.paint(&surface).is_some());
        assert!(meter.paint(&surface).is_none());

        meter.reset();
        assert!(meter.paint(&surface).is_some());
    }

    #[test]
    fn tap_source_holds_level_between_audio_blocks() {
        let (tap, reader) = level_tap();
        let mut meter = running(Preset::Vu, SourceAdapter::pulling(reader));

        // 120 Hz display against audio blocks landing every third frame.
        for frame in 0..600u32 {
            if frame % 3 == 0 {
                tap.publish(LevelSample::new(0.5, 0.5));
            }
            meter.on_frame(frame as f64 * 8.33);

            if frame > 0 {
                let snapshot = meter.snapshot();
                assert_eq!(snapshot.left.instant_level, 0.5, "frame {frame}");
                assert_eq!(snapshot.right.peak_hold_level, 0.5, "frame {frame}");
            }
        }

        let snapshot = meter.snapshot();
        assert!((snapshot.left.smoothed_level - 0.5).abs() < 1e-3);
        assert!((snapshot.right.smoothed_level - 0.5).abs() < 1e-3);
        assert_eq!(meter.stats().skipped, 1);
    }
}
