//! Real-time level metering engine.
//!
//! Turns a stream of instantaneous peak (and optional RMS) amplitudes into a
//! smooth peak/PPM/VU meter display. Each module owns one stage of the frame
//! pipeline: the source adapter reads a target, the ballistics advance the
//! per-channel state, the repaint channel signals a redraw and the render
//! step turns a state snapshot into drawing primitives.

pub mod ballistics;
pub mod clock;
pub mod config;
pub mod error;
pub mod meter;
pub mod render;
pub mod repaint;
pub mod scale;
pub mod source;

pub use ballistics::{BallisticsProcessor, ChannelBallisticsState, MeterSnapshot};
pub use clock::{ClockState, FrameClock, FrameTime};
pub use config::{BallisticsConfig, Preset};
pub use error::{MeterError, Result};
pub use meter::{LevelMeter, MeterStats};
pub use render::{
    render, DrawList, Orientation, Point, Primitive, Rect, RedrawGate, Rgba, Size, Surface,
    VisualStyle,
};
pub use repaint::RepaintChannel;
pub use scale::{DbScale, Zone};
pub use source::{level_tap, LevelSample, LevelSource, LevelTap, SourceAdapter, TapReader};
