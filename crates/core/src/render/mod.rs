//! Stateless drawing of a stereo meter into backend-neutral primitives.
//!
//! Geometry is computed in meter space (a position along the fill axis from
//! 0 to 1) and mapped onto the surface by a `Track`, so every rule works for
//! both orientations.

use serde::{Deserialize, Serialize};

use crate::{
    ballistics::{ChannelBallisticsState, MeterSnapshot},
    scale::{linear_to_db, DbScale, Zone},
    BallisticsConfig,
};

const CHANNEL_GAP: f32 = 2.0;
const CLIP_STRIP: f32 = 4.0;
const CLIP_GAP: f32 = 1.0;
const SCALE_BAND: f32 = 22.0;
const SCALE_TICK: f32 = 4.0;
const SEGMENT_GAP: f32 = 1.0;
const PEAK_MARKER_WIDTH: f32 = 2.0;
const THIN_MARKER_WIDTH: f32 = 1.0;

pub const BACKGROUND: Rgba = Rgba::rgb(0x14, 0x14, 0x18);
pub const UNLIT_SEGMENT: Rgba = Rgba::rgb(0x24, 0x26, 0x2a);
pub const CLIP_INDICATOR: Rgba = Rgba::rgb(0xff, 0x20, 0x20);
pub const OVER_MARKER: Rgba = Rgba::rgb(0xff, 0x00, 0x00);
pub const RMS_MARKER: Rgba = Rgba::rgb(0xe8, 0xe8, 0xe8);
pub const SCALE_INK: Rgba = Rgba::rgb(0x9a, 0x9a, 0xa0);

/// Base and bright colour of each zone, interpolated across the zone's span.
const GREEN: (Rgba, Rgba) = (Rgba::rgb(0x1b, 0x8a, 0x2f), Rgba::rgb(0x4c, 0xe0, 0x5a));
const YELLOW: (Rgba, Rgba) = (Rgba::rgb(0xc9, 0xa2, 0x27), Rgba::rgb(0xf5, 0xd7, 0x3b));
const RED: (Rgba, Rgba) = (Rgba::rgb(0xc0, 0x2a, 0x1f), Rgba::rgb(0xff, 0x4a, 0x3a));

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualStyle {
    #[default]
    Continuous,
    Segmented,
    Vu,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Fills bottom-up.
    #[default]
    Vertical,
    /// Fills left to right.
    Horizontal,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xff }
    }

    pub fn lerp(self, other: Rgba, t: f32) -> Rgba {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Rgba {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
            a: mix(self.a, other.a),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_size(size: Size) -> Self {
        Self::new(0.0, 0.0, size.width, size.height)
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x <= self.right() && point.y >= self.y && point.y <= self.bottom()
    }
}

/// Drawing target parameters chosen by the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Surface {
    pub size: Size,
    pub style: VisualStyle,
    pub orientation: Orientation,
}

impl Surface {
    pub fn new(size: Size, style: VisualStyle, orientation: Orientation) -> Self {
        Self {
            size,
            style,
            orientation,
        }
    }

    pub fn bounds(&self) -> Rect {
        Rect::from_size(self.size)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Primitive {
    Fill {
        rect: Rect,
        color: Rgba,
    },
    /// Linear gradient running from `start` at the low end of the fill axis
    /// to `end` at the high end.
    Gradient {
        rect: Rect,
        start: Rgba,
        end: Rgba,
        orientation: Orientation,
    },
    Line {
        from: Point,
        to: Point,
        width: f32,
        color: Rgba,
    },
    Label {
        at: Point,
        text: String,
        color: Rgba,
    },
}

/// Ordered primitives for one redraw, back to front.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrawList {
    pub primitives: Vec<Primitive>,
}

impl DrawList {
    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Primitive> {
        self.primitives.iter()
    }

    fn push(&mut self, primitive: Primitive) {
        self.primitives.push(primitive);
    }
}

/// A lane of the surface with a fill axis.
#[derive(Debug, Clone, Copy)]
struct Track {
    rect: Rect,
    orientation: Orientation,
}

impl Track {
    fn length(&self) -> f32 {
        match self.orientation {
            Orientation::Vertical => self.rect.height,
            Orientation::Horizontal => self.rect.width,
        }
    }

    /// Rectangle covering positions `from..to` along the fill axis.
    fn span(&self, from: f32, to: f32) -> Rect {
        let length = self.length();
        let (from, to) = (from.clamp(0.0, 1.0), to.clamp(0.0, 1.0));
        match self.orientation {
            Orientation::Vertical => Rect::new(
                self.rect.x,
                self.rect.bottom() - to * length,
                self.rect.width,
                (to - from) * length,
            ),
            Orientation::Horizontal => Rect::new(
                self.rect.x + from * length,
                self.rect.y,
                (to - from) * length,
                self.rect.height,
            ),
        }
    }

    /// Coordinate of `position` on the fill axis.
    fn offset(&self, position: f32) -> f32 {
        let position = position.clamp(0.0, 1.0);
        match self.orientation {
            Orientation::Vertical => self.rect.bottom() - position * self.length(),
            Orientation::Horizontal => self.rect.x + position * self.length(),
        }
    }

    /// Line across the lane at `position`.
    fn cross_line(&self, position: f32) -> (Point, Point) {
        let at = self.offset(position);
        match self.orientation {
            Orientation::Vertical => (
                Point::new(self.rect.x, at),
                Point::new(self.rect.right(), at),
            ),
            Orientation::Horizontal => (
                Point::new(at, self.rect.y),
                Point::new(at, self.rect.bottom()),
            ),
        }
    }
}

/// Surface split into per-channel lanes, clip strips and an optional scale band.
#[derive(Debug, Clone, Copy)]
struct Layout {
    tracks: [Track; 2],
    clip_strips: [Rect; 2],
    scale: Option<Track>,
}

impl Layout {
    fn new(bounds: Rect, orientation: Orientation, show_scale: bool) -> Option<Self> {
        let (along, across) = match orientation {
            Orientation::Vertical => (bounds.height, bounds.width),
            Orientation::Horizontal => (bounds.width, bounds.height),
        };

        let scale_band = if show_scale && across > SCALE_BAND * 2.0 {
            SCALE_BAND
        } else {
            0.0
        };
        let lane_across = (across - scale_band - CHANNEL_GAP) / 2.0;
        let track_along = along - CLIP_STRIP - CLIP_GAP;
        if !(lane_across > 0.0 && track_along > 0.0) {
            return None;
        }

        // Meter space: `a` runs along the fill axis from the low end, `c` across it.
        let place = |a: f32, c: f32, a_len: f32, c_len: f32| match orientation {
            Orientation::Vertical => Rect::new(bounds.x + c, bounds.bottom() - a - a_len, c_len, a_len),
            Orientation::Horizontal => Rect::new(bounds.x + a, bounds.y + c, a_len, c_len),
        };

        let lane_offsets = [0.0, lane_across + CHANNEL_GAP];
        let tracks = lane_offsets.map(|c| Track {
            rect: place(0.0, c, track_along, lane_across),
            orientation,
        });
        let clip_strips =
            lane_offsets.map(|c| place(track_along + CLIP_GAP, c, CLIP_STRIP, lane_across));
        let scale = (scale_band > 0.0).then(|| Track {
            rect: place(0.0, across - scale_band, track_along, scale_band),
            orientation,
        });

        Some(Self {
            tracks,
            clip_strips,
            scale,
        })
    }
}

/// Colour of a normalised position, interpolated within its zone.
pub fn zone_color(scale: &DbScale, position: f32) -> Rgba {
    let zone = scale.zone_at(position);
    let (base, bright) = match zone {
        Zone::Green => GREEN,
        Zone::Yellow => YELLOW,
        Zone::Red => RED,
    };
    let (start, end) = scale.zone_span(zone);
    let t = if end > start {
        (position - start) / (end - start)
    } else {
        0.0
    };
    base.lerp(bright, t)
}

fn peak_marker_color(scale: &DbScale, level: f32) -> Rgba {
    if linear_to_db(level) >= 0.0 {
        OVER_MARKER
    } else {
        zone_color(scale, scale.normalize(level))
    }
}

/// Draws both channels of `snapshot`. Holds no state between calls.
pub fn render(snapshot: &MeterSnapshot, config: &BallisticsConfig, surface: &Surface) -> DrawList {
    let mut list = DrawList::default();
    let bounds = surface.bounds();
    if bounds.is_empty() || !bounds.width.is_finite() || !bounds.height.is_finite() {
        return list;
    }

    list.push(Primitive::Fill {
        rect: bounds,
        color: BACKGROUND,
    });

    let Some(layout) = Layout::new(bounds, surface.orientation, config.show_scale) else {
        return list;
    };
    let scale = DbScale::from_config(config);

    for ((state, track), clip_strip) in snapshot
        .channels()
        .into_iter()
        .zip(layout.tracks)
        .zip(layout.clip_strips)
    {
        match surface.style {
            VisualStyle::Continuous => draw_continuous(&mut list, state, config, &scale, &track),
            VisualStyle::Segmented => draw_segmented(&mut list, state, config, &scale, &track),
            VisualStyle::Vu => draw_vu(&mut list, state, config, &scale, &track),
        }

        if state.clip_latched {
            list.push(Primitive::Fill {
                rect: clip_strip,
                color: CLIP_INDICATOR,
            });
        }
    }

    if let Some(scale_track) = layout.scale {
        draw_scale(&mut list, config, &scale, &scale_track);
    }

    list
}

/// Gradient bar from the bottom of the scale up to `level`, one stop per zone.
fn fill_bar(list: &mut DrawList, scale: &DbScale, track: &Track, level: f32) {
    for zone in [Zone::Green, Zone::Yellow, Zone::Red] {
        let (start, end) = scale.zone_span(zone);
        let top = end.min(level);
        if top <= start {
            continue;
        }
        list.push(Primitive::Gradient {
            rect: track.span(start, top),
            start: zone_color(scale, start),
            end: zone_color(scale, top),
            orientation: track.orientation,
        });
    }
}

fn marker(list: &mut DrawList, track: &Track, position: f32, width: f32, color: Rgba) {
    let (from, to) = track.cross_line(position);
    list.push(Primitive::Line {
        from,
        to,
        width,
        color,
    });
}

fn draw_hold_and_rms(
    list: &mut DrawList,
    state: &ChannelBallisticsState,
    config: &BallisticsConfig,
    scale: &DbScale,
    track: &Track,
) {
    if config.show_rms && state.has_rms {
        let position = scale.normalize(state.rms_level);
        if position > 0.0 {
            marker(list, track, position, THIN_MARKER_WIDTH, RMS_MARKER);
        }
    }

    // Holds at or below the scale floor would sit on the track's edge.
    let position = scale.normalize(state.peak_hold_level);
    if position > 0.0 {
        marker(
            list,
            track,
            position,
            PEAK_MARKER_WIDTH,
            peak_marker_color(scale, state.peak_hold_level),
        );
    }
}

fn draw_continuous(
    list: &mut DrawList,
    state: &ChannelBallisticsState,
    config: &BallisticsConfig,
    scale: &DbScale,
    track: &Track,
) {
    fill_bar(list, scale, track, scale.normalize(state.smoothed_level));
    draw_hold_and_rms(list, state, config, scale, track);
}

fn draw_segmented(
    list: &mut DrawList,
    state: &ChannelBallisticsState,
    config: &BallisticsConfig,
    scale: &DbScale,
    track: &Track,
) {
    let segments = config.segments.max(1);
    let level = scale.normalize(state.smoothed_level);
    let lit = lit_segments(level, segments);
    let cell = 1.0 / segments as f32;
    // Gap expressed on the fill axis, dropped when cells get too small.
    let gap = if track.length() * cell > SEGMENT_GAP * 2.0 {
        SEGMENT_GAP / track.length() / 2.0
    } else {
        0.0
    };

    for i in 0..segments {
        let start = i as f32 * cell;
        let color = if i < lit {
            zone_color(scale, start + cell / 2.0)
        } else {
            UNLIT_SEGMENT
        };
        list.push(Primitive::Fill {
            rect: track.span(start + gap, start + cell - gap),
            color,
        });
    }

    draw_hold_and_rms(list, state, config, scale, track);
}

/// Cells `0..n` are lit for `n = ceil(level × segments)`.
pub fn lit_segments(level: f32, segments: u32) -> u32 {
    ((level.clamp(0.0, 1.0) * segments as f32).ceil() as u32).min(segments)
}

fn draw_vu(
    list: &mut DrawList,
    state: &ChannelBallisticsState,
    config: &BallisticsConfig,
    scale: &DbScale,
    track: &Track,
) {
    let sustained = if config.show_rms && state.has_rms {
        state.rms_level
    } else {
        state.smoothed_level
    };
    fill_bar(list, scale, track, scale.normalize(sustained));

    let position = scale.normalize(state.instant_level);
    if position > 0.0 {
        marker(
            list,
            track,
            position,
            THIN_MARKER_WIDTH,
            zone_color(scale, position),
        );
    }
}

fn draw_scale(list: &mut DrawList, config: &BallisticsConfig, scale: &DbScale, track: &Track) {
    for &mark in &config.scale_marks {
        if mark < scale.min_db() || mark > scale.max_db() {
            continue;
        }

        let at = track.offset(scale.normalize_db(mark));
        let (from, to, label_at) = match track.orientation {
            Orientation::Vertical => (
                Point::new(track.rect.x, at),
                Point::new(track.rect.x + SCALE_TICK, at),
                Point::new(track.rect.x + SCALE_TICK + 2.0, at),
            ),
            Orientation::Horizontal => (
                Point::new(at, track.rect.y),
                Point::new(at, track.rect.y + SCALE_TICK),
                Point::new(at, track.rect.y + SCALE_TICK + 2.0),
            ),
        };

        list.push(Primitive::Line {
            from,
            to,
            width: THIN_MARKER_WIDTH,
            color: SCALE_INK,
        });
        list.push(Primitive::Label {
            at: label_at,
            text: scale_label(mark),
            color: SCALE_INK,
        });
    }
}

fn scale_label(mark: f32) -> String {
    if mark > 0.0 {
        format!("+{mark}")
    } else {
        format!("{mark}")
    }
}

/// Skips redraws while the meter is effectively static.
#[derive(Debug, Clone, Default)]
pub struct RedrawGate {
    last: Option<(MeterSnapshot, Surface)>,
}

impl RedrawGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` and records the snapshot when it differs from the last
    /// drawn one by at least `epsilon`, or when the surface changed.
    pub fn should_draw(&mut self, snapshot: &MeterSnapshot, surface: &Surface, epsilon: f32) -> bool {
        if let Some((drawn, drawn_surface)) = &self.last {
            if drawn_surface == surface && !snapshot.differs_from(drawn, epsilon) {
                return false;
            }
        }
        self.last = Some((*snapshot, *surface));
        true
    }

    /// Forces the next call to draw.
    pub fn invalidate(&mut self) {
        self.last = None;
    }
}
