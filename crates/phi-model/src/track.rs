//! Segment-based animation tracks.
//!
//! A track is built once by a parser and then sampled many times per frame.
//! Sampling is almost monotonic in time, so each track keeps the index of the
//! last segment it hit and seeks linearly from there.

use std::cell::Cell;

use serde::{Deserialize, Serialize};

use crate::easing::Easing;

/// Smallest denominator used for segment progress.
const EPSILON: f64 = 1e-9;

trait Timed {
    fn t0(&self) -> f64;
    fn t1(&self) -> f64;
}

/// Move `cursor` to the segment governing `t` and return its index.
///
/// Forward first, then backward: a time inside a gap lands on the segment
/// before the gap, whose end value is then held.
fn seek<S: Timed>(segments: &[S], cursor: &Cell<usize>, t: f64) -> usize {
    let last = segments.len() - 1;
    let mut i = cursor.get().min(last);
    while i < last && t >= segments[i].t1() {
        i += 1;
    }
    while i > 0 && t < segments[i].t0() {
        i -= 1;
    }
    cursor.set(i);
    i
}

/// Same result as [`seek`], by binary search and without touching any cursor.
fn locate<S: Timed>(segments: &[S], t: f64) -> usize {
    segments
        .partition_point(|s| s.t0() <= t)
        .saturating_sub(1)
}

fn sort_by_start<S: Timed>(segments: &mut [S]) {
    segments.sort_by(|a, b| a.t0().total_cmp(&b.t0()));
}

fn lerp(a: f64, b: f64, p: f64) -> f64 {
    a + (b - a) * p
}

/// Raw progress of `t` through `[t0, t1]`, remapped through the clip window.
fn clipped_progress(t: f64, t0: f64, t1: f64, left: f64, right: f64) -> f64 {
    let raw = (t - t0) / (t1 - t0).max(EPSILON);
    if raw <= left {
        0.0
    } else if raw >= right {
        1.0
    } else {
        (raw - left) / (right - left).max(EPSILON)
    }
}

// --- Eased scalar track ---

/// One eased interpolation from `v0` at `t0` to `v1` at `t1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub t0: f64,
    pub t1: f64,
    pub v0: f64,
    pub v1: f64,
    pub easing: Easing,
    /// Progress at which the easing starts.
    pub clip_left: f64,
    /// Progress at which the easing ends.
    pub clip_right: f64,
}

impl Segment {
    pub fn new(t0: f64, t1: f64, v0: f64, v1: f64, easing: Easing) -> Self {
        Self {
            t0,
            t1,
            v0,
            v1,
            easing,
            clip_left: 0.0,
            clip_right: 1.0,
        }
    }

    pub fn constant(t0: f64, t1: f64, v: f64) -> Self {
        Self::new(t0, t1, v, v, Easing::Linear)
    }

    /// Restrict the eased part of the segment to `[left, right]` of its span.
    pub fn with_clip(mut self, left: f64, right: f64) -> Self {
        let l = left.clamp(0.0, 1.0);
        let r = right.clamp(0.0, 1.0);
        self.clip_left = l.min(r);
        self.clip_right = l.max(r);
        self
    }

    fn value_at(&self, t: f64) -> f64 {
        if t <= self.t0 {
            return self.v0;
        }
        if t >= self.t1 {
            return self.v1;
        }
        let p = clipped_progress(t, self.t0, self.t1, self.clip_left, self.clip_right);
        lerp(self.v0, self.v1, self.easing.apply(p))
    }
}

impl Timed for Segment {
    fn t0(&self) -> f64 {
        self.t0
    }
    fn t1(&self) -> f64 {
        self.t1
    }
}

/// Eased piecewise track for one line property.
#[derive(Debug, Clone, Default)]
pub struct Track {
    segments: Vec<Segment>,
    default: f64,
    cursor: Cell<usize>,
}

impl Track {
    pub fn new(mut segments: Vec<Segment>, default: f64) -> Self {
        sort_by_start(&mut segments);
        Self {
            segments,
            default,
            cursor: Cell::new(0),
        }
    }

    /// Build a track and hold its first value from t=0 up to the first segment.
    pub fn from_zero(segments: Vec<Segment>, default: f64) -> Self {
        let mut track = Self::new(segments, default);
        let lead = match track.segments.first() {
            Some(first) if first.t0 > 0.0 => Segment::constant(0.0, first.t0, first.v0),
            _ => return track,
        };
        track.segments.insert(0, lead);
        track
    }

    pub fn constant(value: f64) -> Self {
        Self::new(Vec::new(), value)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn default_value(&self) -> f64 {
        self.default
    }

    /// End time of the last segment, if any.
    pub fn end_time(&self) -> Option<f64> {
        self.segments.last().map(|s| s.t1)
    }

    /// Sample the track at `t`.
    pub fn eval(&self, t: f64) -> f64 {
        if self.segments.is_empty() {
            return self.default;
        }
        let i = seek(&self.segments, &self.cursor, t);
        self.segments[i].value_at(t)
    }

    /// Sample without the seek cursor. Same result as [`Track::eval`].
    pub fn eval_uncached(&self, t: f64) -> f64 {
        if self.segments.is_empty() {
            return self.default;
        }
        self.segments[locate(&self.segments, t)].value_at(t)
    }

    /// Map every segment value through `f`. Used by parsers to move authored
    /// units into viewport pixels.
    pub fn map_values(mut self, f: impl Fn(f64) -> f64) -> Self {
        for s in &mut self.segments {
            s.v0 = f(s.v0);
            s.v1 = f(s.v1);
        }
        self.default = f(self.default);
        self
    }
}

// --- Layer sum ---

/// Sum of parallel layer tracks plus a constant offset.
#[derive(Debug, Clone, Default)]
pub struct LayeredTrack {
    layers: Vec<Track>,
    offset: f64,
    default: f64,
}

impl LayeredTrack {
    pub fn new(layers: Vec<Track>, offset: f64, default: f64) -> Self {
        Self {
            layers,
            offset,
            default,
        }
    }

    pub fn single(track: Track) -> Self {
        let default = track.default_value();
        Self::new(vec![track], 0.0, default)
    }

    pub fn constant(value: f64) -> Self {
        Self::new(Vec::new(), 0.0, value)
    }

    pub fn layers(&self) -> &[Track] {
        &self.layers
    }

    pub fn eval(&self, t: f64) -> f64 {
        if self.layers.is_empty() {
            return self.default;
        }
        self.offset + self.layers.iter().map(|l| l.eval(t)).sum::<f64>()
    }
}

// --- Velocity integral ---

/// A linear velocity ramp and the area of everything before it.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegralSegment {
    pub t0: f64,
    pub t1: f64,
    pub v0: f64,
    pub v1: f64,
    pub prefix: f64,
}

impl IntegralSegment {
    fn area_until(&self, t: f64) -> f64 {
        let span = (self.t1 - self.t0).max(0.0);
        let full = span.max(EPSILON);
        let dt = (t - self.t0).clamp(0.0, span);
        let vt = lerp(self.v0, self.v1, dt / full);
        0.5 * (self.v0 + vt) * dt
    }

    fn value_at(&self, t: f64) -> f64 {
        if t <= self.t0 {
            self.prefix
        } else {
            self.prefix + self.area_until(t.min(self.t1))
        }
    }
}

impl Timed for IntegralSegment {
    fn t0(&self) -> f64 {
        self.t0
    }
    fn t1(&self) -> f64 {
        self.t1
    }
}

/// Position-from-velocity track: `integral(t)` is the scroll distance.
#[derive(Debug, Clone, Default)]
pub struct IntegralTrack {
    segments: Vec<IntegralSegment>,
    cursor: Cell<usize>,
}

impl IntegralTrack {
    /// Build from `(t0, t1, v0, v1)` velocity ramps.
    pub fn new(ramps: impl IntoIterator<Item = (f64, f64, f64, f64)>) -> Self {
        let mut segments: Vec<IntegralSegment> = ramps
            .into_iter()
            .map(|(t0, t1, v0, v1)| IntegralSegment {
                t0,
                t1,
                v0,
                v1,
                prefix: 0.0,
            })
            .collect();
        sort_by_start(&mut segments);
        let mut acc = 0.0;
        for s in &mut segments {
            s.prefix = acc;
            acc += 0.5 * (s.v0 + s.v1) * (s.t1 - s.t0).max(0.0);
        }
        Self {
            segments,
            cursor: Cell::new(0),
        }
    }

    pub fn segments(&self) -> &[IntegralSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Accumulated distance at `t`.
    pub fn integral(&self, t: f64) -> f64 {
        if self.segments.is_empty() {
            return 0.0;
        }
        let i = seek(&self.segments, &self.cursor, t);
        self.segments[i].value_at(t)
    }

    /// Binary-search variant of [`IntegralTrack::integral`].
    pub fn integral_uncached(&self, t: f64) -> f64 {
        if self.segments.is_empty() {
            return 0.0;
        }
        self.segments[locate(&self.segments, t)].value_at(t)
    }

    /// Stored |velocity| near `t`; a cheap reject signal, not a derivative.
    ///
    /// Zero before the first segment and in gaps, where the integral is flat.
    /// Past the last segment the final end velocity is reported.
    pub fn speed_at(&self, t: f64) -> Option<f64> {
        let last = self.segments.last()?;
        let count = self.segments.partition_point(|s| s.t0 <= t);
        if count == 0 {
            return Some(0.0);
        }
        let s = &self.segments[count - 1];
        if t <= s.t1 {
            Some(s.v0.abs())
        } else if count == self.segments.len() {
            Some(last.v1.abs())
        } else {
            Some(0.0)
        }
    }
}

// --- Color and text ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Channels from an authored `[r, g, b, ...]` list, clamped to 0..=255.
    pub fn from_channels(values: &[f64]) -> Option<Self> {
        match values {
            [r, g, b, ..] => Some(Self::new(
                clamp_channel(*r),
                clamp_channel(*g),
                clamp_channel(*b),
            )),
            _ => None,
        }
    }

    /// Convert an HSV triple in `[0, 1]` to RGB.
    pub fn from_hsv(h: f64, s: f64, v: f64) -> Self {
        let h = h.rem_euclid(1.0) * 6.0;
        let sector = h.floor();
        let f = h - sector;
        let p = v * (1.0 - s);
        let q = v * (1.0 - s * f);
        let t = v * (1.0 - s * (1.0 - f));
        let (r, g, b) = match sector as i32 {
            0 => (v, t, p),
            1 => (q, v, p),
            2 => (p, v, t),
            3 => (p, q, v),
            4 => (t, p, v),
            _ => (v, p, q),
        };
        Self::new(
            clamp_channel(r * 255.0),
            clamp_channel(g * 255.0),
            clamp_channel(b * 255.0),
        )
    }
}

fn clamp_channel(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColorSegment {
    pub t0: f64,
    pub t1: f64,
    pub c0: Rgb,
    pub c1: Rgb,
    pub easing: Easing,
    pub clip_left: f64,
    pub clip_right: f64,
}

impl ColorSegment {
    pub fn new(t0: f64, t1: f64, c0: Rgb, c1: Rgb, easing: Easing) -> Self {
        Self {
            t0,
            t1,
            c0,
            c1,
            easing,
            clip_left: 0.0,
            clip_right: 1.0,
        }
    }

    /// Same clip window semantics as [`Segment::with_clip`].
    pub fn with_clip(mut self, left: f64, right: f64) -> Self {
        let l = left.clamp(0.0, 1.0);
        let r = right.clamp(0.0, 1.0);
        self.clip_left = l.min(r);
        self.clip_right = l.max(r);
        self
    }

    fn value_at(&self, t: f64) -> Rgb {
        if t <= self.t0 {
            return self.c0;
        }
        if t >= self.t1 {
            return self.c1;
        }
        let p = self
            .easing
            .apply(clipped_progress(t, self.t0, self.t1, self.clip_left, self.clip_right));
        let ch = |a: u8, b: u8| clamp_channel(lerp(a as f64, b as f64, p));
        Rgb::new(
            ch(self.c0.r, self.c1.r),
            ch(self.c0.g, self.c1.g),
            ch(self.c0.b, self.c1.b),
        )
    }
}

impl Timed for ColorSegment {
    fn t0(&self) -> f64 {
        self.t0
    }
    fn t1(&self) -> f64 {
        self.t1
    }
}

/// Per-channel eased line color.
#[derive(Debug, Clone, Default)]
pub struct ColorTrack {
    segments: Vec<ColorSegment>,
    default: Rgb,
    cursor: Cell<usize>,
}

impl ColorTrack {
    pub fn new(mut segments: Vec<ColorSegment>, default: Rgb) -> Self {
        sort_by_start(&mut segments);
        Self {
            segments,
            default,
            cursor: Cell::new(0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn eval(&self, t: f64) -> Rgb {
        if self.segments.is_empty() {
            return self.default;
        }
        let i = seek(&self.segments, &self.cursor, t);
        self.segments[i].value_at(t)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextSegment {
    pub t0: f64,
    pub t1: f64,
    pub start: String,
    pub end: String,
}

impl Timed for TextSegment {
    fn t0(&self) -> f64 {
        self.t0
    }
    fn t1(&self) -> f64 {
        self.t1
    }
}

/// Line text that switches from start to end string at the segment midpoint.
#[derive(Debug, Clone, Default)]
pub struct TextTrack {
    segments: Vec<TextSegment>,
    default: String,
    cursor: Cell<usize>,
}

impl TextTrack {
    pub fn new(mut segments: Vec<TextSegment>, default: impl Into<String>) -> Self {
        sort_by_start(&mut segments);
        Self {
            segments,
            default: default.into(),
            cursor: Cell::new(0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn eval(&self, t: f64) -> &str {
        if self.segments.is_empty() {
            return &self.default;
        }
        let s = &self.segments[seek(&self.segments, &self.cursor, t)];
        if t < (s.t0 + s.t1) * 0.5 { &s.start } else { &s.end }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn linear(t0: f64, t1: f64, v0: f64, v1: f64) -> Segment {
        Segment::new(t0, t1, v0, v1, Easing::Linear)
    }

    // --- Track ---

    #[test]
    fn single_linear_segment_values() {
        let track = Track::new(vec![linear(0.0, 1.0, 0.0, 100.0)], 0.0);
        assert_eq!(track.eval(0.0), 0.0);
        assert!((track.eval(0.5) - 50.0).abs() < EPS);
        assert_eq!(track.eval(1.0), 100.0);
        assert_eq!(track.eval(2.0), 100.0);
    }

    #[test]
    fn before_first_segment_returns_start_value() {
        let track = Track::new(vec![linear(1.0, 2.0, 5.0, 10.0)], 0.0);
        assert_eq!(track.eval(-10.0), 5.0);
        assert_eq!(track.eval(1.0), 5.0);
    }

    #[test]
    fn empty_track_returns_default() {
        let track = Track::new(Vec::new(), 3.5);
        assert_eq!(track.eval(0.0), 3.5);
        assert_eq!(track.eval_uncached(100.0), 3.5);
    }

    #[test]
    fn gap_holds_previous_end_value() {
        let track = Track::new(
            vec![linear(0.0, 1.0, 0.0, 10.0), linear(2.0, 3.0, 20.0, 30.0)],
            0.0,
        );
        assert_eq!(track.eval(1.5), 10.0);
        assert_eq!(track.eval(2.5), 25.0);
    }

    #[test]
    fn continuous_across_shared_boundary() {
        let track = Track::new(
            vec![linear(0.0, 1.0, 0.0, 10.0), linear(1.0, 2.0, 10.0, -4.0)],
            0.0,
        );
        let before = track.eval(1.0 - 1e-9);
        let at = track.eval(1.0);
        let after = track.eval(1.0 + 1e-9);
        assert!((before - at).abs() < 1e-6);
        assert!((after - at).abs() < 1e-6);
    }

    #[test]
    fn query_order_does_not_change_results() {
        let segs = (0..20)
            .map(|i| linear(i as f64, i as f64 + 1.0, i as f64, (i * i) as f64))
            .collect();
        let track = Track::new(segs, 0.0);
        let a = track.eval(10.0);
        let b = track.eval(2.0);
        let c = track.eval(10.0);
        assert_eq!(a, c);
        assert_eq!(b, track.eval_uncached(2.0));
        assert_eq!(a, track.eval_uncached(10.0));
    }

    #[test]
    fn clip_window_snaps_outside_and_renormalizes_inside() {
        let seg = linear(0.0, 1.0, 0.0, 100.0).with_clip(0.25, 0.75);
        let track = Track::new(vec![seg], 0.0);
        assert_eq!(track.eval(0.1), 0.0);
        assert_eq!(track.eval(0.25), 0.0);
        assert!((track.eval(0.5) - 50.0).abs() < EPS);
        assert_eq!(track.eval(0.9), 100.0);
    }

    #[test]
    fn zero_length_segment_jumps_without_nan() {
        let track = Track::new(vec![linear(1.0, 1.0, 0.0, 10.0)], 0.0);
        assert_eq!(track.eval(0.5), 0.0);
        assert_eq!(track.eval(1.5), 10.0);
        assert!(!track.eval(1.0).is_nan());
    }

    #[test]
    fn from_zero_prepends_constant_lead() {
        let track = Track::from_zero(vec![linear(2.0, 3.0, 7.0, 9.0)], 0.0);
        assert_eq!(track.segments().len(), 2);
        assert_eq!(track.segments()[0].t0, 0.0);
        assert_eq!(track.eval(1.0), 7.0);
    }

    #[test]
    fn map_values_scales_segments_and_default() {
        let track = Track::new(vec![linear(0.0, 1.0, 1.0, 2.0)], 0.5).map_values(|v| v * 10.0);
        assert_eq!(track.eval(1.0), 20.0);
        assert_eq!(track.default_value(), 5.0);
    }

    // --- LayeredTrack ---

    #[test]
    fn layers_are_summed_with_offset() {
        let a = Track::new(vec![linear(0.0, 1.0, 0.0, 10.0)], 0.0);
        let b = Track::constant(5.0);
        let layered = LayeredTrack::new(vec![a, b], 100.0, 0.0);
        assert!((layered.eval(0.5) - 110.0).abs() < EPS);
    }

    #[test]
    fn no_layers_returns_default() {
        assert_eq!(LayeredTrack::constant(42.0).eval(3.0), 42.0);
    }

    // --- IntegralTrack ---

    #[test]
    fn constant_velocity_integral() {
        let track = IntegralTrack::new([(0.0, 2.0, 10.0, 10.0)]);
        assert!((track.integral(1.0) - 10.0).abs() < EPS);
        assert!((track.integral(2.0) - 20.0).abs() < EPS);
        assert_eq!(track.integral(0.0), 0.0);
    }

    #[test]
    fn integral_is_flat_outside_segments() {
        let track = IntegralTrack::new([(1.0, 2.0, 4.0, 4.0)]);
        assert_eq!(track.integral(-5.0), 0.0);
        assert!((track.integral(10.0) - 4.0).abs() < EPS);
    }

    #[test]
    fn integral_of_ramp_is_trapezoid() {
        let track = IntegralTrack::new([(0.0, 2.0, 0.0, 2.0)]);
        assert!((track.integral(1.0) - 0.5).abs() < EPS);
        assert!((track.integral(2.0) - 2.0).abs() < EPS);
    }

    #[test]
    fn integral_continuous_across_boundaries() {
        let track = IntegralTrack::new([(0.0, 1.0, 3.0, 5.0), (1.0, 4.0, 1.0, 1.0)]);
        let at = track.integral(1.0);
        assert!((track.integral(1.0 - 1e-9) - at).abs() < 1e-6);
        assert!((track.integral(1.0 + 1e-9) - at).abs() < 1e-6);
        assert!((at - 4.0).abs() < EPS);
    }

    #[test]
    fn empty_integral_is_zero() {
        let track = IntegralTrack::default();
        assert_eq!(track.integral(5.0), 0.0);
        assert_eq!(track.speed_at(5.0), None);
    }

    #[test]
    fn speed_at_uses_stored_start_velocity() {
        let track = IntegralTrack::new([(0.0, 1.0, -3.0, 5.0), (1.0, 2.0, 2.0, 8.0)]);
        assert_eq!(track.speed_at(0.5), Some(3.0));
        assert_eq!(track.speed_at(1.5), Some(2.0));
        assert_eq!(track.speed_at(9.0), Some(8.0));
    }

    #[test]
    fn speed_at_is_zero_where_scroll_is_flat() {
        let track = IntegralTrack::new([(1.0, 2.0, 4.0, 4.0), (3.0, 4.0, 6.0, 2.0)]);
        assert_eq!(track.speed_at(0.5), Some(0.0));
        assert_eq!(track.speed_at(2.5), Some(0.0));
        assert_eq!(track.integral(2.5), track.integral(2.9));
        assert_eq!(track.speed_at(3.0), Some(6.0));
        assert_eq!(track.speed_at(5.0), Some(2.0));
    }

    // --- Color and text ---

    #[test]
    fn color_track_lerps_channels() {
        let seg = ColorSegment::new(
            0.0,
            1.0,
            Rgb::new(0, 0, 0),
            Rgb::new(200, 100, 255),
            Easing::Linear,
        );
        let track = ColorTrack::new(vec![seg], Rgb::WHITE);
        assert_eq!(track.eval(0.5), Rgb::new(100, 50, 128));
        assert_eq!(track.eval(5.0), Rgb::new(200, 100, 255));
    }

    #[test]
    fn color_clip_window_holds_ends() {
        let seg = ColorSegment::new(0.0, 2.0, Rgb::new(0, 0, 0), Rgb::new(200, 200, 200), Easing::Linear)
            .with_clip(0.25, 0.75);
        let track = ColorTrack::new(vec![seg], Rgb::WHITE);
        assert_eq!(track.eval(0.4), Rgb::new(0, 0, 0));
        assert_eq!(track.eval(1.0), Rgb::new(100, 100, 100));
        assert_eq!(track.eval(1.6), Rgb::new(200, 200, 200));
    }

    #[test]
    fn text_switches_at_midpoint() {
        let seg = TextSegment {
            t0: 0.0,
            t1: 2.0,
            start: "a".into(),
            end: "b".into(),
        };
        let track = TextTrack::new(vec![seg], "");
        assert_eq!(track.eval(0.5), "a");
        assert_eq!(track.eval(1.0), "b");
        assert_eq!(track.eval(3.0), "b");
    }

    #[test]
    fn channels_are_clamped() {
        assert_eq!(
            Rgb::from_channels(&[300.0, -4.0, 12.4, 99.0]),
            Some(Rgb::new(255, 0, 12))
        );
        assert_eq!(Rgb::from_channels(&[1.0, 2.0]), None);
    }

    #[test]
    fn hsv_primary_hues() {
        assert_eq!(Rgb::from_hsv(0.0, 1.0, 1.0), Rgb::new(255, 0, 0));
        assert_eq!(Rgb::from_hsv(1.0 / 3.0, 1.0, 1.0), Rgb::new(0, 255, 0));
        assert_eq!(Rgb::from_hsv(2.0 / 3.0, 1.0, 1.0), Rgb::new(0, 0, 255));
    }
}
