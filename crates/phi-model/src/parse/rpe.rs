// RPE JSON chart decoder
//
// Beats are [bar, num, den] triples converted through BPMList. The canvas is a
// 1350x900 grid centered on the viewport with +y upward. Each line carries
// parallel event layers whose values are summed per property.

use std::f64::consts::PI;

use serde::Deserialize;
use serde_json::Value;

use super::{ParseOptions, flag, nullable};
use crate::bpm::{Beat, BpmMap};
use crate::chart::{Chart, ChartFormat, ChartMeta, Viewport};
use crate::easing::Easing;
use crate::error::ChartError;
use crate::line::{Line, LineTexture, resolve_hierarchy};
use crate::note::{Note, NoteKind};
use crate::parse::official::NOTE_ID_STRIDE;
use crate::track::{
    ColorSegment, ColorTrack, IntegralTrack, LayeredTrack, Rgb, Segment, TextSegment, TextTrack,
    Track,
};

const CANVAS_W: f64 = 1350.0;
const CANVAS_H: f64 = 900.0;
/// Scroll pixels per speed unit per second on the 900-high canvas.
const SPEED_UNIT_PX: f64 = 120.0;
/// Line speed used when no speed events are authored.
const DEFAULT_SPEED: f64 = 10.0;
/// The last speed value runs this long past the final event boundary.
const SPEED_TAIL: f64 = 1e6;
const DEFAULT_TEXTURE: &str = "line.png";
const EPSILON: f64 = 1e-9;
/// Alpha events whose values all stay within this are already in 0..=1.
const NORMALIZED_ALPHA_MAX: f64 = 1.000001;

#[derive(Debug, Deserialize)]
struct RpeChart {
    #[serde(rename = "META", default)]
    meta: RpeMeta,
    #[serde(rename = "BPMList", default, deserialize_with = "nullable")]
    bpm_list: Vec<RpeBpm>,
    #[serde(rename = "judgeLineList", default, deserialize_with = "nullable")]
    judge_line_list: Vec<RpeLine>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RpeMeta {
    /// Milliseconds
    offset: f64,
    name: String,
    level: String,
    composer: String,
    charter: String,
    song: String,
    background: String,
    #[serde(rename = "RPEVersion")]
    rpe_version: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpeBpm {
    start_time: Beat,
    bpm: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpeLine {
    #[serde(rename = "Name", default, deserialize_with = "nullable")]
    name: String,
    #[serde(rename = "Texture", default)]
    texture: Option<String>,
    #[serde(default = "one")]
    bpmfactor: f64,
    #[serde(default, deserialize_with = "nullable")]
    event_layers: Vec<Option<RpeLayer>>,
    #[serde(default)]
    extended: Option<RpeExtended>,
    #[serde(default = "no_father")]
    father: f64,
    #[serde(default = "yes", deserialize_with = "flag")]
    rotate_with_father: bool,
    #[serde(default)]
    anchor: Option<Vec<f64>>,
    #[serde(default, deserialize_with = "flag")]
    is_gif: bool,
    #[serde(default, deserialize_with = "nullable")]
    notes: Vec<RpeNote>,
    #[serde(default, deserialize_with = "nullable")]
    speed_events: Vec<RpeEvent<f64>>,
}

fn one() -> f64 {
    1.0
}

fn no_father() -> f64 {
    -1.0
}

fn yes() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RpeLayer {
    #[serde(deserialize_with = "nullable")]
    move_x_events: Vec<RpeEvent<f64>>,
    #[serde(deserialize_with = "nullable")]
    move_y_events: Vec<RpeEvent<f64>>,
    #[serde(deserialize_with = "nullable")]
    rotate_events: Vec<RpeEvent<f64>>,
    #[serde(deserialize_with = "nullable")]
    alpha_events: Vec<RpeEvent<f64>>,
    #[serde(deserialize_with = "nullable")]
    speed_events: Vec<RpeEvent<f64>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RpeExtended {
    #[serde(deserialize_with = "nullable")]
    color_events: Vec<RpeEvent<Vec<f64>>>,
    #[serde(deserialize_with = "nullable")]
    scale_x_events: Vec<RpeEvent<f64>>,
    #[serde(deserialize_with = "nullable")]
    scale_y_events: Vec<RpeEvent<f64>>,
    #[serde(deserialize_with = "nullable")]
    text_events: Vec<RpeEvent<String>>,
    #[serde(deserialize_with = "nullable")]
    gif_events: Vec<RpeEvent<f64>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpeEvent<V> {
    start_time: Beat,
    end_time: Beat,
    #[serde(default)]
    start: Option<V>,
    #[serde(default)]
    end: Option<V>,
    #[serde(default)]
    easing_type: f64,
    #[serde(default)]
    easing_left: f64,
    #[serde(default = "one")]
    easing_right: f64,
    #[serde(default)]
    bezier: f64,
    #[serde(default, deserialize_with = "nullable")]
    bezier_points: Vec<f64>,
}

impl<V> RpeEvent<V> {
    fn span(&self, map: &BpmMap) -> (f64, f64) {
        (
            map.beat_to_seconds_triple(self.start_time),
            map.beat_to_seconds_triple(self.end_time),
        )
    }

    fn easing(&self, shift: i32) -> Easing {
        if self.bezier as i64 == 1 && self.bezier_points.len() == 4 {
            let p = &self.bezier_points;
            Easing::bezier([p[0], p[1], p[2], p[3]])
        } else {
            Easing::from_id(self.easing_type as i32 + shift)
        }
    }

    fn clip(&self) -> (f64, f64) {
        let right = if self.easing_right == 0.0 {
            1.0
        } else {
            self.easing_right
        };
        (self.easing_left, right)
    }
}

impl RpeEvent<f64> {
    fn values(&self) -> (f64, f64) {
        let start = self.start.unwrap_or(0.0);
        (start, self.end.unwrap_or(start))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpeNote {
    #[serde(rename = "type", default = "tap_id")]
    kind: f64,
    #[serde(default)]
    start_time: Beat,
    #[serde(default)]
    end_time: Option<Beat>,
    #[serde(default = "one")]
    above: f64,
    #[serde(default, deserialize_with = "flag")]
    is_fake: bool,
    #[serde(default)]
    position_x: f64,
    #[serde(default)]
    y_offset: f64,
    #[serde(default = "one")]
    size: f64,
    #[serde(default = "one")]
    speed: f64,
    #[serde(default)]
    alpha: Option<f64>,
    #[serde(default)]
    hitsound: Option<String>,
    #[serde(default)]
    tint: Option<Vec<f64>>,
    #[serde(default)]
    color: Option<Vec<f64>>,
    #[serde(default)]
    tint_hit_effects: Option<Vec<f64>>,
}

fn tap_id() -> f64 {
    1.0
}

/// Coordinate scale from the RPE canvas to the viewport.
#[derive(Debug, Clone, Copy)]
struct Canvas {
    sx: f64,
    sy: f64,
}

/// RPE chart decoder
pub struct RpeDecoder;

impl RpeDecoder {
    pub fn decode_str(
        text: &str,
        viewport: Viewport,
        options: ParseOptions,
    ) -> Result<Chart, ChartError> {
        let raw: RpeChart = serde_json::from_str(text)?;
        Self::decode_chart(raw, viewport, options)
    }

    pub(crate) fn decode_value(
        value: Value,
        viewport: Viewport,
        options: ParseOptions,
    ) -> Result<Chart, ChartError> {
        let raw: RpeChart = serde_json::from_value(value)?;
        Self::decode_chart(raw, viewport, options)
    }

    fn decode_chart(
        raw: RpeChart,
        viewport: Viewport,
        options: ParseOptions,
    ) -> Result<Chart, ChartError> {
        let bpm_map = BpmMap::new(
            raw.bpm_list
                .iter()
                .map(|b| (b.start_time.value(), b.bpm)),
        );
        let canvas = Canvas {
            sx: viewport.width / CANVAS_W,
            sy: viewport.height / CANVAS_H,
        };
        let line_count = raw.judge_line_list.len();

        let mut lines = Vec::with_capacity(line_count);
        let mut notes = Vec::new();
        for (i, jl) in raw.judge_line_list.iter().enumerate() {
            let map = bpm_map.with_factor(jl.bpmfactor);
            let base_color = Rgb::from_hsv(i as f64 / line_count.max(1) as f64, 0.65, 0.95);
            let line = build_line(i, jl, &map, canvas, line_count, base_color, options.easing_shift);
            for (k, raw_note) in jl.notes.iter().enumerate() {
                let id = i as u64 * NOTE_ID_STRIDE + k as u64;
                notes.push(build_note(id, &line, raw_note, &map, canvas));
            }
            lines.push(line);
        }
        resolve_hierarchy(&mut lines)?;

        let meta = ChartMeta {
            name: raw.meta.name,
            level: raw.meta.level,
            composer: raw.meta.composer,
            charter: raw.meta.charter,
            song: raw.meta.song,
            background: raw.meta.background,
            version: raw.meta.rpe_version,
        };
        Ok(Chart::assemble(
            ChartFormat::Rpe,
            raw.meta.offset / 1000.0,
            lines,
            notes,
            meta,
        ))
    }
}

fn eased_track(
    events: &[RpeEvent<f64>],
    map: &BpmMap,
    shift: i32,
    default: f64,
) -> Track {
    let segs = events
        .iter()
        .map(|e| {
            let (t0, t1) = e.span(map);
            let (v0, v1) = e.values();
            let (left, right) = e.clip();
            Segment::new(t0, t1, v0, v1, e.easing(shift)).with_clip(left, right)
        })
        .collect();
    Track::from_zero(segs, default)
}

/// Sum the layers that animate a property. With no such layer the property
/// sits at `unset` (authored units).
fn layered(
    layers: &[&RpeLayer],
    pick: impl Fn(&RpeLayer) -> &[RpeEvent<f64>],
    map: &BpmMap,
    shift: i32,
    unset: f64,
    scale: impl Fn(f64) -> f64 + Copy,
    offset: f64,
) -> LayeredTrack {
    let tracks: Vec<Track> = layers
        .iter()
        .map(|&l| pick(l))
        .filter(|events| !events.is_empty())
        .map(|events| eased_track(events, map, shift, 0.0).map_values(scale))
        .collect();
    let default = offset + scale(unset);
    LayeredTrack::new(tracks, offset, default)
}

/// Lines are authored either in 0..=255 or already normalized; a line whose
/// alpha events never leave [-1, 1] is taken as normalized.
fn alpha_scale(layers: &[&RpeLayer]) -> f64 {
    let mut values = layers
        .iter()
        .flat_map(|l| l.alpha_events.iter())
        .flat_map(|e| {
            let (v0, v1) = e.values();
            [v0, v1]
        })
        .peekable();
    if values.peek().is_some() && values.all(|v| v.abs() <= NORMALIZED_ALPHA_MAX) {
        1.0
    } else {
        1.0 / 255.0
    }
}

fn build_line(
    index: usize,
    jl: &RpeLine,
    map: &BpmMap,
    canvas: Canvas,
    line_count: usize,
    base_color: Rgb,
    shift: i32,
) -> Line {
    let layers: Vec<&RpeLayer> = jl.event_layers.iter().flatten().collect();
    let parent = (jl.father >= 0.0)
        .then_some(jl.father as usize)
        .filter(|&p| p < line_count);
    // Child positions are offsets from the parent, so only roots are centered.
    let (cx, cy) = match parent {
        Some(_) => (0.0, 0.0),
        None => (CANVAS_W * 0.5 * canvas.sx, CANVAS_H * 0.5 * canvas.sy),
    };
    let (sx, sy) = (canvas.sx, canvas.sy);

    let mut line = Line::new(index);
    line.name = jl.name.clone();
    line.base_color = base_color;
    line.parent = parent;
    line.rotate_with_parent = jl.rotate_with_father;
    line.x = layered(&layers, |l| l.move_x_events.as_slice(), map, shift, 0.0, move |v| v * sx, cx);
    line.y = layered(&layers, |l| l.move_y_events.as_slice(), map, shift, 0.0, move |v| -v * sy, cy);
    line.rotation = layered(&layers, |l| l.rotate_events.as_slice(), map, shift, 0.0, |v| v * PI / 180.0, 0.0);
    let alpha_scale = alpha_scale(&layers);
    line.opacity = layered(&layers, |l| l.alpha_events.as_slice(), map, shift, 255.0, move |v| v * alpha_scale, 0.0);

    let layer_speeds: Vec<&[RpeEvent<f64>]> = layers.iter().map(|l| l.speed_events.as_slice()).collect();
    let px_per_unit = SPEED_UNIT_PX * sy;
    line.scroll = if layer_speeds.iter().any(|s| !s.is_empty()) {
        build_scroll(&layer_speeds, map, px_per_unit)
    } else if !jl.speed_events.is_empty() {
        build_scroll(&[jl.speed_events.as_slice()], map, px_per_unit)
    } else {
        let v = DEFAULT_SPEED * px_per_unit;
        IntegralTrack::new([(0.0, SPEED_TAIL, v, v)])
    };

    if let Some(ext) = &jl.extended {
        apply_extended(&mut line, ext, map, shift);
    }

    let gif_progress = jl
        .extended
        .as_ref()
        .filter(|e| !e.gif_events.is_empty())
        .map(|e| eased_track(&e.gif_events, map, shift, 0.0));
    line.texture = jl
        .texture
        .as_deref()
        .filter(|t| !t.is_empty() && *t != DEFAULT_TEXTURE)
        .map(|path| LineTexture {
            path: path.to_string(),
            anchor: match jl.anchor.as_deref() {
                Some([ax, ay, ..]) => [*ax, *ay],
                _ => [0.5, 0.5],
            },
            is_gif: jl.is_gif,
            gif_progress,
        });
    line
}

fn apply_extended(line: &mut Line, ext: &RpeExtended, map: &BpmMap, shift: i32) {
    if !ext.color_events.is_empty() {
        let default = line.base_color;
        let segs = ext
            .color_events
            .iter()
            .map(|e| {
                let (t0, t1) = e.span(map);
                let c0 = e
                    .start
                    .as_deref()
                    .and_then(Rgb::from_channels)
                    .unwrap_or(default);
                let c1 = e.end.as_deref().and_then(Rgb::from_channels).unwrap_or(c0);
                let (left, right) = e.clip();
                ColorSegment::new(t0, t1, c0, c1, e.easing(shift)).with_clip(left, right)
            })
            .collect();
        line.color = Some(ColorTrack::new(segs, default));
    }
    if !ext.scale_x_events.is_empty() {
        line.scale_x = Some(eased_track(&ext.scale_x_events, map, shift, 1.0));
    }
    if !ext.scale_y_events.is_empty() {
        line.scale_y = Some(eased_track(&ext.scale_y_events, map, shift, 1.0));
    }
    if !ext.text_events.is_empty() {
        let segs = ext
            .text_events
            .iter()
            .map(|e| {
                let (t0, t1) = e.span(map);
                let start = e.start.clone().unwrap_or_default();
                let end = e.end.clone().unwrap_or_else(|| start.clone());
                TextSegment { t0, t1, start, end }
            })
            .collect();
        line.text = Some(TextTrack::new(segs, ""));
    }
}

/// One speed event resolved to seconds.
#[derive(Debug, Clone, Copy)]
struct SpeedSpan {
    t0: f64,
    t1: f64,
    start: f64,
    end: f64,
}

impl SpeedSpan {
    fn at(&self, t: f64) -> f64 {
        let u = ((t - self.t0) / (self.t1 - self.t0).max(EPSILON)).clamp(0.0, 1.0);
        self.start + (self.end - self.start) * u
    }
}

/// Value of one layer across `[a, b]`, which contains no event boundary.
fn layer_speed(spans: &[SpeedSpan], a: f64, b: f64, t: f64) -> f64 {
    let Some(first) = spans.first() else {
        return 0.0;
    };
    let mid = (a + b) * 0.5;
    let mut last_before = None;
    for s in spans {
        if mid < s.t0 {
            break;
        }
        if mid < s.t1 {
            return s.at(t);
        }
        last_before = Some(s);
    }
    match last_before {
        Some(s) => s.end,
        None => first.start,
    }
}

fn build_scroll(layers: &[&[RpeEvent<f64>]], map: &BpmMap, px_per_unit: f64) -> IntegralTrack {
    let spans: Vec<Vec<SpeedSpan>> = layers
        .iter()
        .map(|events| {
            let mut spans: Vec<SpeedSpan> = events
                .iter()
                .map(|e| {
                    let (t0, t1) = e.span(map);
                    let (start, end) = e.values();
                    SpeedSpan { t0, t1, start, end }
                })
                .collect();
            spans.sort_by(|a, b| a.t0.total_cmp(&b.t0));
            spans
        })
        .collect();

    let mut cuts: Vec<f64> = std::iter::once(0.0)
        .chain(spans.iter().flatten().flat_map(|s| [s.t0, s.t1]))
        .filter(|t| t.is_finite())
        .collect();
    cuts.sort_by(f64::total_cmp);
    cuts.dedup();
    if let Some(&last) = cuts.last() {
        cuts.push(last + SPEED_TAIL);
    }

    let ramps = cuts.windows(2).filter(|w| w[1] > w[0]).map(|w| {
        let (a, b) = (w[0], w[1]);
        let v0: f64 = spans.iter().map(|l| layer_speed(l, a, b, a)).sum();
        let v1: f64 = spans.iter().map(|l| layer_speed(l, a, b, b)).sum();
        (a, b, v0 * px_per_unit, v1 * px_per_unit)
    });
    IntegralTrack::new(ramps.collect::<Vec<_>>())
}

fn build_note(id: u64, line: &Line, raw: &RpeNote, map: &BpmMap, canvas: Canvas) -> Note {
    let hit = map.beat_to_seconds_triple(raw.start_time);
    let end = raw
        .end_time
        .map(|b| map.beat_to_seconds_triple(b))
        .unwrap_or(hit);
    let mut kind = NoteKind::from_rpe(raw.kind as i64).unwrap_or(NoteKind::Tap);
    if end > hit + EPSILON {
        kind = NoteKind::Hold;
    }

    let mut note = Note::new(id, line.id, kind, hit);
    if kind.is_hold() {
        note.end_time = end.max(hit);
    }
    note.above = raw.above as i64 != 1;
    note.decorative = raw.is_fake;
    note.lateral_offset = raw.position_x * canvas.sx;
    note.normal_offset = raw.y_offset * canvas.sy;
    note.size = raw.size;
    note.speed = raw.speed;
    note.opacity = raw.alpha.map_or(1.0, |a| (a / 255.0).clamp(0.0, 1.0));
    note.tint = raw
        .tint
        .as_deref()
        .or(raw.color.as_deref())
        .and_then(Rgb::from_channels);
    note.hit_tint = raw.tint_hit_effects.as_deref().and_then(Rgb::from_channels);
    note.hitsound = raw.hitsound.clone();
    note.scroll_at_hit = line.scroll.integral(note.hit_time);
    note.scroll_at_end = line.scroll.integral(note.end_time);
    note
}
