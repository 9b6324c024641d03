// Official JSON chart decoder (formatVersion 1 and 3)
//
// Time is measured in units of 1.875 / bpm seconds with a per-line bpm.
// Coordinates are canvas fractions with +y upward; scroll is in "height units"
// of 0.6 viewport heights.

use std::f64::consts::PI;

use serde::Deserialize;

use crate::bpm::{TimeBase, UnitTimeBase};
use crate::chart::{Chart, ChartFormat, ChartMeta, Viewport};
use crate::easing::Easing;
use crate::error::ChartError;
use crate::line::Line;
use crate::note::{Note, NoteKind};
use crate::track::{IntegralTrack, LayeredTrack, Rgb, Segment, Track};

/// Note lateral unit as a fraction of viewport width.
const UNIT_WIDTH: f64 = 0.05625;
/// Scroll height unit as a fraction of viewport height.
const UNIT_HEIGHT: f64 = 0.6;
/// Note ids are `line * NOTE_ID_STRIDE + index`.
pub(crate) const NOTE_ID_STRIDE: u64 = 100_000;

// Format v1 packs move positions as `x * 1000 + y` on an 880x520 grid.
const V1_PACK: f64 = 1000.0;
const V1_GRID_W: f64 = 880.0;
const V1_GRID_H: f64 = 520.0;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OfficialChart {
    #[serde(default = "default_version")]
    format_version: i64,
    #[serde(default)]
    offset: f64,
    judge_line_list: Vec<OfficialLine>,
}

fn default_version() -> i64 {
    3
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OfficialLine {
    #[serde(default = "default_bpm")]
    bpm: f64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    notes_above: Vec<OfficialNote>,
    #[serde(default)]
    notes_below: Vec<OfficialNote>,
    #[serde(default)]
    speed_events: Vec<SpeedEvent>,
    #[serde(default)]
    judge_line_move_events: Vec<ValueEvent>,
    #[serde(default)]
    judge_line_rotate_events: Vec<ValueEvent>,
    #[serde(default)]
    judge_line_disappear_events: Vec<ValueEvent>,
}

fn default_bpm() -> f64 {
    120.0
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OfficialNote {
    #[serde(rename = "type")]
    kind: i64,
    time: f64,
    #[serde(default)]
    position_x: f64,
    #[serde(default)]
    hold_time: f64,
    #[serde(default = "one")]
    speed: f64,
}

fn one() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpeedEvent {
    start_time: f64,
    end_time: f64,
    value: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValueEvent {
    start_time: f64,
    end_time: f64,
    #[serde(default)]
    start: f64,
    #[serde(default)]
    end: f64,
    #[serde(default)]
    start2: f64,
    #[serde(default)]
    end2: f64,
}

impl ValueEvent {
    fn span(&self, base: &UnitTimeBase) -> (f64, f64) {
        (base.to_seconds(self.start_time), base.to_seconds(self.end_time))
    }
}

/// Official chart decoder
pub struct OfficialDecoder;

impl OfficialDecoder {
    pub fn decode_str(text: &str, viewport: Viewport) -> Result<Chart, ChartError> {
        let raw: OfficialChart = serde_json::from_str(text)?;
        Self::decode_chart(raw, viewport)
    }

    pub(crate) fn decode_value(
        value: serde_json::Value,
        viewport: Viewport,
    ) -> Result<Chart, ChartError> {
        let raw: OfficialChart = serde_json::from_value(value)?;
        Self::decode_chart(raw, viewport)
    }

    fn decode_chart(raw: OfficialChart, viewport: Viewport) -> Result<Chart, ChartError> {
        let version = raw.format_version;
        if version != 1 && version != 3 {
            return Err(ChartError::UnsupportedVersion {
                format: "official",
                version,
            });
        }
        let uh = UNIT_HEIGHT * viewport.height;
        let uw = UNIT_WIDTH * viewport.width;
        let line_count = raw.judge_line_list.len();

        let mut lines = Vec::with_capacity(line_count);
        let mut notes = Vec::new();
        for (i, jl) in raw.judge_line_list.into_iter().enumerate() {
            let base = UnitTimeBase::new(jl.bpm);
            let (x, y) = build_position(&jl.judge_line_move_events, &base, version, viewport);
            let mut line = Line::new(i);
            line.name = jl.name.clone().unwrap_or_default();
            line.x = LayeredTrack::single(x);
            line.y = LayeredTrack::single(y);
            line.rotation = LayeredTrack::single(build_rotation(&jl.judge_line_rotate_events, &base));
            line.opacity = LayeredTrack::single(build_opacity(&jl.judge_line_disappear_events, &base));
            line.scroll = build_scroll(&jl.speed_events, &base, uh);
            line.base_color = Rgb::from_hsv(i as f64 / line_count.max(1) as f64, 0.65, 0.95);
            line.rotate_with_parent = false;

            let mut next_id = i as u64 * NOTE_ID_STRIDE;
            // +y is up in this format, so the authored sides swap.
            let sided = jl
                .notes_above
                .iter()
                .map(|n| (n, false))
                .chain(jl.notes_below.iter().map(|n| (n, true)));
            for (raw_note, above) in sided {
                let id = next_id;
                next_id += 1;
                let Some(kind) = NoteKind::from_official(raw_note.kind) else {
                    log::debug!("official: skipping note with type {}", raw_note.kind);
                    continue;
                };
                notes.push(build_note(id, &line, kind, above, raw_note, &base, uw, uh));
            }
            lines.push(line);
        }

        let meta = ChartMeta {
            version,
            ..ChartMeta::default()
        };
        Ok(Chart::assemble(
            ChartFormat::Official,
            raw.offset,
            lines,
            notes,
            meta,
        ))
    }
}

#[allow(clippy::too_many_arguments)]
fn build_note(
    id: u64,
    line: &Line,
    kind: NoteKind,
    above: bool,
    raw: &OfficialNote,
    base: &UnitTimeBase,
    uw: f64,
    uh: f64,
) -> Note {
    let hit = base.to_seconds(raw.time);
    let mut note = Note::new(id, line.id, kind, hit);
    note.above = above;
    note.lateral_offset = raw.position_x * uw;
    note.speed = raw.speed;
    if kind.is_hold() && raw.hold_time > 0.0 {
        note.end_time = hit + base.to_seconds(raw.hold_time);
    }
    note.scroll_at_hit = line.scroll.integral(note.hit_time);
    if kind.is_hold() && note.end_time > note.hit_time {
        // Hold speed here is a constant rate, not a scroll multiplier.
        let rate = raw.speed.max(0.0);
        note.scroll_at_end = note.scroll_at_hit + rate * note.duration() * uh;
        note.speed = 1.0;
    } else {
        note.scroll_at_end = line.scroll.integral(note.end_time);
    }
    note
}

fn sorted(events: &[ValueEvent]) -> Vec<&ValueEvent> {
    let mut evs: Vec<&ValueEvent> = events.iter().collect();
    evs.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
    evs
}

fn unpack_v1(packed: f64) -> (f64, f64) {
    let x = (packed / V1_PACK).floor();
    let y = packed - x * V1_PACK;
    (x / V1_GRID_W, y / V1_GRID_H)
}

fn build_position(
    events: &[ValueEvent],
    base: &UnitTimeBase,
    version: i64,
    viewport: Viewport,
) -> (Track, Track) {
    let (w, h) = (viewport.width, viewport.height);
    let mut xs = Vec::with_capacity(events.len());
    let mut ys = Vec::with_capacity(events.len());
    for e in sorted(events) {
        let (t0, t1) = e.span(base);
        let ((x0, y0), (x1, y1)) = if version == 1 {
            (unpack_v1(e.start), unpack_v1(e.end))
        } else {
            ((e.start, e.start2), (e.end, e.end2))
        };
        xs.push(Segment::new(t0, t1, x0 * w, x1 * w, Easing::Linear));
        ys.push(Segment::new(t0, t1, h * (1.0 - y0), h * (1.0 - y1), Easing::Linear));
    }
    (
        Track::from_zero(xs, w * 0.5),
        Track::from_zero(ys, h * 0.5),
    )
}

fn build_rotation(events: &[ValueEvent], base: &UnitTimeBase) -> Track {
    let segs = sorted(events)
        .into_iter()
        .map(|e| {
            let (t0, t1) = e.span(base);
            Segment::new(t0, t1, -e.start * PI / 180.0, -e.end * PI / 180.0, Easing::Linear)
        })
        .collect();
    Track::from_zero(segs, 0.0)
}

fn build_opacity(events: &[ValueEvent], base: &UnitTimeBase) -> Track {
    let segs = sorted(events)
        .into_iter()
        .map(|e| {
            let (t0, t1) = e.span(base);
            Segment::new(t0, t1, e.start, e.end, Easing::Linear)
        })
        .collect();
    Track::from_zero(segs, 1.0)
}

fn build_scroll(events: &[SpeedEvent], base: &UnitTimeBase, uh: f64) -> IntegralTrack {
    let mut evs: Vec<&SpeedEvent> = events.iter().collect();
    evs.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
    let mut ramps: Vec<(f64, f64, f64, f64)> = evs
        .iter()
        .map(|e| {
            let v = e.value * uh;
            (base.to_seconds(e.start_time), base.to_seconds(e.end_time), v, v)
        })
        .collect();
    if let Some(&(t0, _, v, _)) = ramps.first() {
        if t0 > 0.0 {
            ramps.insert(0, (0.0, t0, v, v));
        }
    }
    IntegralTrack::new(ramps)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn viewport() -> Viewport {
        Viewport::new(1000.0, 500.0)
    }

    fn chart_json(version: i64, line_body: &str) -> String {
        format!(
            r#"{{"formatVersion": {version}, "offset": 0.25, "judgeLineList": [{{"bpm": 120, {line_body}}}]}}"#
        )
    }

    #[test]
    fn rejects_unknown_version() {
        let err = OfficialDecoder::decode_str(&chart_json(2, r#""notesAbove": []"#), viewport())
            .unwrap_err();
        assert!(matches!(
            err,
            ChartError::UnsupportedVersion { version: 2, .. }
        ));
    }

    #[test]
    fn unit_time_and_offset() {
        let body = r#""notesAbove": [{"type": 1, "time": 64, "positionX": 2.0}]"#;
        let chart = OfficialDecoder::decode_str(&chart_json(3, body), viewport()).unwrap();
        assert_eq!(chart.offset, 0.25);
        let n = &chart.notes[0];
        // 64 units at 120 BPM = 2 beats = 1s
        assert!((n.hit_time - 1.0).abs() < EPS);
        assert!((n.lateral_offset - 2.0 * 0.05625 * 1000.0).abs() < EPS);
        assert!(!n.above);
        assert_eq!(n.id, 0);
    }

    #[test]
    fn notes_below_are_marked_above() {
        let body = r#""notesBelow": [{"type": 2, "time": 0}]"#;
        let chart = OfficialDecoder::decode_str(&chart_json(3, body), viewport()).unwrap();
        assert!(chart.notes[0].above);
        assert_eq!(chart.notes[0].kind, NoteKind::Drag);
    }

    #[test]
    fn move_events_map_to_flipped_pixels() {
        let body = r#""judgeLineMoveEvents": [{"startTime": 0, "endTime": 32, "start": 0.5, "end": 1.0, "start2": 0.25, "end2": 0.5}]"#;
        let chart = OfficialDecoder::decode_str(&chart_json(3, body), viewport()).unwrap();
        let line = &chart.lines[0];
        assert!((line.x.eval(0.0) - 500.0).abs() < EPS);
        assert!((line.y.eval(0.0) - 375.0).abs() < EPS);
        assert!((line.x.eval(0.5) - 1000.0).abs() < EPS);
        assert!((line.y.eval(0.5) - 250.0).abs() < EPS);
    }

    #[test]
    fn v1_positions_are_unpacked() {
        let body = r#""judgeLineMoveEvents": [{"startTime": 0, "endTime": 32, "start": 440260, "end": 440260}]"#;
        let chart = OfficialDecoder::decode_str(&chart_json(1, body), viewport()).unwrap();
        let line = &chart.lines[0];
        assert!((line.x.eval(0.1) - 500.0).abs() < EPS);
        assert!((line.y.eval(0.1) - 250.0).abs() < EPS);
    }

    #[test]
    fn rotation_is_negated_radians() {
        let body = r#""judgeLineRotateEvents": [{"startTime": 0, "endTime": 32, "start": 90, "end": 90}]"#;
        let chart = OfficialDecoder::decode_str(&chart_json(3, body), viewport()).unwrap();
        assert!((chart.lines[0].rotation.eval(0.2) + PI / 2.0).abs() < EPS);
    }

    #[test]
    fn missing_disappear_events_are_opaque() {
        let chart = OfficialDecoder::decode_str(&chart_json(3, r#""notesAbove": []"#), viewport())
            .unwrap();
        assert_eq!(chart.lines[0].opacity.eval(3.0), 1.0);
    }

    #[test]
    fn scroll_is_padded_from_zero() {
        let body = r#""speedEvents": [{"startTime": 32, "endTime": 64, "value": 2.0}]"#;
        let chart = OfficialDecoder::decode_str(&chart_json(3, body), viewport()).unwrap();
        let scroll = &chart.lines[0].scroll;
        let uh = 0.6 * 500.0;
        assert!((scroll.integral(0.5) - 2.0 * uh * 0.5).abs() < EPS);
        assert!((scroll.integral(1.0) - 2.0 * uh * 1.0).abs() < EPS);
    }

    #[test]
    fn hold_tail_uses_constant_rate() {
        let body = r#""speedEvents": [{"startTime": 0, "endTime": 1000, "value": 1.0}],
            "notesAbove": [{"type": 3, "time": 32, "holdTime": 64, "speed": 2.0}]"#;
        let chart = OfficialDecoder::decode_str(&chart_json(3, body), viewport()).unwrap();
        let n = &chart.notes[0];
        let uh = 0.6 * 500.0;
        assert!((n.end_time - 1.5).abs() < EPS);
        assert!((n.scroll_at_hit - 0.5 * uh).abs() < EPS);
        assert!((n.scroll_at_end - (n.scroll_at_hit + 2.0 * 1.0 * uh)).abs() < EPS);
        assert_eq!(n.speed, 1.0);
    }

    #[test]
    fn note_ids_are_strided_by_line() {
        let text = r#"{"formatVersion": 3, "judgeLineList": [
            {"bpm": 120, "notesAbove": [{"type": 1, "time": 0}]},
            {"bpm": 120, "notesAbove": [{"type": 1, "time": 1}, {"type": 1, "time": 2}]}
        ]}"#;
        let chart = OfficialDecoder::decode_str(text, viewport()).unwrap();
        let ids: Vec<u64> = chart.notes.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![0, 100_000, 100_001]);
        assert_eq!(chart.notes[2].line, 1);
    }
}
