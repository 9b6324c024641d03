//! Plain-data views of a chart for `info` and `sample`.

use phi_model::{ALWAYS_VISIBLE, Chart, ChartFormat, ChartMeta, NoteKind};
use phi_scene::{KinematicsOptions, eval_line_state, note_world_position};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartInfo {
    pub format: ChartFormat,
    pub meta: ChartMeta,
    pub offset: f64,
    pub duration: f64,
    pub lines: usize,
    pub notes: usize,
    pub judgeable: usize,
    pub multi_hit: usize,
    pub taps: usize,
    pub drags: usize,
    pub holds: usize,
    pub flicks: usize,
}

impl ChartInfo {
    pub fn of(chart: &Chart) -> Self {
        let count = |kind: NoteKind| {
            chart
                .notes
                .iter()
                .filter(|n| n.is_judgeable() && n.kind == kind)
                .count()
        };
        Self {
            format: chart.format,
            meta: chart.meta.clone(),
            offset: chart.offset,
            duration: chart.duration,
            lines: chart.lines.len(),
            notes: chart.notes.len(),
            judgeable: chart.judgeable_count(),
            multi_hit: chart.notes.iter().filter(|n| n.multi_hit).count(),
            taps: count(NoteKind::Tap),
            drags: count(NoteKind::Drag),
            holds: count(NoteKind::Hold),
            flicks: count(NoteKind::Flick),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineSample {
    pub index: usize,
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
    pub opacity: f64,
    pub scroll: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteSample {
    pub id: u64,
    pub line: usize,
    pub kind: NoteKind,
    pub hit_time: f64,
    pub head: (f64, f64),
    /// Tail endpoint, holds only
    pub tail: Option<(f64, f64)>,
    pub decorative: bool,
    pub multi_hit: bool,
}

/// Line transforms and on-screen notes at one instant.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneSample {
    pub time: f64,
    pub lines: Vec<LineSample>,
    pub notes: Vec<NoteSample>,
}

impl SceneSample {
    /// Notes are included from their first visible time until they leave
    /// the line (hold tails included).
    pub fn at(chart: &Chart, t: f64, options: &KinematicsOptions) -> Self {
        let states: Vec<_> = (0..chart.lines.len())
            .map(|i| eval_line_state(&chart.lines, i, t, options))
            .collect();

        let lines = states
            .iter()
            .enumerate()
            .map(|(index, s)| LineSample {
                index,
                x: s.x,
                y: s.y,
                rotation: s.rotation,
                opacity: s.opacity,
                scroll: s.scroll,
            })
            .collect();

        let notes = chart
            .notes
            .iter()
            .filter(|n| n.line < states.len())
            .filter(|n| n.first_visible == ALWAYS_VISIBLE || n.first_visible <= t)
            .filter(|n| t <= n.end_time)
            .map(|n| {
                let state = &states[n.line];
                let head = note_world_position(state, n, n.scroll_at_hit, false, options);
                let tail = n
                    .is_hold()
                    .then(|| note_world_position(state, n, n.scroll_at_end, true, options));
                NoteSample {
                    id: n.id,
                    line: n.line,
                    kind: n.kind,
                    hit_time: n.hit_time,
                    head,
                    tail,
                    decorative: n.decorative,
                    multi_hit: n.multi_hit,
                }
            })
            .collect();

        Self {
            time: t,
            lines,
            notes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phi_model::{IntegralTrack, LayeredTrack, Line, Note};

    fn chart() -> Chart {
        let mut line = Line::new(0);
        line.x = LayeredTrack::constant(640.0);
        line.y = LayeredTrack::constant(360.0);
        line.scroll = IntegralTrack::new([(0.0, 10.0, 100.0, 100.0)]);
        let mut notes = vec![
            Note::new(0, 0, NoteKind::Tap, 1.0),
            Note::new(1, 0, NoteKind::Hold, 2.0),
            Note::new(2, 0, NoteKind::Flick, 5.0),
        ];
        notes[1].end_time = 3.0;
        notes[2].decorative = true;
        for n in notes.iter_mut() {
            n.scroll_at_hit = line.scroll.integral(n.hit_time);
            n.scroll_at_end = line.scroll.integral(n.end_time);
            n.first_visible = n.hit_time - 1.5;
        }
        Chart::assemble(ChartFormat::Rpe, 0.0, vec![line], notes, ChartMeta::default())
    }

    #[test]
    fn info_counts_judgeable_kinds() {
        let info = ChartInfo::of(&chart());
        assert_eq!(info.notes, 3);
        assert_eq!(info.judgeable, 2);
        assert_eq!((info.taps, info.holds, info.flicks), (1, 1, 0));
        assert_eq!(info.duration, 5.0);
    }

    #[test]
    fn sample_places_visible_notes() {
        let s = SceneSample::at(&chart(), 0.75, &KinematicsOptions::default());
        assert_eq!(s.lines.len(), 1);
        assert_eq!(s.lines[0].scroll, 75.0);
        let ids: Vec<u64> = s.notes.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![0, 1]);
        // 25 px above the line, upward normal in screen space
        let (x, y) = s.notes[0].head;
        assert!((x - 640.0).abs() < 1e-9);
        assert!(((360.0 - y).abs() - 25.0).abs() < 1e-9);
        assert!(s.notes[1].tail.is_some());
    }

    #[test]
    fn sample_drops_passed_notes() {
        let s = SceneSample::at(&chart(), 2.5, &KinematicsOptions::default());
        let ids: Vec<u64> = s.notes.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn sample_serializes_camel_case() {
        let s = SceneSample::at(&chart(), 0.75, &KinematicsOptions::default());
        let json = serde_json::to_value(&s).unwrap();
        assert!(json["notes"][0].get("hitTime").is_some());
    }
}
