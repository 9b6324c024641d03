//! Autoplay pointer scripts.
//!
//! Every judgeable note gets its own pointer, placed where the note crosses
//! its line, with timing chosen so the judge sees each note exactly on time.

use phi_model::{Chart, NoteKind, Viewport};
use phi_scene::{KinematicsOptions, eval_line_state, note_world_position};

use crate::play_field::{HitEvent, PlayField};
use crate::pointer::{PointerEvent, TimedPointerEvent};

/// Flick swipe length as a fraction of the shorter viewport side.
const FLICK_SWIPE_RATIO: f64 = 0.1;
/// Flick press lead before the hit time.
const FLICK_LEAD: f64 = 0.02;
const FLICK_RELEASE_DELAY: f64 = 0.001;
const DRAG_RELEASE_DELAY: f64 = 0.05;
const HOLD_RELEASE_DELAY: f64 = 0.02;

/// Timed pointer events that play every judgeable note of `chart`.
///
/// The script is sorted by time; events sharing a time keep their
/// generation order.
pub fn autoplay_script(
    chart: &Chart,
    options: &KinematicsOptions,
    viewport: Viewport,
) -> Vec<TimedPointerEvent> {
    let swipe = FLICK_SWIPE_RATIO * viewport.width.min(viewport.height);
    let mut script = Vec::new();
    let mut next_id = 1u64;

    for note in chart.notes.iter().filter(|n| n.is_judgeable()) {
        if note.line >= chart.lines.len() {
            log::debug!("note {} references missing line {}", note.id, note.line);
            continue;
        }
        let hit = note.hit_time;
        let state = eval_line_state(&chart.lines, note.line, hit, options);
        let position = note_world_position(&state, note, note.scroll_at_hit, false, options);
        let id = next_id;
        next_id += 1;

        let down = |time: f64| {
            TimedPointerEvent::new(
                time,
                PointerEvent::Down {
                    id,
                    position: Some(position),
                },
            )
        };
        let up = |time: f64| TimedPointerEvent::new(time, PointerEvent::Up { id });

        match note.kind {
            NoteKind::Tap => {
                script.push(down(hit));
                script.push(up(hit));
            }
            NoteKind::Flick => {
                script.push(down(hit - FLICK_LEAD));
                script.push(TimedPointerEvent::new(
                    hit,
                    PointerEvent::Move {
                        id,
                        position: (position.0, position.1 + swipe),
                    },
                ));
                script.push(up(hit + FLICK_RELEASE_DELAY));
            }
            NoteKind::Drag => {
                script.push(down(hit));
                script.push(up(hit + DRAG_RELEASE_DELAY));
            }
            NoteKind::Hold => {
                script.push(down(hit));
                script.push(up(note.end_time + HOLD_RELEASE_DELAY));
            }
        }
    }

    script.sort_by(|a, b| a.time.total_cmp(&b.time));
    log::debug!("autoplay: {} events for {} pointers", script.len(), next_id - 1);
    script
}

/// Feed `script` into `field`, updating at every frame of `fps` and at every
/// event time, until `end` or the last event.
pub fn play_script(
    field: &mut PlayField<'_>,
    script: &[TimedPointerEvent],
    fps: f64,
    end: f64,
) -> Vec<HitEvent> {
    let step = 1.0 / fps.max(1.0);
    let end = script.last().map_or(end, |e| end.max(e.time));
    let mut out = Vec::new();
    let mut next = 0usize;
    let mut frame = 0u64;
    loop {
        let frame_time = frame as f64 * step;
        let t = match script.get(next) {
            Some(e) if e.time <= frame_time => e.time,
            _ => frame_time,
        };
        if t > end {
            break;
        }
        while next < script.len() && script[next].time <= t {
            out.extend(field.handle(t, script[next].event));
            next += 1;
        }
        out.extend(field.update(t));
        if t >= frame_time {
            frame += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use phi_model::{ChartFormat, ChartMeta, IntegralTrack, LayeredTrack, Line, Note};
    use phi_rule::JudgeConfig;

    use crate::play_field::{HitOutcome, MatcherConfig};

    fn viewport() -> Viewport {
        Viewport::new(1280.0, 720.0)
    }

    fn chart() -> Chart {
        let mut line = Line::new(0);
        line.x = LayeredTrack::constant(640.0);
        line.y = LayeredTrack::constant(500.0);
        line.scroll = IntegralTrack::new([(0.0, 100.0, 400.0, 400.0)]);
        let mut notes = vec![
            Note::new(0, 0, NoteKind::Tap, 0.5),
            Note::new(1, 0, NoteKind::Flick, 1.0),
            Note::new(2, 0, NoteKind::Drag, 1.5),
            Note::new(3, 0, NoteKind::Hold, 2.0),
            Note::new(4, 0, NoteKind::Tap, 4.0),
        ];
        notes[3].end_time = 3.0;
        notes[4].decorative = true;
        for (i, n) in notes.iter_mut().enumerate() {
            n.lateral_offset = i as f64 * 200.0 - 400.0;
            n.scroll_at_hit = line.scroll.integral(n.hit_time);
            n.scroll_at_end = line.scroll.integral(n.end_time);
        }
        Chart::assemble(ChartFormat::Official, 0.0, vec![line], notes, ChartMeta::default())
    }

    #[test]
    fn script_covers_judgeable_notes_only() {
        let c = chart();
        let script = autoplay_script(&c, &KinematicsOptions::default(), viewport());
        assert_eq!(script.len(), 2 + 3 + 2 + 2);
        assert!(script.windows(2).all(|w| w[0].time <= w[1].time));

        let downs: Vec<(f64, Option<(f64, f64)>)> = script
            .iter()
            .filter_map(|e| match e.event {
                PointerEvent::Down { position, .. } => Some((e.time, position)),
                _ => None,
            })
            .collect();
        assert_eq!(downs.len(), 4);
        assert_eq!(downs[0], (0.5, Some((240.0, 500.0))));
        assert!((downs[1].0 - 0.98).abs() < 1e-9);
    }

    #[test]
    fn script_plays_perfectly() {
        let c = chart();
        let script = autoplay_script(&c, &KinematicsOptions::default(), viewport());
        let mut field = PlayField::new(
            &c,
            viewport(),
            JudgeConfig::default(),
            MatcherConfig::default(),
            KinematicsOptions::default(),
        );
        let events = play_script(&mut field, &script, 60.0, c.duration + 1.0);
        assert!(events.iter().all(|e| e.outcome != HitOutcome::Miss));
        let summary = field.summary();
        assert_eq!(summary.score, 1_000_000);
        assert_eq!(summary.max_combo, 4);
        assert_eq!(summary.judged, 4);
    }

    #[test]
    fn close_notes_in_one_lane_play_perfectly() {
        let mut line = Line::new(0);
        line.x = LayeredTrack::constant(640.0);
        line.y = LayeredTrack::constant(500.0);
        line.scroll = IntegralTrack::new([(0.0, 100.0, 400.0, 400.0)]);
        let mut notes = vec![
            Note::new(0, 0, NoteKind::Tap, 1.0),
            Note::new(1, 0, NoteKind::Hold, 1.1),
            Note::new(2, 0, NoteKind::Drag, 1.15),
            Note::new(3, 0, NoteKind::Tap, 2.0),
            Note::new(4, 0, NoteKind::Flick, 2.05),
            Note::new(5, 0, NoteKind::Hold, 2.1),
        ];
        notes[1].end_time = 2.0;
        notes[5].end_time = 2.6;
        for n in notes.iter_mut() {
            n.scroll_at_hit = line.scroll.integral(n.hit_time);
            n.scroll_at_end = line.scroll.integral(n.end_time);
        }
        let c = Chart::assemble(ChartFormat::Official, 0.0, vec![line], notes, ChartMeta::default());

        let script = autoplay_script(&c, &KinematicsOptions::default(), viewport());
        let mut field = PlayField::new(
            &c,
            viewport(),
            JudgeConfig::default(),
            MatcherConfig::default(),
            KinematicsOptions::default(),
        );
        let events = play_script(&mut field, &script, 60.0, c.duration + 1.0);
        assert!(events.iter().all(|e| e.outcome != HitOutcome::Miss));
        let summary = field.summary();
        assert_eq!(summary.score, 1_000_000);
        assert_eq!(summary.max_combo, 6);
    }

    #[test]
    fn play_script_without_events_times_out() {
        let c = chart();
        let mut field = PlayField::new(
            &c,
            viewport(),
            JudgeConfig::default(),
            MatcherConfig::default(),
            KinematicsOptions::default(),
        );
        let events = play_script(&mut field, &[], 30.0, c.duration + 1.0);
        let misses = events.iter().filter(|e| e.outcome == HitOutcome::Miss).count();
        assert_eq!(misses, 4);
        assert_eq!(field.summary().score, 0);
    }
}
