// PEC text chart decoder
//
// One command per line. The first line holds the offset in milliseconds; `bp`
// lines build the tempo table; `c*` lines animate judge lines; a note is an
// `n*` line followed by `#` (speed) and `&` (size, which completes it).
// Coordinates are center-origin on a 2048x1400 canvas with +y upward.

use std::f64::consts::PI;

use crate::bpm::BpmMap;
use crate::chart::{Chart, ChartFormat, ChartMeta, Viewport};
use crate::easing::Easing;
use crate::line::Line;
use crate::note::{Note, NoteKind};
use crate::track::{IntegralTrack, LayeredTrack, Segment, Track};

const CANVAS_HALF_W: f64 = 1024.0;
const CANVAS_HALF_H: f64 = 700.0;
const MAX_LINES: usize = 30;
/// Scroll pixels per speed unit per second on a 900-high viewport.
const SPEED_UNIT_PX: f64 = 120.0;
const REFERENCE_HEIGHT: f64 = 900.0;
/// Scroll keeps running this long past the last note on a line.
const NOTE_TAIL: f64 = 5.0;
/// ... and this long past the last line command.
const COMMAND_TAIL: f64 = 2.0;
const MAX_ALPHA: f64 = 255.0;
const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Command {
    Bpm {
        beat: f64,
        bpm: f64,
    },
    Speed {
        line: usize,
        beat: f64,
        value: f64,
    },
    Place {
        line: usize,
        beat: f64,
        x: f64,
        y: f64,
    },
    Rotate {
        line: usize,
        beat: f64,
        deg: f64,
    },
    Alpha {
        line: usize,
        beat: f64,
        alpha: f64,
    },
    Move {
        line: usize,
        beat: f64,
        end_beat: f64,
        x: f64,
        y: f64,
        easing: i32,
    },
    Turn {
        line: usize,
        beat: f64,
        end_beat: f64,
        deg: f64,
        easing: i32,
    },
    Fade {
        line: usize,
        beat: f64,
        end_beat: f64,
        alpha: f64,
        easing: i32,
    },
    Note(RawNote),
    NoteSpeed(f64),
    NoteSize(f64),
}

impl Command {
    /// Target line of an animation command.
    fn line(&self) -> Option<usize> {
        match *self {
            Command::Speed { line, .. }
            | Command::Place { line, .. }
            | Command::Rotate { line, .. }
            | Command::Alpha { line, .. }
            | Command::Move { line, .. }
            | Command::Turn { line, .. }
            | Command::Fade { line, .. } => Some(line),
            _ => None,
        }
    }

    fn beat(&self) -> f64 {
        match *self {
            Command::Bpm { beat, .. }
            | Command::Speed { beat, .. }
            | Command::Place { beat, .. }
            | Command::Rotate { beat, .. }
            | Command::Alpha { beat, .. }
            | Command::Move { beat, .. }
            | Command::Turn { beat, .. }
            | Command::Fade { beat, .. } => beat,
            Command::Note(n) => n.beat,
            Command::NoteSpeed(_) | Command::NoteSize(_) => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct RawNote {
    kind: NoteKind,
    line: usize,
    beat: f64,
    end_beat: f64,
    x: f64,
    above: bool,
    fake: bool,
    speed: f64,
    size: f64,
}

fn numbers<const N: usize>(args: &[&str]) -> Option<[f64; N]> {
    if args.len() < N {
        return None;
    }
    let mut out = [0.0; N];
    for (slot, arg) in out.iter_mut().zip(args) {
        *slot = arg.parse::<f64>().ok().filter(|v| v.is_finite())?;
    }
    Some(out)
}

fn line_id(v: f64) -> Option<usize> {
    (v >= 0.0 && v.fract() == 0.0).then_some(v as usize)
}

fn parse_command(text: &str) -> Option<Command> {
    let mut parts = text.split_whitespace();
    let head = parts.next()?;
    let args: Vec<&str> = parts.collect();
    let cmd = match head {
        "bp" => {
            let [beat, bpm] = numbers(&args)?;
            Command::Bpm { beat, bpm }
        }
        "cv" => {
            let [l, beat, value] = numbers(&args)?;
            Command::Speed {
                line: line_id(l)?,
                beat,
                value,
            }
        }
        "cp" => {
            let [l, beat, x, y] = numbers(&args)?;
            Command::Place {
                line: line_id(l)?,
                beat,
                x,
                y,
            }
        }
        "cd" => {
            let [l, beat, deg] = numbers(&args)?;
            Command::Rotate {
                line: line_id(l)?,
                beat,
                deg,
            }
        }
        "ca" => {
            let [l, beat, alpha] = numbers(&args)?;
            Command::Alpha {
                line: line_id(l)?,
                beat,
                alpha,
            }
        }
        "cm" => {
            let [l, beat, end_beat, x, y, easing] = numbers(&args)?;
            Command::Move {
                line: line_id(l)?,
                beat,
                end_beat,
                x,
                y,
                easing: easing as i32,
            }
        }
        "cr" => {
            let [l, beat, end_beat, deg, easing] = numbers(&args)?;
            Command::Turn {
                line: line_id(l)?,
                beat,
                end_beat,
                deg,
                easing: easing as i32,
            }
        }
        "cf" => {
            let [l, beat, end_beat, alpha] = numbers(&args)?;
            // Fade easing is optional.
            let easing = numbers::<1>(args.get(4..).unwrap_or_default()).map_or(0, |[e]| e as i32);
            Command::Fade {
                line: line_id(l)?,
                beat,
                end_beat,
                alpha,
                easing,
            }
        }
        "n2" => {
            let [l, beat, end_beat, x, dir, fake] = numbers(&args)?;
            Command::Note(RawNote {
                kind: NoteKind::Hold,
                line: line_id(l)?,
                beat,
                end_beat,
                x,
                above: dir as i64 == 1,
                fake: fake as i64 == 1,
                speed: 1.0,
                size: 1.0,
            })
        }
        "n1" | "n3" | "n4" => {
            let id = head[1..].parse::<i64>().ok()?;
            let [l, beat, x, dir, fake] = numbers(&args)?;
            Command::Note(RawNote {
                kind: NoteKind::from_rpe(id)?,
                line: line_id(l)?,
                beat,
                end_beat: beat,
                x,
                above: dir as i64 == 1,
                fake: fake as i64 == 1,
                speed: 1.0,
                size: 1.0,
            })
        }
        "#" => {
            let [v] = numbers(&args)?;
            Command::NoteSpeed(v)
        }
        "&" => {
            let [v] = numbers(&args)?;
            Command::NoteSize(v)
        }
        _ => return None,
    };
    Some(cmd)
}

/// PEC coordinates in `[-1024, 1024]`; values at or beyond the edge are
/// taken as bottom-left anchored and shifted back.
fn x_to_px(x: f64, width: f64) -> f64 {
    let x = if x.abs() >= CANVAS_HALF_W {
        x - CANVAS_HALF_W
    } else {
        x
    };
    (x + CANVAS_HALF_W) * width / (2.0 * CANVAS_HALF_W)
}

fn y_to_px(y: f64, height: f64) -> f64 {
    let y = if y.abs() >= CANVAS_HALF_H {
        y - CANVAS_HALF_H
    } else {
        y
    };
    height * 0.5 - y * height / (2.0 * CANVAS_HALF_H)
}

/// Per-line animation state while replaying commands in time order.
struct LineBuilder {
    x: Vec<Segment>,
    y: Vec<Segment>,
    rotation: Vec<Segment>,
    alpha: Vec<Segment>,
    speed_keys: Vec<(f64, f64)>,
    cur_x: f64,
    cur_y: f64,
    cur_rotation: f64,
    cur_alpha: f64,
    last_command: f64,
}

impl LineBuilder {
    fn new() -> Self {
        let mut builder = Self {
            x: Vec::new(),
            y: Vec::new(),
            rotation: Vec::new(),
            alpha: Vec::new(),
            speed_keys: Vec::new(),
            cur_x: 0.0,
            cur_y: 0.0,
            cur_rotation: 0.0,
            cur_alpha: MAX_ALPHA,
            last_command: 0.0,
        };
        builder.set_position(0.0, 0.0, 0.0);
        builder.set_rotation(0.0, 0.0);
        builder.set_alpha(0.0, MAX_ALPHA);
        builder
    }

    fn set_position(&mut self, t: f64, x: f64, y: f64) {
        self.x.push(Segment::constant(t, t, x));
        self.y.push(Segment::constant(t, t, y));
        self.cur_x = x;
        self.cur_y = y;
    }

    fn set_rotation(&mut self, t: f64, deg: f64) {
        self.rotation.push(Segment::constant(t, t, deg));
        self.cur_rotation = deg;
    }

    fn set_alpha(&mut self, t: f64, alpha: f64) {
        let alpha = alpha.clamp(0.0, MAX_ALPHA);
        self.alpha.push(Segment::constant(t, t, alpha));
        self.cur_alpha = alpha;
    }

    fn apply(&mut self, t: f64, cmd: &Command, map: &BpmMap) {
        let mut until = t;
        match *cmd {
            Command::Speed { value, .. } => self.speed_keys.push((t, value)),
            Command::Place { x, y, .. } => self.set_position(t, x, y),
            Command::Rotate { deg, .. } => self.set_rotation(t, deg),
            Command::Alpha { alpha, .. } => self.set_alpha(t, alpha),
            Command::Move {
                end_beat,
                x,
                y,
                easing,
                ..
            } => {
                let t1 = map.beat_to_seconds(end_beat);
                if t1 > t + EPSILON {
                    let easing = Easing::from_id(easing);
                    self.x.push(Segment::new(t, t1, self.cur_x, x, easing));
                    self.y.push(Segment::new(t, t1, self.cur_y, y, easing));
                    self.cur_x = x;
                    self.cur_y = y;
                    until = t1;
                } else {
                    self.set_position(t, x, y);
                }
            }
            Command::Turn {
                end_beat,
                deg,
                easing,
                ..
            } => {
                let t1 = map.beat_to_seconds(end_beat);
                if t1 > t + EPSILON {
                    let seg = Segment::new(t, t1, self.cur_rotation, deg, Easing::from_id(easing));
                    self.rotation.push(seg);
                    self.cur_rotation = deg;
                    until = t1;
                } else {
                    self.set_rotation(t, deg);
                }
            }
            Command::Fade {
                end_beat,
                alpha,
                easing,
                ..
            } => {
                let t1 = map.beat_to_seconds(end_beat);
                let alpha = alpha.clamp(0.0, MAX_ALPHA);
                if t1 > t + EPSILON {
                    let seg = Segment::new(t, t1, self.cur_alpha, alpha, Easing::from_id(easing));
                    self.alpha.push(seg);
                    self.cur_alpha = alpha;
                    until = t1;
                } else {
                    self.set_alpha(t, alpha);
                }
            }
            _ => return,
        }
        self.last_command = self.last_command.max(until);
    }

    fn finish(mut self, id: usize, viewport: Viewport, note_end: f64) -> Line {
        let end_time = (note_end + NOTE_TAIL).max(self.last_command + COMMAND_TAIL);
        let (w, h) = (viewport.width, viewport.height);

        let mut line = Line::new(id);
        line.x = LayeredTrack::single(Track::new(self.x, 0.0).map_values(|v| x_to_px(v, w)));
        line.y = LayeredTrack::single(Track::new(self.y, 0.0).map_values(|v| y_to_px(v, h)));
        line.rotation = LayeredTrack::single(
            Track::new(self.rotation, 0.0).map_values(|v| v * PI / 180.0),
        );
        line.opacity = LayeredTrack::single(
            Track::new(self.alpha, MAX_ALPHA).map_values(|v| v / MAX_ALPHA),
        );

        self.speed_keys.sort_by(|a, b| a.0.total_cmp(&b.0));
        if self.speed_keys.is_empty() {
            self.speed_keys.push((0.0, 1.0));
        }
        line.scroll = build_scroll(&self.speed_keys, end_time, SPEED_UNIT_PX * h / REFERENCE_HEIGHT);
        line
    }
}

/// Piecewise-constant velocity cut at every key, 0 and `end_time`.
fn build_scroll(keys: &[(f64, f64)], end_time: f64, px_per_unit: f64) -> IntegralTrack {
    let mut cuts: Vec<f64> = std::iter::once(0.0)
        .chain(keys.iter().map(|k| k.0))
        .chain(std::iter::once(end_time))
        .collect();
    cuts.sort_by(f64::total_cmp);
    cuts.dedup();

    let first = keys.first().map_or(1.0, |k| k.1);
    let ramps = cuts.windows(2).filter(|w| w[1] > w[0]).map(|w| {
        let v = keys
            .iter()
            .take_while(|k| k.0 <= w[0] + EPSILON)
            .last()
            .map_or(first, |k| k.1)
            * px_per_unit;
        (w[0], w[1], v, v)
    });
    IntegralTrack::new(ramps.collect::<Vec<_>>())
}

/// PEC chart decoder
pub struct PecDecoder;

impl PecDecoder {
    /// Decode PEC text. Unreadable lines are skipped, so this never fails.
    pub fn decode_str(text: &str, viewport: Viewport) -> Chart {
        let mut rows = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with("//"))
            .peekable();

        let mut offset = 0.0;
        if let Some(ms) = rows.peek().and_then(|r| r.parse::<f64>().ok()) {
            offset = ms / 1000.0;
            rows.next();
        }

        let mut commands = Vec::new();
        let mut raw_notes = Vec::new();
        let mut pending: Option<RawNote> = None;
        for row in rows {
            let Some(cmd) = parse_command(row) else {
                log::debug!("skipping PEC line: {row}");
                continue;
            };
            match cmd {
                Command::Note(note) => {
                    if pending.is_some() {
                        log::debug!("dropping PEC note without size line");
                    }
                    pending = Some(note);
                }
                Command::NoteSpeed(v) => match pending.as_mut() {
                    Some(n) => n.speed = v,
                    None => log::debug!("PEC speed line without a note"),
                },
                Command::NoteSize(v) => match pending.take() {
                    Some(mut n) => {
                        n.size = v;
                        raw_notes.push(n);
                    }
                    None => log::debug!("PEC size line without a note"),
                },
                other => commands.push(other),
            }
        }

        let bpm_map = BpmMap::new(commands.iter().filter_map(|c| match *c {
            Command::Bpm { beat, bpm } => Some((beat, bpm)),
            _ => None,
        }));

        let referenced = commands
            .iter()
            .filter_map(Command::line)
            .chain(raw_notes.iter().map(|n| n.line))
            .max()
            .map_or(0, |m| m + 1);
        if referenced > MAX_LINES {
            log::warn!("PEC chart references {referenced} lines, keeping the first {MAX_LINES}");
        }
        let line_count = referenced.min(MAX_LINES);

        let mut builders: Vec<LineBuilder> = (0..line_count).map(|_| LineBuilder::new()).collect();
        let mut timed: Vec<(f64, &Command)> = commands
            .iter()
            .filter(|c| c.line().is_some())
            .map(|c| (bpm_map.beat_to_seconds(c.beat()), c))
            .collect();
        timed.sort_by(|a, b| a.0.total_cmp(&b.0));
        for (t, cmd) in timed {
            let Some(builder) = cmd.line().and_then(|l| builders.get_mut(l)) else {
                continue;
            };
            builder.apply(t, cmd, &bpm_map);
        }

        let mut note_end = vec![0.0_f64; line_count];
        for n in &raw_notes {
            if let Some(end) = note_end.get_mut(n.line) {
                *end = end.max(bpm_map.beat_to_seconds(n.end_beat.max(n.beat)));
            }
        }
        let lines: Vec<Line> = builders
            .into_iter()
            .zip(note_end)
            .enumerate()
            .map(|(id, (b, end))| b.finish(id, viewport, end))
            .collect();

        let mut notes = Vec::with_capacity(raw_notes.len());
        for raw in raw_notes {
            let Some(line) = lines.get(raw.line) else {
                log::debug!("dropping PEC note on line {}", raw.line);
                continue;
            };
            notes.push(build_note(notes.len() as u64, line, &raw, &bpm_map, viewport));
        }

        Chart::assemble(ChartFormat::Pec, offset, lines, notes, ChartMeta::default())
    }
}

fn build_note(id: u64, line: &Line, raw: &RawNote, map: &BpmMap, viewport: Viewport) -> Note {
    let hit = map.beat_to_seconds(raw.beat);
    let mut note = Note::new(id, line.id, raw.kind, hit);
    if raw.kind.is_hold() {
        note.end_time = map.beat_to_seconds(raw.end_beat).max(hit);
    }
    note.above = raw.above;
    note.decorative = raw.fake;
    note.lateral_offset = raw.x * viewport.width / (2.0 * CANVAS_HALF_W);
    note.speed = raw.speed;
    note.size = raw.size;
    note.scroll_at_hit = line.scroll.integral(note.hit_time);
    note.scroll_at_end = line.scroll.integral(note.end_time);
    note
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn viewport() -> Viewport {
        Viewport::new(2048.0, 1400.0)
    }

    fn decode(text: &str) -> Chart {
        PecDecoder::decode_str(text, viewport())
    }

    // --- Header and commands ---

    #[test]
    fn offset_and_tempo() {
        let chart = decode("150\nbp 0 120\nbp 4 60\ncv 0 0 1\n");
        assert!((chart.offset - 0.15).abs() < EPS);
        assert_eq!(chart.lines.len(), 1);
    }

    #[test]
    fn missing_offset_line_keeps_first_command() {
        let chart = decode("bp 0 60\nn1 0 1 0 1 0\n# 1\n& 1\n");
        assert_eq!(chart.offset, 0.0);
        assert!((chart.notes[0].hit_time - 1.0).abs() < EPS);
    }

    #[test]
    fn comments_and_garbage_are_skipped() {
        let chart = decode("0\n// header\nbp 0 120\nzz 1 2\ncp nope\nn1 0 1 0 1 0\n# 1\n& 1\n");
        assert_eq!(chart.notes.len(), 1);
    }

    #[test]
    fn empty_text_is_an_empty_chart() {
        let chart = decode("");
        assert!(chart.lines.is_empty());
        assert!(chart.notes.is_empty());
    }

    #[test]
    fn parse_command_variants() {
        assert_eq!(
            parse_command("cm 1 2 3 4 5 6"),
            Some(Command::Move {
                line: 1,
                beat: 2.0,
                end_beat: 3.0,
                x: 4.0,
                y: 5.0,
                easing: 6
            })
        );
        assert_eq!(
            parse_command("cf 0 1 2 100"),
            Some(Command::Fade {
                line: 0,
                beat: 1.0,
                end_beat: 2.0,
                alpha: 100.0,
                easing: 0
            })
        );
        assert_eq!(parse_command("cd -1 0 0"), None);
        assert_eq!(parse_command("n5 0 0 0 1 0"), None);
    }

    // --- Line tracks ---

    #[test]
    fn default_line_sits_at_center() {
        let chart = decode("0\nbp 0 120\ncv 0 0 1\n");
        let line = &chart.lines[0];
        assert!((line.x.eval(1.0) - 1024.0).abs() < EPS);
        assert!((line.y.eval(1.0) - 700.0).abs() < EPS);
        assert!((line.opacity.eval(1.0) - 1.0).abs() < EPS);
    }

    #[test]
    fn instant_set_jumps_and_holds() {
        let chart = decode("0\nbp 0 120\ncp 0 2 512 350\nca 0 2 0\n");
        let line = &chart.lines[0];
        assert!((line.x.eval(0.5) - 1024.0).abs() < EPS);
        assert!((line.x.eval(1.0) - 1536.0).abs() < EPS);
        assert!((line.y.eval(5.0) - 350.0).abs() < EPS);
        assert_eq!(line.opacity.eval(3.0), 0.0);
    }

    #[test]
    fn properties_keep_independent_state() {
        // The rotation starts after the move and must not reset position.
        let chart = decode("0\nbp 0 60\ncm 0 0 2 512 0 1\ncr 0 1 3 90 1\n");
        let line = &chart.lines[0];
        assert!((line.x.eval(1.0) - 1280.0).abs() < EPS);
        assert!((line.x.eval(2.5) - 1536.0).abs() < EPS);
        assert!((line.rotation.eval(2.0) - PI / 4.0).abs() < EPS);
    }

    #[test]
    fn fade_is_clamped_and_normalized() {
        let chart = decode("0\nbp 0 60\ncf 0 0 1 510 1\n");
        let line = &chart.lines[0];
        assert!((line.opacity.eval(2.0) - 1.0).abs() < EPS);
    }

    #[test]
    fn edge_coordinates_are_shifted_back() {
        assert!((x_to_px(1024.0, 2048.0) - 1024.0).abs() < EPS);
        assert!((x_to_px(2048.0, 2048.0) - 2048.0).abs() < EPS);
        assert!((y_to_px(700.0, 1400.0) - 700.0).abs() < EPS);
        assert!((y_to_px(-350.0, 1400.0) - 1050.0).abs() < EPS);
    }

    // --- Scroll ---

    #[test]
    fn scroll_is_piecewise_constant() {
        // 60 BPM: beats are seconds. 120 * 1400 / 900 px per unit.
        let unit = 120.0 * 1400.0 / 900.0;
        let chart = decode("0\nbp 0 60\ncv 0 1 2\ncv 0 3 0\n");
        let scroll = &chart.lines[0].scroll;
        // Before the first key the first value applies.
        assert!((scroll.integral(1.0) - 2.0 * unit).abs() < 1e-6);
        assert!((scroll.integral(3.0) - 6.0 * unit).abs() < 1e-6);
        assert!((scroll.integral(4.0) - 6.0 * unit).abs() < 1e-6);
    }

    #[test]
    fn scroll_runs_past_last_note() {
        let chart = decode("0\nbp 0 60\nn1 0 10 0 1 0\n# 1\n& 1\n");
        let scroll = &chart.lines[0].scroll;
        let unit = 120.0 * 1400.0 / 900.0;
        assert!((scroll.integral(15.0) - 15.0 * unit).abs() < 1e-6);
        assert!((scroll.integral(20.0) - 15.0 * unit).abs() < 1e-6);
    }

    // --- Notes ---

    #[test]
    fn note_fields() {
        let text = "0\nbp 0 60\nn2 0 1 3 512 1 0\n# 2.5\n& 1.5\nn4 0 2 -512 2 1\n# 1\n& 1\n";
        let chart = decode(text);
        assert_eq!(chart.notes.len(), 2);
        let hold = &chart.notes[0];
        assert_eq!(hold.kind, NoteKind::Hold);
        assert!((hold.end_time - 3.0).abs() < EPS);
        assert!(hold.above);
        assert_eq!(hold.speed, 2.5);
        assert_eq!(hold.size, 1.5);
        assert!((hold.lateral_offset - 512.0).abs() < EPS);

        let drag = &chart.notes[1];
        assert_eq!(drag.kind, NoteKind::Drag);
        assert!(!drag.above);
        assert!(drag.decorative);
    }

    #[test]
    fn n3_is_flick() {
        let chart = decode("0\nbp 0 60\nn3 0 1 0 1 0\n# 1\n& 1\n");
        assert_eq!(chart.notes[0].kind, NoteKind::Flick);
    }

    #[test]
    fn note_needs_size_line() {
        let chart = decode("0\nbp 0 60\nn1 0 1 0 1 0\n# 1\nn1 0 2 0 1 0\n# 1\n& 1\n");
        assert_eq!(chart.notes.len(), 1);
        assert!((chart.notes[0].hit_time - 2.0).abs() < EPS);
    }

    #[test]
    fn line_count_is_capped() {
        let chart = decode("0\nbp 0 60\ncv 40 0 1\nn1 35 1 0 1 0\n# 1\n& 1\nn1 3 1 0 1 0\n# 1\n& 1\n");
        assert_eq!(chart.lines.len(), 30);
        assert_eq!(chart.notes.len(), 1);
        assert_eq!(chart.notes[0].line, 3);
    }

    #[test]
    fn note_scroll_matches_line() {
        let chart = decode("0\nbp 0 60\ncv 0 0 1\nn1 0 2 0 1 0\n# 1\n& 1\n");
        let note = &chart.notes[0];
        let unit = 120.0 * 1400.0 / 900.0;
        assert!((note.scroll_at_hit - 2.0 * unit).abs() < 1e-6);
    }
}
