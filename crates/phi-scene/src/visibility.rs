//! First-visible time precompute and simultaneous-note grouping.
//!
//! A note is assumed to cross into the padded viewport once while scrolling
//! toward its line. The search brackets that crossing by stepping back from
//! the hit time and then bisects it.

use phi_model::{ALWAYS_VISIBLE, Chart, Line, Note, Viewport};

use crate::kinematics::{KinematicsOptions, eval_line_state, note_world_position};

/// Furthest the search looks back from a hit time, in seconds.
pub const LOOKBACK_HORIZON: f64 = 256.0;
const FIRST_STEP: f64 = 1.0 / 30.0;
const MAX_STEPS: usize = 32;
const BISECT_ITERATIONS: usize = 20;
/// Scroll speeds at or below this are treated as stopped.
const STOPPED_SPEED: f64 = 1e-4;
const MIN_MARGIN: f64 = 120.0;
const MARGIN_RATIO: f64 = 0.18;
const FOOTPRINT_W: f64 = 0.06;
const FOOTPRINT_H: f64 = 0.018;
/// Hit times closer than this count as simultaneous.
const MULTI_HIT_EPSILON: f64 = 1e-4;

/// Viewport grown by the margin plus half a note footprint.
#[derive(Debug, Clone, Copy)]
struct Bounds {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl Bounds {
    fn for_note(viewport: Viewport, size: f64) -> Self {
        let margin = MIN_MARGIN.max(MARGIN_RATIO * viewport.width.max(viewport.height));
        let size = size.abs();
        let pad_x = margin + 0.5 * FOOTPRINT_W * viewport.width * size;
        let pad_y = margin + 0.5 * FOOTPRINT_H * viewport.height * size;
        Self {
            min_x: -pad_x,
            min_y: -pad_y,
            max_x: viewport.width + pad_x,
            max_y: viewport.height + pad_y,
        }
    }

    fn contains(&self, (x, y): (f64, f64)) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Whether the segment from `a` to `b` touches the box (slab clipping).
    fn touches_segment(&self, a: (f64, f64), b: (f64, f64)) -> bool {
        let (dx, dy) = (b.0 - a.0, b.1 - a.1);
        let mut lo = 0.0_f64;
        let mut hi = 1.0_f64;
        for (start, delta, min, max) in [
            (a.0, dx, self.min_x, self.max_x),
            (a.1, dy, self.min_y, self.max_y),
        ] {
            if delta.abs() < 1e-12 {
                if start < min || start > max {
                    return false;
                }
                continue;
            }
            let t0 = (min - start) / delta;
            let t1 = (max - start) / delta;
            lo = lo.max(t0.min(t1));
            hi = hi.min(t0.max(t1));
            if lo > hi {
                return false;
            }
        }
        true
    }
}

fn on_screen(
    lines: &[Line],
    note: &Note,
    t: f64,
    bounds: &Bounds,
    options: &KinematicsOptions,
) -> bool {
    let state = eval_line_state(lines, note.line, t, options);
    let head = note_world_position(&state, note, note.scroll_at_hit, false, options);
    if !note.is_hold() {
        return bounds.contains(head);
    }
    let tail = note_world_position(&state, note, note.scroll_at_end, true, options);
    bounds.touches_segment(head, tail)
}

/// Earliest time the note is inside the padded viewport.
///
/// Returns [`ALWAYS_VISIBLE`] for notes that never need a cutoff, and
/// `hit_time - LOOKBACK_HORIZON` when no crossing is found in range.
pub fn first_visible_time(
    lines: &[Line],
    note: &Note,
    viewport: Viewport,
    options: &KinematicsOptions,
) -> f64 {
    if note.decorative || !note.hit_time.is_finite() {
        return ALWAYS_VISIBLE;
    }
    let Some(line) = lines.get(note.line) else {
        return ALWAYS_VISIBLE;
    };
    let speed = line.scroll.speed_at(note.hit_time).unwrap_or(0.0);
    if speed <= STOPPED_SPEED {
        return ALWAYS_VISIBLE;
    }

    let hit = note.hit_time;
    let fallback = hit - LOOKBACK_HORIZON;
    let bounds = Bounds::for_note(viewport, note.size);
    let visible = |t: f64| on_screen(lines, note, t, &bounds, options);

    // Anchor the search at a visible time at or before the hit.
    let anchor = if visible(hit) {
        Some(hit)
    } else {
        back_steps(hit).find(|&t| visible(t))
    };
    let Some(anchor) = anchor else {
        return fallback;
    };

    let mut last_visible = anchor;
    let mut hidden = None;
    for t in back_steps(anchor) {
        if visible(t) {
            last_visible = t;
        } else {
            hidden = Some(t);
            break;
        }
    }
    let Some(mut lo) = hidden else {
        return fallback;
    };

    let mut hi = last_visible;
    for _ in 0..BISECT_ITERATIONS {
        let mid = 0.5 * (lo + hi);
        if visible(mid) {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    hi
}

/// Times `from - step` for doubling steps, stopping at the lookback horizon.
fn back_steps(from: f64) -> impl Iterator<Item = f64> {
    std::iter::successors(Some(FIRST_STEP), |s| Some(s * 2.0))
        .take(MAX_STEPS)
        .take_while(|&s| s <= LOOKBACK_HORIZON)
        .map(move |s| from - s)
}

/// Fill `first_visible` for every note of the chart.
pub fn precompute_first_visible(chart: &mut Chart, viewport: Viewport, options: &KinematicsOptions) {
    let Chart { lines, notes, .. } = chart;
    let mut clamped = 0usize;
    for note in notes.iter_mut() {
        let t = first_visible_time(lines.as_slice(), note, viewport, options);
        if t == note.hit_time - LOOKBACK_HORIZON {
            clamped += 1;
        }
        note.first_visible = t;
    }
    if clamped > 0 {
        log::debug!("{clamped} notes hit the visibility lookback horizon");
    }
}

/// Flag notes sharing a hit time with another judged note.
///
/// `notes` must be sorted by hit time.
pub fn group_simultaneous_notes(notes: &mut [Note]) {
    let judged: Vec<usize> = notes
        .iter()
        .enumerate()
        .filter(|(_, n)| n.is_judgeable())
        .map(|(i, _)| i)
        .collect();
    for n in notes.iter_mut() {
        n.multi_hit = false;
    }
    for pair in judged.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if (notes[b].hit_time - notes[a].hit_time).abs() <= MULTI_HIT_EPSILON {
            notes[a].multi_hit = true;
            notes[b].multi_hit = true;
        }
    }
}
