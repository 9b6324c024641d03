//! Matches pointer gestures to notes and drives the judge.
//!
//! Candidate search looks at a bounded index window around the judge cursor,
//! keeps notes of the allowed kinds inside the timing window and the judge
//! band around the point where the note lands on its line, and picks the one
//! nearest in time.

use std::collections::{BTreeSet, HashMap};

use phi_model::{Chart, Note, NoteKind, Rgb, Viewport};
use phi_rule::{Grade, JudgeConfig, JudgeEvent, JudgeSession, ScoreSummary};
use phi_scene::{KinematicsOptions, eval_line_state, note_world_position};
use serde::{Deserialize, Serialize};

use crate::pointer::{
    Gesture, GestureThresholds, Pointer, PointerChange, PointerEvent, PointerId, PointerTracker,
};

const PERFECT_TINT: Rgb = Rgb::new(255, 236, 160);
const GOOD_TINT: Rgb = Rgb::new(180, 225, 255);
/// Hit times closer than this count as simultaneous when ranking candidates.
const TIME_TIE_EPSILON: f64 = 1e-6;

/// Matching thresholds. Ratios are relative to the viewport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MatcherConfig {
    /// Width of the lateral judge band as a fraction of the viewport width
    pub judge_width: f64,
    /// Band along the line normal as a fraction of the viewport height;
    /// `None` accepts any distance from the line
    pub judge_height: Option<f64>,
    /// Flick distance as a fraction of the shorter viewport side
    pub flick_threshold: f64,
    /// Minimum flick speed in shorter-sides per second
    pub flick_velocity: f64,
    pub tap_max_duration: f64,
    /// Seconds between hold effect ticks
    pub hold_fx_interval: f64,
    /// Notes searched before the judge cursor
    pub search_behind: usize,
    /// Notes searched after the judge cursor
    pub search_ahead: usize,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            judge_width: 0.12,
            judge_height: Some(0.25),
            flick_threshold: 0.02,
            flick_velocity: 0.1,
            tap_max_duration: 0.5,
            hold_fx_interval: 0.2,
            search_behind: 80,
            search_ahead: 900,
        }
    }
}

impl MatcherConfig {
    pub fn validate(&mut self) {
        self.judge_width = self.judge_width.clamp(0.01, 1.0);
        self.judge_height = self.judge_height.map(|h| h.clamp(0.01, 1.0));
        self.flick_threshold = self.flick_threshold.clamp(0.001, 0.08);
        self.flick_velocity = self.flick_velocity.clamp(0.0, 2.0);
        self.tap_max_duration = self.tap_max_duration.clamp(0.05, 2.0);
        self.hold_fx_interval = self.hold_fx_interval.clamp(0.01, 5.0);
        self.search_ahead = self.search_ahead.max(1);
    }

    pub fn thresholds(&self, viewport: Viewport) -> GestureThresholds {
        GestureThresholds::for_viewport(
            viewport,
            self.flick_threshold,
            self.flick_velocity,
            self.tap_max_duration,
        )
    }
}

/// What happened to a note.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum HitOutcome {
    Hit(Grade),
    HoldStart(Grade),
    HoldTick,
    HoldEnd(Grade),
    Miss,
}

/// Judgment feedback for effects and hitsounds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HitEvent {
    pub note: usize,
    pub note_kind: NoteKind,
    pub outcome: HitOutcome,
    pub time: f64,
    pub x: f64,
    pub y: f64,
    pub tint: Rgb,
}

/// One playback's input matching and judging.
pub struct PlayField<'a> {
    chart: &'a Chart,
    viewport: Viewport,
    config: MatcherConfig,
    kinematics: KinematicsOptions,
    session: JudgeSession,
    tracker: PointerTracker,
    /// Holds owned by each pressed pointer
    held: HashMap<PointerId, Vec<usize>>,
    /// Drags touched before their hit time, judged once it arrives
    armed: BTreeSet<usize>,
}

impl<'a> PlayField<'a> {
    pub fn new(
        chart: &'a Chart,
        viewport: Viewport,
        judge: JudgeConfig,
        config: MatcherConfig,
        kinematics: KinematicsOptions,
    ) -> Self {
        let tracker = PointerTracker::new(config.thresholds(viewport));
        Self {
            chart,
            viewport,
            session: JudgeSession::new(&chart.notes, judge),
            tracker,
            config,
            kinematics,
            held: HashMap::new(),
            armed: BTreeSet::new(),
        }
    }

    pub fn session(&self) -> &JudgeSession {
        &self.session
    }

    pub fn summary(&self) -> ScoreSummary {
        self.session.summary()
    }

    /// Restart judging from scratch, dropping every pointer.
    pub fn reset(&mut self) {
        self.session.reset();
        self.tracker = PointerTracker::new(self.config.thresholds(self.viewport));
        self.held.clear();
        self.armed.clear();
    }

    /// Apply one pointer event at time `t`.
    pub fn handle(&mut self, t: f64, event: PointerEvent) -> Vec<HitEvent> {
        let mut out = Vec::new();
        for change in self.tracker.apply(t, event) {
            match change {
                PointerChange::Pressed(pointer) => self.on_press(t, &pointer, &mut out),
                PointerChange::Flicked(pointer) => {
                    self.judge_gesture(t, NoteKind::Flick, pointer.flick_origin(), &mut out);
                }
                PointerChange::Released { pointer, gesture } => {
                    match gesture {
                        Some(Gesture::Tap) => {
                            self.judge_gesture(t, NoteKind::Tap, pointer.position, &mut out);
                        }
                        Some(Gesture::Flick) => {
                            self.judge_gesture(t, NoteKind::Flick, pointer.flick_origin(), &mut out);
                        }
                        None => {}
                    }
                    self.release_holds(t, pointer.id, &mut out);
                }
            }
        }
        out
    }

    /// Advance to time `t`: drag and slide-in hold catches, timeouts, hold finalization and
    /// hold effect ticks.
    pub fn update(&mut self, t: f64) -> Vec<HitEvent> {
        let mut out = Vec::new();
        self.catch_drags(t, &mut out);
        self.catch_holds(t, &mut out);

        for event in self.session.tick(t) {
            let index = event.note();
            self.armed.remove(&index);
            let outcome = match event {
                JudgeEvent::HoldComplete { grade, .. } => HitOutcome::HoldEnd(grade),
                JudgeEvent::Miss { .. } => HitOutcome::Miss,
            };
            out.push(self.hit_event(index, t, outcome));
        }
        let session = &self.session;
        self.held.retain(|&id, notes| {
            notes.retain(|&i| session.owner(i) == Some(id));
            !notes.is_empty()
        });

        let interval = self.config.hold_fx_interval;
        let mut ticks = Vec::new();
        for notes in self.held.values() {
            ticks.extend(notes.iter().copied());
        }
        ticks.sort_unstable();
        for index in ticks {
            for _ in 0..self.session.hold_fx_due(index, t, interval) {
                out.push(self.hit_event(index, t, HitOutcome::HoldTick));
            }
        }
        out
    }

    /// A press starts the nearest hold, unless another note under the
    /// pointer is nearer in time; that note is left to its own gesture.
    fn on_press(&mut self, t: f64, pointer: &Pointer, out: &mut Vec<HitEvent>) {
        let bad = self.session.config().windows.bad;
        let kinds = [NoteKind::Hold, NoteKind::Tap, NoteKind::Flick, NoteKind::Drag];
        let Some(index) = self.find_candidate(&kinds, t, pointer.position, bad) else {
            return;
        };
        if self.chart.notes[index].kind == NoteKind::Hold {
            self.start_hold(index, t, pointer.id, out);
        }
    }

    fn start_hold(&mut self, index: usize, t: f64, id: PointerId, out: &mut Vec<HitEvent>) {
        if let Some(grade) = self.session.try_hit(index, t) {
            self.session.set_owner(index, Some(id));
            self.held.entry(id).or_default().push(index);
            out.push(self.hit_event(index, t, HitOutcome::HoldStart(grade)));
        }
    }

    fn judge_gesture(
        &mut self,
        t: f64,
        kind: NoteKind,
        position: Option<(f64, f64)>,
        out: &mut Vec<HitEvent>,
    ) {
        let bad = self.session.config().windows.bad;
        let Some(index) = self.find_candidate(&[kind], t, position, bad) else {
            log::trace!("{kind:?} gesture at {t:.3} matched nothing");
            return;
        };
        if let Some(grade) = self.session.try_hit(index, t) {
            out.push(self.hit_event(index, t, HitOutcome::Hit(grade)));
        }
    }

    fn release_holds(&mut self, t: f64, id: PointerId, out: &mut Vec<HitEvent>) {
        let Some(notes) = self.held.remove(&id) else {
            return;
        };
        for index in notes {
            if self.session.owner(index) != Some(id) {
                continue;
            }
            let outcome = match self.session.release_hold(index, t) {
                Some(JudgeEvent::HoldComplete { grade, .. }) => HitOutcome::HoldEnd(grade),
                Some(JudgeEvent::Miss { .. }) => HitOutcome::Miss,
                None => continue,
            };
            out.push(self.hit_event(index, t, outcome));
        }
    }

    /// Arm drags touched by any pressed pointer inside the Good window, then
    /// judge armed drags whose hit time has arrived.
    fn catch_drags(&mut self, t: f64, out: &mut Vec<HitEvent>) {
        let chart = self.chart;
        let good = self.session.config().windows.good;
        let (lo, hi) = self.search_range();
        for index in lo..hi {
            let note = &chart.notes[index];
            if note.kind != NoteKind::Drag
                || (t - note.hit_time).abs() > good
                || self.armed.contains(&index)
                || !self.session.is_open(index)
            {
                continue;
            }
            if self
                .tracker
                .pointers()
                .any(|p| self.band_distance(note, t, p.position).is_some())
            {
                self.armed.insert(index);
            }
        }

        let due: Vec<usize> = self
            .armed
            .iter()
            .copied()
            .filter(|&i| chart.notes[i].hit_time <= t)
            .collect();
        for index in due {
            self.armed.remove(&index);
            if let Some(grade) = self.session.try_hit(index, t) {
                out.push(self.hit_event(index, t, HitOutcome::Hit(grade)));
            }
        }
    }

    /// Start holds whose head has reached the line under a pointer that was
    /// already down, as when sliding onto a hold.
    fn catch_holds(&mut self, t: f64, out: &mut Vec<HitEvent>) {
        let chart = self.chart;
        let good = self.session.config().windows.good;
        let (lo, hi) = self.search_range();
        for index in lo..hi {
            let note = &chart.notes[index];
            if note.kind != NoteKind::Hold
                || note.hit_time > t
                || t - note.hit_time > good
                || !self.session.is_open(index)
            {
                continue;
            }
            let pointer = self
                .tracker
                .pointers()
                .filter(|p| p.position.is_some())
                .find(|p| self.band_distance(note, t, p.position).is_some())
                .map(|p| p.id);
            if let Some(id) = pointer {
                self.start_hold(index, t, id, out);
            }
        }
    }

    fn search_range(&self) -> (usize, usize) {
        let cursor = self.session.cursor();
        let lo = cursor.saturating_sub(self.config.search_behind);
        let hi = cursor
            .saturating_add(self.config.search_ahead)
            .min(self.chart.notes.len());
        (lo, hi)
    }

    /// Open note of one of `kinds` nearest in time to `t` within `window` and
    /// the judge band around `position`. Ties go to the note nearest the
    /// pointer along the line.
    fn find_candidate(
        &self,
        kinds: &[NoteKind],
        t: f64,
        position: Option<(f64, f64)>,
        window: f64,
    ) -> Option<usize> {
        let (lo, hi) = self.search_range();
        let mut best: Option<(usize, f64, f64)> = None;
        for index in lo..hi {
            let note = &self.chart.notes[index];
            if !kinds.contains(&note.kind) || !self.session.is_open(index) {
                continue;
            }
            let dt = (t - note.hit_time).abs();
            if dt > window {
                continue;
            }
            if let Some((_, best_dt, _)) = best {
                if dt > best_dt + TIME_TIE_EPSILON {
                    continue;
                }
            }
            let Some(distance) = self.band_distance(note, t, position) else {
                continue;
            };
            let better = match best {
                None => true,
                Some((_, best_dt, best_distance)) => {
                    dt < best_dt - TIME_TIE_EPSILON || distance < best_distance
                }
            };
            if better {
                best = Some((index, dt, distance));
            }
        }
        best.map(|(index, _, _)| index)
    }

    /// Lateral distance from `position` to the note's landing point at time
    /// `t`, or `None` outside the judge band. Positionless pointers are
    /// always inside at distance zero.
    fn band_distance(&self, note: &Note, t: f64, position: Option<(f64, f64)>) -> Option<f64> {
        let Some((px, py)) = position else {
            return Some(0.0);
        };
        let state = eval_line_state(&self.chart.lines, note.line, t, &self.kinematics);
        let (nx, ny) = note_world_position(&state, note, state.scroll, false, &self.kinematics);
        let (dx, dy) = (px - nx, py - ny);

        let (tx, ty) = state.tangent();
        let lateral = (dx * tx + dy * ty).abs();
        if lateral > 0.5 * self.config.judge_width * self.viewport.width {
            return None;
        }
        if let Some(h) = self.config.judge_height {
            let (mx, my) = state.normal();
            if (dx * mx + dy * my).abs() > 0.5 * h * self.viewport.height {
                return None;
            }
        }
        Some(lateral)
    }

    fn hit_event(&self, index: usize, t: f64, outcome: HitOutcome) -> HitEvent {
        let note = &self.chart.notes[index];
        let state = eval_line_state(&self.chart.lines, note.line, t, &self.kinematics);
        // Hold ticks sit on the line; everything else at the note's head.
        let target = match outcome {
            HitOutcome::HoldTick => state.scroll,
            _ => note.scroll_at_hit,
        };
        let (x, y) = note_world_position(&state, note, target, false, &self.kinematics);
        let grade_tint = match outcome {
            HitOutcome::Hit(Grade::Perfect)
            | HitOutcome::HoldStart(Grade::Perfect)
            | HitOutcome::HoldEnd(Grade::Perfect)
            | HitOutcome::HoldTick => PERFECT_TINT,
            HitOutcome::Hit(Grade::Good)
            | HitOutcome::HoldStart(Grade::Good)
            | HitOutcome::HoldEnd(Grade::Good) => GOOD_TINT,
            _ => Rgb::WHITE,
        };
        HitEvent {
            note: index,
            note_kind: note.kind,
            outcome,
            time: t,
            x,
            y,
            tint: note.hit_tint.unwrap_or(grade_tint),
        }
    }
}
