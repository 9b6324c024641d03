//! Judge session for one playback.
//!
//! Owns one [`NoteJudgeState`] per chart note plus the running combo, accuracy
//! and offset history. Every mutation takes the playback time explicitly.

use std::collections::VecDeque;

use phi_model::{Note, NoteKind};

use crate::judge_property::{Grade, JudgeConfig};
use crate::score::{GradeCounts, ScoreSummary, classic_score, weighted_score};

/// Releases this close to the tail count as held to the end.
const TAIL_EPSILON: f64 = 1e-6;

/// Judge state of a single note.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoteJudgeState {
    /// Reached a terminal state (hit, miss or finalized hold)
    pub judged: bool,
    /// Head was hit inside the windows
    pub hit: bool,
    pub missed: bool,
    /// Playback time the miss was recorded
    pub missed_at: Option<f64>,
    /// Final grade; `None` for misses and pending notes
    pub grade: Option<Grade>,
    /// Hold pressed and not yet released
    pub holding: bool,
    /// Hold released before its tail
    pub released_early: bool,
    /// Press-time grade of a hold
    pub hold_grade: Option<Grade>,
    /// Press-time offset of a hold in seconds
    pub hold_offset: f64,
    pub hold_finalized: bool,
    /// Hold missed its press or was released too early
    pub hold_failed: bool,
    /// Next time a hold effect is due
    pub next_hold_fx: f64,
    /// Pointer owning this hold or drag
    pub owner: Option<u64>,
}

impl NoteJudgeState {
    /// Not judged and not in the middle of a hold.
    pub fn is_open(&self) -> bool {
        !self.judged && !self.holding && self.hold_grade.is_none()
    }
}

/// Outcome reported by [`JudgeSession::tick`] and [`JudgeSession::release_hold`].
#[derive(Debug, Clone, PartialEq)]
pub enum JudgeEvent {
    /// Hold finalized with its press-time grade.
    HoldComplete {
        note: usize,
        grade: Grade,
        released_early: bool,
    },
    /// Note timed out or a hold failed.
    Miss {
        note: usize,
        time: f64,
        hold_failed: bool,
    },
}

impl JudgeEvent {
    pub fn note(&self) -> usize {
        match self {
            JudgeEvent::HoldComplete { note, .. } | JudgeEvent::Miss { note, .. } => *note,
        }
    }
}

/// Per-note timing copied out of the chart.
#[derive(Debug, Clone, Copy)]
struct NoteTiming {
    kind: NoteKind,
    hit: f64,
    end: f64,
    judgeable: bool,
}

/// Timing judge over one chart's notes.
///
/// Notes are indexed as in the slice passed to [`JudgeSession::new`], which
/// must be sorted by hit time (as [`phi_model::Chart`] keeps them).
#[derive(Debug, Clone)]
pub struct JudgeSession {
    config: JudgeConfig,
    timings: Vec<NoteTiming>,
    states: Vec<NoteJudgeState>,
    total: u32,
    combo: u32,
    max_combo: u32,
    acc_sum: f64,
    judged: u32,
    counts: GradeCounts,
    early: u32,
    late: u32,
    offsets: VecDeque<f64>,
    /// First note that may still need a timeout or finalization
    cursor: usize,
}

impl JudgeSession {
    pub fn new(notes: &[Note], config: JudgeConfig) -> Self {
        let timings: Vec<NoteTiming> = notes
            .iter()
            .map(|n| NoteTiming {
                kind: n.kind,
                hit: n.hit_time,
                end: n.end_time.max(n.hit_time),
                judgeable: n.is_judgeable(),
            })
            .collect();
        let total = timings.iter().filter(|t| t.judgeable).count() as u32;
        log::debug!("judge session: {} notes, {total} judgeable", timings.len());
        let offsets = VecDeque::with_capacity(config.offset_history);
        Self {
            states: vec![NoteJudgeState::default(); timings.len()],
            timings,
            config,
            total,
            combo: 0,
            max_combo: 0,
            acc_sum: 0.0,
            judged: 0,
            counts: GradeCounts::default(),
            early: 0,
            late: 0,
            offsets,
            cursor: 0,
        }
    }

    /// Back to the start-of-play state.
    pub fn reset(&mut self) {
        for s in &mut self.states {
            *s = NoteJudgeState::default();
        }
        self.combo = 0;
        self.max_combo = 0;
        self.acc_sum = 0.0;
        self.judged = 0;
        self.counts = GradeCounts::default();
        self.early = 0;
        self.late = 0;
        self.offsets.clear();
        self.cursor = 0;
    }

    pub fn config(&self) -> &JudgeConfig {
        &self.config
    }

    pub fn note_count(&self) -> usize {
        self.states.len()
    }

    pub fn state(&self, index: usize) -> Option<&NoteJudgeState> {
        self.states.get(index)
    }

    pub fn states(&self) -> &[NoteJudgeState] {
        &self.states
    }

    /// Index of the earliest note not yet settled.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Whether `index` is a judgeable note that can still be hit.
    pub fn is_open(&self, index: usize) -> bool {
        match (self.timings.get(index), self.states.get(index)) {
            (Some(timing), Some(state)) => timing.judgeable && state.is_open(),
            _ => false,
        }
    }

    /// Hit note `index` at time `t`.
    ///
    /// Returns the grade, or `None` when the note is not open or `t` is
    /// outside the windows for its kind. A hold press starts holding and
    /// bumps combo; its score is committed on finalization.
    pub fn try_hit(&mut self, index: usize, t: f64) -> Option<Grade> {
        if !self.is_open(index) {
            return None;
        }
        let timing = self.timings[index];
        let dt = t - timing.hit;
        let grade = self.config.windows.classify_for(timing.kind, dt)?;
        self.record_offset(dt);

        if timing.kind.is_hold() {
            let state = &mut self.states[index];
            state.hit = true;
            state.holding = true;
            state.hold_grade = Some(grade);
            state.hold_offset = dt;
            state.next_hold_fx = t;
            self.bump_combo();
            log::trace!("note {index}: hold press {} ({dt:+.3})", grade.name());
            return Some(grade);
        }

        let state = &mut self.states[index];
        state.judged = true;
        state.hit = true;
        state.grade = Some(grade);
        if grade.breaks_combo() {
            self.combo = 0;
        } else {
            self.bump_combo();
        }
        self.commit(Some(grade), dt);
        log::trace!("note {index}: {} ({dt:+.3})", grade.name());
        Some(grade)
    }

    /// Release a held hold at time `t`.
    ///
    /// Returns `None` when the note is not being held.
    pub fn release_hold(&mut self, index: usize, t: f64) -> Option<JudgeEvent> {
        let timing = *self.timings.get(index)?;
        if !self.states[index].holding {
            return None;
        }
        if t >= timing.end - TAIL_EPSILON {
            return Some(self.complete_hold(index));
        }
        let duration = timing.end - timing.hit;
        let progress = if duration > TAIL_EPSILON {
            ((t - timing.hit) / duration).clamp(0.0, 1.0)
        } else {
            1.0
        };
        self.states[index].released_early = true;
        if progress < self.config.hold_tolerance {
            log::trace!("note {index}: released at {:.0}%", progress * 100.0);
            self.states[index].hold_failed = true;
            Some(self.miss(index, t))
        } else {
            Some(self.complete_hold(index))
        }
    }

    /// Force note `index` to a miss. Returns whether anything changed.
    pub fn mark_miss(&mut self, index: usize, t: f64) -> bool {
        let Some(timing) = self.timings.get(index).copied() else {
            return false;
        };
        if !timing.judgeable || self.states[index].judged {
            return false;
        }
        if timing.kind.is_hold() {
            self.states[index].hold_failed = true;
        }
        self.miss(index, t);
        true
    }

    /// Run timeouts and hold finalization up to time `t`.
    pub fn tick(&mut self, t: f64) -> Vec<JudgeEvent> {
        let bad = self.config.windows.bad;
        let mut events = Vec::new();
        for index in self.cursor..self.timings.len() {
            let timing = self.timings[index];
            if timing.hit > t {
                break;
            }
            let state = &self.states[index];
            if !timing.judgeable || state.judged {
                continue;
            }
            if timing.kind.is_hold() {
                if state.holding {
                    if t >= timing.end {
                        events.push(self.complete_hold(index));
                    }
                } else if state.hold_grade.is_none() && t > timing.hit + bad {
                    self.states[index].hold_failed = true;
                    events.push(self.miss(index, t));
                }
            } else if t > timing.hit + bad {
                events.push(self.miss(index, t));
            }
        }
        while self.cursor < self.timings.len() && self.is_settled(self.cursor) {
            self.cursor += 1;
        }
        events
    }

    /// Number of hold effects due for note `index` by time `t`, advancing
    /// its schedule by `interval`.
    pub fn hold_fx_due(&mut self, index: usize, t: f64, interval: f64) -> u32 {
        let Some(state) = self.states.get_mut(index) else {
            return 0;
        };
        if !state.holding || interval <= 0.0 || t < state.next_hold_fx {
            return 0;
        }
        let due = ((t - state.next_hold_fx) / interval).floor() + 1.0;
        state.next_hold_fx += due * interval;
        due as u32
    }

    pub fn set_owner(&mut self, index: usize, owner: Option<u64>) {
        if let Some(state) = self.states.get_mut(index) {
            state.owner = owner;
        }
    }

    pub fn owner(&self, index: usize) -> Option<u64> {
        self.states.get(index).and_then(|s| s.owner)
    }

    pub fn combo(&self) -> u32 {
        self.combo
    }

    pub fn max_combo(&self) -> u32 {
        self.max_combo
    }

    pub fn judged_count(&self) -> u32 {
        self.judged
    }

    pub fn judgeable_count(&self) -> u32 {
        self.total
    }

    pub fn counts(&self) -> GradeCounts {
        self.counts
    }

    /// Weighted score in 0..=1,000,000.
    pub fn score(&self) -> u32 {
        weighted_score(self.acc_sum, self.total, self.config.weights.perfect)
    }

    pub fn classic_score(&self) -> u32 {
        classic_score(
            self.acc_sum,
            self.max_combo,
            self.total,
            self.config.weights.perfect,
        )
    }

    /// Weighted accuracy over judged notes in percent; 0 before any judgment.
    pub fn accuracy(&self) -> f64 {
        if self.judged == 0 {
            return 0.0;
        }
        100.0 * self.acc_sum / (f64::from(self.judged) * self.config.weights.perfect)
    }

    /// Median of the recent hit offsets. Positive means hits land late.
    pub fn suggested_offset(&self) -> Option<f64> {
        if self.offsets.is_empty() {
            return None;
        }
        let mut sorted: Vec<f64> = self.offsets.iter().copied().collect();
        sorted.sort_by(f64::total_cmp);
        let mid = sorted.len() / 2;
        Some(if sorted.len() % 2 == 0 {
            0.5 * (sorted[mid - 1] + sorted[mid])
        } else {
            sorted[mid]
        })
    }

    pub fn summary(&self) -> ScoreSummary {
        ScoreSummary {
            score: self.score(),
            classic_score: self.classic_score(),
            accuracy: self.accuracy(),
            combo: self.combo,
            max_combo: self.max_combo,
            counts: self.counts,
            early: self.early,
            late: self.late,
            judged: self.judged,
            total: self.total,
            suggested_offset: self.suggested_offset(),
        }
    }

    fn is_settled(&self, index: usize) -> bool {
        !self.timings[index].judgeable || self.states[index].judged
    }

    fn bump_combo(&mut self) {
        self.combo += 1;
        self.max_combo = self.max_combo.max(self.combo);
    }

    fn record_offset(&mut self, dt: f64) {
        if self.offsets.len() >= self.config.offset_history.max(1) {
            self.offsets.pop_front();
        }
        self.offsets.push_back(dt);
        if dt < 0.0 {
            self.early += 1;
        } else if dt > 0.0 {
            self.late += 1;
        }
    }

    /// Add one finished note to the accuracy and counts.
    fn commit(&mut self, grade: Option<Grade>, dt: f64) {
        if let Some(grade) = grade {
            self.acc_sum += self
                .config
                .weights
                .weight(grade, dt, &self.config.windows);
        }
        self.counts.add(grade);
        self.judged += 1;
    }

    fn complete_hold(&mut self, index: usize) -> JudgeEvent {
        let state = &mut self.states[index];
        let grade = state.hold_grade.unwrap_or(Grade::Good);
        let dt = state.hold_offset;
        let released_early = state.released_early;
        state.holding = false;
        state.hold_finalized = true;
        state.judged = true;
        state.grade = Some(grade);
        state.owner = None;
        self.commit(Some(grade), dt);
        log::trace!("note {index}: hold complete {}", grade.name());
        JudgeEvent::HoldComplete {
            note: index,
            grade,
            released_early,
        }
    }

    fn miss(&mut self, index: usize, t: f64) -> JudgeEvent {
        let is_hold = self.timings[index].kind.is_hold();
        let state = &mut self.states[index];
        state.judged = true;
        state.missed = true;
        state.missed_at = Some(t);
        state.grade = None;
        state.holding = false;
        state.owner = None;
        if is_hold {
            state.hold_finalized = true;
        }
        let hold_failed = state.hold_failed;
        self.combo = 0;
        self.commit(None, 0.0);
        log::trace!("note {index}: miss at {t:.3}");
        JudgeEvent::Miss {
            note: index,
            time: t,
            hold_failed,
        }
    }
}
