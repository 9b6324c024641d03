use phi_model::NoteKind;
use serde::{Deserialize, Serialize};

/// Hit grade inside the timing windows. A miss is not a grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grade {
    Perfect,
    Good,
    Bad,
}

impl Grade {
    pub fn breaks_combo(self) -> bool {
        self == Grade::Bad
    }

    pub fn name(self) -> &'static str {
        match self {
            Grade::Perfect => "PERFECT",
            Grade::Good => "GOOD",
            Grade::Bad => "BAD",
        }
    }
}

/// Timing radii in seconds. Perfect is inside Good, which is inside Bad.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JudgeWindows {
    pub perfect: f64,
    pub good: f64,
    pub bad: f64,
}

impl Default for JudgeWindows {
    fn default() -> Self {
        Self {
            perfect: 0.045,
            good: 0.090,
            bad: 0.150,
        }
    }
}

impl JudgeWindows {
    /// Classify a signed offset. Boundaries are inclusive.
    pub fn classify(&self, dt: f64) -> Option<Grade> {
        let d = dt.abs();
        if d <= self.perfect {
            Some(Grade::Perfect)
        } else if d <= self.good {
            Some(Grade::Good)
        } else if d <= self.bad {
            Some(Grade::Bad)
        } else {
            None
        }
    }

    /// Classify and then apply the per-kind leniency rules.
    ///
    /// Drag and flick notes upgrade Good to Perfect and cannot be hit with a
    /// Bad. Hold presses upgrade Bad to Good.
    pub fn classify_for(&self, kind: NoteKind, dt: f64) -> Option<Grade> {
        let grade = self.classify(dt)?;
        match (kind, grade) {
            (NoteKind::Drag | NoteKind::Flick, Grade::Good) => Some(Grade::Perfect),
            (NoteKind::Drag | NoteKind::Flick, Grade::Bad) => None,
            (NoteKind::Hold, Grade::Bad) => Some(Grade::Good),
            _ => Some(grade),
        }
    }

    /// Keep radii positive and nested.
    pub fn validate(&mut self) {
        self.perfect = self.perfect.clamp(0.001, 1.0);
        self.good = self.good.clamp(self.perfect, 1.0);
        self.bad = self.bad.clamp(self.good, 1.0);
    }
}

/// Accuracy contribution per grade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScoreWeights {
    /// Weight of a dead-center Perfect
    pub perfect: f64,
    /// Weight of a Perfect at the edge of its window
    pub perfect_edge: f64,
    pub good: f64,
    pub bad: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            perfect: 1.0,
            perfect_edge: 0.9,
            good: 0.6,
            bad: 0.0,
        }
    }
}

impl ScoreWeights {
    /// Weight for `grade` hit at offset `dt`. Perfect falls off linearly from
    /// the center to `perfect_edge`; an upgraded Perfect outside its window
    /// gets the edge weight.
    pub fn weight(&self, grade: Grade, dt: f64, windows: &JudgeWindows) -> f64 {
        match grade {
            Grade::Perfect => {
                let radius = windows.perfect.max(1e-9);
                let p = (dt.abs() / radius).min(1.0);
                self.perfect - (self.perfect - self.perfect_edge) * p
            }
            Grade::Good => self.good,
            Grade::Bad => self.bad,
        }
    }

    pub fn validate(&mut self) {
        self.perfect = self.perfect.max(1e-6);
        self.perfect_edge = self.perfect_edge.clamp(0.0, self.perfect);
        self.good = self.good.clamp(0.0, self.perfect);
        self.bad = self.bad.clamp(0.0, self.good);
    }
}

/// Judge settings for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JudgeConfig {
    pub windows: JudgeWindows,
    pub weights: ScoreWeights,
    /// Fraction of a hold's duration that must be held for it to count
    pub hold_tolerance: f64,
    /// Number of recent hit offsets kept for calibration
    pub offset_history: usize,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            windows: JudgeWindows::default(),
            weights: ScoreWeights::default(),
            hold_tolerance: 0.8,
            offset_history: 64,
        }
    }
}

impl JudgeConfig {
    pub fn validate(&mut self) {
        self.windows.validate();
        self.weights.validate();
        self.hold_tolerance = self.hold_tolerance.clamp(0.0, 1.0);
        self.offset_history = self.offset_history.clamp(1, 4096);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tap_windows() {
        let w = JudgeWindows::default();
        assert_eq!(w.classify(0.040), Some(Grade::Perfect));
        assert_eq!(w.classify(0.070), Some(Grade::Good));
        assert_eq!(w.classify(0.200), None);
        assert_eq!(w.classify(-0.120), Some(Grade::Bad));
    }

    #[test]
    fn boundaries_are_inclusive() {
        let w = JudgeWindows {
            perfect: 0.5,
            good: 0.75,
            bad: 1.0,
        };
        assert_eq!(w.classify(0.5), Some(Grade::Perfect));
        assert_eq!(w.classify(-0.75), Some(Grade::Good));
        assert_eq!(w.classify(1.0), Some(Grade::Bad));
    }

    #[test]
    fn kind_leniency() {
        let w = JudgeWindows::default();
        assert_eq!(w.classify_for(NoteKind::Drag, 0.07), Some(Grade::Perfect));
        assert_eq!(w.classify_for(NoteKind::Flick, 0.12), None);
        assert_eq!(w.classify_for(NoteKind::Hold, 0.12), Some(Grade::Good));
        assert_eq!(w.classify_for(NoteKind::Tap, 0.12), Some(Grade::Bad));
    }

    #[test]
    fn perfect_weight_gradient() {
        let w = JudgeWindows::default();
        let s = ScoreWeights::default();
        assert_eq!(s.weight(Grade::Perfect, 0.0, &w), 1.0);
        assert!((s.weight(Grade::Perfect, 0.045, &w) - 0.9).abs() < 1e-12);
        assert!((s.weight(Grade::Perfect, -0.0225, &w) - 0.95).abs() < 1e-12);
        // Upgraded Perfect beyond the window stays at the edge weight.
        assert!((s.weight(Grade::Perfect, 0.08, &w) - 0.9).abs() < 1e-12);
        assert_eq!(s.weight(Grade::Good, 0.08, &w), 0.6);
        assert_eq!(s.weight(Grade::Bad, 0.12, &w), 0.0);
    }

    #[test]
    fn validate_nests_windows() {
        let mut w = JudgeWindows {
            perfect: 0.2,
            good: 0.1,
            bad: -1.0,
        };
        w.validate();
        assert_eq!(w.good, 0.2);
        assert_eq!(w.bad, 0.2);
    }

    #[test]
    fn config_deserializes_partially() {
        let c: JudgeConfig = serde_json::from_str(r#"{"holdTolerance": 0.5, "windows": {"bad": 0.2}}"#).unwrap();
        assert_eq!(c.hold_tolerance, 0.5);
        assert_eq!(c.windows.bad, 0.2);
        assert_eq!(c.windows.perfect, 0.045);
        assert_eq!(c.offset_history, 64);
    }
}
