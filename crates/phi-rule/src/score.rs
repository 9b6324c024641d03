use serde::{Deserialize, Serialize};

use crate::judge_property::Grade;

/// Score of a flawless run.
pub const MAX_SCORE: u32 = 1_000_000;

/// Per-grade note counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeCounts {
    pub perfect: u32,
    pub good: u32,
    pub bad: u32,
    pub miss: u32,
}

impl GradeCounts {
    pub fn add(&mut self, grade: Option<Grade>) {
        match grade {
            Some(Grade::Perfect) => self.perfect += 1,
            Some(Grade::Good) => self.good += 1,
            Some(Grade::Bad) => self.bad += 1,
            None => self.miss += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.perfect + self.good + self.bad + self.miss
    }
}

/// Snapshot of a judge session's results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSummary {
    /// Weighted score in 0..=1,000,000
    pub score: u32,
    /// 90% accuracy plus 10% max combo, in 0..=1,000,000
    pub classic_score: u32,
    /// Weighted accuracy over judged notes, in percent
    pub accuracy: f64,
    pub combo: u32,
    pub max_combo: u32,
    pub counts: GradeCounts,
    /// Hits before the note's time
    pub early: u32,
    /// Hits after the note's time
    pub late: u32,
    pub judged: u32,
    pub total: u32,
    /// Median of recent hit offsets in seconds
    pub suggested_offset: Option<f64>,
}

impl ScoreSummary {
    pub fn is_full_combo(&self) -> bool {
        self.total > 0 && self.max_combo == self.total
    }

    pub fn is_all_perfect(&self) -> bool {
        self.total > 0 && self.counts.perfect == self.total
    }
}

/// Weighted score: accuracy sum over the best possible sum.
pub(crate) fn weighted_score(acc_sum: f64, total: u32, perfect_weight: f64) -> u32 {
    if total == 0 {
        return 0;
    }
    let ratio = (acc_sum / (f64::from(total) * perfect_weight)).clamp(0.0, 1.0);
    (ratio * f64::from(MAX_SCORE) + 1e-6).floor() as u32
}

/// Classic split: 900,000 for accuracy and 100,000 for max combo.
pub(crate) fn classic_score(acc_sum: f64, max_combo: u32, total: u32, perfect_weight: f64) -> u32 {
    if total == 0 {
        return 0;
    }
    let total = f64::from(total);
    let acc = (acc_sum / (total * perfect_weight)).clamp(0.0, 1.0);
    let combo = (f64::from(max_combo) / total).clamp(0.0, 1.0);
    (900_000.0 * acc + 100_000.0 * combo + 1e-6).floor() as u32
}
