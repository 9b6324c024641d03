// Timing judge: windows, accuracy weights, per-note state, scoring, calibration

mod judge_property;
pub mod judge_session;
mod score;

pub use judge_property::{Grade, JudgeConfig, JudgeWindows, ScoreWeights};
pub use judge_session::{JudgeEvent, JudgeSession, NoteJudgeState};
pub use score::{GradeCounts, MAX_SCORE, ScoreSummary};
