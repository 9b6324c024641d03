use serde::{Deserialize, Serialize};

use crate::line::Line;
use crate::note::Note;

/// Target render size in pixels; parsers rescale authored coordinates to it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width: width.max(1.0),
            height: height.max(1.0),
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280.0, 720.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChartFormat {
    Official,
    Rpe,
    Pec,
}

impl ChartFormat {
    pub fn name(self) -> &'static str {
        match self {
            ChartFormat::Official => "official",
            ChartFormat::Rpe => "rpe",
            ChartFormat::Pec => "pec",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartMeta {
    pub name: String,
    pub level: String,
    pub composer: String,
    pub charter: String,
    pub song: String,
    pub background: String,
    /// Format revision as authored (formatVersion / RPEVersion)
    pub version: i64,
}

/// Canonical parse result shared by every format.
#[derive(Debug, Clone)]
pub struct Chart {
    pub format: ChartFormat,
    /// Audio offset in seconds, positive delays the chart
    pub offset: f64,
    pub lines: Vec<Line>,
    /// Sorted by hit time; ties keep authoring order
    pub notes: Vec<Note>,
    /// Seconds until the last note tail
    pub duration: f64,
    pub meta: ChartMeta,
}

impl Chart {
    /// Sort notes and derive duration.
    pub fn assemble(
        format: ChartFormat,
        offset: f64,
        lines: Vec<Line>,
        mut notes: Vec<Note>,
        meta: ChartMeta,
    ) -> Self {
        notes.sort_by(|a, b| a.hit_time.total_cmp(&b.hit_time));
        let duration = notes
            .iter()
            .map(|n| n.end_time)
            .filter(|t| t.is_finite())
            .fold(0.0, f64::max);
        Self {
            format,
            offset,
            lines,
            notes,
            duration,
            meta,
        }
    }

    /// Notes the judge counts.
    pub fn judgeable_count(&self) -> usize {
        self.notes.iter().filter(|n| n.is_judgeable()).count()
    }
}
