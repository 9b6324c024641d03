use serde::{Deserialize, Serialize};

use crate::track::Rgb;

/// Sentinel first-visible time for notes that are on screen from the start.
pub const ALWAYS_VISIBLE: f64 = -1e9;

/// The kind of a note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NoteKind {
    Tap,
    Drag,
    Hold,
    Flick,
}

impl NoteKind {
    pub fn is_hold(self) -> bool {
        self == NoteKind::Hold
    }

    /// Official chart kind ids: 1 tap, 2 drag, 3 hold, 4 flick.
    pub fn from_official(kind: i64) -> Option<Self> {
        match kind {
            1 => Some(NoteKind::Tap),
            2 => Some(NoteKind::Drag),
            3 => Some(NoteKind::Hold),
            4 => Some(NoteKind::Flick),
            _ => None,
        }
    }

    /// RPE and PEC kind ids: 1 tap, 2 hold, 3 flick, 4 drag.
    pub fn from_rpe(kind: i64) -> Option<Self> {
        match kind {
            1 => Some(NoteKind::Tap),
            2 => Some(NoteKind::Hold),
            3 => Some(NoteKind::Flick),
            4 => Some(NoteKind::Drag),
            _ => None,
        }
    }
}

/// A single note attached to a judgment line
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub id: u64,
    /// Index of the owning line in `Chart::lines`
    pub line: usize,
    pub kind: NoteKind,
    /// Selects the sign of the normal offset (+1 when set)
    pub above: bool,
    /// Rendered but never judged
    pub decorative: bool,
    /// Hit time in seconds
    pub hit_time: f64,
    /// Tail time in seconds; equals `hit_time` unless Hold
    pub end_time: f64,
    /// Offset along the line tangent in pixels
    pub lateral_offset: f64,
    /// Extra offset along the line normal in pixels
    pub normal_offset: f64,
    pub speed: f64,
    pub size: f64,
    /// 0..1
    pub opacity: f64,
    pub tint: Option<Rgb>,
    pub hit_tint: Option<Rgb>,
    pub hitsound: Option<String>,
    pub scroll_at_hit: f64,
    pub scroll_at_end: f64,
    /// First time the note is on screen; filled by visibility precompute
    pub first_visible: f64,
    /// Shares its hit time with another note
    pub multi_hit: bool,
}

impl Note {
    pub fn new(id: u64, line: usize, kind: NoteKind, hit_time: f64) -> Self {
        Self {
            id,
            line,
            kind,
            above: true,
            decorative: false,
            hit_time,
            end_time: hit_time,
            lateral_offset: 0.0,
            normal_offset: 0.0,
            speed: 1.0,
            size: 1.0,
            opacity: 1.0,
            tint: None,
            hit_tint: None,
            hitsound: None,
            scroll_at_hit: 0.0,
            scroll_at_end: 0.0,
            first_visible: ALWAYS_VISIBLE,
            multi_hit: false,
        }
    }

    pub fn is_hold(&self) -> bool {
        self.kind.is_hold()
    }

    /// Counted by the judge.
    pub fn is_judgeable(&self) -> bool {
        !self.decorative && self.hit_time.is_finite()
    }

    pub fn duration(&self) -> f64 {
        (self.end_time - self.hit_time).max(0.0)
    }
}
