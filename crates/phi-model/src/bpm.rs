//! Beat-to-seconds conversion.

use serde::Deserialize;

const MIN_BPM: f64 = 1e-9;
const DEFAULT_BPM: f64 = 120.0;

/// Seconds per official time unit at 1 BPM (32 units per beat).
pub const OFFICIAL_UNIT_SECONDS: f64 = 1.875;

/// Converts a format-native time position to seconds.
pub trait TimeBase {
    fn to_seconds(&self, position: f64) -> f64;
}

/// Musical position as `bar + numerator / denominator`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(from = "BeatRepr")]
pub struct Beat {
    pub bar: f64,
    pub numerator: f64,
    pub denominator: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BeatRepr {
    Triple(Vec<f64>),
    Flat(f64),
}

impl From<BeatRepr> for Beat {
    fn from(repr: BeatRepr) -> Self {
        match repr {
            BeatRepr::Flat(v) => Beat::new(v, 0.0, 1.0),
            BeatRepr::Triple(parts) => Beat::new(
                parts.first().copied().unwrap_or(0.0),
                parts.get(1).copied().unwrap_or(0.0),
                parts.get(2).copied().unwrap_or(1.0),
            ),
        }
    }
}

impl Beat {
    pub fn new(bar: f64, numerator: f64, denominator: f64) -> Self {
        Self {
            bar,
            numerator,
            denominator,
        }
    }

    /// Flat beat value. A zero denominator counts as the bar alone.
    pub fn value(&self) -> f64 {
        if self.denominator == 0.0 {
            self.bar
        } else {
            self.bar + self.numerator / self.denominator
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BpmEntry {
    pub beat: f64,
    pub bpm: f64,
    /// Seconds elapsed at `beat`.
    pub seconds: f64,
}

/// Sorted tempo table with precomputed second prefixes.
#[derive(Debug, Clone, PartialEq)]
pub struct BpmMap {
    entries: Vec<BpmEntry>,
    /// Per-line time stretch applied after conversion.
    factor: f64,
}

impl Default for BpmMap {
    fn default() -> Self {
        Self::new(std::iter::empty())
    }
}

impl BpmMap {
    /// Build from `(beat, bpm)` pairs in any order.
    ///
    /// Entries sharing a beat keep their authored order, so the later one
    /// governs from that beat on.
    pub fn new(pairs: impl IntoIterator<Item = (f64, f64)>) -> Self {
        let mut raw: Vec<(f64, f64)> = pairs
            .into_iter()
            .filter(|(b, _)| b.is_finite())
            .map(|(b, bpm)| (b, bpm.max(MIN_BPM)))
            .collect();
        if raw.is_empty() {
            raw.push((0.0, DEFAULT_BPM));
        }
        raw.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut entries = Vec::with_capacity(raw.len());
        let mut seconds = 0.0;
        let mut prev: Option<(f64, f64)> = None;
        for (beat, bpm) in raw {
            if let Some((pb, pbpm)) = prev {
                seconds += (beat - pb) * 60.0 / pbpm;
            } else if beat > 0.0 {
                // Time before the first entry runs at its tempo.
                seconds = beat * 60.0 / bpm;
            }
            entries.push(BpmEntry { beat, bpm, seconds });
            prev = Some((beat, bpm));
        }
        Self {
            entries,
            factor: 1.0,
        }
    }

    /// Same table, stretched by a per-line `bpmfactor`.
    pub fn with_factor(&self, factor: f64) -> Self {
        Self {
            entries: self.entries.clone(),
            factor: if factor.is_finite() && factor > 0.0 {
                factor
            } else {
                1.0
            },
        }
    }

    pub fn entries(&self) -> &[BpmEntry] {
        &self.entries
    }

    pub fn beat_to_seconds(&self, beat: f64) -> f64 {
        let idx = self
            .entries
            .partition_point(|e| e.beat <= beat)
            .saturating_sub(1);
        let e = &self.entries[idx];
        (e.seconds + (beat - e.beat) * 60.0 / e.bpm) * self.factor
    }

    pub fn beat_to_seconds_triple(&self, beat: Beat) -> f64 {
        self.beat_to_seconds(beat.value())
    }

    /// Tempo in effect at `beat`.
    pub fn bpm_at(&self, beat: f64) -> f64 {
        let idx = self
            .entries
            .partition_point(|e| e.beat <= beat)
            .saturating_sub(1);
        self.entries[idx].bpm
    }
}

impl TimeBase for BpmMap {
    fn to_seconds(&self, position: f64) -> f64 {
        self.beat_to_seconds(position)
    }
}

/// Flat time units of `1.875 / bpm` seconds each.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitTimeBase {
    pub bpm: f64,
}

impl UnitTimeBase {
    pub fn new(bpm: f64) -> Self {
        Self {
            bpm: bpm.max(MIN_BPM),
        }
    }

    pub fn seconds_per_unit(&self) -> f64 {
        OFFICIAL_UNIT_SECONDS / self.bpm
    }
}

impl TimeBase for UnitTimeBase {
    fn to_seconds(&self, position: f64) -> f64 {
        position * self.seconds_per_unit()
    }
}
