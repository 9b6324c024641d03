//! Line transforms and note placement at a playback time.
//!
//! Child lines store their position as an offset from the parent, so a
//! line's world position is its own tracks plus every position ancestor's.
//! Rotation composes the same way along the rotation chain.

use std::collections::HashMap;

use phi_model::{Line, Note};
use serde::{Deserialize, Serialize};

/// Compatibility switches and overrides for scene evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KinematicsOptions {
    /// Global multiplier on note travel distance
    pub flow_speed: f64,
    /// Apply the note speed multiplier to non-hold notes and hold heads
    pub speed_affects_travel: bool,
    /// Keep hold heads from passing through the line before release
    pub anchor_hold_head: bool,
    /// Forces every line to this opacity
    pub opacity_override: Option<f64>,
    /// Forces single lines (by index) to a fixed opacity
    pub line_opacity_overrides: HashMap<usize, f64>,
}

impl Default for KinematicsOptions {
    fn default() -> Self {
        Self {
            flow_speed: 1.0,
            speed_affects_travel: false,
            anchor_hold_head: false,
            opacity_override: None,
            line_opacity_overrides: HashMap::new(),
        }
    }
}

/// Evaluated world transform of one line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineState {
    pub x: f64,
    pub y: f64,
    /// Radians
    pub rotation: f64,
    /// Display opacity in 0..1
    pub opacity: f64,
    /// Accumulated scroll distance in pixels
    pub scroll: f64,
    /// Authored opacity before clamping; negative values are kept
    pub raw_opacity: f64,
}

impl LineState {
    /// Unit vector along the line.
    pub fn tangent(&self) -> (f64, f64) {
        (self.rotation.cos(), self.rotation.sin())
    }

    /// Unit vector perpendicular to the line.
    pub fn normal(&self) -> (f64, f64) {
        (-self.rotation.sin(), self.rotation.cos())
    }
}

/// Evaluate line `index` of `lines` at time `t`.
///
/// # Panics
///
/// If `index` or an ancestor index is out of range. Ancestor chains built by
/// `resolve_hierarchy` always index into the same slice.
pub fn eval_line_state(
    lines: &[Line],
    index: usize,
    t: f64,
    options: &KinematicsOptions,
) -> LineState {
    let line = &lines[index];
    let mut x = line.x.eval(t);
    let mut y = line.y.eval(t);
    for &a in &line.position_ancestors {
        x += lines[a].x.eval(t);
        y += lines[a].y.eval(t);
    }
    let mut rotation = line.rotation.eval(t);
    for &a in &line.rotation_ancestors {
        rotation += lines[a].rotation.eval(t);
    }

    let forced = options
        .opacity_override
        .or_else(|| options.line_opacity_overrides.get(&index).copied());
    let (raw_opacity, opacity) = match forced {
        Some(v) => (v, v.clamp(0.0, 1.0)),
        None => {
            let raw = line.opacity.eval(t);
            (raw, raw.abs().clamp(0.0, 1.0))
        }
    };

    LineState {
        x,
        y,
        rotation,
        opacity,
        scroll: line.scroll.integral(t),
        raw_opacity,
    }
}

/// World position of a note endpoint.
///
/// `scroll_target` is the scroll distance at which the endpoint reaches the
/// line: `scroll_at_hit` for heads, `scroll_at_end` for hold tails.
pub fn note_world_position(
    state: &LineState,
    note: &Note,
    scroll_target: f64,
    is_tail: bool,
    options: &KinematicsOptions,
) -> (f64, f64) {
    let travel = if (note.is_hold() && is_tail) || options.speed_affects_travel {
        note.speed
    } else {
        1.0
    };
    let mut distance = (scroll_target - state.scroll) * options.flow_speed * travel;
    if options.anchor_hold_head && note.is_hold() && !is_tail {
        distance = distance.max(0.0);
    }
    let side = if note.above { 1.0 } else { -1.0 };
    let along_normal = side * distance + note.normal_offset;

    let (tx, ty) = state.tangent();
    let (nx, ny) = state.normal();
    (
        state.x + tx * note.lateral_offset + nx * along_normal,
        state.y + ty * note.lateral_offset + ny * along_normal,
    )
}
