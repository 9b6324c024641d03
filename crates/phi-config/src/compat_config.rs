use std::collections::BTreeMap;

use phi_model::ParseOptions;
use phi_scene::KinematicsOptions;
use serde::{Deserialize, Serialize};

/// Switches for reproducing quirks of other players.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct CompatConfig {
    pub speed_affects_travel: bool,
    pub anchor_hold_head: bool,
    /// Forces every line to this opacity
    pub opacity_override: Option<f64>,
    /// Per-line forced opacity, keyed by line index
    pub line_opacity_overrides: BTreeMap<usize, f64>,
    pub flow_speed: f64,
    /// Added to RPE easing ids before lookup
    pub rpe_easing_shift: i32,
}

impl Default for CompatConfig {
    fn default() -> Self {
        Self {
            speed_affects_travel: false,
            anchor_hold_head: false,
            opacity_override: None,
            line_opacity_overrides: BTreeMap::new(),
            flow_speed: 1.0,
            rpe_easing_shift: 0,
        }
    }
}

impl CompatConfig {
    pub fn validate(&mut self) {
        self.flow_speed = if self.flow_speed.is_finite() {
            self.flow_speed.clamp(0.01, 100.0)
        } else {
            1.0
        };
        self.opacity_override = self.opacity_override.filter(|v| v.is_finite());
        self.line_opacity_overrides.retain(|_, v| v.is_finite());
        self.rpe_easing_shift = self.rpe_easing_shift.clamp(-64, 64);
    }

    pub fn kinematics_options(&self) -> KinematicsOptions {
        KinematicsOptions {
            flow_speed: self.flow_speed,
            speed_affects_travel: self.speed_affects_travel,
            anchor_hold_head: self.anchor_hold_head,
            opacity_override: self.opacity_override,
            line_opacity_overrides: self
                .line_opacity_overrides
                .iter()
                .map(|(&k, &v)| (k, v))
                .collect(),
        }
    }

    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            easing_shift: self.rpe_easing_shift,
        }
    }
}
