use std::path::Path;

use anyhow::{Context, Result};
use phi_input::MatcherConfig;
use phi_model::{ParseOptions, Viewport};
use phi_rule::JudgeConfig;
use phi_scene::KinematicsOptions;
use serde::{Deserialize, Serialize};

use crate::compat_config::CompatConfig;

/// Render size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

impl ViewportConfig {
    pub fn validate(&mut self) {
        self.width = self.width.clamp(160, 7680);
        self.height = self.height.clamp(120, 4320);
    }

    pub fn viewport(&self) -> Viewport {
        Viewport::new(f64::from(self.width), f64::from(self.height))
    }
}

/// Everything a playback session needs besides the chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct PlayConfig {
    pub viewport: ViewportConfig,
    pub judge: JudgeConfig,
    pub input: MatcherConfig,
    pub compat: CompatConfig,
    /// Simulation frame rate
    pub fps: u32,
}

impl Default for PlayConfig {
    fn default() -> Self {
        Self {
            viewport: ViewportConfig::default(),
            judge: JudgeConfig::default(),
            input: MatcherConfig::default(),
            compat: CompatConfig::default(),
            fps: 60,
        }
    }
}

impl PlayConfig {
    /// Clamp every field into its valid range.
    pub fn validate(&mut self) {
        self.viewport.validate();
        self.judge.validate();
        self.input.validate();
        self.compat.validate();
        self.fps = self.fps.clamp(1, 1000);
    }

    /// Read config from a JSON file.
    pub fn read(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let mut config: PlayConfig = serde_json::from_str(&data)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.validate();
        log::debug!("loaded play config from {}", path.display());
        Ok(config)
    }

    /// Read `path` when given, defaults otherwise.
    pub fn read_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::read(path),
            None => Ok(Self::default()),
        }
    }

    /// Write config to a JSON file.
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write config {}", path.display()))?;
        Ok(())
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport.viewport()
    }

    pub fn kinematics_options(&self) -> KinematicsOptions {
        self.compat.kinematics_options()
    }

    pub fn parse_options(&self) -> ParseOptions {
        self.compat.parse_options()
    }
}
