//! Project settings: edit range, handle padding, frame rate, resolution.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::foundation::core::{FrameRange, Resolution};
use crate::foundation::error::{PasslineError, PasslineResult};
use crate::scene::paths;

/// Timeline and format settings for one project, with per-asset overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// First frame of the cut.
    pub edit_in: f64,
    /// Last frame of the cut, inclusive.
    pub edit_out: f64,
    /// Frames padded onto both ends of the edit range.
    pub handles: f64,
    /// Project frame rate.
    pub fps: f64,
    /// Output image resolution.
    #[serde(default)]
    pub resolution: Resolution,
    /// Missing override keys fall back to the project values, key by key.
    #[serde(default)]
    pub assets: BTreeMap<String, AssetOverrides>,
}

/// Per-asset replacements for individual project timeline settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssetOverrides {
    /// Replacement cut-in frame.
    pub edit_in: Option<f64>,
    /// Replacement cut-out frame.
    pub edit_out: Option<f64>,
    /// Replacement handle padding.
    pub handles: Option<f64>,
    /// Replacement frame rate.
    pub fps: Option<f64>,
}

impl ProjectConfig {
    /// Parse settings from JSON text.
    pub fn from_json(text: &str) -> PasslineResult<Self> {
        serde_json::from_str(text).map_err(|e| PasslineError::serde(e.to_string()))
    }

    /// Read and parse a settings file.
    pub fn from_path(path: &Path) -> PasslineResult<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| PasslineError::not_found(format!("{}: {e}", path.display())))?;
        Self::from_json(&text)
    }

    fn overrides(&self, asset: Option<&str>) -> Option<&AssetOverrides> {
        self.assets.get(asset?)
    }

    /// Working frame range for an asset: the edit range padded by handles on
    /// both sides. Handle padding under one frame has always meant a
    /// mis-filled setting and is rejected.
    pub fn timeline(&self, asset: Option<&str>) -> PasslineResult<FrameRange> {
        let o = self.overrides(asset);
        let edit_in = o.and_then(|a| a.edit_in).unwrap_or(self.edit_in);
        let edit_out = o.and_then(|a| a.edit_out).unwrap_or(self.edit_out);
        let handles = o.and_then(|a| a.handles).unwrap_or(self.handles);
        if handles < 1.0 {
            return Err(PasslineError::validation(format!(
                "handle padding must be at least one frame, got {handles}"
            )));
        }
        FrameRange::new(edit_in - handles, edit_out + handles, 1.0)
    }

    /// Effective frame rate for an asset.
    pub fn fps(&self, asset: Option<&str>) -> f64 {
        self.overrides(asset)
            .and_then(|a| a.fps)
            .unwrap_or(self.fps)
    }

    /// Host time unit matching the asset's effective frame rate.
    pub fn time_unit(&self, asset: Option<&str>) -> PasslineResult<TimeUnit> {
        TimeUnit::from_fps(self.fps(asset))
    }
}

/// Host time-unit names for the supported frame rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    /// 15 fps.
    Game,
    /// 24 fps, 23.976 included.
    Film,
    /// 30 fps, 29.97 included.
    Ntsc,
    /// 48 fps.
    Show,
    /// 50 fps.
    Palf,
    /// 60 fps.
    Ntscf,
}

impl TimeUnit {
    /// The host accepts a fixed set of rates; anything else is a settings
    /// mistake, not something to round.
    pub fn from_fps(fps: f64) -> PasslineResult<Self> {
        Ok(match fps {
            15.0 => Self::Game,
            23.976 | 24.0 => Self::Film,
            29.97 | 30.0 => Self::Ntsc,
            48.0 => Self::Show,
            50.0 => Self::Palf,
            60.0 => Self::Ntscf,
            _ => {
                return Err(PasslineError::validation(format!(
                    "unsupported frame rate {fps}"
                )));
            }
        })
    }

    /// The unit name as the host spells it.
    pub fn name(self) -> &'static str {
        match self {
            Self::Game => "game",
            Self::Film => "film",
            Self::Ntsc => "ntsc",
            Self::Show => "show",
            Self::Palf => "palf",
            Self::Ntscf => "ntscf",
        }
    }
}

/// One working session: a workspace on disk, the project settings, and
/// optionally the asset being worked on.
#[derive(Debug, Clone)]
pub struct WorkSession {
    /// Root of the working directory on disk.
    pub workspace_dir: String,
    /// Project settings in effect.
    pub project: ProjectConfig,
    /// Asset the session is scoped to, if any.
    pub asset: Option<String>,
}

impl WorkSession {
    /// A session with no asset scope.
    pub fn new(workspace_dir: impl Into<String>, project: ProjectConfig) -> Self {
        Self {
            workspace_dir: workspace_dir.into(),
            project,
            asset: None,
        }
    }

    /// Scope the session to one asset.
    pub fn with_asset(mut self, asset: impl Into<String>) -> Self {
        self.asset = Some(asset.into());
        self
    }

    /// Where rendered frames land for this workspace.
    pub fn output_dir(&self) -> String {
        paths::slash_join(&self.workspace_dir, "renders")
    }

    /// Working frame range for the session's asset scope.
    pub fn timeline(&self) -> PasslineResult<FrameRange> {
        self.project.timeline(self.asset.as_deref())
    }

    /// Host time unit for the session's asset scope.
    pub fn time_unit(&self) -> PasslineResult<TimeUnit> {
        self.project.time_unit(self.asset.as_deref())
    }
}
