use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// One entry of the unit configuration list. Name, atlas and skeleton paths
/// are required; a record missing any of them is rejected individually at
/// load time.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitDescriptor {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub atlas: String,
    #[serde(default)]
    pub skel: String,
    #[serde(default = "UnitDescriptor::default_scale")]
    pub scale: f32,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub default_anim: Option<String>,
}

impl UnitDescriptor {
    const fn default_scale() -> f32 {
        1.0
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.name.is_empty() {
            return Err("missing unit name");
        }
        if self.atlas.is_empty() {
            return Err("missing atlas path");
        }
        if self.skel.is_empty() {
            return Err("missing skel path");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageConfig {
    #[serde(default)]
    pub units: Vec<UnitDescriptor>,
    /// Ceiling for one frame's animation delta, in seconds.
    #[serde(default = "StageConfig::default_max_frame_delta")]
    pub max_frame_delta: f32,
    /// Whether the output target is composited as premultiplied alpha.
    #[serde(default = "StageConfig::default_premultiplied_output")]
    pub premultiplied_output: bool,
    /// Fallback directory for relative asset paths.
    #[serde(default)]
    pub asset_root: Option<PathBuf>,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            units: Vec::new(),
            max_frame_delta: Self::default_max_frame_delta(),
            premultiplied_output: Self::default_premultiplied_output(),
            asset_root: None,
        }
    }
}

impl StageConfig {
    pub const fn default_max_frame_delta() -> f32 {
        0.05
    }

    const fn default_premultiplied_output() -> bool {
        true
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                eprintln!("Config load error: {err:?}. Falling back to defaults.");
                Self::default()
            }
        }
    }
}
