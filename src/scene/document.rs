use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::channel::Channel;
use crate::foundation::core::FrameBounds;
use crate::foundation::error::{FramepassError, FramepassResult};
use crate::keyframes::AnimatedEntity;
use crate::output::format::OutputFormat;
use crate::pipeline::graph::Compositor;

/// Serialized scene: document settings, render settings, geometry and animation.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SceneDocument {
    /// When absent, the scene file itself stands in for the document.
    #[serde(default)]
    pub document_path: Option<PathBuf>,
    #[serde(default)]
    pub camera: Option<String>,
    #[serde(default = "default_view_layer")]
    pub view_layer: String,
    pub frame_range: FrameBounds,
    #[serde(default = "default_frame")]
    pub current_frame: i64,
    #[serde(default = "default_resolution")]
    pub resolution: [u32; 2],
    #[serde(default)]
    pub output_format: OutputFormat,
    #[serde(default)]
    pub persistent_data: bool,
    #[serde(default)]
    pub enabled_passes: BTreeSet<Channel>,
    /// Passes the engine can produce; others render as combined.
    #[serde(default = "all_passes")]
    pub supported_passes: BTreeSet<Channel>,
    #[serde(default)]
    pub compositor: Compositor,
    #[serde(default)]
    pub sphere: Sphere,
    #[serde(default)]
    pub mist: Mist,
    #[serde(default)]
    pub animation: Vec<AnimatedEntity>,
}

/// Sphere resting over a ground plane at `y = 0`.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Sphere {
    pub name: String,
    pub material: String,
    pub center: [f64; 3],
    pub radius: f64,
    pub color: [f32; 3],
    pub emission_strength: f32,
}

impl Default for Sphere {
    fn default() -> Self {
        Self {
            name: "Sphere".to_string(),
            material: "SphereMaterial".to_string(),
            center: [0.0, 1.0, -4.0],
            radius: 1.0,
            color: [0.8, 0.25, 0.2],
            emission_strength: 0.0,
        }
    }
}

/// Mist pass falloff.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Mist {
    pub start: f64,
    pub depth: f64,
}

impl Default for Mist {
    fn default() -> Self {
        Self {
            start: 2.0,
            depth: 20.0,
        }
    }
}

impl SceneDocument {
    /// Parse and check a scene document.
    pub fn from_json(text: &str) -> FramepassResult<Self> {
        let doc: Self =
            serde_json::from_str(text).map_err(|e| FramepassError::serde(e.to_string()))?;
        doc.validate()?;
        Ok(doc)
    }

    /// Reject documents the renderer cannot handle.
    pub fn validate(&self) -> FramepassResult<()> {
        if self.frame_range.lo > self.frame_range.hi {
            return Err(FramepassError::validation(format!(
                "scene frame range {}-{} is reversed",
                self.frame_range.lo, self.frame_range.hi
            )));
        }
        let [w, h] = self.resolution;
        if w == 0 || h == 0 || w > 16_384 || h > 16_384 {
            return Err(FramepassError::validation(format!(
                "scene resolution {w}x{h} is out of range"
            )));
        }
        if !(self.sphere.radius.is_finite() && self.sphere.radius > 0.0) {
            return Err(FramepassError::validation("sphere radius must be > 0"));
        }
        if !(self.mist.depth.is_finite() && self.mist.depth > 0.0) {
            return Err(FramepassError::validation("mist depth must be > 0"));
        }
        if let Some(graph) = &self.compositor.graph {
            graph.check()?;
        }
        Ok(())
    }
}

fn default_view_layer() -> String {
    "ViewLayer".to_string()
}

fn default_frame() -> i64 {
    1
}

fn default_resolution() -> [u32; 2] {
    [64, 48]
}

fn all_passes() -> BTreeSet<Channel> {
    Channel::ALL.into_iter().collect()
}
