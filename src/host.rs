//! Capability interface to the host application that owns the scene and the renderer.
//!
//! The renderer and its document are process-wide singletons in a real host. Passing them around as
//! an explicit `&mut dyn RenderHost` keeps that dependency visible and lets tests substitute a fake.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::channel::Channel;
use crate::foundation::core::FrameBounds;
use crate::foundation::error::{FramepassError, FramepassResult};
use crate::output::format::OutputFormat;
use crate::pipeline::graph::Compositor;

/// Name used for documents that were never saved.
pub const UNTITLED: &str = "untitled";

/// Pixels produced by one render, straight-alpha RGBA `f32` in `0..=1`, row-major, top row first.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderedImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// `width * height * 4` samples.
    pub pixels: Vec<f32>,
}

impl RenderedImage {
    /// Create an image, checking the buffer length against the dimensions.
    pub fn new(width: u32, height: u32, pixels: Vec<f32>) -> FramepassResult<Self> {
        let expected = (width as usize) * (height as usize) * 4;
        if width == 0 || height == 0 {
            return Err(FramepassError::render("rendered image has zero size"));
        }
        if pixels.len() != expected {
            return Err(FramepassError::render(format!(
                "rendered image buffer has {} samples, expected {expected}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Quantize to straight RGBA8.
    pub fn to_rgba8(&self) -> Vec<u8> {
        self.pixels.iter().map(|&v| quantize(v)).collect()
    }

    /// Quantize to RGB8, dropping alpha.
    pub fn to_rgb8(&self) -> Vec<u8> {
        self.pixels
            .chunks_exact(4)
            .flat_map(|px| [quantize(px[0]), quantize(px[1]), quantize(px[2])])
            .collect()
    }
}

fn quantize(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Everything the batch engine needs from the host application.
///
/// Mutating calls change shared document state; the engine restores what it changes.
pub trait RenderHost {
    /// Path of the open document, `None` if it was never saved.
    fn document_path(&self) -> Option<PathBuf>;

    /// Name of the active camera.
    fn active_camera(&self) -> Option<String>;

    /// Name of the active view layer.
    fn view_layer(&self) -> String;

    /// The scene's own frame range.
    fn frame_range(&self) -> FrameBounds;

    /// Current timeline frame.
    fn current_frame(&self) -> i64;

    /// Move the timeline, re-evaluating animation.
    fn set_frame(&mut self, frame: i64);

    /// Image format the host's render settings write.
    fn output_format(&self) -> OutputFormat;

    /// Change the image format in the render settings.
    fn set_output_format(&mut self, format: OutputFormat);

    /// Whether the renderer keeps scene data between renders.
    fn persistent_data(&self) -> bool;

    /// Toggle persistent render data.
    fn set_persistent_data(&mut self, on: bool);

    /// Snapshot of the compositing setup.
    fn compositor(&self) -> Compositor;

    /// Replace the compositing setup.
    fn set_compositor(&mut self, compositor: Compositor);

    /// Passes enabled on the active view layer. `Combined` is implicit and never listed.
    fn enabled_passes(&self) -> BTreeSet<Channel>;

    /// Replace the enabled pass set.
    fn set_enabled_passes(&mut self, passes: BTreeSet<Channel>);

    /// Output sockets the render-layer node currently exposes. Depends on the enabled passes and on
    /// which passes the active render engine supports.
    fn render_layer_sockets(&self) -> Vec<String>;

    /// Render the current frame synchronously. Errors are treated as renderer crashes.
    fn render(&mut self) -> FramepassResult<RenderedImage>;

    /// Save the last in-memory render result directly to `path`.
    fn save_render_result(&mut self, path: &Path, format: OutputFormat) -> FramepassResult<()>;
}

/// Document base name without extension, or [`UNTITLED`].
pub fn document_stem(host: &dyn RenderHost) -> String {
    host.document_path()
        .as_deref()
        .and_then(Path::file_stem)
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string())
}

/// Directory containing the open document, if it was saved.
pub fn document_dir(host: &dyn RenderHost) -> Option<PathBuf> {
    host.document_path()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .filter(|p| !p.as_os_str().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_size_is_checked() {
        assert!(RenderedImage::new(2, 1, vec![0.0; 8]).is_ok());
        assert!(RenderedImage::new(2, 1, vec![0.0; 7]).is_err());
        assert!(RenderedImage::new(0, 1, vec![]).is_err());
    }

    #[test]
    fn quantization_clamps_and_rounds() {
        let img = RenderedImage::new(1, 1, vec![-1.0, 0.5, 2.0, 1.0]).unwrap();
        assert_eq!(img.to_rgba8(), vec![0, 128, 255, 255]);
        assert_eq!(img.to_rgb8(), vec![0, 128, 255]);
    }
}
