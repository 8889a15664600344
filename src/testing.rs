//! In-memory host fakes for exercising the batch engine without a real renderer.
//!
//! [`RecordingHost`] keeps every piece of document state the engine touches and logs each
//! mutating call, so tests can assert on ordering and on the no-residual-state guarantee.
//! [`DroppingWriter`], [`FailingWriter`] and [`FlakyWriter`] stand in for the disk writer when a
//! test needs the verification or fallback paths.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::channel::Channel;
use crate::foundation::core::FrameBounds;
use crate::foundation::error::{FramepassError, FramepassResult};
use crate::host::{RenderHost, RenderedImage};
use crate::keyframes::{AnimatedEntity, AnimationStore};
use crate::output::format::OutputFormat;
use crate::output::writer::{ImageWriter, write_image};
use crate::pipeline::graph::Compositor;

/// One mutating call observed by [`RecordingHost`].
#[derive(Clone, Debug, PartialEq)]
pub enum HostCall {
    SetFrame(i64),
    SetOutputFormat(OutputFormat),
    SetPersistentData(bool),
    SetCompositor(Compositor),
    SetPasses(BTreeSet<Channel>),
    /// `routed` is the socket feeding the composite output, `None` for the default output.
    Render {
        frame: i64,
        routed: Option<String>,
    },
    SaveRenderResult(PathBuf),
}

/// Scriptable [`RenderHost`] that records what the engine does to it.
#[derive(Clone, Debug)]
pub struct RecordingHost {
    pub document_path: Option<PathBuf>,
    pub camera: Option<String>,
    pub view_layer: String,
    pub frame_range: FrameBounds,
    pub frame: i64,
    pub format: OutputFormat,
    pub persistent_data: bool,
    pub compositor: Compositor,
    pub passes: BTreeSet<Channel>,
    /// Passes the fake engine exposes as render-layer sockets.
    pub supported: BTreeSet<Channel>,
    /// `render` errors at these frames.
    pub fail_render_frames: BTreeSet<i64>,
    /// `save_render_result` always errors.
    pub fail_fallback_save: bool,
    pub entities: Vec<AnimatedEntity>,
    pub calls: Vec<HostCall>,
    last_render: Option<RenderedImage>,
}

impl Default for RecordingHost {
    fn default() -> Self {
        Self {
            document_path: Some(PathBuf::from("/projects/shot.blend")),
            camera: Some("Camera".to_string()),
            view_layer: "ViewLayer".to_string(),
            frame_range: FrameBounds { lo: 1, hi: 250 },
            frame: 1,
            format: OutputFormat::Png,
            persistent_data: false,
            compositor: Compositor::default(),
            passes: BTreeSet::new(),
            supported: Channel::ALL.into_iter().collect(),
            fail_render_frames: BTreeSet::new(),
            fail_fallback_save: false,
            entities: Vec::new(),
            calls: Vec::new(),
            last_render: None,
        }
    }
}

impl RecordingHost {
    /// Host whose engine supports only `supported` besides Combined.
    pub fn supporting(supported: impl IntoIterator<Item = Channel>) -> Self {
        Self {
            supported: supported.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Recorded renders as `(frame, routed socket)`.
    pub fn renders(&self) -> Vec<(i64, Option<String>)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                HostCall::Render { frame, routed } => Some((*frame, routed.clone())),
                _ => None,
            })
            .collect()
    }

    /// Number of recorded calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&HostCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    /// Gray level the fake encodes for a routed socket, so written files reveal their channel.
    pub fn shade_for(routed: Option<&str>) -> f32 {
        let index = Channel::ALL
            .iter()
            .position(|c| Some(c.socket()) == routed)
            .unwrap_or(0);
        index as f32 / 8.0
    }
}

impl RenderHost for RecordingHost {
    fn document_path(&self) -> Option<PathBuf> {
        self.document_path.clone()
    }

    fn active_camera(&self) -> Option<String> {
        self.camera.clone()
    }

    fn view_layer(&self) -> String {
        self.view_layer.clone()
    }

    fn frame_range(&self) -> FrameBounds {
        self.frame_range
    }

    fn current_frame(&self) -> i64 {
        self.frame
    }

    fn set_frame(&mut self, frame: i64) {
        self.frame = frame;
        self.calls.push(HostCall::SetFrame(frame));
    }

    fn output_format(&self) -> OutputFormat {
        self.format
    }

    fn set_output_format(&mut self, format: OutputFormat) {
        self.format = format;
        self.calls.push(HostCall::SetOutputFormat(format));
    }

    fn persistent_data(&self) -> bool {
        self.persistent_data
    }

    fn set_persistent_data(&mut self, on: bool) {
        self.persistent_data = on;
        self.calls.push(HostCall::SetPersistentData(on));
    }

    fn compositor(&self) -> Compositor {
        self.compositor.clone()
    }

    fn set_compositor(&mut self, compositor: Compositor) {
        self.calls.push(HostCall::SetCompositor(compositor.clone()));
        self.compositor = compositor;
    }

    fn enabled_passes(&self) -> BTreeSet<Channel> {
        self.passes.clone()
    }

    fn set_enabled_passes(&mut self, passes: BTreeSet<Channel>) {
        self.calls.push(HostCall::SetPasses(passes.clone()));
        self.passes = passes;
    }

    fn render_layer_sockets(&self) -> Vec<String> {
        Channel::ALL
            .iter()
            .filter(|c| {
                c.is_combined() || (self.passes.contains(c) && self.supported.contains(c))
            })
            .map(|c| c.socket().to_string())
            .collect()
    }

    fn render(&mut self) -> FramepassResult<RenderedImage> {
        let routed = self.compositor.routed_socket().map(str::to_string);
        self.calls.push(HostCall::Render {
            frame: self.frame,
            routed: routed.clone(),
        });
        if self.fail_render_frames.contains(&self.frame) {
            return Err(FramepassError::render(format!(
                "renderer crashed on frame {}",
                self.frame
            )));
        }
        let v = Self::shade_for(routed.as_deref());
        let image = RenderedImage::new(2, 2, [v, v, v, 1.0].repeat(4))?;
        self.last_render = Some(image.clone());
        Ok(image)
    }

    fn save_render_result(&mut self, path: &Path, format: OutputFormat) -> FramepassResult<()> {
        self.calls.push(HostCall::SaveRenderResult(path.to_path_buf()));
        if self.fail_fallback_save {
            return Err(FramepassError::render("direct save refused"));
        }
        let image = self
            .last_render
            .as_ref()
            .ok_or_else(|| FramepassError::render("no render result to save"))?;
        write_image(image, path, format)
    }
}

impl AnimationStore for RecordingHost {
    fn animated_entities(&self) -> &[AnimatedEntity] {
        &self.entities
    }
}

/// Writer that reports success without creating a file, so post-write verification fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct DroppingWriter;

impl ImageWriter for DroppingWriter {
    fn write(&mut self, _: &RenderedImage, _: &Path, _: OutputFormat) -> FramepassResult<()> {
        Ok(())
    }
}

/// Writer that always fails with an I/O error.
#[derive(Clone, Copy, Debug, Default)]
pub struct FailingWriter;

impl ImageWriter for FailingWriter {
    fn write(&mut self, _: &RenderedImage, path: &Path, _: OutputFormat) -> FramepassResult<()> {
        Err(FramepassError::io(
            format!("write image '{}'", path.display()),
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only volume"),
        ))
    }
}

/// Writer whose first `failures` writes fail like [`FailingWriter`]; later writes go to disk.
#[derive(Clone, Copy, Debug, Default)]
pub struct FlakyWriter {
    pub failures: usize,
}

impl ImageWriter for FlakyWriter {
    fn write(&mut self, image: &RenderedImage, path: &Path, format: OutputFormat) -> FramepassResult<()> {
        if self.failures > 0 {
            self.failures -= 1;
            return FailingWriter.write(image, path, format);
        }
        write_image(image, path, format)
    }
}
