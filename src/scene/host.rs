use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::channel::Channel;
use crate::foundation::core::FrameBounds;
use crate::foundation::error::{FramepassError, FramepassResult};
use crate::host::{RenderHost, RenderedImage};
use crate::keyframes::{AnimatedEntity, AnimationStore};
use crate::output::format::OutputFormat;
use crate::output::writer::write_image;
use crate::pipeline::graph::Compositor;
use crate::scene::document::SceneDocument;
use crate::scene::raster::render_channel;

/// [`RenderHost`] backed by a JSON scene document and the procedural CPU renderer.
#[derive(Clone, Debug)]
pub struct SceneHost {
    doc: SceneDocument,
    source: Option<PathBuf>,
    last_render: Option<RenderedImage>,
}

impl SceneHost {
    /// Host over an in-memory document.
    pub fn new(doc: SceneDocument) -> Self {
        Self {
            doc,
            source: None,
            last_render: None,
        }
    }

    /// Read a scene document from `path`.
    pub fn load(path: &Path) -> FramepassResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| FramepassError::io(format!("read scene '{}'", path.display()), e))?;
        let doc = SceneDocument::from_json(&text)?;
        tracing::debug!(path = %path.display(), frames = ?doc.frame_range, "loaded scene");
        Ok(Self {
            doc,
            source: Some(path.to_path_buf()),
            last_render: None,
        })
    }

    /// Current document state.
    pub fn document(&self) -> &SceneDocument {
        &self.doc
    }

    /// Channel the compositor currently sends to the output. Links from sockets the render layer
    /// does not expose fall back to combined.
    fn output_channel(&self) -> Channel {
        let Some(socket) = self.doc.compositor.routed_socket() else {
            return Channel::Combined;
        };
        let exposed = self.render_layer_sockets().iter().any(|s| s == socket);
        Channel::ALL
            .into_iter()
            .find(|c| exposed && c.socket() == socket)
            .unwrap_or(Channel::Combined)
    }
}

impl RenderHost for SceneHost {
    fn document_path(&self) -> Option<PathBuf> {
        self.doc.document_path.clone().or_else(|| self.source.clone())
    }

    fn active_camera(&self) -> Option<String> {
        self.doc.camera.clone()
    }

    fn view_layer(&self) -> String {
        self.doc.view_layer.clone()
    }

    fn frame_range(&self) -> FrameBounds {
        self.doc.frame_range
    }

    fn current_frame(&self) -> i64 {
        self.doc.current_frame
    }

    fn set_frame(&mut self, frame: i64) {
        self.doc.current_frame = frame;
    }

    fn output_format(&self) -> OutputFormat {
        self.doc.output_format
    }

    fn set_output_format(&mut self, format: OutputFormat) {
        self.doc.output_format = format;
    }

    fn persistent_data(&self) -> bool {
        self.doc.persistent_data
    }

    fn set_persistent_data(&mut self, on: bool) {
        self.doc.persistent_data = on;
    }

    fn compositor(&self) -> Compositor {
        self.doc.compositor.clone()
    }

    fn set_compositor(&mut self, compositor: Compositor) {
        self.doc.compositor = compositor;
    }

    fn enabled_passes(&self) -> BTreeSet<Channel> {
        self.doc.enabled_passes.clone()
    }

    fn set_enabled_passes(&mut self, passes: BTreeSet<Channel>) {
        self.doc.enabled_passes = passes;
    }

    fn render_layer_sockets(&self) -> Vec<String> {
        Channel::ALL
            .iter()
            .filter(|c| {
                c.is_combined()
                    || (self.doc.enabled_passes.contains(c)
                        && self.doc.supported_passes.contains(c))
            })
            .map(|c| c.socket().to_string())
            .collect()
    }

    fn render(&mut self) -> FramepassResult<RenderedImage> {
        let channel = self.output_channel();
        let image = render_channel(&self.doc, self.doc.current_frame, channel)?;
        self.last_render = Some(image.clone());
        Ok(image)
    }

    fn save_render_result(&mut self, path: &Path, format: OutputFormat) -> FramepassResult<()> {
        let image = self
            .last_render
            .as_ref()
            .ok_or_else(|| FramepassError::render("no render result to save"))?;
        write_image(image, path, format)
    }
}

impl AnimationStore for SceneHost {
    fn animated_entities(&self) -> &[AnimatedEntity] {
        &self.doc.animation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::configurator::ChannelScope;

    fn host() -> SceneHost {
        SceneHost::new(
            SceneDocument::from_json(
                r#"{"frame_range": {"lo": 1, "hi": 5}, "resolution": [8, 6],
                    "supported_passes": ["Depth", "Normal"]}"#,
            )
            .unwrap(),
        )
    }

    #[test]
    fn routed_pass_changes_the_render() {
        let mut host = host();
        let combined = host.render().unwrap();
        let depth = {
            let mut scope = ChannelScope::configure(&mut host, Channel::Depth);
            assert!(!scope.degraded());
            scope.host().render().unwrap()
        };
        assert_ne!(combined, depth);
        assert_eq!(host.render().unwrap(), combined);
        assert!(host.enabled_passes().is_empty());
    }

    #[test]
    fn unsupported_pass_renders_combined() {
        let mut host = host();
        let combined = host.render().unwrap();
        let mut scope = ChannelScope::configure(&mut host, Channel::Mist);
        assert!(scope.degraded());
        assert_eq!(scope.host().render().unwrap(), combined);
    }

    #[test]
    fn in_memory_document_is_untitled() {
        let host = host();
        assert_eq!(host.document_path(), None);
        assert_eq!(crate::host::document_stem(&host), crate::host::UNTITLED);
    }
}
