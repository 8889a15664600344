#![forbid(unsafe_code)]
//! Batch still rendering of frame x channel combinations.
//!
//! A [`RenderPlan`] expands a frame expression and a channel selection into work items. The
//! [`BatchRenderDriver`] steps through them against a [`RenderHost`], isolating one channel per
//! render with the [`ChannelConfigurator`] and naming each file from a [`FilenamePattern`].

pub mod channel;
pub mod driver;
pub mod foundation;
pub mod frames;
pub mod host;
pub mod keyframes;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod plan;
pub mod prefs;
pub mod scene;
pub mod testing;

pub use channel::{Channel, ChannelSelection};
pub use driver::{
    BatchRenderDriver, CancelToken, DriverOpts, DriverState, ItemStatus, ProgressEvent,
    RunSummary, Step,
};
pub use foundation::core::{FrameBounds, FrameNumber};
pub use foundation::error::{FramepassError, FramepassResult};
pub use frames::FrameSpec;
pub use host::{RenderHost, RenderedImage, UNTITLED};
pub use keyframes::{
    AnimCurve, AnimatedEntity, AnimationStore, BoundsSource, EntityKind, KeyframePoint,
    KeyframeScanner, Suggestion, suggest_frames,
};
pub use naming::{FilenamePattern, RenderContext, Token, sanitize_file_stem};
pub use output::{
    DiskWriter, ImageWriter, OutputFormat, ensure_writable, locate_output, resolve_output_dir,
};
pub use pipeline::{ChannelConfigurator, ChannelScope, Compositor, NodeGraph, NodeKind};
pub use plan::{FrameChannelPlan, RenderPlan, WorkItem};
pub use prefs::Preferences;
pub use scene::{SceneDocument, SceneHost};
