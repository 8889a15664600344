//! Per-channel render pipeline configuration.

pub mod configurator;
pub mod graph;

pub use configurator::{ChannelConfigurator, ChannelScope, ChannelSetup, RestoreToken};
pub use graph::{COMPOSITE_INPUT, Compositor, Link, Node, NodeGraph, NodeKind};
