use std::collections::BTreeSet;

use crate::channel::Channel;
use crate::host::RenderHost;
use crate::pipeline::graph::{COMPOSITE_INPUT, Compositor, NodeGraph, NodeKind};

/// Opaque capture of the pipeline state a [`ChannelConfigurator::configure`] call replaced.
///
/// Holds whether compositing was on, the full prior graph (or its absence) and the prior pass set.
/// The combined channel captures nothing.
#[derive(Debug)]
#[must_use = "a RestoreToken must be passed to ChannelConfigurator::restore"]
pub struct RestoreToken {
    channel: Channel,
    prior: Option<PriorState>,
}

#[derive(Debug)]
struct PriorState {
    compositor: Compositor,
    passes: BTreeSet<Channel>,
}

impl RestoreToken {
    /// Channel the pipeline was configured for.
    pub fn channel(&self) -> Channel {
        self.channel
    }
}

/// Result of configuring the pipeline for one channel.
#[derive(Debug)]
pub struct ChannelSetup {
    /// Pass to [`ChannelConfigurator::restore`] after the render.
    pub token: RestoreToken,
    /// `true` when the engine cannot produce the channel and the render falls back to combined.
    pub degraded: bool,
}

/// Rewires the host's output graph so the next render emits exactly one channel.
pub struct ChannelConfigurator;

impl ChannelConfigurator {
    /// Prepare the host so its next render produces `channel`.
    ///
    /// Combined is a no-op. Any other channel gets its pass enabled on the view layer and the
    /// render-layer socket for that pass wired into the composite output. If the engine does not
    /// expose the socket, the compositor is left alone (combined output) and the setup is marked
    /// degraded. In every case the returned token undoes the changes.
    pub fn configure<H: RenderHost + ?Sized>(host: &mut H, channel: Channel) -> ChannelSetup {
        if channel.is_combined() {
            return ChannelSetup {
                token: RestoreToken {
                    channel,
                    prior: None,
                },
                degraded: false,
            };
        }

        let prior = PriorState {
            compositor: host.compositor(),
            passes: host.enabled_passes(),
        };

        if !prior.passes.contains(&channel) {
            let mut passes = prior.passes.clone();
            passes.insert(channel);
            host.set_enabled_passes(passes);
        }

        let socket = channel.socket();
        let available = host.render_layer_sockets().iter().any(|s| s == socket);
        let degraded = !available;
        if degraded {
            tracing::warn!(
                channel = %channel,
                socket,
                "render engine does not provide this pass; falling back to Combined"
            );
        } else {
            host.set_compositor(route_socket(&prior.compositor, socket));
            tracing::debug!(channel = %channel, socket, "routed pass to composite output");
        }

        ChannelSetup {
            token: RestoreToken {
                channel,
                prior: Some(prior),
            },
            degraded,
        }
    }

    /// Put back exactly what `configure` replaced.
    pub fn restore<H: RenderHost + ?Sized>(host: &mut H, token: RestoreToken) {
        let Some(prior) = token.prior else {
            return;
        };
        host.set_compositor(prior.compositor);
        host.set_enabled_passes(prior.passes);
        tracing::debug!(channel = %token.channel, "restored render pipeline");
    }
}

/// Copy of `current` with compositing on and `socket` of the render-layers node feeding the
/// composite output, and the viewer when there is one. Missing render-layers and composite nodes
/// are created; other nodes and links are kept.
fn route_socket(current: &Compositor, socket: &str) -> Compositor {
    let mut graph = current
        .graph
        .clone()
        .unwrap_or_else(NodeGraph::default_compositing);
    let render_layers = graph.ensure_node(NodeKind::RenderLayers);
    let composite = graph.ensure_node(NodeKind::Composite);
    graph.link(&render_layers, socket, &composite, COMPOSITE_INPUT);
    if let Some(viewer) = graph.find(&NodeKind::Viewer).map(|n| n.name.clone()) {
        graph.link(&render_layers, socket, &viewer, COMPOSITE_INPUT);
    }
    Compositor {
        use_nodes: true,
        graph: Some(graph),
    }
}

/// Scoped channel configuration: restores the pipeline when dropped.
///
/// Renders go through [`ChannelScope::host`] while the scope is alive. Dropping the scope, on
/// success, error return or unwind alike, performs the restore exactly once.
pub struct ChannelScope<'a, H: RenderHost + ?Sized> {
    host: &'a mut H,
    token: Option<RestoreToken>,
    degraded: bool,
}

impl<'a, H: RenderHost + ?Sized> ChannelScope<'a, H> {
    /// Configure `host` for `channel`.
    pub fn configure(host: &'a mut H, channel: Channel) -> Self {
        let setup = ChannelConfigurator::configure(&mut *host, channel);
        Self {
            host,
            token: Some(setup.token),
            degraded: setup.degraded,
        }
    }

    /// The configured host.
    pub fn host(&mut self) -> &mut H {
        &mut *self.host
    }

    /// Whether the channel fell back to combined output.
    pub fn degraded(&self) -> bool {
        self.degraded
    }

    /// Restore now instead of at end of scope.
    pub fn finish(mut self) {
        self.restore_now();
    }

    fn restore_now(&mut self) {
        if let Some(token) = self.token.take() {
            ChannelConfigurator::restore(&mut *self.host, token);
        }
    }
}

impl<H: RenderHost + ?Sized> Drop for ChannelScope<'_, H> {
    fn drop(&mut self) {
        self.restore_now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{HostCall, RecordingHost};

    #[test]
    fn combined_is_a_no_op() {
        let mut host = RecordingHost::default();
        let setup = ChannelConfigurator::configure(&mut host, Channel::Combined);
        assert!(!setup.degraded);
        ChannelConfigurator::restore(&mut host, setup.token);
        assert!(host.calls.is_empty());
    }

    #[test]
    fn depth_is_routed_and_restored() {
        let mut host = RecordingHost::default();
        let before = (host.compositor(), host.enabled_passes());

        let setup = ChannelConfigurator::configure(&mut host, Channel::Depth);
        assert!(!setup.degraded);
        assert!(host.passes.contains(&Channel::Depth));
        assert_eq!(host.compositor.routed_socket(), Some("Depth"));

        ChannelConfigurator::restore(&mut host, setup.token);
        assert_eq!((host.compositor(), host.enabled_passes()), before);
    }

    #[test]
    fn existing_graph_keeps_its_other_nodes() {
        let mut host = RecordingHost::default();
        let mut graph = NodeGraph::default_compositing();
        graph.add_node(NodeKind::Viewer);
        host.compositor = Compositor {
            use_nodes: false,
            graph: Some(graph.clone()),
        };

        let setup = ChannelConfigurator::configure(&mut host, Channel::Normal);
        let routed = host.compositor.graph.clone().unwrap();
        assert!(routed.find(&NodeKind::Viewer).is_some());
        assert_eq!(routed.nodes.len(), graph.nodes.len());

        ChannelConfigurator::restore(&mut host, setup.token);
        assert!(!host.compositor.use_nodes);
        assert_eq!(host.compositor.graph, Some(graph));
    }

    #[test]
    fn existing_viewer_follows_the_pass() {
        let mut host = RecordingHost::default();
        let mut graph = NodeGraph::default_compositing();
        let viewer = graph.add_node(NodeKind::Viewer);
        graph.link("Render Layers", "Image", &viewer, COMPOSITE_INPUT);
        host.compositor = Compositor {
            use_nodes: true,
            graph: Some(graph),
        };

        let setup = ChannelConfigurator::configure(&mut host, Channel::Normal);
        let routed = host.compositor.graph.clone().unwrap();
        assert_eq!(
            routed.input_link(&viewer, COMPOSITE_INPUT).unwrap().from_socket,
            "Normal"
        );
        assert_eq!(host.compositor.routed_socket(), Some("Normal"));
        ChannelConfigurator::restore(&mut host, setup.token);
        assert_eq!(
            host.compositor.graph.unwrap().input_link(&viewer, COMPOSITE_INPUT).unwrap().from_socket,
            "Image"
        );
    }

    #[test]
    fn already_enabled_pass_is_not_rewritten() {
        let mut host = RecordingHost::default();
        host.passes.insert(Channel::Mist);
        let setup = ChannelConfigurator::configure(&mut host, Channel::Mist);
        assert_eq!(host.count(|c| matches!(c, HostCall::SetPasses(_))), 0);
        ChannelConfigurator::restore(&mut host, setup.token);
        assert!(host.passes.contains(&Channel::Mist));
    }

    #[test]
    fn unsupported_pass_degrades_to_combined() {
        let mut host = RecordingHost::supporting([Channel::Depth]);
        let setup = ChannelConfigurator::configure(&mut host, Channel::Emission);
        assert!(setup.degraded);
        assert_eq!(host.compositor.routed_socket(), None);
        assert_eq!(host.count(|c| matches!(c, HostCall::SetCompositor(_))), 0);

        ChannelConfigurator::restore(&mut host, setup.token);
        assert!(host.passes.is_empty());
    }

    #[test]
    fn scope_restores_on_drop() {
        let mut host = RecordingHost::default();
        {
            let mut scope = ChannelScope::configure(&mut host, Channel::GlossyDirect);
            let image = scope.host().render().unwrap();
            assert_eq!(image.width, 2);
        }
        assert_eq!(host.compositor, Compositor::default());
        assert_eq!(
            host.renders(),
            vec![(1, Some("GlossDir".to_string()))],
        );
    }

    #[test]
    fn scope_restores_once_after_failed_render() {
        let mut host = RecordingHost::default();
        host.fail_render_frames.insert(1);
        {
            let mut scope = ChannelScope::configure(&mut host, Channel::DiffuseDirect);
            assert!(scope.host().render().is_err());
            scope.finish();
        }
        let restores = host.count(|c| *c == HostCall::SetCompositor(Compositor::default()));
        assert_eq!(restores, 1);
        assert!(host.passes.is_empty());
    }
}
