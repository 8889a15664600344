use crate::channel::Channel;
use crate::foundation::error::{FramepassError, FramepassResult};

/// Input socket of the composite node that receives the final image.
pub const COMPOSITE_INPUT: &str = "Image";

/// Kind of compositing node the configurator cares about.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    RenderLayers,
    Composite,
    Viewer,
    Other(String),
}

impl NodeKind {
    fn default_name(&self) -> &str {
        match self {
            NodeKind::RenderLayers => "Render Layers",
            NodeKind::Composite => "Composite",
            NodeKind::Viewer => "Viewer",
            NodeKind::Other(name) => name,
        }
    }
}

/// One compositing node.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
}

/// Directed connection from an output socket to an input socket.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Link {
    pub from_node: String,
    pub from_socket: String,
    pub to_node: String,
    pub to_socket: String,
}

/// Compositing node graph.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NodeGraph {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl NodeGraph {
    /// The tree a host creates when compositing is first switched on: render layers feeding the
    /// composite output.
    pub fn default_compositing() -> Self {
        let mut g = Self::default();
        let rl = g.add_node(NodeKind::RenderLayers);
        let comp = g.add_node(NodeKind::Composite);
        g.link(&rl, Channel::Combined.socket(), &comp, COMPOSITE_INPUT);
        g
    }

    /// First node of `kind`.
    pub fn find(&self, kind: &NodeKind) -> Option<&Node> {
        self.nodes.iter().find(|n| &n.kind == kind)
    }

    /// Add a node of `kind` with a name that does not collide, returning the name.
    pub fn add_node(&mut self, kind: NodeKind) -> String {
        let base = kind.default_name().to_string();
        let mut name = base.clone();
        let mut n = 1;
        while self.nodes.iter().any(|node| node.name == name) {
            name = format!("{base}.{n:03}");
            n += 1;
        }
        self.nodes.push(Node {
            name: name.clone(),
            kind,
        });
        name
    }

    /// Name of the first node of `kind`, adding one if none exists.
    pub fn ensure_node(&mut self, kind: NodeKind) -> String {
        match self.find(&kind) {
            Some(node) => node.name.clone(),
            None => self.add_node(kind),
        }
    }

    /// Connect `from.from_socket` to `to.to_socket`. An input socket takes a single link, so any
    /// existing link into it is replaced.
    pub fn link(&mut self, from: &str, from_socket: &str, to: &str, to_socket: &str) {
        self.links
            .retain(|l| !(l.to_node == to && l.to_socket == to_socket));
        self.links.push(Link {
            from_node: from.to_string(),
            from_socket: from_socket.to_string(),
            to_node: to.to_string(),
            to_socket: to_socket.to_string(),
        });
    }

    /// The link feeding `node.socket`, if any.
    pub fn input_link(&self, node: &str, socket: &str) -> Option<&Link> {
        self.links
            .iter()
            .find(|l| l.to_node == node && l.to_socket == socket)
    }

    /// Reject duplicate node names and links that reference missing nodes.
    pub fn check(&self) -> FramepassResult<()> {
        for (i, node) in self.nodes.iter().enumerate() {
            if self.nodes[..i].iter().any(|n| n.name == node.name) {
                return Err(FramepassError::pipeline(format!(
                    "duplicate node name '{}'",
                    node.name
                )));
            }
        }
        for link in &self.links {
            for end in [&link.from_node, &link.to_node] {
                if !self.nodes.iter().any(|n| &n.name == end) {
                    return Err(FramepassError::pipeline(format!(
                        "link {}.{} -> {}.{} references unknown node '{end}'",
                        link.from_node, link.from_socket, link.to_node, link.to_socket
                    )));
                }
            }
        }
        Ok(())
    }
}

/// The host's compositing state.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Compositor {
    #[serde(default)]
    pub use_nodes: bool,
    #[serde(default)]
    pub graph: Option<NodeGraph>,
}

impl Compositor {
    /// Render-layer socket that ends up in the final image, when compositing is active and wired
    /// from a render-layers node. `None` means the renderer's default (combined) output.
    pub fn routed_socket(&self) -> Option<&str> {
        if !self.use_nodes {
            return None;
        }
        let graph = self.graph.as_ref()?;
        let composite = graph.find(&NodeKind::Composite)?;
        let link = graph.input_link(&composite.name, COMPOSITE_INPUT)?;
        let source = graph.nodes.iter().find(|n| n.name == link.from_node)?;
        (source.kind == NodeKind::RenderLayers).then_some(link.from_socket.as_str())
    }
}
