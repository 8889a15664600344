use std::collections::BTreeSet;
use std::str::FromStr;

use crate::foundation::error::{FramepassError, FramepassResult};

/// One output channel a work item can render.
///
/// Declaration order is the canonical channel order used for plan expansion, so the derived
/// `Ord` must stay in sync with [`Channel::ALL`].
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum Channel {
    /// The renderer's default beauty output.
    Combined,
    /// Z depth.
    Depth,
    /// Mist (normalized distance falloff).
    Mist,
    /// Surface normals.
    Normal,
    /// Direct diffuse lighting.
    DiffuseDirect,
    /// Direct glossy lighting.
    GlossyDirect,
    /// Emission.
    Emission,
}

impl Channel {
    /// All channels in canonical order.
    pub const ALL: [Channel; 7] = [
        Channel::Combined,
        Channel::Depth,
        Channel::Mist,
        Channel::Normal,
        Channel::DiffuseDirect,
        Channel::GlossyDirect,
        Channel::Emission,
    ];

    /// Canonical name, used for display and for the `(Channel)` filename token.
    pub fn name(self) -> &'static str {
        match self {
            Channel::Combined => "Combined",
            Channel::Depth => "Depth",
            Channel::Mist => "Mist",
            Channel::Normal => "Normal",
            Channel::DiffuseDirect => "DiffuseDirect",
            Channel::GlossyDirect => "GlossyDirect",
            Channel::Emission => "Emission",
        }
    }

    /// Name of the render-layer output socket that carries this channel.
    pub fn socket(self) -> &'static str {
        match self {
            Channel::Combined => "Image",
            Channel::Depth => "Depth",
            Channel::Mist => "Mist",
            Channel::Normal => "Normal",
            Channel::DiffuseDirect => "DiffDir",
            Channel::GlossyDirect => "GlossDir",
            Channel::Emission => "Emit",
        }
    }

    /// `true` for the renderer's default output, which needs no pipeline changes.
    pub fn is_combined(self) -> bool {
        self == Channel::Combined
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Channel {
    type Err = FramepassError;

    /// Accepts canonical names case-insensitively, ignoring `_`/`-`/spaces, plus a few common
    /// pass aliases (`z`, `emit`, `diffdir`, `glossdir`, `image`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(char::to_lowercase)
            .collect();
        let channel = match key.as_str() {
            "combined" | "image" | "beauty" => Channel::Combined,
            "depth" | "z" => Channel::Depth,
            "mist" => Channel::Mist,
            "normal" | "normals" => Channel::Normal,
            "diffusedirect" | "diffdir" => Channel::DiffuseDirect,
            "glossydirect" | "glossdir" => Channel::GlossyDirect,
            "emission" | "emit" => Channel::Emission,
            _ => {
                return Err(FramepassError::validation(format!(
                    "unknown channel '{s}' (expected one of: {})",
                    Channel::ALL.map(Channel::name).join(", ")
                )));
            }
        };
        Ok(channel)
    }
}

/// Non-empty set of channels to render for every selected frame.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "RawSelection")]
pub struct ChannelSelection {
    channels: BTreeSet<Channel>,
}

#[derive(serde::Deserialize)]
struct RawSelection {
    channels: BTreeSet<Channel>,
}

impl TryFrom<RawSelection> for ChannelSelection {
    type Error = FramepassError;

    fn try_from(raw: RawSelection) -> FramepassResult<Self> {
        Self::new(raw.channels)
    }
}

impl ChannelSelection {
    /// Build an explicit selection. An empty selection is an input error.
    pub fn new(channels: impl IntoIterator<Item = Channel>) -> FramepassResult<Self> {
        let channels: BTreeSet<Channel> = channels.into_iter().collect();
        if channels.is_empty() {
            return Err(FramepassError::validation(
                "channel selection must contain at least one channel",
            ));
        }
        Ok(Self { channels })
    }

    /// Build a selection where "nothing chosen" means [`Channel::Combined`].
    pub fn or_default(channels: impl IntoIterator<Item = Channel>) -> Self {
        Self::new(channels).unwrap_or_default()
    }

    /// Parse a comma-separated channel list (`"combined,depth"`).
    pub fn parse(list: &str) -> FramepassResult<Self> {
        let channels = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Channel::from_str)
            .collect::<FramepassResult<Vec<_>>>()?;
        Self::new(channels)
    }

    /// Number of selected channels.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Always `false`; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Return `true` when `channel` is selected.
    pub fn contains(&self, channel: Channel) -> bool {
        self.channels.contains(&channel)
    }

    /// Selected channels in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = Channel> + '_ {
        self.channels.iter().copied()
    }
}

impl Default for ChannelSelection {
    fn default() -> Self {
        Self {
            channels: BTreeSet::from([Channel::Combined]),
        }
    }
}
