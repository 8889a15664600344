use std::path::PathBuf;
use std::time::Duration;

use crate::channel::Channel;
use crate::driver::state::DriverState;
use crate::foundation::core::FrameNumber;

/// Outcome of one work item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// The requested channel was written.
    Written,
    /// Written, but the engine lacked the pass and the image is the combined output.
    Degraded,
    /// Nothing usable was written.
    Failed,
}

/// Emitted after every processed work item, in plan order.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct ProgressEvent {
    /// Items processed so far, including this one.
    pub items_done: usize,
    /// Items in the plan.
    pub items_total: usize,
    /// Frame of this item.
    pub frame: FrameNumber,
    /// Channel of this item.
    pub channel: Channel,
    /// Resolved output path.
    pub path: PathBuf,
    /// Outcome.
    pub status: ItemStatus,
    /// The host's direct save was needed to produce the file.
    pub fallback_used: bool,
}

impl ProgressEvent {
    /// Canonical name of the item's channel.
    pub fn channel_name(&self) -> &'static str {
        self.channel.name()
    }
}

/// Report for a finished run, produced for every terminal state.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct RunSummary {
    /// Terminal state.
    pub state: DriverState,
    /// Items in the plan.
    pub items_total: usize,
    /// Items processed before the run ended.
    pub items_done: usize,
    /// Items written with the requested channel.
    pub items_succeeded: usize,
    /// Items written with the combined fallback.
    pub items_degraded: usize,
    /// Items that produced no file.
    pub items_failed: usize,
    /// Wall time from start to the terminal transition.
    pub elapsed: Duration,
    /// Directory outputs were written to, if it was resolved.
    pub output_dir: Option<PathBuf>,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {}/{} items ({} ok, {} degraded, {} failed) in {:.1}s",
            self.state,
            self.items_done,
            self.items_total,
            self.items_succeeded,
            self.items_degraded,
            self.items_failed,
            self.elapsed.as_secs_f64()
        )?;
        if let Some(dir) = &self.output_dir {
            write!(f, " -> {}", dir.display())?;
        }
        Ok(())
    }
}
