use crate::channel::{Channel, ChannelSelection};
use crate::foundation::core::FrameNumber;
use crate::foundation::error::FramepassResult;
use crate::frames::FrameSpec;
use crate::naming::FilenamePattern;

/// One (frame, channel) render, fixed at plan time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkItem {
    /// Frame to render.
    pub frame: FrameNumber,
    /// Channel to isolate.
    pub channel: Channel,
    /// Zero-based position in the plan.
    pub position: usize,
}

/// Immutable, validated sequence of work items plus the pattern that names them.
#[derive(Clone, Debug)]
pub struct RenderPlan {
    items: Vec<WorkItem>,
    pattern: FilenamePattern,
    frames: FrameSpec,
    selection: ChannelSelection,
}

impl RenderPlan {
    /// Items in execution order.
    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    /// `|frames| * |channels|`.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Never true for a built plan.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Pattern used to name outputs.
    pub fn pattern(&self) -> &FilenamePattern {
        &self.pattern
    }

    /// Frames covered.
    pub fn frames(&self) -> &FrameSpec {
        &self.frames
    }

    /// Channels covered.
    pub fn selection(&self) -> &ChannelSelection {
        &self.selection
    }

    /// Plan for the current frame only: one item per selected channel.
    pub fn single_frame(
        frame: FrameNumber,
        selection: &ChannelSelection,
        pattern: FilenamePattern,
    ) -> FramepassResult<Self> {
        pattern.validate(selection.len())?;
        Ok(expand(FrameSpec::single(frame), selection, pattern))
    }
}

/// Expands user input into a [`RenderPlan`].
pub struct FrameChannelPlan;

impl FrameChannelPlan {
    /// Parse `frame_text`, validate `pattern` against the selection and expand frame-major,
    /// channel-minor. Fails before anything is rendered.
    #[tracing::instrument(skip(selection, pattern), fields(pattern = %pattern))]
    pub fn build(
        frame_text: &str,
        selection: &ChannelSelection,
        pattern: FilenamePattern,
    ) -> FramepassResult<RenderPlan> {
        let frames = FrameSpec::parse(frame_text)?;
        pattern.validate(selection.len())?;
        if frames.len() > 1 && !pattern.has_frame_token() {
            tracing::warn!(
                frames = frames.len(),
                "filename pattern has no (Frame) token; later frames overwrite earlier ones"
            );
        }
        let plan = expand(frames, selection, pattern);
        tracing::debug!(items = plan.len(), "built render plan");
        Ok(plan)
    }
}

fn expand(frames: FrameSpec, selection: &ChannelSelection, pattern: FilenamePattern) -> RenderPlan {
    let items = frames
        .frames()
        .iter()
        .flat_map(move |&frame| selection.iter().map(move |channel| (frame, channel)))
        .enumerate()
        .map(|(position, (frame, channel))| WorkItem {
            frame,
            channel,
            position,
        })
        .collect();
    RenderPlan {
        items,
        pattern,
        frames,
        selection: selection.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(p: &str) -> FilenamePattern {
        FilenamePattern::new(p).unwrap()
    }

    #[test]
    fn frame_major_channel_minor() {
        let sel = ChannelSelection::new([Channel::Depth, Channel::Combined]).unwrap();
        let plan =
            FrameChannelPlan::build("1,2", &sel, pattern("(FileName)_(Frame)_(Channel)")).unwrap();
        let got: Vec<_> = plan
            .items()
            .iter()
            .map(|i| (i.frame.0, i.channel, i.position))
            .collect();
        assert_eq!(
            got,
            vec![
                (1, Channel::Combined, 0),
                (1, Channel::Depth, 1),
                (2, Channel::Combined, 2),
                (2, Channel::Depth, 3),
            ]
        );
    }

    #[test]
    fn count_is_frames_times_channels() {
        let sel =
            ChannelSelection::new([Channel::Combined, Channel::Mist, Channel::Normal]).unwrap();
        let plan =
            FrameChannelPlan::build("1-10,20", &sel, pattern("f_(Frame)_(Channel)")).unwrap();
        assert_eq!(plan.len(), 33);
        assert_eq!(plan.frames().len(), 11);
    }

    #[test]
    fn multi_channel_needs_channel_token() {
        let sel =
            ChannelSelection::new([Channel::Combined, Channel::Depth, Channel::Mist]).unwrap();
        assert!(FrameChannelPlan::build("1", &sel, pattern("(FileName)_(Frame)")).is_err());
        let one = ChannelSelection::default();
        assert!(FrameChannelPlan::build("1", &one, pattern("(FileName)_(Frame)")).is_ok());
    }

    #[test]
    fn bad_frames_are_rejected() {
        let sel = ChannelSelection::default();
        for bad in ["", "0", "-3", "a-b", "5-2"] {
            assert!(
                FrameChannelPlan::build(bad, &sel, FilenamePattern::default()).is_err(),
                "{bad:?} should fail"
            );
        }
    }

    #[test]
    fn single_frame_plan_has_one_item_per_channel() {
        let sel = ChannelSelection::new([Channel::Emission, Channel::Combined]).unwrap();
        let plan =
            RenderPlan::single_frame(FrameNumber(12), &sel, pattern("s_(Channel)")).unwrap();
        assert_eq!(plan.len(), 2);
        assert!(plan.items().iter().all(|i| i.frame == FrameNumber(12)));
        assert_eq!(plan.items()[1].channel, Channel::Emission);
    }
}
