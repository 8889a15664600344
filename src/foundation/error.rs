use crate::channel::Channel;
use crate::foundation::core::FrameNumber;

/// Result alias used across the crate.
pub type FramepassResult<T> = Result<T, FramepassError>;

/// Error type for planning, pipeline configuration, rendering and output.
#[derive(thiserror::Error, Debug)]
pub enum FramepassError {
    /// Rejected user input (frame expression, pattern, channel selection).
    #[error("validation error: {0}")]
    Validation(String),

    /// The host's render pipeline could not be reconfigured or restored.
    #[error("pipeline error: {0}")]
    Pipeline(String),

    /// The host renderer failed to produce an image.
    #[error("render error: {0}")]
    Render(String),

    /// Output file or directory problem.
    #[error("io error: {context}: {source}")]
    Io {
        /// What was being attempted.
        context: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// Driver protocol misuse (starting while busy, stepping while idle).
    #[error("driver error: {0}")]
    Driver(String),

    /// JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serde(String),

    /// A run aborted on a fatal condition while processing a work item.
    #[error("run failed at item {position} (frame {frame}, {channel}): {source}")]
    Fatal {
        /// Sequence position of the item in flight.
        position: usize,
        /// Frame of the item in flight.
        frame: FrameNumber,
        /// Channel of the item in flight.
        channel: Channel,
        /// Underlying cause.
        #[source]
        source: Box<FramepassError>,
    },

    /// Anything else.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FramepassError {
    /// Build a [`FramepassError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`FramepassError::Pipeline`].
    pub fn pipeline(msg: impl Into<String>) -> Self {
        Self::Pipeline(msg.into())
    }

    /// Build a [`FramepassError::Render`].
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Build a [`FramepassError::Driver`].
    pub fn driver(msg: impl Into<String>) -> Self {
        Self::Driver(msg.into())
    }

    /// Build a [`FramepassError::Serde`].
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Wrap an I/O error with a short description of the failed operation.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            FramepassError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(
            FramepassError::pipeline("x")
                .to_string()
                .contains("pipeline error:")
        );
        assert!(
            FramepassError::render("x")
                .to_string()
                .contains("render error:")
        );
        assert!(
            FramepassError::driver("x")
                .to_string()
                .contains("driver error:")
        );
        assert!(
            FramepassError::serde("x")
                .to_string()
                .contains("serialization error:")
        );
    }

    #[test]
    fn fatal_names_the_item_in_flight() {
        let err = FramepassError::Fatal {
            position: 3,
            frame: FrameNumber(12),
            channel: Channel::Depth,
            source: Box::new(FramepassError::render("engine crashed")),
        };
        let msg = err.to_string();
        assert!(msg.contains("item 3"));
        assert!(msg.contains("frame 12"));
        assert!(msg.contains("Depth"));
        assert!(msg.contains("engine crashed"));
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = FramepassError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
