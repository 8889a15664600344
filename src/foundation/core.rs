use crate::foundation::error::{FramepassError, FramepassResult};

/// A strictly positive frame number on the host's timeline.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(try_from = "u32")]
pub struct FrameNumber(pub u32);

impl TryFrom<u32> for FrameNumber {
    type Error = FramepassError;

    fn try_from(n: u32) -> FramepassResult<Self> {
        Self::new(n)
    }
}

impl FrameNumber {
    /// Create a validated frame number (`n >= 1`).
    pub fn new(n: u32) -> FramepassResult<Self> {
        if n == 0 {
            return Err(FramepassError::validation("frame numbers must be positive"));
        }
        Ok(Self(n))
    }

    /// The frame as a signed host timeline value.
    pub fn as_i64(self) -> i64 {
        i64::from(self.0)
    }
}

impl std::fmt::Display for FrameNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Inclusive frame window `[lo, hi]` on the host timeline.
///
/// Keyframes may sit at zero or negative frames, so the bounds are signed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FrameBounds {
    pub lo: i64,
    pub hi: i64,
}

impl FrameBounds {
    /// Create validated bounds with `lo <= hi`.
    pub fn new(lo: i64, hi: i64) -> FramepassResult<Self> {
        if lo > hi {
            return Err(FramepassError::validation(format!(
                "frame bounds start {lo} must be <= end {hi}"
            )));
        }
        Ok(Self { lo, hi })
    }

    /// Return `true` when `frame` is inside `[lo, hi]`.
    pub fn contains(self, frame: i64) -> bool {
        self.lo <= frame && frame <= self.hi
    }
}
