use std::collections::BTreeSet;

use crate::foundation::core::{FrameBounds, FrameNumber};
use crate::foundation::error::{FramepassError, FramepassResult};

/// Upper bound on frames a single range clause may expand to.
const MAX_RANGE_LEN: u32 = 1 << 20;

/// Ordered set of distinct positive frames parsed from an expression like `"1,5,10-15,30"`.
///
/// Invariants: non-empty, strictly ascending, no duplicates, every frame `>= 1`.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "RawFrameSpec")]
pub struct FrameSpec {
    frames: Vec<FrameNumber>,
}

#[derive(serde::Deserialize)]
struct RawFrameSpec {
    frames: Vec<FrameNumber>,
}

impl TryFrom<RawFrameSpec> for FrameSpec {
    type Error = FramepassError;

    fn try_from(raw: RawFrameSpec) -> FramepassResult<Self> {
        Self::from_frames(raw.frames)
    }
}

impl FrameSpec {
    /// Parse a comma-separated list of frames and inclusive `lo-hi` ranges.
    ///
    /// Whitespace around clauses is ignored, as are empty clauses (`"1,,2"`). Clause order does not
    /// matter and overlapping clauses collapse.
    pub fn parse(expr: &str) -> FramepassResult<Self> {
        let expr = expr.trim();
        if expr.is_empty() {
            return Err(FramepassError::validation("frame expression is empty"));
        }

        let mut set = BTreeSet::new();
        for clause in expr.split(',').map(str::trim).filter(|c| !c.is_empty()) {
            let (lo, hi) = parse_clause(clause)?;
            set.extend(lo..=hi);
        }
        if set.is_empty() {
            return Err(FramepassError::validation("no valid frame numbers found"));
        }

        Ok(Self {
            frames: set.into_iter().map(FrameNumber).collect(),
        })
    }

    /// Build a spec from already-known frames (duplicates and order are normalized).
    pub fn from_frames(frames: impl IntoIterator<Item = FrameNumber>) -> FramepassResult<Self> {
        let set: BTreeSet<FrameNumber> = frames.into_iter().collect();
        if set.is_empty() {
            return Err(FramepassError::validation("frame list is empty"));
        }
        if set.contains(&FrameNumber(0)) {
            return Err(FramepassError::validation("frame numbers must be positive"));
        }
        Ok(Self {
            frames: set.into_iter().collect(),
        })
    }

    /// A spec holding exactly one frame.
    pub fn single(frame: FrameNumber) -> Self {
        Self {
            frames: vec![frame],
        }
    }

    /// Frames in ascending order.
    pub fn frames(&self) -> &[FrameNumber] {
        &self.frames
    }

    /// Number of distinct frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Always `false` for a constructed spec.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Smallest frame.
    pub fn first(&self) -> Option<FrameNumber> {
        self.frames.first().copied()
    }

    /// Largest frame.
    pub fn last(&self) -> Option<FrameNumber> {
        self.frames.last().copied()
    }

    /// Inclusive window from the smallest to the largest frame.
    pub fn bounds(&self) -> Option<FrameBounds> {
        Some(FrameBounds {
            lo: self.first()?.as_i64(),
            hi: self.last()?.as_i64(),
        })
    }

    /// Render back to an expression, compressing runs of three or more consecutive frames into
    /// `lo-hi` ranges: `[1,2,3,5,6]` becomes `"1-3,5,6"`.
    pub fn to_expression(&self) -> String {
        let mut parts = Vec::new();
        let mut i = 0;
        while i < self.frames.len() {
            let start = self.frames[i].0;
            let mut j = i;
            while j + 1 < self.frames.len() && self.frames[j + 1].0 == self.frames[j].0 + 1 {
                j += 1;
            }
            let run = j - i + 1;
            if run >= 3 {
                parts.push(format!("{start}-{}", self.frames[j].0));
            } else {
                parts.extend(self.frames[i..=j].iter().map(|f| f.0.to_string()));
            }
            i = j + 1;
        }
        parts.join(",")
    }
}

impl std::fmt::Display for FrameSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_expression())
    }
}

fn parse_clause(clause: &str) -> FramepassResult<(u32, u32)> {
    if clause.starts_with('-') {
        return Err(FramepassError::validation(format!(
            "invalid frame '{clause}': frame numbers must be positive"
        )));
    }

    match clause.split_once('-') {
        Some((lo, hi)) => {
            let lo = parse_frame(lo.trim(), clause)?;
            let hi = parse_frame(hi.trim(), clause)?;
            if lo > hi {
                return Err(FramepassError::validation(format!(
                    "invalid range '{clause}': start must be <= end"
                )));
            }
            if hi - lo >= MAX_RANGE_LEN {
                return Err(FramepassError::validation(format!(
                    "invalid range '{clause}': spans more than {MAX_RANGE_LEN} frames"
                )));
            }
            Ok((lo, hi))
        }
        None => {
            let f = parse_frame(clause, clause)?;
            Ok((f, f))
        }
    }
}

fn parse_frame(token: &str, clause: &str) -> FramepassResult<u32> {
    if token.starts_with('-') {
        return Err(FramepassError::validation(format!(
            "invalid range '{clause}': frame numbers must be positive"
        )));
    }
    let n: u32 = token.parse().map_err(|_| {
        FramepassError::validation(format!("invalid frame number or range: '{clause}'"))
    })?;
    if n == 0 {
        return Err(FramepassError::validation(format!(
            "invalid frame '{clause}': frame numbers must be positive"
        )));
    }
    Ok(n)
}

/// Lenient parse used for deriving keyframe-scan bounds: invalid clauses are skipped instead of
/// rejected. Returns `None` when nothing usable remains.
pub(crate) fn parse_lenient(expr: &str) -> Option<FrameSpec> {
    let mut set = BTreeSet::new();
    for clause in expr.split(',').map(str::trim).filter(|c| !c.is_empty()) {
        if let Ok((lo, hi)) = parse_clause(clause) {
            set.extend(lo..=hi);
        }
    }
    FrameSpec::from_frames(set.into_iter().map(FrameNumber)).ok()
}
