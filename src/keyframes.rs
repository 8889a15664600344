//! Keyframe discovery over the host's animation data.

use std::collections::BTreeSet;

use crate::foundation::core::{FrameBounds, FrameNumber};
use crate::frames::{FrameSpec, parse_lenient};

/// What kind of data block owns an animation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Object,
    ObjectData,
    Material,
    Scene,
    World,
}

/// One explicit keyframe point.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct KeyframePoint {
    pub frame: f64,
    pub value: f64,
}

/// Animation curve for one property channel.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AnimCurve {
    pub data_path: String,
    // Component of a vector property (0 = x).
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub keyframes: Vec<KeyframePoint>,
}

impl AnimCurve {
    /// Sample the curve with linear interpolation and constant extrapolation.
    ///
    /// Returns `None` for a curve without keys.
    pub fn sample(&self, frame: f64) -> Option<f64> {
        let mut keys: Vec<KeyframePoint> = self
            .keyframes
            .iter()
            .copied()
            .filter(|k| k.frame.is_finite())
            .collect();
        keys.sort_by(|a, b| a.frame.total_cmp(&b.frame));
        let first = keys.first()?;
        let last = keys.last()?;
        if frame <= first.frame {
            return Some(first.value);
        }
        if frame >= last.frame {
            return Some(last.value);
        }
        keys.windows(2).find_map(|w| {
            let (a, b) = (w[0], w[1]);
            if frame >= a.frame && frame <= b.frame {
                let span = b.frame - a.frame;
                if span <= f64::EPSILON {
                    return Some(b.value);
                }
                let t = (frame - a.frame) / span;
                Some(a.value + (b.value - a.value) * t)
            } else {
                None
            }
        })
    }
}

/// An animated data block and its curves.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AnimatedEntity {
    pub name: String,
    pub kind: EntityKind,
    #[serde(default)]
    pub curves: Vec<AnimCurve>,
}

/// Read access to the host's animation data.
pub trait AnimationStore {
    /// Every animated entity in the scene: objects, their data and materials, the scene and the
    /// world.
    fn animated_entities(&self) -> &[AnimatedEntity];
}

/// Collects keyframe frames across all animated entities.
pub struct KeyframeScanner;

impl KeyframeScanner {
    /// Distinct keyframe frames in ascending order, optionally limited to inclusive `bounds`.
    ///
    /// Only explicit keys count, never interpolated samples. No animation yields an empty result.
    #[tracing::instrument(skip(entities), fields(entities = entities.len()))]
    pub fn scan(entities: &[AnimatedEntity], bounds: Option<FrameBounds>) -> Vec<i64> {
        let mut frames = BTreeSet::new();
        for entity in entities {
            let mut own = BTreeSet::new();
            for curve in &entity.curves {
                own.extend(
                    curve
                        .keyframes
                        .iter()
                        .filter(|k| k.frame.is_finite())
                        .map(|k| k.frame.trunc() as i64),
                );
            }
            if !own.is_empty() {
                tracing::debug!(
                    entity = %entity.name,
                    kind = ?entity.kind,
                    keys = own.len(),
                    "collected keyframes"
                );
            }
            frames.append(&mut own);
        }

        match bounds {
            Some(b) => frames.into_iter().filter(|f| b.contains(*f)).collect(),
            None => frames.into_iter().collect(),
        }
    }

    /// [`KeyframeScanner::scan`] over an [`AnimationStore`].
    pub fn scan_store(store: &dyn AnimationStore, bounds: Option<FrameBounds>) -> Vec<i64> {
        Self::scan(store.animated_entities(), bounds)
    }
}

/// Where the bounds of a keyframe suggestion came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundsSource {
    ExistingFrames,
    SceneRange,
}

/// Keyframes proposed as a frame expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Suggestion {
    pub frames: FrameSpec,
    pub bounds: FrameBounds,
    pub source: BoundsSource,
}

/// Propose keyframe frames to render.
///
/// The working window is the min/max of `current_expr` when it contains any usable frame (invalid
/// clauses are skipped), otherwise `scene_range`. Keys at frame zero or below cannot be rendered
/// and are dropped. Returns `None` when no key survives.
pub fn suggest_frames(
    store: &dyn AnimationStore,
    current_expr: Option<&str>,
    scene_range: FrameBounds,
) -> Option<Suggestion> {
    let existing = current_expr
        .and_then(parse_lenient)
        .and_then(|spec| spec.bounds());
    let (bounds, source) = match existing {
        Some(bounds) => (bounds, BoundsSource::ExistingFrames),
        None => (scene_range, BoundsSource::SceneRange),
    };

    let keys = KeyframeScanner::scan_store(store, Some(bounds));
    let frames = keys
        .into_iter()
        .filter_map(|f| u32::try_from(f).ok())
        .filter(|f| *f > 0)
        .map(FrameNumber);
    let frames = FrameSpec::from_frames(frames).ok()?;
    tracing::info!(
        count = frames.len(),
        lo = bounds.lo,
        hi = bounds.hi,
        ?source,
        "suggested keyframes"
    );
    Some(Suggestion {
        frames,
        bounds,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curve(path: &str, frames: &[f64]) -> AnimCurve {
        AnimCurve {
            data_path: path.to_string(),
            index: 0,
            keyframes: frames
                .iter()
                .map(|&frame| KeyframePoint { frame, value: frame })
                .collect(),
        }
    }

    fn entity(name: &str, kind: EntityKind, curves: Vec<AnimCurve>) -> AnimatedEntity {
        AnimatedEntity {
            name: name.to_string(),
            kind,
            curves,
        }
    }

    struct Store(Vec<AnimatedEntity>);

    impl AnimationStore for Store {
        fn animated_entities(&self) -> &[AnimatedEntity] {
            &self.0
        }
    }

    fn sample_store() -> Store {
        Store(vec![
            entity(
                "Cube",
                EntityKind::Object,
                vec![curve("location", &[1.0, 24.0]), curve("rotation", &[24.0, 48.5])],
            ),
            entity("Steel", EntityKind::Material, vec![curve("roughness", &[12.0])]),
            entity("Scene", EntityKind::Scene, vec![curve("gravity", &[150.0])]),
            entity("World", EntityKind::World, vec![curve("strength", &[-3.0, 0.0])]),
        ])
    }

    #[test]
    fn scan_merges_all_entities_sorted_and_distinct() {
        let store = sample_store();
        assert_eq!(
            KeyframeScanner::scan_store(&store, None),
            vec![-3, 0, 1, 12, 24, 48, 150]
        );
    }

    #[test]
    fn bounds_exclude_out_of_range_keys() {
        let store = sample_store();
        let b = FrameBounds::new(1, 100).unwrap();
        assert_eq!(
            KeyframeScanner::scan_store(&store, Some(b)),
            vec![1, 12, 24, 48]
        );
    }

    #[test]
    fn no_animation_is_empty() {
        assert!(KeyframeScanner::scan(&[], None).is_empty());
        let bare = vec![entity("Empty", EntityKind::Object, vec![])];
        assert!(KeyframeScanner::scan(&bare, None).is_empty());
    }

    #[test]
    fn suggestion_prefers_existing_frames_for_bounds() {
        let store = sample_store();
        let scene = FrameBounds::new(1, 250).unwrap();
        let s = suggest_frames(&store, Some("10-30"), scene).unwrap();
        assert_eq!(s.source, BoundsSource::ExistingFrames);
        assert_eq!(s.frames.to_expression(), "12,24");

        let s = suggest_frames(&store, Some("garbage"), scene).unwrap();
        assert_eq!(s.source, BoundsSource::SceneRange);
        assert_eq!(s.frames.to_expression(), "1,12,24,48,150");
    }

    #[test]
    fn suggestion_is_none_when_nothing_survives() {
        let store = sample_store();
        let scene = FrameBounds::new(1, 250).unwrap();
        assert!(suggest_frames(&store, Some("200-210"), scene).is_none());
    }

    #[test]
    fn sample_interpolates_linearly_and_clamps() {
        let c = AnimCurve {
            data_path: "location".to_string(),
            index: 0,
            keyframes: vec![
                KeyframePoint {
                    frame: 10.0,
                    value: 2.0,
                },
                KeyframePoint {
                    frame: 0.0,
                    value: 0.0,
                },
            ],
        };
        assert_eq!(c.sample(-5.0), Some(0.0));
        assert_eq!(c.sample(5.0), Some(1.0));
        assert_eq!(c.sample(20.0), Some(2.0));
        assert_eq!(curve("x", &[]).sample(1.0), None);
    }
}
