//! Procedural CPU renderer for [`SceneDocument`]: one sphere over a checkered ground, seen from a
//! fixed pinhole camera at the origin looking down `-z`.

use glam::DVec3;

use crate::channel::Channel;
use crate::foundation::error::FramepassResult;
use crate::host::RenderedImage;
use crate::keyframes::EntityKind;
use crate::scene::document::SceneDocument;

const FOV_Y: f64 = std::f64::consts::FRAC_PI_3;
const CAMERA_HEIGHT: f64 = 1.0;
const FAR: f64 = 50.0;
const SKY: [f32; 3] = [0.45, 0.6, 0.85];

/// Scene state at one frame after evaluating animation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Evaluated {
    pub center: DVec3,
    pub radius: f64,
    pub emission: f32,
}

/// Evaluate the sphere's animated properties at `frame`.
pub fn evaluate(doc: &SceneDocument, frame: i64) -> Evaluated {
    let t = frame as f64;
    let mut center = DVec3::from_array(doc.sphere.center);
    let mut emission = doc.sphere.emission_strength;
    for entity in &doc.animation {
        for curve in &entity.curves {
            let Some(v) = curve.sample(t) else {
                continue;
            };
            match (entity.kind, curve.data_path.as_str()) {
                (EntityKind::Object, "location")
                    if entity.name == doc.sphere.name && curve.index < 3 =>
                {
                    center[curve.index] = v;
                }
                (EntityKind::Material, "emission_strength")
                    if entity.name == doc.sphere.material =>
                {
                    emission = v as f32;
                }
                _ => {}
            }
        }
    }
    Evaluated {
        center,
        radius: doc.sphere.radius,
        emission,
    }
}

struct Hit {
    t: f64,
    point: DVec3,
    normal: DVec3,
    albedo: [f32; 3],
    emission: f32,
}

/// Render `channel` of the scene at `frame`.
pub fn render_channel(
    doc: &SceneDocument,
    frame: i64,
    channel: Channel,
) -> FramepassResult<RenderedImage> {
    let [w, h] = doc.resolution;
    let scene = evaluate(doc, frame);
    let light = DVec3::new(-0.5, 1.0, 0.6).normalize_or_zero();
    let aspect = f64::from(w) / f64::from(h);
    let half = (FOV_Y * 0.5).tan();
    let origin = DVec3::new(0.0, CAMERA_HEIGHT, 0.0);

    let mut pixels = Vec::with_capacity((w as usize) * (h as usize) * 4);
    for y in 0..h {
        for x in 0..w {
            let u = ((f64::from(x) + 0.5) / f64::from(w) * 2.0 - 1.0) * half * aspect;
            let v = (1.0 - (f64::from(y) + 0.5) / f64::from(h) * 2.0) * half;
            let dir = DVec3::new(u, v, -1.0).normalize_or_zero();
            let hit = trace(origin, dir, &scene, doc);
            let rgb = shade(channel, hit.as_ref(), dir, light, doc);
            pixels.extend([rgb[0], rgb[1], rgb[2], 1.0]);
        }
    }
    RenderedImage::new(w, h, pixels)
}

fn trace(origin: DVec3, dir: DVec3, scene: &Evaluated, doc: &SceneDocument) -> Option<Hit> {
    let sphere = hit_sphere(origin, dir, scene.center, scene.radius).map(|t| {
        let point = origin + dir * t;
        Hit {
            t,
            point,
            normal: (point - scene.center).normalize_or_zero(),
            albedo: doc.sphere.color,
            emission: scene.emission,
        }
    });
    let ground = (dir.y < -1e-9)
        .then(|| -origin.y / dir.y)
        .filter(|t| *t > 1e-6 && *t < FAR)
        .map(|t| {
            let point = origin + dir * t;
            let checker = ((point.x.floor() + point.z.floor()) as i64).rem_euclid(2) == 0;
            let g = if checker { 0.7 } else { 0.35 };
            Hit {
                t,
                point,
                normal: DVec3::Y,
                albedo: [g, g, g],
                emission: 0.0,
            }
        });
    match (sphere, ground) {
        (Some(s), Some(g)) => Some(if s.t <= g.t { s } else { g }),
        (s, g) => s.or(g),
    }
}

fn shade(channel: Channel, hit: Option<&Hit>, dir: DVec3, light: DVec3, doc: &SceneDocument) -> [f32; 3] {
    let Some(hit) = hit else {
        return match channel {
            Channel::Combined => SKY,
            Channel::Depth | Channel::Mist => [1.0; 3],
            _ => [0.0; 3],
        };
    };
    let diffuse = hit.normal.dot(light).max(0.0) as f32;
    let reflected = light - hit.normal * (2.0 * light.dot(hit.normal));
    let specular = reflected.dot(dir).max(0.0).powi(32) as f32 * 0.6;
    let diff = hit.albedo.map(|a| a * diffuse);
    let emit = doc.sphere.color.map(|c| c * hit.emission);

    match channel {
        Channel::Combined => {
            let ambient = hit.albedo.map(|a| a * 0.1);
            [0, 1, 2].map(|i| ambient[i] + diff[i] + specular + emit[i])
        }
        Channel::Depth => [(hit.t / FAR).clamp(0.0, 1.0) as f32; 3],
        Channel::Mist => {
            let m = ((hit.t - doc.mist.start) / doc.mist.depth).clamp(0.0, 1.0);
            [m as f32; 3]
        }
        Channel::Normal => (hit.normal * 0.5 + 0.5).as_vec3().to_array(),
        Channel::DiffuseDirect => diff,
        Channel::GlossyDirect => [specular; 3],
        Channel::Emission => {
            // Emission only lives on the sphere surface.
            if hit.point.y > 1e-6 { emit } else { [0.0; 3] }
        }
    }
}

fn hit_sphere(origin: DVec3, dir: DVec3, center: DVec3, radius: f64) -> Option<f64> {
    let oc = origin - center;
    let b = oc.dot(dir);
    let c = oc.length_squared() - radius * radius;
    let disc = b * b - c;
    if disc < 0.0 {
        return None;
    }
    let sq = disc.sqrt();
    [-b - sq, -b + sq].into_iter().find(|t| *t > 1e-6)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyframes::{AnimCurve, AnimatedEntity, KeyframePoint};

    fn doc() -> SceneDocument {
        SceneDocument::from_json(r#"{"frame_range": {"lo": 1, "hi": 10}, "resolution": [16, 12]}"#)
            .unwrap()
    }

    fn center_pixel(img: &RenderedImage) -> [f32; 4] {
        let idx = ((img.height / 2 * img.width + img.width / 2) * 4) as usize;
        [
            img.pixels[idx],
            img.pixels[idx + 1],
            img.pixels[idx + 2],
            img.pixels[idx + 3],
        ]
    }

    #[test]
    fn channels_produce_distinct_images() {
        let doc = doc();
        let images: Vec<_> = Channel::ALL
            .iter()
            .map(|&c| render_channel(&doc, 1, c).unwrap())
            .collect();
        for (i, a) in images.iter().enumerate() {
            for b in &images[i + 1..] {
                assert_ne!(a.pixels, b.pixels);
            }
        }
    }

    #[test]
    fn sphere_is_in_view() {
        let doc = doc();
        let depth = render_channel(&doc, 1, Channel::Depth).unwrap();
        let d = center_pixel(&depth)[0];
        assert!(d > 0.0 && d < 0.2, "depth {d}");
    }

    #[test]
    fn location_curve_moves_the_sphere() {
        let mut doc = doc();
        doc.animation.push(AnimatedEntity {
            name: "Sphere".to_string(),
            kind: EntityKind::Object,
            curves: vec![AnimCurve {
                data_path: "location".to_string(),
                index: 0,
                keyframes: vec![
                    KeyframePoint { frame: 1.0, value: 0.0 },
                    KeyframePoint { frame: 11.0, value: 10.0 },
                ],
            }],
        });
        assert_eq!(evaluate(&doc, 6).center.x, 5.0);
        let a = render_channel(&doc, 1, Channel::Combined).unwrap();
        let b = render_channel(&doc, 10, Channel::Combined).unwrap();
        assert_ne!(a.pixels, b.pixels);
    }
}
