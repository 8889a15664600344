//! Built-in host: a JSON scene document rendered procedurally on the CPU.

pub mod document;
pub mod host;
pub mod raster;

pub use document::{Mist, SceneDocument, Sphere};
pub use host::SceneHost;
