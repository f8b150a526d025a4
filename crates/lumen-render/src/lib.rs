//! Scene rendering for the Lumen sandbox.
//!
//! Composes the `lumen-gpu` primitives into a single-frame-in-flight
//! renderer, plus the camera and mesh data the scene works with.

pub mod camera;
pub mod mesh;
pub mod renderer;

pub use camera::{FlyCamera, MovementDirection};
pub use mesh::{Mesh, Vertex};
pub use renderer::{FramePushConstants, Renderer, RendererConfig, SceneUniforms};
