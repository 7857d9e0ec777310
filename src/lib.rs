//! Software implementation of a fixed-function 3D pipeline: matrix stack, vertex shading,
//! clipping, rasterization with depth test and per-fragment lighting into an RGB buffer.

pub mod error;
pub mod object;
pub mod scene;
pub mod util;

pub use error::{Error, Result};
pub use object::{Object, RigidBody};
pub use scene::{
    CullMode, FrameBuffer, Light, Material, MatrixMode, PolygonMode, RenderSettings, Scene,
    ShadingModel,
};
pub use util::Vertex;
