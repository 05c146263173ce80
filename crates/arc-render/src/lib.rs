//! Arcanee Render
//!
//! Owns the console framebuffer, the swapchain and the fixed render pass
//! order: 3D scene into the console framebuffer, 2D canvas composited over
//! it with premultiplied alpha, then a present pass scaling to the
//! backbuffer under the active scaling mode. The present viewport math is
//! pure and pixel-exact; integer-nearest sampling never touches mips or
//! linear filtering.

// crate-specific lint exceptions:
//#![allow()]

mod canvas_layer;
mod cbuf;
mod context;
mod mesh_pass;
mod present;
mod renderer;
mod shaders;

pub use cbuf::{COLOR_FORMAT, DEPTH_FORMAT};
pub use context::GpuContext;
pub use mesh_pass::{
    DrawItem, GpuLight, GpuMaterial, GpuMesh, GpuTexture, MeshPass, SceneUniforms, MAX_LIGHTS,
};
pub use present::{compute_viewport, Viewport};
pub use renderer::{FrameInputs, Renderer, ScenePass};

use thiserror::Error;

/// An error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("graphics initialization failed: {0}")]
    Init(String),
    #[error("graphics device error: {0}")]
    Device(String),
}

impl Error {
    pub fn category(&self) -> arc_core::ErrorCategory {
        arc_core::ErrorCategory::DeviceError
    }
}

/// A result type.
pub type Result<T, E = Error> = std::result::Result<T, E>;
