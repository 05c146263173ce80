//! Arcanee Scene3D
//!
//! Retained scene store for the 3D side of the console: an id-indexed
//! entity table with implicit transforms, optional mesh-renderer, light and
//! camera components, the metallic-roughness material model, and the
//! deterministic glTF importer. `gfx3d.*` bindings mutate this store
//! immediately; rendering consumes it read-only once per frame.
//!
//! World convention: right-handed, +Y up, -Z forward (the glTF convention,
//! so imported assets need no basis change).

// crate-specific lint exceptions:
//#![allow()]

mod camera;
mod entity;
mod gltf_import;
mod light;
mod material;
mod mesh;
mod scene;
mod texture;

pub use camera::{Camera, CameraView, Projection};
pub use entity::{Entity, EntityId, MeshRenderer, Transform};
pub use gltf_import::{import_gltf, GltfImport, ImportedMaterial, ImportedNode};
pub use light::{Light, LightKind};
pub use material::{AlphaMode, Material, MaterialTextures};
pub use mesh::Mesh;
pub use scene::Scene;
pub use texture::TextureData;

use arc_core::ErrorCategory;
use thiserror::Error;

/// An error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("unknown entity {0:?}")]
    UnknownEntity(EntityId),
    #[error("{what} must be finite")]
    NonFinite { what: &'static str },
    #[error("{what} is out of range: {reason}")]
    OutOfRange {
        what: &'static str,
        reason: &'static str,
    },
    #[error("glTF import failed: {0}")]
    Gltf(String),
    #[error("external reference {0:?} could not be read")]
    ExternalRef(String),
    #[error("image decode failed: {0}")]
    ImageDecode(String),
    #[error("mesh data is inconsistent: {0}")]
    BadMesh(&'static str),
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownEntity(_) => ErrorCategory::InvalidHandle,
            Self::NonFinite { .. } | Self::OutOfRange { .. } => ErrorCategory::InvalidArgument,
            Self::Gltf(_) | Self::ImageDecode(_) | Self::BadMesh(_) => {
                ErrorCategory::AssetDecodeError
            }
            Self::ExternalRef(_) => ErrorCategory::IoError,
        }
    }
}

/// A result type.
pub type Result<T, E = Error> = std::result::Result<T, E>;
