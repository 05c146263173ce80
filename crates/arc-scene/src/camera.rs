use glam::{Mat4, Vec3};

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Perspective {
        /// Vertical field of view in radians.
        fov_y: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        /// World-space height of the view volume.
        height: f32,
        near: f32,
        far: f32,
    },
}

impl Projection {
    /// Validation: `near > 0` and `near < far` for perspective;
    /// orthographic additionally needs a positive height.
    pub fn validate(self) -> Result<Self> {
        let (near, far) = match self {
            Self::Perspective { fov_y, near, far } => {
                if !fov_y.is_finite() || fov_y <= 0.0 || fov_y >= std::f32::consts::PI {
                    return Err(Error::OutOfRange {
                        what: "fovY",
                        reason: "need 0 < fovY < pi",
                    });
                }
                if near <= 0.0 {
                    return Err(Error::OutOfRange {
                        what: "near plane",
                        reason: "must be positive",
                    });
                }
                (near, far)
            }
            Self::Orthographic { height, near, far } => {
                if !height.is_finite() || height <= 0.0 {
                    return Err(Error::OutOfRange {
                        what: "ortho height",
                        reason: "must be positive",
                    });
                }
                (near, far)
            }
        };
        if !near.is_finite() || !far.is_finite() || near >= far {
            return Err(Error::OutOfRange {
                what: "clip planes",
                reason: "need near < far",
            });
        }
        Ok(self)
    }

    pub fn matrix(self, aspect: f32) -> Mat4 {
        match self {
            Self::Perspective { fov_y, near, far } => {
                Mat4::perspective_rh(fov_y, aspect, near, far)
            }
            Self::Orthographic { height, near, far } => {
                let half_h = height / 2.0;
                let half_w = half_h * aspect;
                Mat4::orthographic_rh(-half_w, half_w, -half_h, half_h, near, far)
            }
        }
    }
}

/// Where the view matrix comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraView {
    /// Derived from the owning entity's transform (looking down -Z).
    FromEntity,
    Explicit {
        eye: Vec3,
        at: Vec3,
        up: Vec3,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub projection: Projection,
    pub view: CameraView,
}

impl Camera {
    pub fn view_matrix(&self, entity_world: Mat4) -> Mat4 {
        match self.view {
            CameraView::FromEntity => entity_world.inverse(),
            CameraView::Explicit { eye, at, up } => Mat4::look_at_rh(eye, at, up),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projection_validation() {
        assert!(Projection::Perspective {
            fov_y: 1.0,
            near: 0.1,
            far: 100.0
        }
        .validate()
        .is_ok());

        assert!(Projection::Perspective {
            fov_y: 1.0,
            near: 0.0,
            far: 100.0
        }
        .validate()
        .is_err());

        assert!(Projection::Perspective {
            fov_y: 1.0,
            near: 10.0,
            far: 10.0
        }
        .validate()
        .is_err());

        assert!(Projection::Orthographic {
            height: 0.0,
            near: -1.0,
            far: 1.0
        }
        .validate()
        .is_err());
    }

    #[test]
    fn explicit_view_looks_at_the_target() {
        let camera = Camera {
            projection: Projection::Perspective {
                fov_y: 1.0,
                near: 0.1,
                far: 100.0,
            },
            view: CameraView::Explicit {
                eye: Vec3::new(0.0, 0.0, 5.0),
                at: Vec3::ZERO,
                up: Vec3::Y,
            },
        };
        let view = camera.view_matrix(Mat4::IDENTITY);
        // The target lands on the -Z axis in view space.
        let target_view = view.transform_point3(Vec3::ZERO);
        assert!(target_view.z < 0.0);
        assert!(target_view.x.abs() < 1e-5);
    }
}
