use glam::Vec3;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    Directional,
    Point {
        range: f32,
    },
    Spot {
        range: f32,
        /// Radians; `0 < inner < outer`.
        inner_angle: f32,
        outer_angle: f32,
    },
}

/// A light component. Color is linear RGB.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub color: Vec3,
    pub intensity: f32,
}

impl Light {
    /// Validates the component: finite non-negative color,
    /// `intensity >= 0`, `range > 0` for point/spot, and
    /// `outer > inner > 0` for spot cones.
    pub fn validate(self) -> Result<Self> {
        if !self.color.is_finite() || self.color.min_element() < 0.0 {
            return Err(Error::OutOfRange {
                what: "light color",
                reason: "components must be finite and non-negative",
            });
        }
        if !self.intensity.is_finite() || self.intensity < 0.0 {
            return Err(Error::OutOfRange {
                what: "light intensity",
                reason: "must be finite and non-negative",
            });
        }
        match self.kind {
            LightKind::Directional => {}
            LightKind::Point { range } => {
                if !range.is_finite() || range <= 0.0 {
                    return Err(Error::OutOfRange {
                        what: "light range",
                        reason: "must be positive",
                    });
                }
            }
            LightKind::Spot {
                range,
                inner_angle,
                outer_angle,
            } => {
                if !range.is_finite() || range <= 0.0 {
                    return Err(Error::OutOfRange {
                        what: "light range",
                        reason: "must be positive",
                    });
                }
                let angles_ok = inner_angle.is_finite()
                    && outer_angle.is_finite()
                    && inner_angle > 0.0
                    && outer_angle > inner_angle
                    && outer_angle <= std::f32::consts::PI;
                if !angles_ok {
                    return Err(Error::OutOfRange {
                        what: "spot angles",
                        reason: "need 0 < inner < outer <= pi",
                    });
                }
            }
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_matrix() {
        let ok = Light {
            kind: LightKind::Spot {
                range: 10.0,
                inner_angle: 0.3,
                outer_angle: 0.6,
            },
            color: Vec3::new(1.0, 0.9, 0.8),
            intensity: 2.0,
        };
        assert!(ok.validate().is_ok());

        let bad_cone = Light {
            kind: LightKind::Spot {
                range: 10.0,
                inner_angle: 0.6,
                outer_angle: 0.3,
            },
            ..ok
        };
        assert!(bad_cone.validate().is_err());

        let bad_range = Light {
            kind: LightKind::Point { range: 0.0 },
            ..ok
        };
        assert!(bad_range.validate().is_err());

        let bad_color = Light {
            kind: LightKind::Directional,
            color: Vec3::new(-0.1, 0.0, 0.0),
            intensity: 1.0,
        };
        assert!(bad_color.validate().is_err());

        let bad_intensity = Light {
            kind: LightKind::Directional,
            color: Vec3::ONE,
            intensity: f32::INFINITY,
        };
        assert!(bad_intensity.validate().is_err());
    }
}
