use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::arc::rotate_deg;

/// Affine transform applied when replaying library graphics at an instance
/// location: mirror, then scale, then rotate (all about `center`), then
/// translate. The order is fixed; callers fill in the identity for the parts
/// they don't need.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform2 {
    pub move_vec: DVec2,
    pub rotation_deg: f64,
    pub scale: f64,
    pub mirror: bool,
    pub center: DVec2,
}

impl Default for Transform2 {
    fn default() -> Self {
        Transform2 {
            move_vec: DVec2::ZERO,
            rotation_deg: 0.0,
            scale: 1.0,
            mirror: false,
            center: DVec2::ZERO,
        }
    }
}

impl Transform2 {
    pub fn is_identity(&self) -> bool {
        self.move_vec == DVec2::ZERO
            && self.rotation_deg == 0.0
            && self.scale == 1.0
            && !self.mirror
    }

    /// Transform a point.
    pub fn apply(&self, p: DVec2) -> DVec2 {
        let mut p = p;

        if self.mirror {
            p.x = 2.0 * self.center.x - p.x;
        }

        if self.scale != 1.0 {
            p = self.center + (p - self.center) * self.scale;
        }

        if self.rotation_deg != 0.0 {
            p = rotate_deg(p, self.center, self.rotation_deg);
        }

        p + self.move_vec
    }

    /// Transform a text or item angle: mirroring reflects the angle, the
    /// rotation then adds.
    pub fn apply_angle(&self, angle_deg: f64) -> f64 {
        let base = if self.mirror { -angle_deg } else { angle_deg };
        base + self.rotation_deg
    }

    /// Scale a scalar length.
    pub fn apply_length(&self, len: f64) -> f64 {
        len * self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_leaves_points_alone() {
        let t = Transform2::default();
        assert!(t.is_identity());
        assert_eq!(t.apply(DVec2::new(3.0, 4.0)), DVec2::new(3.0, 4.0));
    }

    #[test]
    fn order_is_mirror_scale_rotate_translate() {
        let t = Transform2 {
            move_vec: DVec2::new(100.0, 0.0),
            rotation_deg: 90.0,
            scale: 2.0,
            mirror: true,
            center: DVec2::ZERO,
        };

        // (1, 0) -> mirror -> (-1, 0) -> scale -> (-2, 0)
        //        -> rotate 90 ccw -> (0, -2) -> move -> (100, -2)
        let p = t.apply(DVec2::new(1.0, 0.0));
        assert!((p - DVec2::new(100.0, -2.0)).length() < 1e-9);
    }

    #[test]
    fn mirrored_angles_are_reflected() {
        let t = Transform2 { mirror: true, rotation_deg: 30.0, ..Default::default() };
        assert!((t.apply_angle(45.0) - (-15.0)).abs() < 1e-9);
    }
}
