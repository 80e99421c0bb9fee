//! View-frustum plane extraction and AABB culling.
//!
//! Planes come straight out of an MVP matrix with the standard row-combination
//! identities. The AABB test is conservative: a box is rejected only when one
//! plane has all eight corners on its negative side, so straddling boxes are
//! always kept.

use cgmath::{Matrix4, Vector3};

use crate::data_structures::geometry::Aabb;

/// One clip plane, `normal · p + d` signed distance form.
#[derive(Clone, Copy, Debug)]
pub struct Plane {
    pub normal: Vector3<f32>,
    pub d: f32,
}

impl Plane {
    fn distance(&self, point: Vector3<f32>) -> f32 {
        self.normal.x * point.x + self.normal.y * point.y + self.normal.z * point.z + self.d
    }
}

/// Six clip planes in the order right, left, bottom, top, far, near.
#[derive(Clone, Copy, Debug)]
pub struct Frustum {
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Extract the planes from a combined model-view-projection matrix.
    ///
    /// Each plane is the fourth row of the flattened matrix plus or minus one
    /// of the other rows, normalized by the magnitude of its normal.
    pub fn from_mvp(mvp: &Matrix4<f32>) -> Self {
        // cgmath stores column-major; flattening yields m[col * 4 + row].
        let m: &[f32; 16] = mvp.as_ref();

        let plane = |a: f32, b: f32, c: f32, d: f32| {
            let magnitude = (a * a + b * b + c * c).sqrt();
            Plane {
                normal: Vector3::new(a / magnitude, b / magnitude, c / magnitude),
                d: d / magnitude,
            }
        };

        let planes = [
            // right
            plane(m[3] - m[0], m[7] - m[4], m[11] - m[8], m[15] - m[12]),
            // left
            plane(m[3] + m[0], m[7] + m[4], m[11] + m[8], m[15] + m[12]),
            // bottom
            plane(m[3] + m[1], m[7] + m[5], m[11] + m[9], m[15] + m[13]),
            // top
            plane(m[3] - m[1], m[7] - m[5], m[11] - m[9], m[15] - m[13]),
            // far
            plane(m[3] - m[2], m[7] - m[6], m[11] - m[10], m[15] - m[14]),
            // near
            plane(m[3] + m[2], m[7] + m[6], m[11] + m[10], m[15] + m[14]),
        ];

        Self { planes }
    }

    /// Conservative AABB test: false only when some plane has all eight
    /// corners at non-positive distance.
    pub fn contains_aabb(&self, aabb: &Aabb) -> bool {
        let corners = aabb.corners();
        for plane in &self.planes {
            let mut any_inside = false;
            for corner in &corners {
                if plane.distance(*corner) > 0.0 {
                    any_inside = true;
                    break;
                }
            }
            if !any_inside {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cgmath::{Deg, InnerSpace, Point3, SquareMatrix, perspective};

    fn aabb(min: [f32; 3], max: [f32; 3]) -> Aabb {
        Aabb {
            min: Vector3::from(min),
            max: Vector3::from(max),
        }
    }

    #[test]
    fn identity_mvp_yields_unit_planes() {
        let frustum = Frustum::from_mvp(&Matrix4::identity());
        for plane in &frustum.planes {
            assert_relative_eq!(plane.normal.magnitude(), 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn box_behind_far_plane_is_rejected() {
        let projection = perspective(Deg(90.0), 1.0, 0.1, 100.0);
        let view = Matrix4::look_at_rh(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 0.0, -1.0),
            Vector3::unit_y(),
        );
        let frustum = Frustum::from_mvp(&(projection * view));
        let far_box = aabb([-1.0, -1.0, -1001.0], [1.0, 1.0, -999.0]);
        assert!(!frustum.contains_aabb(&far_box));
    }

    #[test]
    fn box_straddling_origin_is_kept() {
        let projection = perspective(Deg(90.0), 1.0, 0.1, 100.0);
        let view = Matrix4::look_at_rh(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 0.0, -1.0),
            Vector3::unit_y(),
        );
        let frustum = Frustum::from_mvp(&(projection * view));
        let origin_box = aabb([-1.0, -1.0, -1.0], [1.0, 1.0, 1.0]);
        assert!(frustum.contains_aabb(&origin_box));
    }

    #[test]
    fn box_inside_frustum_is_kept() {
        let projection = perspective(Deg(90.0), 1.0, 0.1, 100.0);
        let frustum = Frustum::from_mvp(&projection);
        let inside = aabb([-0.5, -0.5, -10.5], [0.5, 0.5, -9.5]);
        assert!(frustum.contains_aabb(&inside));
    }

    #[test]
    fn box_left_of_frustum_is_rejected() {
        let projection = perspective(Deg(90.0), 1.0, 0.1, 100.0);
        let frustum = Frustum::from_mvp(&projection);
        let left = aabb([-60.0, -1.0, -11.0], [-50.0, 1.0, -10.0]);
        assert!(!frustum.contains_aabb(&left));
    }
}
