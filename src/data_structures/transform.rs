//! Local transforms and explicit matrix composition.
//!
//! Composition order is a crate-wide contract: [`compose`] multiplies the
//! child's matrix by the parent's, exactly as the import path accumulates
//! node transforms. Keep this order; scene assembly and the camera view
//! matrix both depend on it.

use cgmath::{InnerSpace, Matrix3, Matrix4, One, Quaternion, SquareMatrix, Vector3};

/// Local position, rotation and scale of one scene object.
///
/// Owned inline by its scene object; the owner back-reference of the original
/// design is implicit in the arena slot.
#[derive(Clone, Debug)]
pub struct Transform {
    pub position: Vector3<f32>,
    pub rotation: Quaternion<f32>,
    pub scale: Vector3<f32>,
}

impl Transform {
    pub fn new() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 0.0),
            rotation: Quaternion::one(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    /// Build a transform from a matrix by decomposing it into independent
    /// scale, rotation and translation.
    pub fn from_matrix(matrix: &Matrix4<f32>) -> Self {
        let (scale, rotation, position) = decompose(matrix);
        Self {
            position,
            rotation,
            scale,
        }
    }

    /// Model matrix, translation * rotation * scale.
    pub fn model_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.position)
            * Matrix4::from(self.rotation)
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

/// World transform of a child under a parent: the child pre-multiplies the
/// parent. This matches the accumulation order of the import path and must
/// not be flipped.
pub fn compose(child: &Matrix4<f32>, parent: &Matrix4<f32>) -> Matrix4<f32> {
    child * parent
}

/// Split a matrix into `(scale, rotation, translation)`.
///
/// Assumes no shear: the rotation is recovered from the scale-normalized
/// upper 3x3. Degenerate axes (zero scale) decompose to identity rotation on
/// that axis rather than NaN.
pub fn decompose(matrix: &Matrix4<f32>) -> (Vector3<f32>, Quaternion<f32>, Vector3<f32>) {
    let translation = matrix.w.truncate();

    let x_axis = matrix.x.truncate();
    let y_axis = matrix.y.truncate();
    let z_axis = matrix.z.truncate();
    let scale = Vector3::new(x_axis.magnitude(), y_axis.magnitude(), z_axis.magnitude());

    let safe = |axis: Vector3<f32>, len: f32, fallback: Vector3<f32>| {
        if len > f32::EPSILON {
            axis / len
        } else {
            fallback
        }
    };
    let basis = Matrix3::from_cols(
        safe(x_axis, scale.x, Vector3::unit_x()),
        safe(y_axis, scale.y, Vector3::unit_y()),
        safe(z_axis, scale.z, Vector3::unit_z()),
    );
    let rotation = Quaternion::from(basis);

    (scale, rotation, translation)
}

/// Identity matrix seed for transform accumulation.
pub fn identity() -> Matrix4<f32> {
    Matrix4::identity()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cgmath::{Deg, Rotation3};

    #[test]
    fn compose_is_child_times_parent() {
        let child = Matrix4::from_translation(Vector3::new(1.0, 0.0, 0.0));
        let parent = Matrix4::from_nonuniform_scale(2.0, 2.0, 2.0);
        let composed = compose(&child, &parent);
        assert_relative_eq!(composed, child * parent);
        // The other order differs, so a flipped implementation cannot pass.
        assert_ne!(composed, parent * child);
    }

    #[test]
    fn decompose_recovers_trs_components() {
        let rotation = Quaternion::from_angle_y(Deg(40.0));
        let source = Matrix4::from_translation(Vector3::new(3.0, -1.0, 2.0))
            * Matrix4::from(rotation)
            * Matrix4::from_nonuniform_scale(2.0, 3.0, 4.0);

        let (scale, rot, translation) = decompose(&source);
        assert_relative_eq!(scale, Vector3::new(2.0, 3.0, 4.0), epsilon = 1e-5);
        assert_relative_eq!(translation, Vector3::new(3.0, -1.0, 2.0), epsilon = 1e-5);
        // Quaternions are sign-ambiguous; compare through the matrix form.
        assert_relative_eq!(Matrix4::from(rot), Matrix4::from(rotation), epsilon = 1e-5);
    }

    #[test]
    fn model_matrix_roundtrips_through_decompose() {
        let mut transform = Transform::new();
        transform.position = Vector3::new(-2.0, 5.0, 0.5);
        transform.rotation = Quaternion::from_angle_x(Deg(25.0));
        transform.scale = Vector3::new(1.5, 1.5, 1.5);

        let rebuilt = Transform::from_matrix(&transform.model_matrix());
        assert_relative_eq!(
            rebuilt.model_matrix(),
            transform.model_matrix(),
            epsilon = 1e-5
        );
    }

    #[test]
    fn degenerate_scale_does_not_produce_nan() {
        let flat = Matrix4::from_nonuniform_scale(1.0, 0.0, 1.0);
        let (scale, rotation, _) = decompose(&flat);
        assert_eq!(scale.y, 0.0);
        assert!(!rotation.s.is_nan());
    }
}
