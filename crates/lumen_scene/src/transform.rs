use glam::{Mat3, Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Guards direction and look-at math against zero-length inputs.
pub const DIRECTION_EPSILON: f32 = 1e-6;

/// Local TRS of a scene-graph node.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocalTransform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for LocalTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl LocalTransform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    #[inline]
    #[must_use]
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Splits `matrix` into TRS using the column lengths as scale.
    #[must_use]
    pub fn from_matrix(matrix: &Mat4) -> Self {
        Self {
            position: matrix.w_axis.truncate(),
            rotation: rotation_of(matrix),
            scale: scale_of(matrix),
        }
    }
}

/// Column lengths of the upper 3x3.
#[must_use]
pub fn scale_of(matrix: &Mat4) -> Vec3 {
    Vec3::new(
        matrix.x_axis.truncate().length(),
        matrix.y_axis.truncate().length(),
        matrix.z_axis.truncate().length(),
    )
}

/// Rotation of the upper 3x3 after dividing each column by its length.
#[must_use]
pub fn rotation_of(matrix: &Mat4) -> Quat {
    let scale = scale_of(matrix);
    let column = |axis: Vec3, length: f32| {
        if length > DIRECTION_EPSILON {
            axis / length
        } else {
            axis
        }
    };
    let basis = Mat3::from_cols(
        column(matrix.x_axis.truncate(), scale.x),
        column(matrix.y_axis.truncate(), scale.y),
        column(matrix.z_axis.truncate(), scale.z),
    );
    Quat::from_mat3(&basis).normalize()
}

/// Rotation whose local -Z looks along `forward`, keeping `up` as close as possible.
///
/// Falls back to +Z and then +X as the up hint when `forward` is parallel to `up`.
#[must_use]
pub fn rotation_looking_to(forward: Vec3, up: Vec3) -> Quat {
    let forward = forward.normalize_or_zero();
    let mut up = up.normalize_or_zero();
    if up.cross(forward).length() <= DIRECTION_EPSILON {
        up = Vec3::Z;
        if up.cross(forward).length() <= DIRECTION_EPSILON {
            up = Vec3::X;
        }
    }
    let right = forward.cross(up).normalize();
    let corrected_up = right.cross(forward).normalize();
    Quat::from_mat3(&Mat3::from_cols(right, corrected_up, -forward)).normalize()
}
