use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};

/// Minimum offset alignment of uniform buffer bindings.
pub const UNIFORM_OFFSET_ALIGNMENT: u64 = 256;

/// Per-object uniform block of the forward shaders.
///
/// Matrices are stored row-major, see [`pack_mat4_row_major`].
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct ForwardObjectUniforms {
    pub model: [f32; 16],
    pub view: [f32; 16],
    pub proj: [f32; 16],
    pub normal: [f32; 16],
    pub base_color: [f32; 4],
}

impl ForwardObjectUniforms {
    /// `proj` is expected in the Y-down clip convention already.
    #[must_use]
    pub fn new(model: &Mat4, view: &Mat4, proj: &Mat4, normal: &Mat4, base_color: Vec4) -> Self {
        Self {
            model: pack_mat4_row_major(model),
            view: pack_mat4_row_major(view),
            proj: pack_mat4_row_major(proj),
            normal: pack_mat4_row_major(normal),
            base_color: base_color.to_array(),
        }
    }

    /// Size of one block rounded up to [`UNIFORM_OFFSET_ALIGNMENT`].
    #[must_use]
    pub fn aligned_size() -> u64 {
        (std::mem::size_of::<Self>() as u64).next_multiple_of(UNIFORM_OFFSET_ALIGNMENT)
    }
}

/// Writes `m` as 16 floats, row after row.
///
/// Shaders declare these uniforms `row_major`, so `m * v` evaluates to the
/// same value on both sides.
#[must_use]
pub fn pack_mat4_row_major(m: &Mat4) -> [f32; 16] {
    m.transpose().to_cols_array()
}

/// Flips clip-space Y for a Y-down framebuffer.
#[must_use]
pub fn flip_projection_y(proj: &Mat4) -> Mat4 {
    let mut flipped = *proj;
    flipped.y_axis.y *= -1.0;
    flipped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packing_is_row_major() {
        let m = Mat4::from_cols_array(&[
            1.0, 2.0, 3.0, 4.0, //
            5.0, 6.0, 7.0, 8.0, //
            9.0, 10.0, 11.0, 12.0, //
            13.0, 14.0, 15.0, 16.0,
        ]);
        let packed = pack_mat4_row_major(&m);
        // First row holds the x component of every column.
        assert_eq!(&packed[0..4], &[1.0, 5.0, 9.0, 13.0]);
        assert_eq!(&packed[12..16], &[4.0, 8.0, 12.0, 16.0]);
    }

    #[test]
    fn block_layout() {
        assert_eq!(std::mem::size_of::<ForwardObjectUniforms>(), 272);
        assert_eq!(ForwardObjectUniforms::aligned_size(), 512);
    }

    #[test]
    fn flip_negates_only_y_scale() {
        let proj = Mat4::perspective_rh(1.0, 1.5, 0.1, 100.0);
        let flipped = flip_projection_y(&proj);
        assert_eq!(flipped.y_axis.y, -proj.y_axis.y);
        assert_eq!(flipped.x_axis, proj.x_axis);
        assert_eq!(flipped.z_axis, proj.z_axis);
    }
}
