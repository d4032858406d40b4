//! Conversions from `glam` transforms to their GPU layouts.

use glam::{Affine2, Mat3, Vec2};

/// A `mat3x3<f32>` as laid out in WGSL uniform and storage buffers: three
/// columns, each padded to 16 bytes.
pub type GpuMat3 = [f32; 12];

/// First two rows of the affine transform, `[a, c, tx]` and `[b, d, ty]`.
pub fn affine_rows(transform: &Affine2) -> ([f32; 3], [f32; 3]) {
    let m = transform.matrix2;
    let t = transform.translation;
    ([m.x_axis.x, m.y_axis.x, t.x], [m.x_axis.y, m.y_axis.y, t.y])
}

/// Pad a 3x3 matrix to its WGSL layout.
pub fn to_gpu_mat3(matrix: &Mat3) -> GpuMat3 {
    let [c0, c1, c2] = matrix.to_cols_array_2d();
    [
        c0[0], c0[1], c0[2], 0.0, //
        c1[0], c1[1], c1[2], 0.0, //
        c2[0], c2[1], c2[2], 0.0,
    ]
}

/// Maps pixel coordinates of a target of `root_size`, offset by `origin`, to
/// clip space. Y points down in pixel space and up in clip space.
pub fn pixel_to_clip(root_size: Vec2, origin: Vec2) -> Affine2 {
    Affine2::from_translation(Vec2::new(-1.0, 1.0))
        * Affine2::from_scale(Vec2::new(2.0 / root_size.x, -2.0 / root_size.y))
        * Affine2::from_translation(origin)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_affine_rows() {
        let transform = Affine2::from_translation(Vec2::new(5.0, 7.0)) * Affine2::from_scale(Vec2::new(2.0, 3.0));
        let (row0, row1) = affine_rows(&transform);
        assert_eq!(row0, [2.0, 0.0, 5.0]);
        assert_eq!(row1, [0.0, 3.0, 7.0]);
    }

    #[test]
    fn test_gpu_mat3_padding() {
        let m = to_gpu_mat3(&Mat3::from(Affine2::from_translation(Vec2::new(3.0, 4.0))));
        assert_eq!(m, [1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 3.0, 4.0, 1.0, 0.0]);
    }

    #[test]
    fn test_pixel_to_clip_corners() {
        let clip = pixel_to_clip(Vec2::new(200.0, 100.0), Vec2::ZERO);
        assert_eq!(clip.transform_point2(Vec2::ZERO), Vec2::new(-1.0, 1.0));
        assert_eq!(clip.transform_point2(Vec2::new(200.0, 100.0)), Vec2::new(1.0, -1.0));

        let offset = pixel_to_clip(Vec2::new(200.0, 100.0), Vec2::new(100.0, 50.0));
        assert_eq!(offset.transform_point2(Vec2::ZERO), Vec2::ZERO);
    }
}
