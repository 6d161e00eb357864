// Transform utilities for scene matrices
//
// Scene transforms are authored and composed in double precision; the
// renderer stores single precision matrices.

use glam::{DMat4, Mat4};

/// Convert a scene (double precision) matrix to a renderer matrix.
pub fn to_render_matrix(matrix: DMat4) -> Mat4 {
    matrix.as_mat4()
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    #[test]
    fn test_render_matrix_keeps_translation() {
        let mat = DMat4::from_translation(DVec3::new(10.0, 20.0, 30.0));
        let render = to_render_matrix(mat);

        assert_eq!(render.w_axis.x, 10.0);
        assert_eq!(render.w_axis.y, 20.0);
        assert_eq!(render.w_axis.z, 30.0);
    }
}
