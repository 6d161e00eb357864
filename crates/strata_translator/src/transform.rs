//! World matrices of prims, sampled over the shutter when they move.

use strata_math::{to_render_matrix, Mat4};
use strata_render::{AttrValue, NodeHandle};
use strata_scene::{local_transformation, transform_might_be_time_varying, transform_time_samples_in_interval, Prim};

use crate::context::JobContext;
use crate::error::ReadResult;

/// Whether the world transform of `prim` can change over time, through
/// its own ops or an ancestor's.
pub fn is_transform_animated(prim: &Prim<'_>) -> bool {
    std::iter::once(*prim)
        .chain(prim.ancestors())
        .any(|p| transform_might_be_time_varying(&p))
}

/// Authored transform sample times of `prim` and its ancestors strictly
/// inside `(start, end)`.
fn inner_sample_times(prim: &Prim<'_>, start: f64, end: f64) -> Vec<f64> {
    let mut times: Vec<f64> = std::iter::once(*prim)
        .chain(prim.ancestors())
        .flat_map(|p| transform_time_samples_in_interval(&p, start, end))
        .collect();
    times.sort_by(f64::total_cmp);
    times.dedup();
    times
}

impl<'a> JobContext<'_, 'a> {
    /// Times the transform of `prim` is evaluated at: the current frame,
    /// or evenly spread over the shutter when motion blur is on and the
    /// transform moves. Every authored key inside the shutter adds one
    /// sample.
    pub fn matrix_times(&self, prim: &Prim<'a>) -> Vec<f32> {
        let time = self.time();
        if !time.motion_blur || !is_transform_animated(prim) {
            return vec![time.frame];
        }

        let shutter = time.shutter();
        let inner = inner_sample_times(prim, shutter.min as f64, shutter.max as f64);
        shutter.uniform_samples(inner.len() + 2)
    }

    /// World matrices of `prim` at [`Self::matrix_times`].
    ///
    /// Prims that are not transformable schemas get the world matrix of
    /// their parent times their own authored ops.
    pub fn matrix_samples(&mut self, prim: &Prim<'a>, is_xformable: bool) -> Vec<Mat4> {
        self.matrix_times(prim)
            .into_iter()
            .map(|t| to_render_matrix(self.world_matrix(prim, t, is_xformable)))
            .collect()
    }

    fn world_matrix(&mut self, prim: &Prim<'a>, frame: f32, is_xformable: bool) -> strata_math::DMat4 {
        self.with_xform_cache(frame, |cache| {
            if is_xformable {
                cache.local_to_world(prim)
            } else {
                cache.parent_to_world(prim) * local_transformation(prim, frame as f64).0
            }
        })
    }

    /// Set `matrix` on `node`, always as an array. Nodes with several
    /// keys also get their motion window.
    pub fn read_matrix(&mut self, prim: &Prim<'a>, node: NodeHandle, is_xformable: bool) -> ReadResult<()> {
        let matrices = match self.precomputed_matrices() {
            Some(matrices) => matrices.to_vec(),
            None => self.matrix_samples(prim, is_xformable),
        };

        let universe = self.universe();
        let keys = matrices.len();
        universe.set(
            node,
            "matrix",
            AttrValue::Array(matrices.into_iter().map(AttrValue::Matrix).collect()),
        )?;
        if keys > 1 {
            let time = self.time();
            universe.set(node, "motion_start", time.motion_start)?;
            universe.set(node, "motion_end", time.motion_end)?;
        }
        Ok(())
    }
}
