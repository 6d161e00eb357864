//! Transform operations and world transform caching.
//!
//! Ops are evaluated in `xformOpOrder` and composed column-vector style:
//! `local = op0 * op1 * ... * opN`, `world = parent_world * local`.

use std::collections::HashMap;

use strata_math::{DMat4, DQuat, DVec3};

use crate::prim::Prim;
use crate::stage::PrimId;
use crate::value::Value;

const RESET_XFORM_STACK: &str = "!resetXformStack!";
const INVERT_PREFIX: &str = "!invert!";

/// Axis order of a three-axis rotation op.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RotationOrder {
    XYZ,
    XZY,
    YXZ,
    YZX,
    ZXY,
    ZYX,
}

/// A single evaluated transform op.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum XformOp {
    Translate(DVec3),
    Scale(DVec3),
    RotateX(f64),
    RotateY(f64),
    RotateZ(f64),
    /// Euler angles in degrees, applied in the given axis order
    Rotate(RotationOrder, DVec3),
    Orient(DQuat),
    Transform(DMat4),
}

fn axis_rotation(axis: usize, degrees: f64) -> DMat4 {
    let radians = degrees.to_radians();
    match axis {
        0 => DMat4::from_rotation_x(radians),
        1 => DMat4::from_rotation_y(radians),
        _ => DMat4::from_rotation_z(radians),
    }
}

impl XformOp {
    /// Build an op from its attribute name (`xformOp:rotateXYZ:pivot`)
    /// and value.
    pub fn from_attribute(name: &str, value: &Value) -> Option<Self> {
        let kind = name.strip_prefix("xformOp:")?.split(':').next()?;
        let vec3 = || match value {
            Value::Vec3(v) => Some(*v),
            Value::Float(f) => Some(DVec3::splat(*f)),
            _ => None,
        };
        Some(match kind {
            "translate" => XformOp::Translate(vec3()?),
            "scale" => XformOp::Scale(vec3()?),
            "rotateX" => XformOp::RotateX(value.as_float()?),
            "rotateY" => XformOp::RotateY(value.as_float()?),
            "rotateZ" => XformOp::RotateZ(value.as_float()?),
            "rotateXYZ" => XformOp::Rotate(RotationOrder::XYZ, vec3()?),
            "rotateXZY" => XformOp::Rotate(RotationOrder::XZY, vec3()?),
            "rotateYXZ" => XformOp::Rotate(RotationOrder::YXZ, vec3()?),
            "rotateYZX" => XformOp::Rotate(RotationOrder::YZX, vec3()?),
            "rotateZXY" => XformOp::Rotate(RotationOrder::ZXY, vec3()?),
            "rotateZYX" => XformOp::Rotate(RotationOrder::ZYX, vec3()?),
            "orient" => match value {
                // USD quaternions are written real part first
                Value::Vec4(q) => XformOp::Orient(DQuat::from_xyzw(q.y, q.z, q.w, q.x).normalize()),
                _ => return None,
            },
            "transform" => XformOp::Transform(value.as_matrix()?),
            _ => return None,
        })
    }

    pub fn matrix(&self) -> DMat4 {
        match *self {
            XformOp::Translate(t) => DMat4::from_translation(t),
            XformOp::Scale(s) => DMat4::from_scale(s),
            XformOp::RotateX(d) => axis_rotation(0, d),
            XformOp::RotateY(d) => axis_rotation(1, d),
            XformOp::RotateZ(d) => axis_rotation(2, d),
            XformOp::Rotate(order, angles) => {
                // First axis applied first, so it sits rightmost
                let [a, b, c] = match order {
                    RotationOrder::XYZ => [0, 1, 2],
                    RotationOrder::XZY => [0, 2, 1],
                    RotationOrder::YXZ => [1, 0, 2],
                    RotationOrder::YZX => [1, 2, 0],
                    RotationOrder::ZXY => [2, 0, 1],
                    RotationOrder::ZYX => [2, 1, 0],
                };
                let angle = |axis: usize| angles[axis];
                axis_rotation(c, angle(c)) * axis_rotation(b, angle(b)) * axis_rotation(a, angle(a))
            }
            XformOp::Orient(q) => DMat4::from_quat(q),
            XformOp::Transform(m) => m,
        }
    }
}

fn op_order<'a>(prim: &Prim<'a>) -> Vec<String> {
    match prim.get("xformOpOrder", 0.0) {
        Some(Value::StringArray(order)) => order,
        _ => Vec::new(),
    }
}

/// Local transform of `prim` at `time`, and whether it resets the
/// inherited transform stack.
pub fn local_transformation(prim: &Prim<'_>, time: f64) -> (DMat4, bool) {
    let mut result = DMat4::IDENTITY;
    let mut resets = false;

    for entry in op_order(prim) {
        if entry == RESET_XFORM_STACK {
            resets = true;
            result = DMat4::IDENTITY;
            continue;
        }
        let (name, invert) = match entry.strip_prefix(INVERT_PREFIX) {
            Some(name) => (name, true),
            None => (entry.as_str(), false),
        };
        let Some(value) = prim.get(name, time) else {
            log::warn!("{}: xformOp {} has no value", prim.path(), name);
            continue;
        };
        let Some(op) = XformOp::from_attribute(name, &value) else {
            log::warn!("{}: unsupported xformOp {}", prim.path(), name);
            continue;
        };
        let matrix = op.matrix();
        result *= if invert { matrix.inverse() } else { matrix };
    }

    (result, resets)
}

/// Whether the ops authored on `prim` itself may change over time.
pub fn transform_might_be_time_varying(prim: &Prim<'_>) -> bool {
    op_order(prim).iter().any(|entry| {
        let name = entry.strip_prefix(INVERT_PREFIX).unwrap_or(entry);
        prim.attribute(name).is_some_and(|a| a.might_be_time_varying())
    })
}

/// Authored op sample times of `prim` strictly inside `(start, end)`.
pub fn transform_time_samples_in_interval(prim: &Prim<'_>, start: f64, end: f64) -> Vec<f64> {
    let mut times: Vec<f64> = op_order(prim)
        .iter()
        .filter_map(|entry| prim.attribute(entry.strip_prefix(INVERT_PREFIX).unwrap_or(entry)))
        .flat_map(|attr| attr.samples_in_open_interval(start, end))
        .collect();
    times.sort_by(f64::total_cmp);
    times.dedup();
    times
}

/// Memoised local-to-world transforms at one time.
#[derive(Debug, Clone)]
pub struct XformCache {
    time: f64,
    world: HashMap<PrimId, DMat4>,
}

impl XformCache {
    pub fn new(time: f64) -> Self {
        Self {
            time,
            world: HashMap::new(),
        }
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    /// Change the evaluation time, dropping cached results if it differs.
    pub fn set_time(&mut self, time: f64) {
        if time != self.time {
            self.time = time;
            self.world.clear();
        }
    }

    pub fn clear(&mut self) {
        self.world.clear();
    }

    /// World transform of `prim`.
    pub fn local_to_world(&mut self, prim: &Prim<'_>) -> DMat4 {
        if prim.is_pseudo_root() {
            return DMat4::IDENTITY;
        }
        if let Some(matrix) = self.world.get(&prim.id()) {
            return *matrix;
        }

        let (local, resets) = local_transformation(prim, self.time);
        let world = if resets {
            local
        } else {
            self.parent_to_world(prim) * local
        };
        self.world.insert(prim.id(), world);
        world
    }

    /// World transform of the parent of `prim`.
    pub fn parent_to_world(&mut self, prim: &Prim<'_>) -> DMat4 {
        match prim.parent() {
            Some(parent) => self.local_to_world(&parent),
            None => DMat4::IDENTITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::Stage;

    const SCENE: &str = r#"#usda 1.0
def Xform "World" {
    double3 xformOp:translate.timeSamples = {
        0: (0, 0, 0),
        10: (10, 0, 0),
    }
    uniform token[] xformOpOrder = ["xformOp:translate"]

    def Xform "Child" {
        double3 xformOp:translate = (0, 5, 0)
        float xformOp:rotateY = 90
        double3 xformOp:scale = (2, 2, 2)
        uniform token[] xformOpOrder = ["xformOp:translate", "xformOp:rotateY", "xformOp:scale"]
    }

    def Xform "Reset" {
        double3 xformOp:translate = (1, 1, 1)
        uniform token[] xformOpOrder = ["!resetXformStack!", "xformOp:translate"]
    }
}
"#;

    #[test]
    fn test_ops_compose_in_order() {
        let stage = Stage::from_string(SCENE).unwrap();
        let child = stage.prim_at_path("/World/Child").unwrap();

        let (local, resets) = local_transformation(&child, 0.0);
        assert!(!resets);

        // Scale, then rotate about Y, then translate
        let p = local.transform_point3(DVec3::new(1.0, 0.0, 0.0));
        assert!((p - DVec3::new(0.0, 5.0, -2.0)).length() < 1e-9);
    }

    #[test]
    fn test_world_includes_animated_parent() {
        let stage = Stage::from_string(SCENE).unwrap();
        let child = stage.prim_at_path("/World/Child").unwrap();

        let mut cache = XformCache::new(5.0);
        let world = cache.local_to_world(&child);
        assert!(world.w_axis.truncate().abs_diff_eq(DVec3::new(5.0, 5.0, 0.0), 1e-9));

        cache.set_time(10.0);
        let world = cache.local_to_world(&child);
        assert!(world.w_axis.truncate().abs_diff_eq(DVec3::new(10.0, 5.0, 0.0), 1e-9));
    }

    #[test]
    fn test_reset_xform_stack() {
        let stage = Stage::from_string(SCENE).unwrap();
        let reset = stage.prim_at_path("/World/Reset").unwrap();

        let mut cache = XformCache::new(10.0);
        let world = cache.local_to_world(&reset);
        assert!(world.abs_diff_eq(DMat4::from_translation(DVec3::ONE), 1e-12));
    }

    #[test]
    fn test_time_varying_detection() {
        let stage = Stage::from_string(SCENE).unwrap();
        let world = stage.prim_at_path("/World").unwrap();
        let child = stage.prim_at_path("/World/Child").unwrap();

        assert!(transform_might_be_time_varying(&world));
        assert!(!transform_might_be_time_varying(&child));
        assert!(transform_time_samples_in_interval(&world, 0.0, 10.0).is_empty());
        assert_eq!(transform_time_samples_in_interval(&world, -1.0, 11.0), vec![0.0, 10.0]);
    }

    #[test]
    fn test_rotate_xyz_applies_x_first() {
        let op = XformOp::Rotate(RotationOrder::XYZ, DVec3::new(90.0, 90.0, 0.0));
        // +Y rotated about X becomes +Z, then about Y becomes +X
        let p = op.matrix().transform_vector3(DVec3::Y);
        assert!(p.abs_diff_eq(DVec3::X, 1e-9));
    }
}
