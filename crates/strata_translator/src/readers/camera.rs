//! `Camera` prims.

use strata_render::NodeCategory;
use strata_scene::{Prim, Value};

use super::common::{float_value, read_arnold_parameters, token_value};
use crate::context::JobContext;
use crate::error::{ReadError, ReadResult};
use crate::registry::PrimReader;

/// Horizontal field of view in degrees of a lens with `focal_length`
/// over `aperture`, both in the same unit.
pub fn field_of_view(focal_length: f64, aperture: f64) -> f32 {
    (2.0 * (aperture / (2.0 * focal_length)).atan()).to_degrees() as f32
}

pub struct CameraReader;

impl PrimReader for CameraReader {
    fn category(&self) -> NodeCategory {
        NodeCategory::Camera
    }

    fn read<'a>(&self, prim: Prim<'a>, ctx: &mut JobContext<'_, 'a>) -> ReadResult<()> {
        let projection = token_value(ctx, &prim, "projection").unwrap_or_else(|| "perspective".to_string());
        let node_type = match projection.as_str() {
            "perspective" => "persp_camera",
            "orthographic" => "ortho_camera",
            _ => {
                return Err(ReadError::InvalidValue {
                    path: prim.path().to_string(),
                    attribute: "projection".to_string(),
                    value: projection,
                })
            }
        };

        let node = ctx.create_node(node_type, prim.path())?;
        let universe = ctx.universe();
        ctx.read_matrix(&prim, node, true)?;

        if node_type == "persp_camera" {
            let focal_length = float_value(ctx, &prim, "focalLength", 50.0);
            let aperture = float_value(ctx, &prim, "horizontalAperture", 20.955);
            if focal_length > 0.0 {
                universe.set(node, "fov", field_of_view(focal_length, aperture))?;
            }
        }

        if let Some(Value::Vec2(range)) = prim.get("clippingRange", ctx.time().frame as f64) {
            universe.set(node, "near_clip", range.x as f32)?;
            universe.set(node, "far_clip", range.y as f32)?;
        }
        if let Some(open) = prim.get("shutter:open", 0.0).and_then(|v| v.as_float()) {
            universe.set(node, "shutter_start", open as f32)?;
        }
        if let Some(close) = prim.get("shutter:close", 0.0).and_then(|v| v.as_float()) {
            universe.set(node, "shutter_end", close as f32)?;
        }

        read_arnold_parameters(ctx, &prim, node, "arnold")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_of_view() {
        assert!((field_of_view(1.0, 2.0) - 90.0).abs() < 1e-4);
        assert!((field_of_view(50.0, 20.955) - 23.670).abs() < 1e-2);
    }
}
