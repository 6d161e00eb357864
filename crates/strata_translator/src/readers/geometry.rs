//! Shape converters.

use strata_math::Vec3;
use strata_render::{AttrValue, NodeCategory};
use strata_scene::{Prim, Value};

use super::common::{
    copy_value, float_value, read_material_binding, read_shape_attributes, read_subsets_material_binding,
    token_value,
};
use crate::context::JobContext;
use crate::error::ReadResult;
use crate::registry::PrimReader;

/// `Mesh` to `polymesh`.
pub struct MeshReader;

impl PrimReader for MeshReader {
    fn category(&self) -> NodeCategory {
        NodeCategory::Shape
    }

    fn read<'a>(&self, prim: Prim<'a>, ctx: &mut JobContext<'_, 'a>) -> ReadResult<()> {
        let node = ctx.create_node("polymesh", prim.path())?;
        let universe = ctx.universe();
        let frame = ctx.time().frame as f64;

        ctx.read_matrix(&prim, node, true)?;
        copy_value(ctx, &prim, "points", node, "vlist")?;
        copy_value(ctx, &prim, "faceVertexCounts", node, "nsides")?;
        copy_value(ctx, &prim, "faceVertexIndices", node, "vidxs")?;

        match token_value(ctx, &prim, "subdivisionScheme").as_deref() {
            Some("catmullClark") => universe.set(node, "subdiv_type", "catclark")?,
            Some("none") => universe.set(node, "subdiv_type", "none")?,
            _ => {}
        }

        let subsets = prim.material_bind_subsets();
        if subsets.is_empty() {
            read_material_binding(ctx, &prim, node, true)?;
        } else {
            let face_count = match prim.get("faceVertexCounts", frame) {
                Some(Value::IntArray(counts)) => counts.len(),
                _ => 0,
            };
            read_subsets_material_binding(ctx, &prim, node, &subsets, face_count, true)?;
        }

        read_shape_attributes(ctx, &prim, node, true)
    }
}

/// The implicit primitives translated to parametric shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Sphere,
    Cube,
    Cylinder,
    Cone,
}

impl Primitive {
    fn node_type(self) -> &'static str {
        match self {
            Primitive::Sphere => "sphere",
            Primitive::Cube => "box",
            Primitive::Cylinder => "cylinder",
            Primitive::Cone => "cone",
        }
    }
}

/// Unit vector of a `X`/`Y`/`Z` axis token, `Z` when absent.
fn axis(token: Option<&str>) -> Vec3 {
    match token {
        Some("X") => Vec3::X,
        Some("Y") => Vec3::Y,
        _ => Vec3::Z,
    }
}

/// `Sphere`, `Cube`, `Cylinder` and `Cone`. Skipped when primitive
/// conversion is turned off.
pub struct PrimitiveReader(pub Primitive);

impl PrimReader for PrimitiveReader {
    fn category(&self) -> NodeCategory {
        NodeCategory::Shape
    }

    fn read<'a>(&self, prim: Prim<'a>, ctx: &mut JobContext<'_, 'a>) -> ReadResult<()> {
        if !ctx.config().convert_primitives {
            return Ok(());
        }

        let node = ctx.create_node(self.0.node_type(), prim.path())?;
        let universe = ctx.universe();
        ctx.read_matrix(&prim, node, true)?;

        match self.0 {
            Primitive::Sphere => {
                let radius = float_value(ctx, &prim, "radius", 1.0) as f32;
                universe.set(node, "radius", radius)?;
            }
            Primitive::Cube => {
                let half = float_value(ctx, &prim, "size", 2.0) as f32 / 2.0;
                universe.set(node, "min", AttrValue::Vec3(Vec3::splat(-half)))?;
                universe.set(node, "max", AttrValue::Vec3(Vec3::splat(half)))?;
            }
            Primitive::Cylinder | Primitive::Cone => {
                let radius = float_value(ctx, &prim, "radius", 1.0) as f32;
                let height = float_value(ctx, &prim, "height", 2.0) as f32;
                let axis = axis(token_value(ctx, &prim, "axis").as_deref());
                universe.set(node, "bottom", AttrValue::Vec3(axis * (-height / 2.0)))?;
                universe.set(node, "top", AttrValue::Vec3(axis * (height / 2.0)))?;
                if self.0 == Primitive::Cone {
                    universe.set(node, "bottom_radius", radius)?;
                    universe.set(node, "top_radius", 0.0f32)?;
                } else {
                    universe.set(node, "radius", radius)?;
                }
            }
        }

        read_material_binding(ctx, &prim, node, true)?;
        read_shape_attributes(ctx, &prim, node, false)
    }
}

/// `Points` to `points`; widths become radii.
pub struct PointsReader;

impl PrimReader for PointsReader {
    fn category(&self) -> NodeCategory {
        NodeCategory::Shape
    }

    fn read<'a>(&self, prim: Prim<'a>, ctx: &mut JobContext<'_, 'a>) -> ReadResult<()> {
        let node = ctx.create_node("points", prim.path())?;
        let universe = ctx.universe();
        let frame = ctx.time().frame as f64;

        ctx.read_matrix(&prim, node, true)?;
        copy_value(ctx, &prim, "points", node, "points")?;

        match prim.get("widths", frame) {
            Some(Value::FloatArray(widths)) if widths.len() == 1 => {
                universe.set(node, "radius", (widths[0] / 2.0) as f32)?;
            }
            Some(Value::FloatArray(widths)) => {
                let radii = widths.iter().map(|w| AttrValue::Float((w / 2.0) as f32)).collect();
                universe.set(node, "radius", AttrValue::Array(radii))?;
            }
            Some(Value::Float(width)) => universe.set(node, "radius", (width / 2.0) as f32)?,
            _ => {}
        }

        read_material_binding(ctx, &prim, node, true)?;
        read_shape_attributes(ctx, &prim, node, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_tokens() {
        assert_eq!(axis(Some("X")), Vec3::X);
        assert_eq!(axis(Some("Y")), Vec3::Y);
        assert_eq!(axis(None), Vec3::Z);
    }
}
