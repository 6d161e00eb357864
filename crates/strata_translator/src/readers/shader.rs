//! `Shader` prims.

use strata_render::NodeCategory;
use strata_scene::Prim;

use super::common::{read_arnold_parameters, read_inputs, token_value};
use crate::context::JobContext;
use crate::error::ReadResult;
use crate::registry::PrimReader;

const ARNOLD_PREFIX: &str = "arnold:";

/// Renderer node type for a shader `info:id`.
pub fn shader_node_type(id: &str) -> &str {
    match id {
        "UsdPreviewSurface" => "standard_surface",
        _ => id.strip_prefix(ARNOLD_PREFIX).unwrap_or(id),
    }
}

/// Inputs of `UsdPreviewSurface` with a different name on the node.
fn preview_surface_param(input: &str) -> Option<&str> {
    Some(match input {
        "diffuseColor" => "base_color",
        "roughness" => "specular_roughness",
        "metallic" => "metalness",
        "emissiveColor" => "emission_color",
        other => other,
    })
}

fn same_param(input: &str) -> Option<&str> {
    Some(input)
}

pub struct ShaderReader;

impl PrimReader for ShaderReader {
    fn category(&self) -> NodeCategory {
        NodeCategory::Shader
    }

    fn read<'a>(&self, prim: Prim<'a>, ctx: &mut JobContext<'_, 'a>) -> ReadResult<()> {
        let Some(id) = token_value(ctx, &prim, "info:id") else {
            log::warn!("{}: shader has no info:id", prim.path());
            return Ok(());
        };
        let node_type = shader_node_type(&id);
        if ctx.universe().node_entry(node_type).is_none() {
            log::warn!("{}: unknown shader type {}", prim.path(), id);
            return Ok(());
        }

        let node = ctx.create_node(node_type, prim.path())?;
        let param: fn(&str) -> Option<&str> = if id == "UsdPreviewSurface" {
            preview_surface_param
        } else {
            same_param
        };
        read_inputs(ctx, &prim, node, param)?;
        read_arnold_parameters(ctx, &prim, node, "arnold")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shader_node_type() {
        assert_eq!(shader_node_type("arnold:standard_surface"), "standard_surface");
        assert_eq!(shader_node_type("UsdPreviewSurface"), "standard_surface");
        assert_eq!(shader_node_type("image"), "image");
    }

    #[test]
    fn test_preview_surface_params() {
        assert_eq!(preview_surface_param("diffuseColor"), Some("base_color"));
        assert_eq!(preview_surface_param("opacity"), Some("opacity"));
    }
}
