//! `UsdLux` lights.

use strata_render::NodeCategory;
use strata_scene::Prim;

use super::common::{read_arnold_parameters, read_inputs};
use crate::context::JobContext;
use crate::error::ReadResult;
use crate::registry::PrimReader;

/// Light inputs carried over; the rest of the light schemas is not
/// translated.
fn light_param(input: &str) -> Option<&str> {
    matches!(input, "intensity" | "color" | "exposure").then_some(input)
}

/// A light schema and the light node it becomes.
pub struct LightReader {
    node_type: &'static str,
}

impl LightReader {
    pub fn new(node_type: &'static str) -> Self {
        Self { node_type }
    }
}

impl PrimReader for LightReader {
    fn category(&self) -> NodeCategory {
        NodeCategory::Light
    }

    fn read<'a>(&self, prim: Prim<'a>, ctx: &mut JobContext<'_, 'a>) -> ReadResult<()> {
        let node = ctx.create_node(self.node_type, prim.path())?;
        ctx.read_matrix(&prim, node, true)?;
        read_inputs(ctx, &prim, node, light_param)?;
        read_arnold_parameters(ctx, &prim, node, "arnold")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_light_params() {
        assert_eq!(light_param("intensity"), Some("intensity"));
        assert_eq!(light_param("color"), Some("color"));
        assert_eq!(light_param("texture:file"), None);
    }
}
