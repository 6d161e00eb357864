//! Arnold node schemas (`ArnoldOptions`, `ArnoldSetParameter`, ...).
//!
//! These prims describe one renderer node each, with parameters authored
//! in the `arnold:` namespace.

use strata_render::NodeCategory;
use strata_scene::Prim;

use super::common::{read_arnold_parameters, read_material_binding, read_shape_attributes};
use crate::context::JobContext;
use crate::error::ReadResult;
use crate::registry::PrimReader;

pub struct ArnoldNodeReader {
    node_type: &'static str,
    category: NodeCategory,
}

impl ArnoldNodeReader {
    pub fn new(node_type: &'static str, category: NodeCategory) -> Self {
        Self { node_type, category }
    }
}

impl PrimReader for ArnoldNodeReader {
    fn category(&self) -> NodeCategory {
        self.category
    }

    fn read<'a>(&self, prim: Prim<'a>, ctx: &mut JobContext<'_, 'a>) -> ReadResult<()> {
        let node = ctx.create_node(self.node_type, prim.path())?;

        if self.category != NodeCategory::Shape {
            return read_arnold_parameters(ctx, &prim, node, "arnold");
        }

        // Not a transformable schema, the matrix comes from the parent
        ctx.read_matrix(&prim, node, false)?;
        read_material_binding(ctx, &prim, node, true)?;
        read_shape_attributes(ctx, &prim, node, false)
    }
}
