//! Built-in prim converters.

mod arnold;
mod camera;
pub mod common;
mod geometry;
mod light;
mod shader;

pub use arnold::ArnoldNodeReader;
pub use camera::{field_of_view, CameraReader};
pub use geometry::{MeshReader, PointsReader, Primitive, PrimitiveReader};
pub use light::LightReader;
pub use shader::{shader_node_type, ShaderReader};

use strata_render::NodeCategory;

use crate::registry::ReaderRegistry;

/// Prim types recognised but not translated.
const UNSUPPORTED: &[&str] = &["BasisCurves", "NurbsCurves", "NurbsPatch", "PointInstancer", "Volume"];

pub(crate) fn register_builtin(registry: &mut ReaderRegistry) {
    registry.register("Mesh", MeshReader);
    registry.register("Sphere", PrimitiveReader(Primitive::Sphere));
    registry.register("Cube", PrimitiveReader(Primitive::Cube));
    registry.register("Cylinder", PrimitiveReader(Primitive::Cylinder));
    registry.register("Cone", PrimitiveReader(Primitive::Cone));
    registry.register("Points", PointsReader);

    registry.register("Shader", ShaderReader);
    registry.register("Camera", CameraReader);

    registry.register("DistantLight", LightReader::new("distant_light"));
    registry.register("SphereLight", LightReader::new("point_light"));
    registry.register("DomeLight", LightReader::new("skydome_light"));
    registry.register("RectLight", LightReader::new("quad_light"));
    registry.register("DiskLight", LightReader::new("disk_light"));

    registry.register("ArnoldOptions", ArnoldNodeReader::new("options", NodeCategory::Options));
    registry.register(
        "ArnoldSetParameter",
        ArnoldNodeReader::new("set_parameter", NodeCategory::Operator),
    );
    registry.register("ArnoldCollection", ArnoldNodeReader::new("collection", NodeCategory::Operator));
    registry.register("ArnoldDisk", ArnoldNodeReader::new("disk", NodeCategory::Shape));
    registry.register("ArnoldPlane", ArnoldNodeReader::new("plane", NodeCategory::Shape));

    for type_name in UNSUPPORTED {
        registry.register_unsupported(*type_name);
    }
}
