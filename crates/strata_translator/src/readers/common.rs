//! Reading shared by the built-in converters: attribute values, material
//! assignments, primvars and `arnold:` parameters.

use std::collections::HashSet;

use strata_math::to_render_matrix;
use strata_render::{ray, AttrValue, NodeCategory, NodeHandle, NodeParam};
use strata_scene::{Attribute, ConnectedInput, Prim, Primvar, Value};

use crate::connection::{Connection, ConnectionKind, NULL_TARGET};
use crate::context::JobContext;
use crate::error::ReadResult;
use crate::session::DEFAULT_SHADER;

/// Render context searched first for material terminals.
const RENDER_CONTEXT: &str = "arnold";

fn vec3_value(v: strata_math::DVec3, color: bool) -> AttrValue {
    if color {
        AttrValue::Rgb(v.as_vec3())
    } else {
        AttrValue::Vec3(v.as_vec3())
    }
}

/// Convert a scene value to a node value. `type_name` is the declared
/// type without `[]`; it tells colors from vectors and bytes from ints.
pub fn to_attr_value(value: &Value, type_name: &str) -> AttrValue {
    let color = type_name.starts_with("color");
    let byte = type_name == "uchar";
    match value {
        Value::Bool(b) => AttrValue::Bool(*b),
        Value::Int(i) if byte => AttrValue::Byte(*i as u8),
        Value::Int(i) => AttrValue::Int(*i),
        Value::Float(f) => AttrValue::Float(*f as f32),
        Value::String(s) => AttrValue::Str(s.clone()),
        Value::Vec2(v) => AttrValue::Vec2(v.as_vec2()),
        Value::Vec3(v) => vec3_value(*v, color),
        Value::Vec4(v) => AttrValue::Rgba(v.as_vec4()),
        Value::Matrix(m) => AttrValue::Matrix(to_render_matrix(*m)),
        Value::BoolArray(a) => AttrValue::Array(a.iter().map(|b| AttrValue::Bool(*b)).collect()),
        Value::IntArray(a) if byte => AttrValue::Array(a.iter().map(|i| AttrValue::Byte(*i as u8)).collect()),
        Value::IntArray(a) => AttrValue::Array(a.iter().map(|i| AttrValue::Int(*i)).collect()),
        Value::FloatArray(a) => AttrValue::Array(a.iter().map(|f| AttrValue::Float(*f as f32)).collect()),
        Value::StringArray(a) => AttrValue::Array(a.iter().map(|s| AttrValue::Str(s.clone())).collect()),
        Value::Vec2Array(a) => AttrValue::Array(a.iter().map(|v| AttrValue::Vec2(v.as_vec2())).collect()),
        Value::Vec3Array(a) => AttrValue::Array(a.iter().map(|v| vec3_value(*v, color)).collect()),
        Value::Vec4Array(a) => AttrValue::Array(a.iter().map(|v| AttrValue::Rgba(v.as_vec4())).collect()),
        Value::MatrixArray(a) => AttrValue::Array(
            a.iter()
                .map(|m| AttrValue::Matrix(to_render_matrix(*m)))
                .collect(),
        ),
    }
}

/// Value of `name` on `prim` at the current frame, converted.
pub fn read_value(ctx: &JobContext<'_, '_>, prim: &Prim<'_>, name: &str) -> Option<AttrValue> {
    let attr = prim.attribute(name)?;
    let value = attr.get(ctx.time().frame as f64)?;
    Some(to_attr_value(&value, &attr.type_name))
}

/// Copy attribute `name` of `prim` to `param` of `node`, if authored.
pub fn copy_value(
    ctx: &JobContext<'_, '_>,
    prim: &Prim<'_>,
    name: &str,
    node: NodeHandle,
    param: &str,
) -> ReadResult<bool> {
    match read_value(ctx, prim, name) {
        Some(value) => {
            ctx.universe().set(node, param, value)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

pub fn float_value(ctx: &JobContext<'_, '_>, prim: &Prim<'_>, name: &str, default: f64) -> f64 {
    prim.get(name, ctx.time().frame as f64)
        .and_then(|v| v.as_float())
        .unwrap_or(default)
}

pub fn token_value(ctx: &JobContext<'_, '_>, prim: &Prim<'_>, name: &str) -> Option<String> {
    match prim.get(name, ctx.time().frame as f64)? {
        Value::String(token) => Some(token),
        _ => None,
    }
}

/// Surface (or volume) shader path of the material bound to `prim`, and
/// its displacement shader path when `displacement` is requested.
pub fn material_targets(prim: &Prim<'_>, displacement: bool) -> (Option<String>, Option<String>) {
    let Some(material) = prim.compute_bound_material() else {
        return (None, None);
    };

    let shader = material
        .surface_source(RENDER_CONTEXT)
        .or_else(|| material.volume_source(RENDER_CONTEXT))
        .map(|source| source.shader.path().to_string());
    let disp_map = if displacement {
        material
            .displacement_source(RENDER_CONTEXT)
            .map(|source| source.shader.path().to_string())
    } else {
        None
    };
    (shader, disp_map)
}

fn is_polymesh(ctx: &JobContext<'_, '_>, node: NodeHandle) -> ReadResult<bool> {
    Ok(ctx.universe().node_type(node)? == "polymesh")
}

/// Assign the material bound to `prim`. The shader is resolved later
/// through a connection; shapes without a material get the default shader
/// when `assign_default` is set.
pub fn read_material_binding(
    ctx: &mut JobContext<'_, '_>,
    prim: &Prim<'_>,
    node: NodeHandle,
    assign_default: bool,
) -> ReadResult<()> {
    let polymesh = is_polymesh(ctx, node)?;
    let (shader, disp_map) = material_targets(prim, polymesh);

    match shader {
        Some(shader) => ctx.add_connection(Connection::new(node, "shader", shader, ConnectionKind::Ptr)),
        None if assign_default => {
            let default = ctx.default_shader()?;
            ctx.universe().set(node, "shader", AttrValue::Node(Some(default)))?;
        }
        None => {}
    }

    if let Some(disp_map) = disp_map {
        ctx.add_connection(Connection::new(node, "disp_map", disp_map, ConnectionKind::Ptr));
    }
    Ok(())
}

/// Shader name in a subset assignment list.
fn subset_shader(ctx: &mut JobContext<'_, '_>, shader: Option<String>, assign_default: bool) -> ReadResult<String> {
    match shader {
        Some(shader) => Ok(shader),
        None if assign_default => {
            ctx.default_shader()?;
            Ok(DEFAULT_SHADER.to_string())
        }
        None => Ok(NULL_TARGET.to_string()),
    }
}

/// Assign one material per `GeomSubset`. Faces outside every subset use
/// the material of `prim` itself, appended after the subsets' ones.
pub fn read_subsets_material_binding(
    ctx: &mut JobContext<'_, '_>,
    prim: &Prim<'_>,
    node: NodeHandle,
    subsets: &[Prim<'_>],
    face_count: usize,
    assign_default: bool,
) -> ReadResult<()> {
    let polymesh = is_polymesh(ctx, node)?;
    let frame = ctx.time().frame as f64;

    let unassigned = subsets.len().min(u8::MAX as usize) as u8;
    let mut shidxs = vec![unassigned; face_count];
    let mut shaders = Vec::with_capacity(subsets.len() + 1);
    let mut disp_maps = Vec::with_capacity(subsets.len() + 1);
    let mut has_displacement = false;

    for (index, subset) in subsets.iter().enumerate() {
        let (shader, disp_map) = material_targets(subset, polymesh);
        shaders.push(subset_shader(ctx, shader, assign_default)?);
        has_displacement |= disp_map.is_some();
        disp_maps.push(disp_map.unwrap_or_else(|| NULL_TARGET.to_string()));

        if let Some(Value::IntArray(indices)) = subset.get("indices", frame) {
            for face in indices {
                if let Some(slot) = usize::try_from(face).ok().and_then(|f| shidxs.get_mut(f)) {
                    *slot = index as u8;
                }
            }
        }
    }

    if shidxs.contains(&unassigned) {
        let (shader, disp_map) = material_targets(prim, polymesh);
        shaders.push(subset_shader(ctx, shader, assign_default)?);
        has_displacement |= disp_map.is_some();
        disp_maps.push(disp_map.unwrap_or_else(|| NULL_TARGET.to_string()));
    }

    if !shaders.is_empty() {
        ctx.add_connection(Connection::new(node, "shader", shaders.join(" "), ConnectionKind::Array));
    }
    if has_displacement {
        ctx.add_connection(Connection::new(node, "disp_map", disp_maps.join(" "), ConnectionKind::Array));
    }
    ctx.universe().set(
        node,
        "shidxs",
        AttrValue::Array(shidxs.into_iter().map(AttrValue::Byte).collect()),
    )?;
    Ok(())
}

/// First element of a single-valued array, the value itself otherwise.
fn constant_value(value: AttrValue) -> AttrValue {
    match value {
        AttrValue::Array(mut items) if !items.is_empty() => items.swap_remove(0),
        other => other,
    }
}

/// Set the primvars of `prim` as user data on `node`: its own varying
/// primvars plus the constant ones inherited down to it. Namespaced
/// primvars are skipped. On polymeshes `st`/`uv` and `normals` fill the
/// `uvlist` and `nlist` arrays.
pub fn read_primvars<'a>(
    ctx: &mut JobContext<'_, 'a>,
    prim: &Prim<'a>,
    node: NodeHandle,
    is_polymesh: bool,
) -> ReadResult<()> {
    let universe = ctx.universe();
    let frame = ctx.time().frame as f64;

    let local: Vec<Primvar<'a>> = prim
        .authored_primvars()
        .into_iter()
        .filter(|p| !p.is_inheritable())
        .collect();
    let primvars: Vec<Primvar<'a>> = local.into_iter().chain(ctx.primvars().iter().copied()).collect();

    let mut seen = HashSet::new();
    for primvar in primvars {
        if primvar.name().contains(':') || !seen.insert(primvar.name()) {
            continue;
        }
        let Some(value) = primvar.get(frame) else {
            continue;
        };
        let interpolation = primvar.interpolation();
        let value = to_attr_value(&value, primvar.type_name());

        let (name, index_name, mesh_array) = match primvar.name() {
            "uv" | "st" if is_polymesh && matches!(value, AttrValue::Array(_)) => {
                ("uvlist".to_string(), "uvidxs".to_string(), true)
            }
            "normals" if is_polymesh => ("nlist".to_string(), "nidxs".to_string(), true),
            other => (other.to_string(), format!("{}idxs", other), false),
        };

        // Per-vertex mesh arrays are indexed like the vertices
        if mesh_array && matches!(interpolation, "vertex" | "varying") {
            if let Some(vidxs) = universe.get(node, "vidxs") {
                universe.set(node, &index_name, vidxs)?;
            }
        }

        if interpolation == "faceVarying" {
            let indices = primvar_indices(&primvar, frame).unwrap_or_else(|| {
                let count = value.as_array().map_or(0, <[AttrValue]>::len);
                (0..count as i64).collect()
            });
            if !indices.is_empty() {
                universe.set(
                    node,
                    &index_name,
                    AttrValue::Array(indices.into_iter().map(AttrValue::Int).collect()),
                )?;
            }
        }

        let value = if interpolation == "constant" {
            constant_value(value)
        } else {
            value
        };
        universe.set(node, &name, value)?;
    }
    Ok(())
}

fn primvar_indices(primvar: &Primvar<'_>, frame: f64) -> Option<Vec<i64>> {
    let attr = primvar.owner().attribute(&format!("{}:indices", primvar.attribute().name))?;
    match attr.get(frame)? {
        Value::IntArray(indices) if !indices.is_empty() => Some(indices),
        _ => None,
    }
}

fn ray_bit(ray_name: &str) -> u8 {
    match ray_name {
        "camera" => ray::CAMERA,
        "shadow" => ray::SHADOW,
        "diffuse_transmit" => ray::DIFFUSE_TRANSMIT,
        "specular_transmit" => ray::SPECULAR_TRANSMIT,
        "volume" => ray::VOLUME,
        "diffuse_reflect" => ray::DIFFUSE_REFLECT,
        "specular_reflect" => ray::SPECULAR_REFLECT,
        "subsurface" => ray::SUBSURFACE,
        _ => ray::NONE,
    }
}

/// Update one ray bit of a visibility-like byte parameter.
fn set_ray_flag(ctx: &JobContext<'_, '_>, node: NodeHandle, param: &str, ray_name: &str, value: &Value) -> ReadResult<()> {
    let Some(enabled) = value.as_bool() else {
        return Ok(());
    };
    let universe = ctx.universe();
    let current = universe
        .get(node, param)
        .and_then(|v| v.as_int())
        .map_or(ray::ALL, |v| v as u8);
    let bit = ray_bit(ray_name);
    let flags = if enabled { current | bit } else { current & !bit };
    universe.set(node, param, AttrValue::Byte(flags))?;
    Ok(())
}

/// Queue a link from the shader output connected to `attr`. A node graph
/// input holding a value sets that value instead.
fn read_attribute_link(
    ctx: &mut JobContext<'_, '_>,
    prim: &Prim<'_>,
    attr: &Attribute,
    node: NodeHandle,
    param: &str,
) -> ReadResult<()> {
    match prim.connected_input(&attr.name) {
        Some(ConnectedInput::Output(source)) => ctx.add_connection(
            Connection::new(node, param, source.shader.path(), ConnectionKind::Link)
                .with_output(format!("outputs:{}", source.output)),
        ),
        Some(ConnectedInput::Value(input)) => {
            if let Some(value) = input.get(ctx.time().frame as f64) {
                ctx.universe().set(node, param, to_attr_value(&value, &input.type_name))?;
            }
        }
        None => log::debug!("{}: {} is connected to nothing", prim.path(), attr.name),
    }
    Ok(())
}

/// Index of an array element attribute name (`i3` for element 3).
fn array_element_index(name: &str) -> Option<usize> {
    name.strip_prefix('i')?.parse().ok()
}

/// Link one element of an array parameter. Arrays can't be linked per
/// element in the scene, so element `N` of `<scope>:<param>` is authored
/// as a connected `<scope>:<param>:iN`.
fn read_array_link(
    ctx: &mut JobContext<'_, '_>,
    prim: &Prim<'_>,
    attr: &Attribute,
    node: NodeHandle,
    param: &str,
) -> ReadResult<()> {
    match array_element_index(attr.base_name()) {
        Some(index) if attr.has_authored_connections() => {
            read_attribute_link(ctx, prim, attr, node, &format!("{}[{}]", param, index))
        }
        _ => Ok(()),
    }
}

/// Read the attributes of `prim` in the `scope` namespace as parameters
/// of `node`. `name` renames the node; parameters holding nodes become
/// connections; `visibility:<ray>` and `sidedness:<ray>` toggle ray bits
/// on shapes.
pub fn read_arnold_parameters(
    ctx: &mut JobContext<'_, '_>,
    prim: &Prim<'_>,
    node: NodeHandle,
    scope: &str,
) -> ReadResult<()> {
    let universe = ctx.universe();
    let entry = universe.node_type_entry(node)?;
    let is_shape = entry.category == NodeCategory::Shape;
    let frame = ctx.time().frame as f64;

    for attr in prim.attributes() {
        let namespace = attr.namespace();
        let param = attr.base_name();
        if param.is_empty() {
            continue;
        }

        if namespace != scope {
            let ray_param = namespace
                .strip_prefix(scope)
                .and_then(|rest| rest.strip_prefix(':'))
                .filter(|rest| matches!(*rest, "visibility" | "sidedness" | "autobump_visibility"));
            if let (true, Some(ray_param), Some(value)) = (is_shape, ray_param, attr.get(frame)) {
                set_ray_flag(ctx, node, ray_param, param, &value)?;
            }
            if let Some(array_param) = namespace.strip_prefix(scope).and_then(|rest| rest.strip_prefix(':')) {
                read_array_link(ctx, prim, attr, node, array_param)?;
            }
            continue;
        }

        if param == "name" {
            if let Some(Value::String(name)) = attr.get(frame) {
                if !name.is_empty() && name != prim.path() {
                    universe.set_name(node, &name)?;
                    ctx.add_node_name(prim.path(), node);
                }
            }
            continue;
        }

        if attr.has_authored_connections() {
            read_attribute_link(ctx, prim, attr, node, param)?;
            continue;
        }

        let Some(value) = attr.get(frame) else {
            continue;
        };
        match (entry.node_param(param), value) {
            (Some(NodeParam::Node), Value::String(target)) => {
                if !target.is_empty() {
                    ctx.add_connection(Connection::new(node, param, target, ConnectionKind::Ptr));
                }
            }
            (Some(NodeParam::NodeArray), Value::String(target)) => {
                ctx.add_connection(Connection::new(node, param, target, ConnectionKind::Array));
            }
            (Some(NodeParam::NodeArray), Value::StringArray(targets)) => {
                ctx.add_connection(Connection::new(node, param, targets.join(" "), ConnectionKind::Array));
            }
            (_, value) => universe.set(node, param, to_attr_value(&value, &attr.type_name))?,
        }
    }
    Ok(())
}

/// Read `inputs:` attributes of `prim`. `param` maps an input name to the
/// node parameter it sets, `None` skips the input. Connected inputs become
/// links.
pub fn read_inputs(
    ctx: &mut JobContext<'_, '_>,
    prim: &Prim<'_>,
    node: NodeHandle,
    param: fn(&str) -> Option<&str>,
) -> ReadResult<()> {
    let frame = ctx.time().frame as f64;
    for attr in prim.attributes() {
        let namespace = attr.namespace();
        if let Some(array_input) = namespace.strip_prefix("inputs:") {
            if let Some(array_param) = param(array_input) {
                read_array_link(ctx, prim, attr, node, array_param)?;
            }
            continue;
        }
        if namespace != "inputs" {
            continue;
        }
        let Some(param) = param(attr.base_name()) else {
            continue;
        };
        if attr.has_authored_connections() {
            read_attribute_link(ctx, prim, attr, node, param)?;
        } else if let Some(value) = attr.get(frame) {
            ctx.universe().set(node, param, to_attr_value(&value, &attr.type_name))?;
        }
    }
    Ok(())
}

/// Primvars, `arnold:` parameters and visibility of a shape.
pub fn read_shape_attributes<'a>(
    ctx: &mut JobContext<'_, 'a>,
    prim: &Prim<'a>,
    node: NodeHandle,
    is_polymesh: bool,
) -> ReadResult<()> {
    read_primvars(ctx, prim, node, is_polymesh)?;
    read_arnold_parameters(ctx, prim, node, "arnold")?;

    let frame = ctx.time().frame;
    if !ctx.prim_visibility(prim, frame) {
        ctx.universe().set(node, "visibility", AttrValue::Byte(ray::NONE))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_math::{DVec3, Vec3};

    #[test]
    fn test_to_attr_value_types() {
        let color = Value::Vec3(DVec3::new(1.0, 0.5, 0.0));
        assert_eq!(to_attr_value(&color, "color3f"), AttrValue::Rgb(Vec3::new(1.0, 0.5, 0.0)));
        assert_eq!(to_attr_value(&color, "float3"), AttrValue::Vec3(Vec3::new(1.0, 0.5, 0.0)));
        assert_eq!(to_attr_value(&Value::Int(3), "uchar"), AttrValue::Byte(3));
        assert_eq!(to_attr_value(&Value::Int(3), "int"), AttrValue::Int(3));
        assert_eq!(
            to_attr_value(&Value::FloatArray(vec![0.5, 2.0]), "float"),
            AttrValue::Array(vec![AttrValue::Float(0.5), AttrValue::Float(2.0)])
        );
    }

    #[test]
    fn test_constant_value() {
        let single = AttrValue::Array(vec![AttrValue::Rgb(Vec3::X)]);
        assert_eq!(constant_value(single), AttrValue::Rgb(Vec3::X));
        assert_eq!(constant_value(AttrValue::Float(1.0)), AttrValue::Float(1.0));
    }

    #[test]
    fn test_ray_bits() {
        assert_eq!(ray_bit("camera"), ray::CAMERA);
        assert_eq!(ray_bit("subsurface"), ray::SUBSURFACE);
        assert_eq!(ray_bit("unknown"), ray::NONE);
    }

    #[test]
    fn test_array_element_index() {
        assert_eq!(array_element_index("i0"), Some(0));
        assert_eq!(array_element_index("i12"), Some(12));
        assert_eq!(array_element_index("i"), None);
        assert_eq!(array_element_index("i-1"), None);
        assert_eq!(array_element_index("camera"), None);
    }
}
