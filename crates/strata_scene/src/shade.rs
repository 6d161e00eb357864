//! Material binding and shader source resolution.

use crate::prim::Prim;
use crate::value::Attribute;

const BINDING: &str = "material:binding";

/// Node graphs can forward outputs; deeper chains are treated as cycles.
const MAX_CONNECTION_HOPS: usize = 16;

/// The shader output feeding a material terminal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShaderSource<'a> {
    pub shader: Prim<'a>,
    /// Output name without the `outputs:` namespace
    pub output: &'a str,
}

/// What a connected attribute reads from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ConnectedInput<'a> {
    Output(ShaderSource<'a>),
    /// Node graph input holding a value rather than a connection
    Value(&'a Attribute),
}

/// Split `/Mat/Tex.outputs:rgb` into the prim path and property name.
pub fn split_property_path(path: &str) -> (&str, &str) {
    match path.rfind('.') {
        Some(pos) if path[pos..].find('/').is_none() => (&path[..pos], &path[pos + 1..]),
        _ => (path, ""),
    }
}

impl<'a> Prim<'a> {
    /// Material bound directly on this prim.
    pub fn direct_material(&self) -> Option<Prim<'a>> {
        let target = self.relationship(BINDING)?.targets.first()?;
        self.stage().prim_at_path(target)
    }

    /// Material bound on this prim or the nearest ancestor with a binding.
    pub fn compute_bound_material(&self) -> Option<Prim<'a>> {
        std::iter::once(*self)
            .chain(self.ancestors())
            .find_map(|p| p.direct_material())
    }

    /// `GeomSubset` children partitioning faces for material binding.
    pub fn material_bind_subsets(&self) -> Vec<Prim<'a>> {
        self.children()
            .filter(|c| c.type_name() == "GeomSubset")
            .filter(|c| c.get("familyName", 0.0).and_then(|v| v.as_str().map(|s| s == "materialBind")) == Some(true))
            .collect()
    }

    /// What a connected attribute reads from, following node graph
    /// outputs and inputs until a shader or a value is reached.
    pub fn connected_input(&self, attribute: &str) -> Option<ConnectedInput<'a>> {
        let mut attribute = self.attribute(attribute)?;

        for _ in 0..MAX_CONNECTION_HOPS {
            let target = attribute.connections.first()?;
            let (prim_path, property) = split_property_path(target);
            let source = self.stage().prim_at_path(prim_path)?;

            if matches!(source.type_name(), "NodeGraph" | "Material") {
                let forwarded = source.attribute(property)?;
                if !forwarded.has_authored_connections() {
                    return Some(ConnectedInput::Value(forwarded));
                }
                attribute = forwarded;
                continue;
            }

            let output = property.strip_prefix("outputs:").unwrap_or(property);
            return Some(ConnectedInput::Output(ShaderSource { shader: source, output }));
        }

        log::warn!("{}: connection chain too deep", self.path());
        None
    }

    /// Shader output feeding a connected attribute.
    pub fn connected_source(&self, attribute: &str) -> Option<ShaderSource<'a>> {
        match self.connected_input(attribute)? {
            ConnectedInput::Output(source) => Some(source),
            ConnectedInput::Value(_) => None,
        }
    }

    fn terminal_source(&self, terminal: &str, render_context: &str) -> Option<ShaderSource<'a>> {
        self.connected_source(&format!("outputs:{}:{}", render_context, terminal))
            .or_else(|| self.connected_source(&format!("outputs:{}", terminal)))
    }

    /// Surface shader of a material, render context first.
    pub fn surface_source(&self, render_context: &str) -> Option<ShaderSource<'a>> {
        self.terminal_source("surface", render_context)
    }

    pub fn volume_source(&self, render_context: &str) -> Option<ShaderSource<'a>> {
        self.terminal_source("volume", render_context)
    }

    pub fn displacement_source(&self, render_context: &str) -> Option<ShaderSource<'a>> {
        self.terminal_source("displacement", render_context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::Stage;

    const SCENE: &str = r#"#usda 1.0
def Xform "World" {
    rel material:binding = </World/Looks/Default>

    def Sphere "Ball" {
        rel material:binding = </World/Looks/Red>
    }
    def Cube "Box" {}
    def Mesh "Split" {
        def GeomSubset "Top" {
            uniform token familyName = "materialBind"
            rel material:binding = </World/Looks/Red>
        }
        def GeomSubset "Other" {
            uniform token familyName = "partition"
        }
    }

    def Scope "Looks" {
        def Material "Red" {
            token outputs:surface.connect = </World/Looks/Red/Preview.outputs:surface>
            token outputs:arnold:surface.connect = </World/Looks/Red/Graph.outputs:out>

            def Shader "Preview" {
                uniform token info:id = "UsdPreviewSurface"
            }
            def NodeGraph "Graph" {
                token outputs:out.connect = </World/Looks/Red/Surf.outputs:shader>
            }
            def Shader "Surf" {
                uniform token info:id = "arnold:standard_surface"
            }
        }
        def NodeGraph "Controls" {
            float inputs:gain = 0.5
            color3f inputs:tint.connect = </World/Looks/Red/Surf.outputs:out>
        }
        def Shader "Mixer" {
            float inputs:weight.connect = </World/Looks/Controls.inputs:gain>
            color3f inputs:color.connect = </World/Looks/Controls.inputs:tint>
            color3f inputs:missing.connect = </World/Looks/Controls.inputs:nothing>
        }
        def Material "Default" {
            token outputs:volume.connect = </World/Looks/Default/Fog.outputs:volume>
            def Shader "Fog" {}
        }
    }
}
"#;

    #[test]
    fn test_bound_material_walks_ancestors() {
        let stage = Stage::from_string(SCENE).unwrap();

        let ball = stage.prim_at_path("/World/Ball").unwrap();
        assert_eq!(ball.compute_bound_material().unwrap().path(), "/World/Looks/Red");

        let cube = stage.prim_at_path("/World/Box").unwrap();
        assert_eq!(cube.compute_bound_material().unwrap().path(), "/World/Looks/Default");
    }

    #[test]
    fn test_render_context_output_wins() {
        let stage = Stage::from_string(SCENE).unwrap();
        let red = stage.prim_at_path("/World/Looks/Red").unwrap();

        let arnold = red.surface_source("arnold").unwrap();
        assert_eq!(arnold.shader.path(), "/World/Looks/Red/Surf");
        assert_eq!(arnold.output, "shader");

        let other = red.surface_source("ri").unwrap();
        assert_eq!(other.shader.path(), "/World/Looks/Red/Preview");
    }

    #[test]
    fn test_volume_without_surface() {
        let stage = Stage::from_string(SCENE).unwrap();
        let material = stage.prim_at_path("/World/Looks/Default").unwrap();

        assert!(material.surface_source("arnold").is_none());
        assert_eq!(material.volume_source("arnold").unwrap().shader.name(), "Fog");
    }

    #[test]
    fn test_node_graph_inputs() {
        let stage = Stage::from_string(SCENE).unwrap();
        let mixer = stage.prim_at_path("/World/Looks/Mixer").unwrap();

        match mixer.connected_input("inputs:weight") {
            Some(ConnectedInput::Value(attr)) => assert_eq!(attr.name, "inputs:gain"),
            other => panic!("expected a value, got {:?}", other),
        }
        assert!(mixer.connected_source("inputs:weight").is_none());

        let color = mixer.connected_source("inputs:color").unwrap();
        assert_eq!(color.shader.path(), "/World/Looks/Red/Surf");
        assert_eq!(color.output, "out");

        assert_eq!(mixer.connected_input("inputs:missing"), None);
    }

    #[test]
    fn test_material_bind_subsets() {
        let stage = Stage::from_string(SCENE).unwrap();
        let split = stage.prim_at_path("/World/Split").unwrap();

        let subsets = split.material_bind_subsets();
        assert_eq!(subsets.len(), 1);
        assert_eq!(subsets[0].name(), "Top");
    }

    #[test]
    fn test_split_property_path() {
        assert_eq!(split_property_path("/A/B.outputs:rgb"), ("/A/B", "outputs:rgb"));
        assert_eq!(split_property_path("/A/B"), ("/A/B", ""));
    }
}
