//! Handle-free, serializable view of a universe.
//!
//! Node references are written as node names so two universes built in a
//! different order compare equal when their graphs match.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use crate::node::NodeHandle;
use crate::universe::Universe;
use crate::value::AttrValue;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub parent: Option<String>,
    pub attributes: BTreeMap<String, JsonValue>,
    /// Parameter to `source` or `source.component`
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub links: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UniverseSnapshot {
    /// Nodes sorted by name, then type
    pub nodes: Vec<NodeSnapshot>,
}

impl UniverseSnapshot {
    pub fn node(&self, name: &str) -> Option<&NodeSnapshot> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.name.as_str()).collect()
    }
}

fn node_ref(universe: &Universe, handle: Option<NodeHandle>) -> JsonValue {
    match handle {
        Some(h) => universe.node_name(h).map(JsonValue::String).unwrap_or(JsonValue::Null),
        None => JsonValue::Null,
    }
}

fn to_json(universe: &Universe, value: &AttrValue) -> JsonValue {
    match value {
        AttrValue::Bool(b) => json!(b),
        AttrValue::Byte(b) => json!(b),
        AttrValue::Int(i) => json!(i),
        AttrValue::Float(f) => json!(f),
        AttrValue::Str(s) => json!(s),
        AttrValue::Vec2(v) => json!(v.to_array()),
        AttrValue::Vec3(v) | AttrValue::Rgb(v) => json!(v.to_array()),
        AttrValue::Rgba(v) => json!(v.to_array()),
        AttrValue::Matrix(m) => json!(m.to_cols_array()),
        AttrValue::Node(handle) => node_ref(universe, *handle),
        AttrValue::Array(items) => JsonValue::Array(items.iter().map(|v| to_json(universe, v)).collect()),
    }
}

impl Universe {
    /// Serializable copy of every node.
    pub fn snapshot(&self) -> UniverseSnapshot {
        self.snapshot_of(&self.nodes())
    }

    /// Serializable copy of `handles`.
    pub fn snapshot_of(&self, handles: &[NodeHandle]) -> UniverseSnapshot {
        let mut nodes: Vec<NodeSnapshot> = handles
            .iter()
            .filter_map(|&handle| {
                let name = self.node_name(handle).ok()?;
                let node_type = self.node_type(handle).ok()?;
                let parent = self
                    .node_parent(handle)
                    .ok()
                    .flatten()
                    .and_then(|p| self.node_name(p).ok());

                let attributes = self
                    .attribute_names(handle)
                    .into_iter()
                    .filter_map(|param| {
                        let value = self.get(handle, &param)?;
                        Some((param, to_json(self, &value)))
                    })
                    .collect();

                let links = self
                    .linked_params(handle)
                    .into_iter()
                    .filter_map(|param| {
                        let link = self.get_link(handle, &param)?;
                        let source = self.node_name(link.source).ok()?;
                        let target = match link.output {
                            Some(output) => format!("{}.{}", source, output),
                            None => source,
                        };
                        Some((param, target))
                    })
                    .collect();

                Some(NodeSnapshot {
                    name,
                    node_type,
                    parent,
                    attributes,
                    links,
                })
            })
            .collect();

        nodes.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.node_type.cmp(&b.node_type)));
        UniverseSnapshot { nodes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_uses_names() {
        let universe = Universe::new();
        let surf = universe.create_node("standard_surface", "/Mat/Surf", None).unwrap();
        let ball = universe.create_node("sphere", "/Ball", None).unwrap();
        let tex = universe.create_node("image", "/Mat/Tex", None).unwrap();

        universe
            .set(ball, "shader", AttrValue::Array(vec![AttrValue::Node(Some(surf))]))
            .unwrap();
        universe.set(ball, "radius", 2.0f32).unwrap();
        universe.link_output(tex, Some("g"), surf, "specular").unwrap();

        let snapshot = universe.snapshot();
        assert_eq!(snapshot.names(), vec!["/Ball", "/Mat/Surf", "/Mat/Tex"]);

        let ball = snapshot.node("/Ball").unwrap();
        assert_eq!(ball.attributes["shader"], json!(["/Mat/Surf"]));
        assert_eq!(ball.attributes["radius"], json!(2.0));

        let surf = snapshot.node("/Mat/Surf").unwrap();
        assert_eq!(surf.links["specular"], "/Mat/Tex.g");
    }

    #[test]
    fn test_snapshot_ignores_creation_order() {
        let a = Universe::new();
        a.create_node("box", "one", None).unwrap();
        a.create_node("cone", "two", None).unwrap();

        let b = Universe::new();
        b.create_node("cone", "two", None).unwrap();
        b.create_node("box", "one", None).unwrap();

        assert_eq!(a.snapshot(), b.snapshot());
        let json = serde_json::to_string(&a.snapshot()).unwrap();
        assert!(json.contains("\"type\":\"box\""));
    }
}
