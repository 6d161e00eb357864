//! Node handles, categories and node type entries.

use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

/// Handle to a node owned by a [`crate::Universe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(pub(crate) u32);

impl NodeHandle {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What kind of node a node type produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCategory {
    Options,
    Camera,
    Light,
    Shape,
    Shader,
    Override,
    Driver,
    Filter,
    ColorManager,
    Operator,
}

impl NodeCategory {
    pub const ALL: [NodeCategory; 10] = [
        NodeCategory::Options,
        NodeCategory::Camera,
        NodeCategory::Light,
        NodeCategory::Shape,
        NodeCategory::Shader,
        NodeCategory::Override,
        NodeCategory::Driver,
        NodeCategory::Filter,
        NodeCategory::ColorManager,
        NodeCategory::Operator,
    ];

    /// Bit of this category in a [`NodeMask`].
    pub fn mask(self) -> NodeMask {
        NodeMask(match self {
            NodeCategory::Options => 0x1,
            NodeCategory::Camera => 0x2,
            NodeCategory::Light => 0x4,
            NodeCategory::Shape => 0x8,
            NodeCategory::Shader => 0x10,
            NodeCategory::Override => 0x20,
            NodeCategory::Driver => 0x40,
            NodeCategory::Filter => 0x80,
            NodeCategory::ColorManager => 0x800,
            NodeCategory::Operator => 0x1000,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            NodeCategory::Options => "options",
            NodeCategory::Camera => "camera",
            NodeCategory::Light => "light",
            NodeCategory::Shape => "shape",
            NodeCategory::Shader => "shader",
            NodeCategory::Override => "override",
            NodeCategory::Driver => "driver",
            NodeCategory::Filter => "filter",
            NodeCategory::ColorManager => "color_manager",
            NodeCategory::Operator => "operator",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

/// Set of node categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeMask(pub u32);

impl NodeMask {
    pub const NONE: NodeMask = NodeMask(0);
    pub const OPTIONS: NodeMask = NodeMask(0x1);
    pub const CAMERA: NodeMask = NodeMask(0x2);
    pub const LIGHT: NodeMask = NodeMask(0x4);
    pub const SHAPE: NodeMask = NodeMask(0x8);
    pub const SHADER: NodeMask = NodeMask(0x10);
    pub const OVERRIDE: NodeMask = NodeMask(0x20);
    pub const DRIVER: NodeMask = NodeMask(0x40);
    pub const FILTER: NodeMask = NodeMask(0x80);
    pub const COLOR_MANAGER: NodeMask = NodeMask(0x800);
    pub const OPERATOR: NodeMask = NodeMask(0x1000);
    pub const ALL: NodeMask = NodeMask(0xFFFF);

    pub fn contains(self, category: NodeCategory) -> bool {
        self.0 & category.mask().0 != 0
    }

    /// Parse a comma separated list of category names (`shape,shader`),
    /// or `all`.
    pub fn parse(list: &str) -> Option<Self> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .try_fold(NodeMask::NONE, |mask, name| match name {
                "all" => Some(NodeMask::ALL),
                _ => NodeCategory::from_name(name).map(|c| mask | c.mask()),
            })
    }
}

impl Default for NodeMask {
    fn default() -> Self {
        NodeMask::ALL
    }
}

impl BitOr for NodeMask {
    type Output = NodeMask;
    fn bitor(self, rhs: NodeMask) -> NodeMask {
        NodeMask(self.0 | rhs.0)
    }
}

impl BitOrAssign for NodeMask {
    fn bitor_assign(&mut self, rhs: NodeMask) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for NodeMask {
    type Output = NodeMask;
    fn bitand(self, rhs: NodeMask) -> NodeMask {
        NodeMask(self.0 & rhs.0)
    }
}

impl BitAndAssign for NodeMask {
    fn bitand_assign(&mut self, rhs: NodeMask) {
        self.0 &= rhs.0;
    }
}

/// Kind of a parameter that references other nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeParam {
    /// A single node pointer
    Node,
    /// An array of node pointers
    NodeArray,
}

/// A node type known to a universe.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeEntry {
    pub name: String,
    pub category: NodeCategory,
    /// Parameters holding node references
    pub node_params: Vec<(String, NodeParam)>,
}

impl NodeEntry {
    pub fn new(name: impl Into<String>, category: NodeCategory) -> Self {
        Self {
            name: name.into(),
            category,
            node_params: Vec::new(),
        }
    }

    pub fn with_node_param(mut self, name: impl Into<String>, kind: NodeParam) -> Self {
        self.node_params.push((name.into(), kind));
        self
    }

    /// Kind of `param` if it references nodes.
    pub fn node_param(&self, param: &str) -> Option<NodeParam> {
        self.node_params.iter().find(|(name, _)| name == param).map(|(_, kind)| *kind)
    }
}

const SHAPES: &[&str] = &[
    "polymesh", "sphere", "box", "cylinder", "cone", "disk", "plane", "points", "curves", "nurbs", "implicit",
    "volume", "usd", "procedural",
];

const SHADERS: &[&str] = &[
    "standard_surface",
    "standard_volume",
    "standard_hair",
    "lambert",
    "flat",
    "utility",
    "image",
    "user_data_rgb",
    "user_data_rgba",
    "user_data_float",
    "user_data_int",
    "user_data_string",
    "mix_shader",
    "layer_rgba",
    "multiply",
    "add",
    "noise",
    "ramp_rgb",
    "normal_map",
    "bump2d",
    "displacement",
    "set_transform",
];

/// Node types every universe starts with.
pub(crate) fn builtin_entries() -> Vec<NodeEntry> {
    let mut entries = vec![
        NodeEntry::new("options", NodeCategory::Options).with_node_param("camera", NodeParam::Node),
        NodeEntry::new("persp_camera", NodeCategory::Camera),
        NodeEntry::new("ortho_camera", NodeCategory::Camera),
        NodeEntry::new("distant_light", NodeCategory::Light),
        NodeEntry::new("point_light", NodeCategory::Light),
        NodeEntry::new("skydome_light", NodeCategory::Light).with_node_param("shader", NodeParam::Node),
        NodeEntry::new("quad_light", NodeCategory::Light).with_node_param("shader", NodeParam::Node),
        NodeEntry::new("disk_light", NodeCategory::Light),
        NodeEntry::new("cylinder_light", NodeCategory::Light),
        NodeEntry::new("mesh_light", NodeCategory::Light).with_node_param("mesh", NodeParam::Node),
        NodeEntry::new("ginstance", NodeCategory::Shape)
            .with_node_param("node", NodeParam::Node)
            .with_node_param("shader", NodeParam::NodeArray),
        NodeEntry::new("driver_exr", NodeCategory::Driver),
        NodeEntry::new("gaussian_filter", NodeCategory::Filter),
        NodeEntry::new("box_filter", NodeCategory::Filter),
        NodeEntry::new("color_manager_ocio", NodeCategory::ColorManager),
        NodeEntry::new("set_parameter", NodeCategory::Operator).with_node_param("inputs", NodeParam::NodeArray),
        NodeEntry::new("collection", NodeCategory::Operator).with_node_param("inputs", NodeParam::NodeArray),
        NodeEntry::new("merge", NodeCategory::Operator).with_node_param("inputs", NodeParam::NodeArray),
        NodeEntry::new("switch_operator", NodeCategory::Operator).with_node_param("inputs", NodeParam::NodeArray),
    ];

    entries.extend(SHAPES.iter().map(|name| {
        NodeEntry::new(*name, NodeCategory::Shape)
            .with_node_param("shader", NodeParam::NodeArray)
            .with_node_param("disp_map", NodeParam::NodeArray)
    }));
    entries.extend(SHADERS.iter().map(|name| NodeEntry::new(*name, NodeCategory::Shader)));
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_bits() {
        assert_eq!(NodeCategory::ColorManager.mask(), NodeMask::COLOR_MANAGER);
        assert_eq!(NodeCategory::Operator.mask().0, 0x1000);

        let mask = NodeMask::SHAPE | NodeMask::SHADER;
        assert!(mask.contains(NodeCategory::Shape));
        assert!(!mask.contains(NodeCategory::Light));
        assert_eq!(mask & NodeMask::SHAPE, NodeMask::SHAPE);
    }

    #[test]
    fn test_parse_mask() {
        assert_eq!(NodeMask::parse("shape, shader"), Some(NodeMask::SHAPE | NodeMask::SHADER));
        assert_eq!(NodeMask::parse("all"), Some(NodeMask::ALL));
        assert_eq!(NodeMask::parse("shape,bogus"), None);
    }

    #[test]
    fn test_builtin_node_params() {
        let entries = builtin_entries();
        let polymesh = entries.iter().find(|e| e.name == "polymesh").unwrap();
        assert_eq!(polymesh.category, NodeCategory::Shape);
        assert_eq!(polymesh.node_param("shader"), Some(NodeParam::NodeArray));
        assert_eq!(polymesh.node_param("vlist"), None);

        let options = entries.iter().find(|e| e.name == "options").unwrap();
        assert_eq!(options.node_param("camera"), Some(NodeParam::Node));
    }
}
