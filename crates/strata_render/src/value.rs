//! Typed node attribute values.

use strata_math::{Mat4, Vec2, Vec3, Vec4};

use crate::node::NodeHandle;

/// Value stored on a node parameter.
#[derive(Clone, Debug, PartialEq)]
pub enum AttrValue {
    Bool(bool),
    Byte(u8),
    Int(i64),
    Float(f32),
    Str(String),
    Vec2(Vec2),
    Vec3(Vec3),
    Rgb(Vec3),
    Rgba(Vec4),
    Matrix(Mat4),
    /// Node pointer; `None` is an explicit null
    Node(Option<NodeHandle>),
    Array(Vec<AttrValue>),
}

impl AttrValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(i) => Some(*i),
            AttrValue::Byte(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            AttrValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<NodeHandle> {
        match self {
            AttrValue::Node(node) => *node,
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[AttrValue]> {
        match self {
            AttrValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_matrix(&self) -> Option<Mat4> {
        match self {
            AttrValue::Matrix(m) => Some(*m),
            _ => None,
        }
    }

    /// Node handles referenced by this value, including array entries.
    pub fn referenced_nodes(&self) -> Vec<NodeHandle> {
        match self {
            AttrValue::Node(Some(node)) => vec![*node],
            AttrValue::Array(items) => items.iter().flat_map(|v| v.referenced_nodes()).collect(),
            _ => Vec::new(),
        }
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<f32> for AttrValue {
    fn from(v: f32) -> Self {
        AttrValue::Float(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Str(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Str(v)
    }
}

impl From<Mat4> for AttrValue {
    fn from(v: Mat4) -> Self {
        AttrValue::Matrix(v)
    }
}

impl From<NodeHandle> for AttrValue {
    fn from(v: NodeHandle) -> Self {
        AttrValue::Node(Some(v))
    }
}
