//! Layer-level specs produced by the USDA parser.
//!
//! Specs hold the opinions authored in a single layer. They are merged
//! into composed prims by the stage.

use crate::value::Attribute;

/// How a prim spec was introduced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Specifier {
    /// `def`: the prim is defined
    #[default]
    Def,
    /// `over`: opinions only, the prim is not defined by this spec
    Over,
    /// `class`: abstract prim, never traversed
    Class,
}

/// A composition arc to another prim, possibly in another layer.
///
/// `references = @./asset.usda@</Prim>` or `references = </Internal>`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Reference {
    /// Asset path as written, `None` for internal references
    pub asset: Option<String>,

    /// Target prim; `None` means the referenced layer's default prim
    pub prim_path: Option<String>,
}

/// A relationship (`rel material:binding = </Mat>`).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Relationship {
    pub name: String,
    pub targets: Vec<String>,
}

/// All opinions about one prim in one layer.
#[derive(Clone, Debug, Default)]
pub struct PrimSpec {
    pub specifier: Specifier,

    /// Schema type (`Mesh`, `Xform`...), `None` for typeless prims
    pub type_name: Option<String>,

    pub name: String,

    pub instanceable: Option<bool>,

    pub active: Option<bool>,

    pub references: Vec<Reference>,

    pub attributes: Vec<Attribute>,

    pub relationships: Vec<Relationship>,

    pub children: Vec<PrimSpec>,
}

impl PrimSpec {
    /// Attribute by name, created on first access.
    ///
    /// A single USDA property can be spread over several statements
    /// (`radius = 1`, `radius.timeSamples = {...}`), so statements are
    /// folded into one attribute.
    pub fn attribute_mut(&mut self, name: &str) -> &mut Attribute {
        let index = match self.attributes.iter().position(|a| a.name == name) {
            Some(index) => index,
            None => {
                self.attributes.push(Attribute {
                    name: name.to_string(),
                    ..Default::default()
                });
                self.attributes.len() - 1
            }
        };
        &mut self.attributes[index]
    }

    pub fn child(&self, name: &str) -> Option<&PrimSpec> {
        self.children.iter().find(|c| c.name == name)
    }
}

/// Layer metadata from the `( ... )` block after the `#usda` header.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LayerMetadata {
    pub default_prim: Option<String>,
    pub start_time_code: Option<f64>,
    pub end_time_code: Option<f64>,
    pub doc: Option<String>,
}
