//! Primvars and their inheritance down the hierarchy.
//!
//! Only constant-interpolation primvars are inherited. A prim authoring a
//! primvar with the same name as an inherited one replaces it for itself
//! and its descendants.

use crate::prim::Prim;
use crate::value::{Attribute, Value};

const PRIMVARS_PREFIX: &str = "primvars:";

/// An authored primvar on a prim.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Primvar<'a> {
    owner: Prim<'a>,
    attribute: &'a Attribute,
}

impl<'a> Primvar<'a> {
    /// Wrap `attribute` if it is an authored primvar.
    pub fn new(owner: Prim<'a>, attribute: &'a Attribute) -> Option<Self> {
        let authored = attribute.has_authored_value() || attribute.has_authored_connections();
        (attribute.name.starts_with(PRIMVARS_PREFIX) && authored).then_some(Self { owner, attribute })
    }

    /// Name without the `primvars:` namespace (`displayColor`,
    /// `arnold:subdiv_type`).
    pub fn name(&self) -> &'a str {
        &self.attribute.name[PRIMVARS_PREFIX.len()..]
    }

    /// Prim the primvar is authored on.
    pub fn owner(&self) -> Prim<'a> {
        self.owner
    }

    pub fn attribute(&self) -> &'a Attribute {
        self.attribute
    }

    pub fn type_name(&self) -> &'a str {
        &self.attribute.type_name
    }

    /// Declared interpolation, `constant` when absent.
    pub fn interpolation(&self) -> &'a str {
        self.attribute.interpolation.as_deref().unwrap_or("constant")
    }

    pub fn is_inheritable(&self) -> bool {
        self.interpolation() == "constant"
    }

    pub fn get(&self, time: f64) -> Option<Value> {
        self.attribute.get(time)
    }
}

impl<'a> Prim<'a> {
    /// Primvars authored on this prim.
    pub fn authored_primvars(&self) -> Vec<Primvar<'a>> {
        let owner = *self;
        self.attributes()
            .iter()
            .filter_map(|attr| Primvar::new(owner, attr))
            .collect()
    }

    /// Primvars this prim passes to its children, given the ones it
    /// inherited. Empty when the children inherit `inherited` unchanged.
    pub fn find_incrementally_inheritable_primvars(&self, inherited: &[Primvar<'a>]) -> Vec<Primvar<'a>> {
        let mut result: Option<Vec<Primvar<'a>>> = None;

        for primvar in self.authored_primvars() {
            let current = result.get_or_insert_with(|| inherited.to_vec());
            current.retain(|p| p.name() != primvar.name());
            if primvar.is_inheritable() {
                current.push(primvar);
            }
        }

        result.unwrap_or_default()
    }

    /// Every primvar that applies to this prim: inheritable primvars from
    /// ancestors plus all primvars authored locally.
    pub fn find_primvars_with_inheritance(&self) -> Vec<Primvar<'a>> {
        let mut lineage: Vec<Prim<'a>> = self.ancestors().collect();
        lineage.reverse();

        let mut inherited: Vec<Primvar<'a>> = Vec::new();
        for ancestor in lineage {
            let changed = ancestor.find_incrementally_inheritable_primvars(&inherited);
            if !changed.is_empty() {
                inherited = changed;
            }
        }

        let local = self.authored_primvars();
        inherited.retain(|p| local.iter().all(|l| l.name() != p.name()));
        inherited.extend(local);
        inherited
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::Stage;

    const SCENE: &str = r#"#usda 1.0
def Xform "World" {
    color3f[] primvars:displayColor = [(1, 0, 0)] (interpolation = "constant")
    float primvars:roughness = 0.5

    def Xform "Group" {
        def Mesh "Plain" {}

        def Mesh "Override" {
            color3f[] primvars:displayColor = [(0, 1, 0)] (interpolation = "constant")
            float[] primvars:weights = [1, 2, 3] (interpolation = "vertex")
        }
    }
}
"#;

    fn names(primvars: &[Primvar<'_>]) -> Vec<String> {
        let mut names: Vec<String> = primvars
            .iter()
            .map(|p| format!("{}@{}", p.name(), p.owner().path()))
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_unchanged_scope_returns_empty() {
        let stage = Stage::from_string(SCENE).unwrap();
        let world = stage.prim_at_path("/World").unwrap();
        let group = stage.prim_at_path("/World/Group").unwrap();

        let from_world = world.find_incrementally_inheritable_primvars(&[]);
        assert_eq!(names(&from_world), vec!["displayColor@/World", "roughness@/World"]);
        assert!(group.find_incrementally_inheritable_primvars(&from_world).is_empty());
    }

    #[test]
    fn test_override_replaces_inherited() {
        let stage = Stage::from_string(SCENE).unwrap();
        let world = stage.prim_at_path("/World").unwrap();
        let mesh = stage.prim_at_path("/World/Group/Override").unwrap();

        let inherited = world.find_incrementally_inheritable_primvars(&[]);
        let passed = mesh.find_incrementally_inheritable_primvars(&inherited);

        // vertex-interpolated weights are not inheritable
        assert_eq!(names(&passed), vec!["displayColor@/World/Group/Override", "roughness@/World"]);
    }

    #[test]
    fn test_find_with_inheritance() {
        let stage = Stage::from_string(SCENE).unwrap();

        let plain = stage.prim_at_path("/World/Group/Plain").unwrap();
        assert_eq!(
            names(&plain.find_primvars_with_inheritance()),
            vec!["displayColor@/World", "roughness@/World"]
        );

        let mesh = stage.prim_at_path("/World/Group/Override").unwrap();
        assert_eq!(
            names(&mesh.find_primvars_with_inheritance()),
            vec![
                "displayColor@/World/Group/Override",
                "roughness@/World",
                "weights@/World/Group/Override"
            ]
        );
    }
}
