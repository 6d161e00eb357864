//! Prim handles.

use std::fmt;

use crate::stage::{PrimData, PrimId, Stage};
use crate::usda::Relationship;
use crate::value::{Attribute, Value};

/// Schema types that carry a transform.
const XFORMABLE_TYPES: &[&str] = &[
    "Xform",
    "Mesh",
    "Sphere",
    "Cube",
    "Cylinder",
    "Cone",
    "Capsule",
    "Plane",
    "Points",
    "BasisCurves",
    "NurbsCurves",
    "NurbsPatch",
    "PointInstancer",
    "Camera",
    "DistantLight",
    "SphereLight",
    "DomeLight",
    "RectLight",
    "DiskLight",
    "CylinderLight",
    "Volume",
    "SkelRoot",
];

/// Imageable but not transformable.
const IMAGEABLE_ONLY_TYPES: &[&str] = &["Scope"];

/// Cheap, copyable reference to a prim on a stage.
#[derive(Clone, Copy)]
pub struct Prim<'a> {
    stage: &'a Stage,
    id: PrimId,
}

impl<'a> Prim<'a> {
    pub(crate) fn new(stage: &'a Stage, id: PrimId) -> Self {
        Self { stage, id }
    }

    fn data(&self) -> &'a PrimData {
        self.stage.data(self.id)
    }

    pub fn id(&self) -> PrimId {
        self.id
    }

    pub fn stage(&self) -> &'a Stage {
        self.stage
    }

    pub fn path(&self) -> &'a str {
        &self.data().path
    }

    pub fn name(&self) -> &'a str {
        &self.data().name
    }

    /// Schema type name, empty for typeless prims.
    pub fn type_name(&self) -> &'a str {
        &self.data().type_name
    }

    pub fn is_typed(&self) -> bool {
        !self.data().type_name.is_empty()
    }

    pub fn is_pseudo_root(&self) -> bool {
        self.data().parent.is_none()
    }

    pub fn is_active(&self) -> bool {
        self.data().active
    }

    /// `def` (or `class`) on this prim and every ancestor.
    pub fn is_defined(&self) -> bool {
        self.data().defined
    }

    /// This prim or an ancestor is a `class`.
    pub fn is_abstract(&self) -> bool {
        self.data().is_abstract
    }

    /// `instanceable = true` was authored.
    pub fn is_instanceable(&self) -> bool {
        self.data().instanceable
    }

    /// Instanceable and expanded from a reference, so its contents live
    /// on a shared prototype.
    pub fn is_instance(&self) -> bool {
        self.data().prototype.is_some()
    }

    pub fn prototype(&self) -> Option<Prim<'a>> {
        self.data().prototype.map(|id| Prim::new(self.stage, id))
    }

    /// Root of a prototype subtree (`/__Prototype_N`).
    pub fn is_prototype(&self) -> bool {
        self.data().is_prototype
    }

    /// Descendant of a prototype root.
    pub fn is_in_prototype(&self) -> bool {
        self.data().in_prototype
    }

    /// Parent prim, `None` for the pseudo-root.
    pub fn parent(&self) -> Option<Prim<'a>> {
        self.data().parent.map(|id| Prim::new(self.stage, id))
    }

    pub fn children(&self) -> impl Iterator<Item = Prim<'a>> + 'a {
        let stage = self.stage;
        self.data().children.iter().map(move |&id| Prim::new(stage, id))
    }

    /// Ancestors from the parent up to (excluding) the pseudo-root.
    pub fn ancestors(&self) -> impl Iterator<Item = Prim<'a>> + 'a {
        std::iter::successors(self.parent(), |p| p.parent()).filter(|p| !p.is_pseudo_root())
    }

    pub fn attributes(&self) -> &'a [Attribute] {
        &self.data().attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&'a Attribute> {
        self.data().attributes.iter().find(|a| a.name == name)
    }

    /// Value of an attribute at `time`, if authored.
    pub fn get(&self, name: &str, time: f64) -> Option<Value> {
        self.attribute(name).and_then(|a| a.get(time))
    }

    pub fn relationships(&self) -> &'a [Relationship] {
        &self.data().relationships
    }

    pub fn relationship(&self, name: &str) -> Option<&'a Relationship> {
        self.data().relationships.iter().find(|r| r.name == name)
    }

    pub fn is_xformable(&self) -> bool {
        XFORMABLE_TYPES.contains(&self.type_name())
    }

    pub fn is_imageable(&self) -> bool {
        self.is_xformable() || IMAGEABLE_ONLY_TYPES.contains(&self.type_name())
    }

    /// Authored `visibility` token, `inherited` when absent.
    pub fn visibility(&self, time: f64) -> String {
        match self.get("visibility", time) {
            Some(Value::String(token)) => token,
            _ => "inherited".to_string(),
        }
    }

    /// Authored `purpose` token, `default` when absent.
    pub fn purpose(&self) -> String {
        match self.get("purpose", 0.0) {
            Some(Value::String(token)) => token,
            _ => "default".to_string(),
        }
    }

    /// Visible unless this prim or an ancestor is `invisible` at `time`.
    pub fn compute_visibility(&self, time: f64) -> bool {
        std::iter::once(*self)
            .chain(self.ancestors())
            .all(|p| p.visibility(time) != "invisible")
    }
}

impl PartialEq for Prim<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.stage, other.stage) && self.id == other.id
    }
}

impl Eq for Prim<'_> {}

impl fmt::Debug for Prim<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Prim({} {})", self.type_name(), self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENE: &str = r#"#usda 1.0
def Xform "World" {
    token visibility = "invisible"
    def Scope "Group" {
        def Sphere "Ball" {
            uniform token purpose = "proxy"
        }
    }
}
def "Loose" {}
"#;

    #[test]
    fn test_schema_queries() {
        let stage = Stage::from_string(SCENE).unwrap();

        let group = stage.prim_at_path("/World/Group").unwrap();
        assert!(group.is_imageable());
        assert!(!group.is_xformable());

        let loose = stage.prim_at_path("/Loose").unwrap();
        assert!(!loose.is_typed());
        assert!(!loose.is_imageable());
    }

    #[test]
    fn test_visibility_inherits() {
        let stage = Stage::from_string(SCENE).unwrap();
        let ball = stage.prim_at_path("/World/Group/Ball").unwrap();

        assert_eq!(ball.visibility(0.0), "inherited");
        assert!(!ball.compute_visibility(0.0));
        assert_eq!(ball.purpose(), "proxy");
        assert!(stage.prim_at_path("/Loose").unwrap().compute_visibility(0.0));
    }

    #[test]
    fn test_ancestors_stop_before_pseudo_root() {
        let stage = Stage::from_string(SCENE).unwrap();
        let ball = stage.prim_at_path("/World/Group/Ball").unwrap();

        let paths: Vec<&str> = ball.ancestors().map(|p| p.path()).collect();
        assert_eq!(paths, vec!["/World/Group", "/World"]);
        assert_eq!(stage.pseudo_root().children().count(), 2);
    }
}
