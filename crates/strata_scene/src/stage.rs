//! Composed stage.
//!
//! A [`Stage`] is an arena of composed prims indexed by path. Instanceable
//! prims with references share a prototype root (`/__Prototype_N`) that
//! holds their children; instances themselves have no children.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::compose::{compose_layers, ComposedPrim, ReferenceResolver};
use crate::layer::Layer;
use crate::prim::Prim;
use crate::usda::{LayerMetadata, ParseError, Relationship, Specifier};
use crate::value::Attribute;

/// Errors that can occur when opening a stage.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {identifier}: {source}")]
    Parse {
        identifier: String,
        #[source]
        source: ParseError,
    },

    #[error("No stage with cache id {0}")]
    UnknownCacheId(i64),

    #[error("No layers to compose")]
    NoLayers,
}

/// Result type for stage operations.
pub type StageResult<T> = Result<T, StageError>;

/// Index of a prim in its stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrimId(pub(crate) u32);

impl PrimId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Debug)]
pub(crate) struct PrimData {
    pub path: String,
    pub name: String,
    pub parent: Option<PrimId>,
    pub children: Vec<PrimId>,
    pub type_name: String,
    pub active: bool,
    /// Def or class here and on every ancestor
    pub defined: bool,
    /// Class here or on an ancestor
    pub is_abstract: bool,
    pub instanceable: bool,
    pub attributes: Vec<Attribute>,
    pub relationships: Vec<Relationship>,
    /// Shared prototype for instances
    pub prototype: Option<PrimId>,
    pub is_prototype: bool,
    pub in_prototype: bool,
}

/// A composed scene.
#[derive(Debug)]
pub struct Stage {
    prims: Vec<PrimData>,
    index: HashMap<String, PrimId>,
    prototypes: Vec<PrimId>,
    metadata: LayerMetadata,
    root_identifier: String,
}

const PSEUDO_ROOT: PrimId = PrimId(0);

impl Stage {
    /// Open a USDA file.
    pub fn open<P: AsRef<Path>>(path: P) -> StageResult<Self> {
        Self::from_layers(vec![Layer::open(path)?])
    }

    /// Compose a stage from a single in-memory document.
    pub fn from_string(content: &str) -> StageResult<Self> {
        let layer = Layer::from_string("anon:stage.usda", content).map_err(|source| StageError::Parse {
            identifier: "anon:stage.usda".to_string(),
            source,
        })?;
        Self::from_layers(vec![layer])
    }

    /// Compose a layer stack, strongest layer first.
    pub fn from_layers(layers: Vec<Layer>) -> StageResult<Self> {
        if layers.is_empty() {
            return Err(StageError::NoLayers);
        }

        let mut root = compose_layers(&layers);
        ReferenceResolver::default().resolve_root(&mut root);

        // Stage metadata comes from the weakest (root) layer
        let root_layer = &layers[layers.len() - 1];
        let mut stage = Stage {
            prims: Vec::new(),
            index: HashMap::new(),
            prototypes: Vec::new(),
            metadata: root_layer.metadata().clone(),
            root_identifier: root_layer.identifier().to_string(),
        };

        stage.prims.push(PrimData {
            path: "/".to_string(),
            name: String::new(),
            parent: None,
            children: Vec::new(),
            type_name: String::new(),
            active: true,
            defined: true,
            is_abstract: false,
            instanceable: false,
            attributes: Vec::new(),
            relationships: Vec::new(),
            prototype: None,
            is_prototype: false,
            in_prototype: false,
        });
        stage.index.insert("/".to_string(), PSEUDO_ROOT);

        let mut builder = Builder::default();
        for child in root.children {
            let path = format!("/{}", child.name);
            stage.build(child, PSEUDO_ROOT, path, &mut builder);
        }

        log::debug!(
            "Composed stage {} ({} prims, {} prototypes)",
            stage.root_identifier,
            stage.prims.len() - 1,
            stage.prototypes.len()
        );

        Ok(stage)
    }

    fn add(&mut self, data: PrimData) -> PrimId {
        let id = PrimId(self.prims.len() as u32);
        if let Some(parent) = data.parent {
            self.prims[parent.index()].children.push(id);
        }
        self.index.insert(data.path.clone(), id);
        self.prims.push(data);
        id
    }

    fn build(&mut self, mut node: ComposedPrim, parent: PrimId, path: String, builder: &mut Builder) {
        let parent_data = &self.prims[parent.index()];
        let defined = parent_data.defined && node.specifier != Specifier::Over;
        let is_abstract = parent_data.is_abstract || node.specifier == Specifier::Class;
        let in_prototype = parent_data.in_prototype || parent_data.is_prototype;
        let active = node.active.unwrap_or(true);
        let instanceable = node.instanceable.unwrap_or(false);

        let children = std::mem::take(&mut node.children);
        let id = self.add(PrimData {
            path: path.clone(),
            name: node.name,
            parent: Some(parent),
            children: Vec::new(),
            type_name: node.type_name.unwrap_or_default(),
            active,
            defined,
            is_abstract,
            instanceable,
            attributes: node.attributes,
            relationships: node.relationships,
            prototype: None,
            is_prototype: false,
            in_prototype,
        });

        // Inactive prims keep no descendants
        if !active {
            return;
        }

        if let (true, Some(origin)) = (instanceable, node.origin.as_ref()) {
            let key = origin.key();
            let prototype = match builder.prototypes.get(&key) {
                Some(&prototype) => prototype,
                None => {
                    let proto_path = format!("/__Prototype_{}", self.prototypes.len() + 1);
                    let prototype = self.add(PrimData {
                        path: proto_path.clone(),
                        name: proto_path[1..].to_string(),
                        parent: Some(PSEUDO_ROOT),
                        children: Vec::new(),
                        type_name: String::new(),
                        active: true,
                        defined: true,
                        is_abstract: false,
                        instanceable: false,
                        attributes: Vec::new(),
                        relationships: Vec::new(),
                        prototype: None,
                        is_prototype: true,
                        in_prototype: false,
                    });
                    self.prototypes.push(prototype);
                    builder.prototypes.insert(key, prototype);

                    for mut child in children {
                        child.remap(&path, &proto_path);
                        let child_path = format!("{}/{}", proto_path, child.name);
                        self.build(child, prototype, child_path, builder);
                    }
                    prototype
                }
            };
            self.prims[id.index()].prototype = Some(prototype);
            return;
        }

        for child in children {
            let child_path = format!("{}/{}", path, child.name);
            self.build(child, id, child_path, builder);
        }
    }

    pub(crate) fn data(&self, id: PrimId) -> &PrimData {
        &self.prims[id.index()]
    }

    /// The `/` prim.
    pub fn pseudo_root(&self) -> Prim<'_> {
        Prim::new(self, PSEUDO_ROOT)
    }

    /// Prim at an absolute path.
    pub fn prim_at_path(&self, path: &str) -> Option<Prim<'_>> {
        self.index.get(path).map(|&id| Prim::new(self, id))
    }

    pub fn prim(&self, id: PrimId) -> Option<Prim<'_>> {
        (id.index() < self.prims.len()).then(|| Prim::new(self, id))
    }

    /// Prototype roots in creation order.
    pub fn prototypes(&self) -> impl Iterator<Item = Prim<'_>> {
        self.prototypes.iter().map(move |&id| Prim::new(self, id))
    }

    /// Number of prims including the pseudo-root and prototypes.
    pub fn prim_count(&self) -> usize {
        self.prims.len()
    }

    pub fn metadata(&self) -> &LayerMetadata {
        &self.metadata
    }

    /// Identifier of the root (weakest) layer.
    pub fn root_identifier(&self) -> &str {
        &self.root_identifier
    }
}

#[derive(Default)]
struct Builder {
    prototypes: HashMap<String, PrimId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const INSTANCED: &str = r#"#usda 1.0
class "Tree" {
    def Mesh "Trunk" {
        rel material:binding = </Tree/Bark>
    }
    def Material "Bark" {}
}

def Xform "World" {
    def Xform "A" (
        instanceable = true
        references = </Tree>
    ) {
        double3 xformOp:translate = (1, 0, 0)
        uniform token[] xformOpOrder = ["xformOp:translate"]
    }
    def Xform "B" (
        instanceable = true
        references = </Tree>
    ) {}
    def Xform "Off" (
        active = false
    ) {
        def Sphere "Hidden" {}
    }
}
"#;

    #[test]
    fn test_instances_share_prototype() {
        let stage = Stage::from_string(INSTANCED).unwrap();

        let a = stage.prim_at_path("/World/A").unwrap();
        let b = stage.prim_at_path("/World/B").unwrap();
        assert!(a.is_instance());
        assert_eq!(a.prototype().unwrap().path(), "/__Prototype_1");
        assert_eq!(a.prototype(), b.prototype());
        assert_eq!(a.children().count(), 0);
        assert_eq!(stage.prototypes().count(), 1);

        // Instance keeps its own opinions
        assert!(a.attribute("xformOp:translate").is_some());
    }

    #[test]
    fn test_prototype_contents_are_remapped() {
        let stage = Stage::from_string(INSTANCED).unwrap();

        let trunk = stage.prim_at_path("/__Prototype_1/Trunk").unwrap();
        assert!(trunk.is_in_prototype());
        assert_eq!(trunk.type_name(), "Mesh");
        assert_eq!(
            trunk.relationship("material:binding").unwrap().targets,
            vec!["/__Prototype_1/Bark".to_string()]
        );
        assert!(stage.prim_at_path("/World/A/Trunk").is_none());
    }

    #[test]
    fn test_inactive_prims_drop_children() {
        let stage = Stage::from_string(INSTANCED).unwrap();
        let off = stage.prim_at_path("/World/Off").unwrap();
        assert!(!off.is_active());
        assert!(stage.prim_at_path("/World/Off/Hidden").is_none());
    }

    #[test]
    fn test_class_is_abstract() {
        let stage = Stage::from_string(INSTANCED).unwrap();
        let trunk = stage.prim_at_path("/Tree/Trunk").unwrap();
        assert!(trunk.is_abstract());
        assert!(!stage.prim_at_path("/World").unwrap().is_abstract());
    }

    #[test]
    fn test_no_layers() {
        assert!(matches!(Stage::from_layers(Vec::new()), Err(StageError::NoLayers)));
    }
}
