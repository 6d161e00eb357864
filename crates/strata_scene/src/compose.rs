//! Layer stack and reference composition.
//!
//! Layers are merged weakest to strongest into a tree of composed prims.
//! References are then expanded: the referenced subtree forms the weaker
//! base and the referencing prim's own opinions are applied over it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::layer::{resolve_asset, Layer};
use crate::usda::{PrimSpec, Relationship, Specifier};
use crate::value::Attribute;

/// Nested references deeper than this are treated as cycles.
const MAX_REFERENCE_DEPTH: usize = 32;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct ReferenceArc {
    pub asset: Option<PathBuf>,
    pub prim_path: Option<String>,
}

impl ReferenceArc {
    /// Identity used to share prototypes between instances.
    pub fn key(&self) -> String {
        let asset = self.asset.as_ref().map(|p| p.display().to_string()).unwrap_or_default();
        format!("@{}@<{}>", asset, self.prim_path.as_deref().unwrap_or(""))
    }
}

/// A prim with all layer opinions merged.
#[derive(Clone, Debug)]
pub(crate) struct ComposedPrim {
    pub name: String,
    pub specifier: Specifier,
    pub type_name: Option<String>,
    pub instanceable: Option<bool>,
    pub active: Option<bool>,
    /// Unexpanded references, strongest first
    pub references: Vec<ReferenceArc>,
    /// Strongest reference this prim was expanded from
    pub origin: Option<ReferenceArc>,
    pub attributes: Vec<Attribute>,
    pub relationships: Vec<Relationship>,
    pub children: Vec<ComposedPrim>,
}

impl ComposedPrim {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            specifier: Specifier::Over,
            type_name: None,
            instanceable: None,
            active: None,
            references: Vec::new(),
            origin: None,
            attributes: Vec::new(),
            relationships: Vec::new(),
            children: Vec::new(),
        }
    }

    fn from_spec(spec: &PrimSpec, anchor: Option<&Path>) -> Self {
        Self {
            name: spec.name.clone(),
            specifier: spec.specifier,
            type_name: spec.type_name.clone(),
            instanceable: spec.instanceable,
            active: spec.active,
            references: spec
                .references
                .iter()
                .map(|r| ReferenceArc {
                    asset: r.asset.as_deref().map(|a| resolve_asset(anchor, a)),
                    prim_path: r.prim_path.clone(),
                })
                .collect(),
            origin: None,
            attributes: spec.attributes.clone(),
            relationships: spec.relationships.clone(),
            children: spec.children.iter().map(|c| Self::from_spec(c, anchor)).collect(),
        }
    }

    pub fn child(&self, name: &str) -> Option<&ComposedPrim> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Descendant at an absolute path, with `self` as the pseudo-root.
    pub fn find(&self, path: &str) -> Option<&ComposedPrim> {
        path.split('/')
            .filter(|s| !s.is_empty())
            .try_fold(self, |prim, name| prim.child(name))
    }

    /// Apply `strong` over `self`.
    pub fn merge(&mut self, strong: &ComposedPrim) {
        if strong.specifier != Specifier::Over {
            self.specifier = strong.specifier;
        }
        if strong.type_name.is_some() {
            self.type_name = strong.type_name.clone();
        }
        if strong.instanceable.is_some() {
            self.instanceable = strong.instanceable;
        }
        if strong.active.is_some() {
            self.active = strong.active;
        }
        if !strong.references.is_empty() {
            let mut references = strong.references.clone();
            references.extend(self.references.drain(..));
            self.references = references;
        }
        if strong.origin.is_some() {
            self.origin = strong.origin.clone();
        }

        for attr in &strong.attributes {
            match self.attributes.iter_mut().find(|a| a.name == attr.name) {
                Some(existing) => merge_attribute(existing, attr),
                None => self.attributes.push(attr.clone()),
            }
        }

        for rel in &strong.relationships {
            match self.relationships.iter_mut().find(|r| r.name == rel.name) {
                Some(existing) => existing.targets = rel.targets.clone(),
                None => self.relationships.push(rel.clone()),
            }
        }

        for child in &strong.children {
            match self.children.iter_mut().find(|c| c.name == child.name) {
                Some(existing) => existing.merge(child),
                None => self.children.push(child.clone()),
            }
        }
    }

    /// Rewrite connection and relationship targets under `from` to `to`.
    pub fn remap(&mut self, from: &str, to: &str) {
        for attr in &mut self.attributes {
            for target in &mut attr.connections {
                remap_path(target, from, to);
            }
        }
        for rel in &mut self.relationships {
            for target in &mut rel.targets {
                remap_path(target, from, to);
            }
        }
        for child in &mut self.children {
            child.remap(from, to);
        }
    }
}

fn merge_attribute(weak: &mut Attribute, strong: &Attribute) {
    if !strong.type_name.is_empty() {
        weak.type_name = strong.type_name.clone();
        weak.is_array = strong.is_array;
    }
    if strong.default.is_some() {
        weak.default = strong.default.clone();
        // A stronger default hides weaker animation
        if strong.samples.is_empty() {
            weak.samples.clear();
        }
    }
    if !strong.samples.is_empty() {
        weak.samples = strong.samples.clone();
    }
    if !strong.connections.is_empty() {
        weak.connections = strong.connections.clone();
    }
    if strong.interpolation.is_some() {
        weak.interpolation = strong.interpolation.clone();
    }
}

fn remap_path(target: &mut String, from: &str, to: &str) {
    if let Some(rest) = target.strip_prefix(from) {
        if rest.is_empty() || rest.starts_with('/') || rest.starts_with('.') {
            *target = format!("{}{}", to, rest);
        }
    }
}

/// Merge a layer stack (strongest first) into a pseudo-root.
pub(crate) fn compose_layers(layers: &[Layer]) -> ComposedPrim {
    let mut root = ComposedPrim::new("");
    for layer in layers.iter().rev() {
        let anchor = layer.anchor();
        for spec in layer.prims() {
            let prim = ComposedPrim::from_spec(spec, anchor);
            match root.children.iter_mut().find(|c| c.name == prim.name) {
                Some(existing) => existing.merge(&prim),
                None => root.children.push(prim),
            }
        }
    }
    root
}

/// Expands references, loading external layers on demand.
#[derive(Default)]
pub(crate) struct ReferenceResolver {
    /// Composed external layers with their default prim, `None` when the
    /// layer failed to load
    external: HashMap<PathBuf, Option<(ComposedPrim, Option<String>)>>,
}

impl ReferenceResolver {
    /// Expand every reference in the tree under `root`.
    pub fn resolve_root(&mut self, root: &mut ComposedPrim) {
        let snapshot = root.clone();
        for child in &mut root.children {
            let path = format!("/{}", child.name);
            self.resolve(child, &path, &snapshot, 0);
        }
    }

    fn resolve(&mut self, prim: &mut ComposedPrim, path: &str, scope: &ComposedPrim, depth: usize) {
        if !prim.references.is_empty() {
            if depth > MAX_REFERENCE_DEPTH {
                log::warn!("Reference depth limit reached at {}, ignoring references", path);
                prim.references.clear();
            } else {
                self.expand(prim, path, scope, depth);
            }
        }

        for child in &mut prim.children {
            let child_path = format!("{}/{}", path, child.name);
            self.resolve(child, &child_path, scope, depth);
        }
    }

    fn expand(&mut self, prim: &mut ComposedPrim, path: &str, scope: &ComposedPrim, depth: usize) {
        let references = std::mem::take(&mut prim.references);
        let mut base: Option<ComposedPrim> = None;

        // Weakest first so each stronger reference merges over the previous
        for arc in references.iter().rev() {
            let Some((mut target, source_path, target_scope)) = self.fetch(arc, scope) else {
                log::warn!("Unresolved reference {} on {}", arc.key(), path);
                continue;
            };

            self.resolve(&mut target, &source_path, &target_scope, depth + 1);
            target.remap(&source_path, path);

            match base.as_mut() {
                Some(base) => base.merge(&target),
                None => base = Some(target),
            }
        }

        if let Some(mut base) = base {
            base.name = prim.name.clone();
            base.references.clear();
            base.merge(prim);
            base.origin = references.first().cloned();
            *prim = base;
        }
    }

    /// Referenced subtree, its path in its own namespace and the scope used
    /// to expand nested internal references.
    fn fetch(&mut self, arc: &ReferenceArc, scope: &ComposedPrim) -> Option<(ComposedPrim, String, ComposedPrim)> {
        match &arc.asset {
            None => {
                let path = arc.prim_path.as_deref()?;
                let target = scope.find(path)?.clone();
                Some((target, path.to_string(), scope.clone()))
            }
            Some(asset) => {
                let (root, default_prim) = self
                    .external
                    .entry(asset.clone())
                    .or_insert_with(|| match Layer::open(asset) {
                        Ok(layer) => {
                            let default_prim = layer.default_prim().map(str::to_string);
                            Some((compose_layers(std::slice::from_ref(&layer)), default_prim))
                        }
                        Err(err) => {
                            log::warn!("Failed to open referenced layer: {}", err);
                            None
                        }
                    })
                    .as_ref()?;

                let path = match &arc.prim_path {
                    Some(path) => path.clone(),
                    None => format!("/{}", default_prim.as_deref()?),
                };
                let target = root.find(&path)?.clone();
                Some((target, path, root.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn layer(text: &str) -> Layer {
        Layer::from_string("test", text).unwrap()
    }

    #[test]
    fn test_stronger_layer_wins() {
        let weak = layer("#usda 1.0\ndef Sphere \"S\" {\n    double radius = 1\n    float other = 3\n}\n");
        let strong = layer("#usda 1.0\nover \"S\" {\n    double radius = 5\n}\n");

        let root = compose_layers(&[strong, weak]);
        let sphere = root.find("/S").unwrap();
        assert_eq!(sphere.specifier, Specifier::Def);
        assert_eq!(sphere.type_name.as_deref(), Some("Sphere"));

        let radius = sphere.attributes.iter().find(|a| a.name == "radius").unwrap();
        assert_eq!(radius.default, Some(Value::Float(5.0)));
        assert_eq!(sphere.attributes.len(), 2);
    }

    #[test]
    fn test_stronger_default_hides_samples() {
        let weak = layer("#usda 1.0\ndef Sphere \"S\" {\n    double radius.timeSamples = { 0: 1, 10: 2 }\n}\n");
        let strong = layer("#usda 1.0\nover \"S\" {\n    double radius = 7\n}\n");

        let root = compose_layers(&[strong, weak]);
        let radius = &root.find("/S").unwrap().attributes[0];
        assert!(radius.samples.is_empty());
        assert_eq!(radius.get(5.0), Some(Value::Float(7.0)));
    }

    #[test]
    fn test_internal_reference_remaps_targets() {
        let text = r#"#usda 1.0
class "Asset" {
    def Sphere "Geo" {
        rel material:binding = </Asset/Mat>
    }
    def Material "Mat" {}
}
def "Inst" (
    references = </Asset>
) {
    over "Geo" {
        double radius = 3
    }
}
"#;
        let mut root = compose_layers(&[layer(text)]);
        ReferenceResolver::default().resolve_root(&mut root);

        let inst = root.find("/Inst").unwrap();
        assert_eq!(inst.specifier, Specifier::Def);
        assert!(inst.origin.is_some());

        let geo = root.find("/Inst/Geo").unwrap();
        assert_eq!(geo.type_name.as_deref(), Some("Sphere"));
        assert_eq!(geo.relationships[0].targets, vec!["/Inst/Mat".to_string()]);
        assert_eq!(geo.attributes[0].default, Some(Value::Float(3.0)));
    }

    #[test]
    fn test_external_reference_uses_default_prim() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("asset.usda"),
            "#usda 1.0\n(\n    defaultPrim = \"Ball\"\n)\ndef Sphere \"Ball\" {\n    double radius = 4\n}\n",
        )
        .unwrap();
        let main = dir.path().join("main.usda");
        std::fs::write(&main, "#usda 1.0\ndef \"Prop\" (\n    references = @./asset.usda@\n) {}\n").unwrap();

        let mut root = compose_layers(&[Layer::open(&main).unwrap()]);
        ReferenceResolver::default().resolve_root(&mut root);

        let prop = root.find("/Prop").unwrap();
        assert_eq!(prop.type_name.as_deref(), Some("Sphere"));
        assert_eq!(prop.attributes[0].default, Some(Value::Float(4.0)));
    }

    #[test]
    fn test_missing_reference_keeps_local_opinions() {
        let text = "#usda 1.0\ndef Xform \"A\" (\n    references = </Nowhere>\n) {\n    float x = 1\n}\n";
        let mut root = compose_layers(&[layer(text)]);
        ReferenceResolver::default().resolve_root(&mut root);

        let a = root.find("/A").unwrap();
        assert_eq!(a.type_name.as_deref(), Some("Xform"));
        assert!(a.origin.is_none());
        assert_eq!(a.attributes.len(), 1);
    }
}
