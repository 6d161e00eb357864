//! The node graph nodes are created in.
//!
//! A [`Universe`] can be shared between threads: the node table sits
//! behind a read-write lock and every node has its own mutex, so setting
//! attributes on different nodes does not contend.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use thiserror::Error;

use crate::node::{builtin_entries, NodeCategory, NodeEntry, NodeHandle, NodeMask};
use crate::value::AttrValue;

/// Errors that can occur when editing a universe.
#[derive(Error, Debug, PartialEq)]
pub enum RenderError {
    #[error("Unknown node type '{0}'")]
    UnknownNodeType(String),

    #[error("Node {0} does not exist")]
    StaleHandle(NodeHandle),
}

/// Result type for universe operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Connection feeding a parameter from another node's output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Link {
    pub source: NodeHandle,
    /// Output component (`r`, `x`...), `None` for the whole output
    pub output: Option<String>,
}

#[derive(Debug)]
struct NodeData {
    name: String,
    entry: Arc<NodeEntry>,
    parent: Option<NodeHandle>,
    attributes: BTreeMap<String, AttrValue>,
    links: BTreeMap<String, Link>,
}

type NameKey = (Option<NodeHandle>, String);

/// A set of renderer nodes.
pub struct Universe {
    entries: RwLock<HashMap<String, Arc<NodeEntry>>>,
    nodes: RwLock<Vec<Option<Arc<Mutex<NodeData>>>>>,
    names: RwLock<HashMap<NameKey, NodeHandle>>,
}

impl Default for Universe {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl Universe {
    /// An empty universe knowing the built-in node types.
    pub fn new() -> Self {
        let entries = builtin_entries()
            .into_iter()
            .map(|entry| (entry.name.clone(), Arc::new(entry)))
            .collect();
        Self {
            entries: RwLock::new(entries),
            nodes: RwLock::new(Vec::new()),
            names: RwLock::new(HashMap::new()),
        }
    }

    /// Add or replace a node type.
    pub fn register_node_type(&self, entry: NodeEntry) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(entry.name.clone(), Arc::new(entry));
    }

    pub fn node_entry(&self, node_type: &str) -> Option<Arc<NodeEntry>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(node_type).cloned()
    }

    fn node(&self, handle: NodeHandle) -> RenderResult<Arc<Mutex<NodeData>>> {
        let nodes = self.nodes.read().unwrap_or_else(|e| e.into_inner());
        nodes
            .get(handle.index())
            .and_then(|slot| slot.clone())
            .ok_or(RenderError::StaleHandle(handle))
    }

    /// Create a node. An empty name leaves the node anonymous.
    pub fn create_node(&self, node_type: &str, name: &str, parent: Option<NodeHandle>) -> RenderResult<NodeHandle> {
        let entry = self
            .node_entry(node_type)
            .ok_or_else(|| RenderError::UnknownNodeType(node_type.to_string()))?;

        let data = NodeData {
            name: name.to_string(),
            entry,
            parent,
            attributes: BTreeMap::new(),
            links: BTreeMap::new(),
        };

        let handle = {
            let mut nodes = self.nodes.write().unwrap_or_else(|e| e.into_inner());
            nodes.push(Some(Arc::new(Mutex::new(data))));
            NodeHandle((nodes.len() - 1) as u32)
        };

        if !name.is_empty() {
            let mut names = self.names.write().unwrap_or_else(|e| e.into_inner());
            if let Some(previous) = names.insert((parent, name.to_string()), handle) {
                log::warn!("Node name '{}' already used by {}, replacing", name, previous);
            }
        }

        Ok(handle)
    }

    /// Destroy a node and forget its name.
    pub fn destroy_node(&self, handle: NodeHandle) -> RenderResult<()> {
        let node = {
            let mut nodes = self.nodes.write().unwrap_or_else(|e| e.into_inner());
            nodes
                .get_mut(handle.index())
                .and_then(Option::take)
                .ok_or(RenderError::StaleHandle(handle))?
        };

        let data = lock(&node);
        if !data.name.is_empty() {
            let mut names = self.names.write().unwrap_or_else(|e| e.into_inner());
            let key = (data.parent, data.name.clone());
            if names.get(&key) == Some(&handle) {
                names.remove(&key);
            }
        }
        Ok(())
    }

    pub fn is_live(&self, handle: NodeHandle) -> bool {
        self.node(handle).is_ok()
    }

    /// Find a node by name in `parent`'s scope, then among top-level nodes.
    pub fn lookup_node(&self, name: &str, parent: Option<NodeHandle>) -> Option<NodeHandle> {
        let names = self.names.read().unwrap_or_else(|e| e.into_inner());
        names
            .get(&(parent, name.to_string()))
            .or_else(|| names.get(&(None, name.to_string())))
            .copied()
    }

    pub fn node_name(&self, handle: NodeHandle) -> RenderResult<String> {
        Ok(lock(&*self.node(handle)?).name.clone())
    }

    /// Rename a node, keeping the name index in sync.
    pub fn set_name(&self, handle: NodeHandle, name: &str) -> RenderResult<()> {
        let node = self.node(handle)?;
        let mut data = lock(&node);
        let mut names = self.names.write().unwrap_or_else(|e| e.into_inner());

        let old_key = (data.parent, data.name.clone());
        if names.get(&old_key) == Some(&handle) {
            names.remove(&old_key);
        }
        data.name = name.to_string();
        if !name.is_empty() {
            names.insert((data.parent, data.name.clone()), handle);
        }
        Ok(())
    }

    pub fn node_type(&self, handle: NodeHandle) -> RenderResult<String> {
        Ok(lock(&*self.node(handle)?).entry.name.clone())
    }

    pub fn node_category(&self, handle: NodeHandle) -> RenderResult<NodeCategory> {
        Ok(lock(&*self.node(handle)?).entry.category)
    }

    pub fn node_type_entry(&self, handle: NodeHandle) -> RenderResult<Arc<NodeEntry>> {
        Ok(lock(&*self.node(handle)?).entry.clone())
    }

    pub fn node_parent(&self, handle: NodeHandle) -> RenderResult<Option<NodeHandle>> {
        Ok(lock(&*self.node(handle)?).parent)
    }

    pub fn set(&self, handle: NodeHandle, param: &str, value: impl Into<AttrValue>) -> RenderResult<()> {
        let node = self.node(handle)?;
        lock(&node).attributes.insert(param.to_string(), value.into());
        Ok(())
    }

    pub fn get(&self, handle: NodeHandle, param: &str) -> Option<AttrValue> {
        let node = self.node(handle).ok()?;
        let data = lock(&node);
        data.attributes.get(param).cloned()
    }

    /// Names of the parameters set on a node, sorted.
    pub fn attribute_names(&self, handle: NodeHandle) -> Vec<String> {
        match self.node(handle) {
            Ok(node) => lock(&node).attributes.keys().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Names of the linked parameters of a node, sorted.
    pub fn linked_params(&self, handle: NodeHandle) -> Vec<String> {
        match self.node(handle) {
            Ok(node) => lock(&node).links.keys().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Remove a parameter value.
    pub fn reset(&self, handle: NodeHandle, param: &str) -> RenderResult<()> {
        let node = self.node(handle)?;
        lock(&node).attributes.remove(param);
        Ok(())
    }

    /// Feed `param` of `target` from the whole output of `source`.
    pub fn link(&self, source: NodeHandle, target: NodeHandle, param: &str) -> RenderResult<()> {
        self.link_output(source, None, target, param)
    }

    /// Feed `param` of `target` from `source`, optionally from a single
    /// output component.
    pub fn link_output(
        &self,
        source: NodeHandle,
        output: Option<&str>,
        target: NodeHandle,
        param: &str,
    ) -> RenderResult<()> {
        self.node(source)?;
        let node = self.node(target)?;
        lock(&node).links.insert(
            param.to_string(),
            Link {
                source,
                output: output.map(str::to_string),
            },
        );
        Ok(())
    }

    /// Remove the link on `param`, if any.
    pub fn unlink(&self, target: NodeHandle, param: &str) -> RenderResult<()> {
        let node = self.node(target)?;
        lock(&node).links.remove(param);
        Ok(())
    }

    pub fn get_link(&self, target: NodeHandle, param: &str) -> Option<Link> {
        let node = self.node(target).ok()?;
        let data = lock(&node);
        data.links.get(param).cloned()
    }

    /// Live nodes in creation order.
    pub fn nodes(&self) -> Vec<NodeHandle> {
        let nodes = self.nodes.read().unwrap_or_else(|e| e.into_inner());
        nodes
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(i, _)| NodeHandle(i as u32))
            .collect()
    }

    /// Live nodes whose category is in `mask`.
    pub fn nodes_in(&self, mask: NodeMask) -> Vec<NodeHandle> {
        self.nodes()
            .into_iter()
            .filter(|&h| self.node_category(h).is_ok_and(|c| mask.contains(c)))
            .collect()
    }

    pub fn node_count(&self) -> usize {
        let nodes = self.nodes.read().unwrap_or_else(|e| e.into_inner());
        nodes.iter().filter(|slot| slot.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_math::Vec3;

    #[test]
    fn test_create_and_lookup() {
        let universe = Universe::new();
        let sphere = universe.create_node("sphere", "/World/Ball", None).unwrap();

        assert_eq!(universe.node_type(sphere).unwrap(), "sphere");
        assert_eq!(universe.node_category(sphere).unwrap(), NodeCategory::Shape);
        assert_eq!(universe.lookup_node("/World/Ball", None), Some(sphere));
        assert_eq!(universe.node_count(), 1);
    }

    #[test]
    fn test_unknown_type() {
        let universe = Universe::new();
        assert_eq!(
            universe.create_node("teapot", "t", None),
            Err(RenderError::UnknownNodeType("teapot".to_string()))
        );
    }

    #[test]
    fn test_parent_scoped_names() {
        let universe = Universe::new();
        let proc_a = universe.create_node("usd", "a", None).unwrap();
        let proc_b = universe.create_node("usd", "b", None).unwrap();
        let in_a = universe.create_node("sphere", "/Ball", Some(proc_a)).unwrap();
        let in_b = universe.create_node("sphere", "/Ball", Some(proc_b)).unwrap();

        assert_eq!(universe.lookup_node("/Ball", Some(proc_a)), Some(in_a));
        assert_eq!(universe.lookup_node("/Ball", Some(proc_b)), Some(in_b));
        assert_eq!(universe.node_parent(in_a).unwrap(), Some(proc_a));
        assert_eq!(universe.node_name(in_b).unwrap(), "/Ball");
        // no top-level node of that name
        assert_eq!(universe.lookup_node("/Ball", None), None);
        // top-level names are visible from any scope
        assert_eq!(universe.lookup_node("a", Some(proc_b)), Some(proc_a));
    }

    #[test]
    fn test_attributes_and_links() {
        let universe = Universe::new();
        let surf = universe.create_node("standard_surface", "surf", None).unwrap();
        let tex = universe.create_node("image", "tex", None).unwrap();

        universe.set(surf, "base", 0.8f32).unwrap();
        universe.set(surf, "base_color", AttrValue::Rgb(Vec3::ONE)).unwrap();
        assert_eq!(universe.get(surf, "base"), Some(AttrValue::Float(0.8)));

        universe.link_output(tex, Some("r"), surf, "base").unwrap();
        assert_eq!(
            universe.get_link(surf, "base"),
            Some(Link {
                source: tex,
                output: Some("r".to_string())
            })
        );

        universe.unlink(surf, "base").unwrap();
        assert_eq!(universe.get_link(surf, "base"), None);
    }

    #[test]
    fn test_destroy_and_rename() {
        let universe = Universe::new();
        let a = universe.create_node("box", "a", None).unwrap();
        universe.set_name(a, "renamed").unwrap();
        assert_eq!(universe.lookup_node("a", None), None);
        assert_eq!(universe.lookup_node("renamed", None), Some(a));

        universe.destroy_node(a).unwrap();
        assert!(!universe.is_live(a));
        assert_eq!(universe.lookup_node("renamed", None), None);
        assert_eq!(universe.set(a, "x", 1i64), Err(RenderError::StaleHandle(a)));
        assert_eq!(universe.node_name(a), Err(RenderError::StaleHandle(a)));
        assert!(universe.node_type_entry(a).is_err());
        assert_eq!(universe.nodes(), Vec::new());
    }

    #[test]
    fn test_nodes_in_mask() {
        let universe = Universe::new();
        universe.create_node("options", "options", None).unwrap();
        let cam = universe.create_node("persp_camera", "cam", None).unwrap();
        assert_eq!(universe.nodes_in(NodeMask::CAMERA), vec![cam]);
    }
}
