//! Prim type to converter mapping.

use std::collections::HashMap;
use std::sync::OnceLock;

use strata_render::{NodeCategory, NodeMask};
use strata_scene::Prim;

use crate::context::JobContext;
use crate::error::ReadResult;
use crate::readers;

/// Converts prims of one schema type into renderer nodes.
pub trait PrimReader: Send + Sync {
    /// Category of the nodes this reader creates.
    fn category(&self) -> NodeCategory;

    /// Categories checked against the reader's type mask.
    fn mask(&self) -> NodeMask {
        self.category().mask()
    }

    /// Whether `read` sets a world matrix. Jobs run off the walker thread
    /// get their matrices computed before they are spawned.
    fn reads_transform(&self) -> bool {
        matches!(
            self.category(),
            NodeCategory::Shape | NodeCategory::Camera | NodeCategory::Light
        )
    }

    /// Translate `prim`. An error skips this prim only; the read goes on.
    fn read<'a>(&self, prim: Prim<'a>, ctx: &mut JobContext<'_, 'a>) -> ReadResult<()>;
}

/// Logs that a type is known but not translated.
struct UnsupportedReader {
    type_name: String,
}

impl PrimReader for UnsupportedReader {
    fn category(&self) -> NodeCategory {
        NodeCategory::Shape
    }

    fn mask(&self) -> NodeMask {
        NodeMask::ALL
    }

    fn reads_transform(&self) -> bool {
        false
    }

    fn read<'a>(&self, prim: Prim<'a>, _ctx: &mut JobContext<'_, 'a>) -> ReadResult<()> {
        log::warn!("Primitive type {} is not supported, ignoring {}", self.type_name, prim.path());
        Ok(())
    }
}

/// Readers by exact prim type name.
#[derive(Default)]
pub struct ReaderRegistry {
    readers: HashMap<String, Box<dyn PrimReader>>,
}

impl ReaderRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in reader.
    pub fn with_builtin_readers() -> Self {
        let mut registry = Self::new();
        readers::register_builtin(&mut registry);
        registry
    }

    /// The process-wide registry used by readers that were not given one.
    /// Built on first use.
    pub fn global() -> &'static ReaderRegistry {
        static REGISTRY: OnceLock<ReaderRegistry> = OnceLock::new();
        REGISTRY.get_or_init(ReaderRegistry::with_builtin_readers)
    }

    /// Add or replace the reader for `type_name`.
    pub fn register(&mut self, type_name: impl Into<String>, reader: impl PrimReader + 'static) {
        self.readers.insert(type_name.into(), Box::new(reader));
    }

    /// Warn about prims of `type_name` instead of translating them.
    pub fn register_unsupported(&mut self, type_name: impl Into<String>) {
        let type_name = type_name.into();
        self.readers.insert(
            type_name.clone(),
            Box::new(UnsupportedReader { type_name }),
        );
    }

    pub fn reader(&self, type_name: &str) -> Option<&dyn PrimReader> {
        self.readers.get(type_name).map(|r| r.as_ref())
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.readers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.readers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_readers() {
        let registry = ReaderRegistry::with_builtin_readers();
        assert_eq!(registry.reader("Mesh").unwrap().category(), NodeCategory::Shape);
        assert_eq!(registry.reader("Shader").unwrap().category(), NodeCategory::Shader);
        assert_eq!(registry.reader("Camera").unwrap().category(), NodeCategory::Camera);
        assert_eq!(registry.reader("DomeLight").unwrap().category(), NodeCategory::Light);
        assert_eq!(registry.reader("ArnoldOptions").unwrap().category(), NodeCategory::Options);
        assert!(registry.reader("Xform").is_none());
        assert!(registry.reader("mesh").is_none());
    }

    #[test]
    fn test_readers_needing_matrices() {
        let registry = ReaderRegistry::with_builtin_readers();
        for type_name in ["Mesh", "Sphere", "Camera", "DistantLight", "ArnoldDisk"] {
            assert!(registry.reader(type_name).unwrap().reads_transform(), "{}", type_name);
        }
        for type_name in ["Shader", "ArnoldOptions", "ArnoldSetParameter", "ArnoldCollection"] {
            assert!(!registry.reader(type_name).unwrap().reads_transform(), "{}", type_name);
        }
    }

    #[test]
    fn test_unsupported_matches_any_mask() {
        let mut registry = ReaderRegistry::new();
        assert!(registry.is_empty());
        registry.register_unsupported("HermiteCurves");

        let reader = registry.reader("HermiteCurves").unwrap();
        assert_eq!(reader.mask(), NodeMask::ALL);
        assert!(!reader.reads_transform());
        assert_eq!(registry.type_names(), vec!["HermiteCurves"]);
    }

    #[test]
    fn test_global_is_shared() {
        let a = ReaderRegistry::global() as *const ReaderRegistry;
        let b = ReaderRegistry::global() as *const ReaderRegistry;
        assert_eq!(a, b);
        assert!(ReaderRegistry::global().reader("Sphere").is_some());
    }
}
