//! Layers: one parsed USDA document plus where it came from.

use std::path::{Path, PathBuf};

use crate::stage::{StageError, StageResult};
use crate::usda::{parse_usda, LayerMetadata, ParseResult, PrimSpec};

/// A parsed layer.
#[derive(Clone, Debug)]
pub struct Layer {
    identifier: String,
    path: Option<PathBuf>,
    metadata: LayerMetadata,
    prims: Vec<PrimSpec>,
}

impl Layer {
    /// Read and parse a USDA file.
    pub fn open<P: AsRef<Path>>(path: P) -> StageResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| StageError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let identifier = path.display().to_string();
        let parsed = parse_usda(&content).map_err(|source| StageError::Parse {
            identifier: identifier.clone(),
            source,
        })?;

        log::debug!("Opened layer {} ({} root prims)", identifier, parsed.prims.len());

        Ok(Self {
            identifier,
            path: Some(path.to_path_buf()),
            metadata: parsed.metadata,
            prims: parsed.prims,
        })
    }

    /// Parse an in-memory layer. Relative asset paths in it resolve
    /// against the working directory.
    pub fn from_string(identifier: impl Into<String>, content: &str) -> ParseResult<Self> {
        let parsed = parse_usda(content)?;
        Ok(Self {
            identifier: identifier.into(),
            path: None,
            metadata: parsed.metadata,
            prims: parsed.prims,
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// File the layer was read from, `None` for in-memory layers.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn metadata(&self) -> &LayerMetadata {
        &self.metadata
    }

    pub fn prims(&self) -> &[PrimSpec] {
        &self.prims
    }

    /// `defaultPrim`, or the first root prim when none is authored.
    pub fn default_prim(&self) -> Option<&str> {
        self.metadata
            .default_prim
            .as_deref()
            .or_else(|| self.prims.first().map(|p| p.name.as_str()))
    }

    /// Directory that relative asset paths in this layer are anchored to.
    pub fn anchor(&self) -> Option<&Path> {
        self.path.as_deref().and_then(Path::parent)
    }
}

/// Resolve an asset path authored in a layer anchored at `anchor`.
pub(crate) fn resolve_asset(anchor: Option<&Path>, asset: &str) -> PathBuf {
    let asset = Path::new(asset);
    match anchor {
        Some(dir) if asset.is_relative() => dir.join(asset),
        _ => asset.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prim_falls_back_to_first_root() {
        let layer = Layer::from_string("mem", "#usda 1.0\ndef Xform \"A\" {}\ndef Xform \"B\" {}\n").unwrap();
        assert_eq!(layer.default_prim(), Some("A"));
        assert!(layer.path().is_none());
    }

    #[test]
    fn test_open_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.usda");
        std::fs::write(&path, "#usda 1.0\n(\n    defaultPrim = \"B\"\n)\ndef Xform \"A\" {}\ndef Xform \"B\" {}\n").unwrap();

        let layer = Layer::open(&path).unwrap();
        assert_eq!(layer.default_prim(), Some("B"));
        assert_eq!(layer.anchor(), Some(dir.path()));
    }

    #[test]
    fn test_open_missing_file() {
        let err = Layer::open("/definitely/not/here.usda").unwrap_err();
        assert!(matches!(err, StageError::Io { .. }));
    }

    #[test]
    fn test_resolve_asset() {
        let anchor = Path::new("/shots/a");
        assert_eq!(resolve_asset(Some(anchor), "./b.usda"), PathBuf::from("/shots/a/./b.usda"));
        assert_eq!(resolve_asset(Some(anchor), "/abs/c.usda"), PathBuf::from("/abs/c.usda"));
        assert_eq!(resolve_asset(None, "d.usda"), PathBuf::from("d.usda"));
    }
}
