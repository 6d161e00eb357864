//! Reads from files, override layers and the stage cache.

use std::sync::Arc;

use strata_render::{AttrValue, Universe};
use strata_scene::{Stage, StageCache};
use strata_translator::{ReadError, Reader};

const ROOT: &str = r#"#usda 1.0
def Xform "World" {
    def Sphere "Ball" {
        double radius = 1
    }
    def Xform "Inst" (
        instanceable = true
        references = </Asset>
    ) {}
}

class Xform "Asset" {
    def Cube "Body" {}
}
"#;

const OVERRIDE: &str = r#"#usda 1.0
over "World" {
    over "Ball" {
        double radius = 3
    }
    def Cone "Extra" {}
}
"#;

fn write_root(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("root.usda");
    std::fs::write(&path, ROOT).unwrap();
    path
}

fn radius(universe: &Universe, name: &str) -> Option<AttrValue> {
    universe.get(universe.lookup_node(name, None)?, "radius")
}

#[test]
fn test_read_file() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempfile::tempdir().unwrap();
    let path = write_root(&dir);

    let universe = Arc::new(Universe::new());
    let mut reader = Reader::new(universe.clone());
    reader.read_file(&path, &[], None).unwrap();

    assert_eq!(radius(&universe, "/World/Ball"), Some(AttrValue::Float(1.0)));
    assert!(universe.lookup_node("/World/Extra", None).is_none());

    // The prototype node reads the same file
    let prototype = universe.lookup_node("/__Prototype_1", None).unwrap();
    assert_eq!(
        universe.get(prototype, "filename"),
        Some(AttrValue::Str(path.display().to_string()))
    );
    assert_eq!(universe.get(prototype, "overrides"), None);
    assert_eq!(universe.get(prototype, "cache_id"), None);
}

#[test]
fn test_overrides_are_stronger() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_root(&dir);

    let universe = Arc::new(Universe::new());
    let mut reader = Reader::new(universe.clone());
    let overrides = vec![String::new(), OVERRIDE.to_string()];
    reader.read_file(&path, &overrides, None).unwrap();

    assert_eq!(radius(&universe, "/World/Ball"), Some(AttrValue::Float(3.0)));
    assert!(universe.lookup_node("/World/Extra", None).is_some());

    // Empty overrides are dropped
    let prototype = universe.lookup_node("/__Prototype_1", None).unwrap();
    assert_eq!(
        universe.get(prototype, "overrides"),
        Some(AttrValue::Array(vec![AttrValue::Str(OVERRIDE.to_string())]))
    );
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.usda");

    let universe = Arc::new(Universe::new());
    let mut reader = Reader::new(universe.clone());
    let err = reader.read_file(&missing, &[], None).unwrap_err();
    assert!(matches!(err, ReadError::Stage(_)));
    assert_eq!(universe.node_count(), 0);

    // Overrides alone still make a stage
    let overrides = vec!["#usda 1.0\ndef Sphere \"Alone\" {}\n".to_string()];
    reader.read_file(&missing, &overrides, None).unwrap();
    assert!(universe.lookup_node("/Alone", None).is_some());
}

#[test]
fn test_read_cached() {
    let stage = Arc::new(Stage::from_string(ROOT).unwrap());
    let id = StageCache::global().insert(stage);

    let universe = Arc::new(Universe::new());
    let mut reader = Reader::new(universe.clone());
    reader.read_cached(id, Some("/World")).unwrap();

    assert!(universe.lookup_node("/World/Ball", None).is_some());
    let prototype = universe.lookup_node("/__Prototype_1", None).unwrap();
    assert_eq!(universe.get(prototype, "cache_id"), Some(AttrValue::Int(id)));
    assert_eq!(universe.get(prototype, "filename"), Some(AttrValue::Str(String::new())));

    StageCache::global().erase(id);
    let mut reader = Reader::new(Arc::new(Universe::new()));
    assert!(matches!(reader.read_cached(id, None), Err(ReadError::Stage(_))));
}
