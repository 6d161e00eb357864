//! Applying deferred connections once their targets exist.
//!
//! Connections are resolved in two passes. Each thread first resolves the
//! ones it queued; the ones still missing a target are then retried on a
//! single thread, translating the target prims on demand.

use std::sync::Arc;

use strata_render::{AttrValue, NodeHandle};

use crate::connection::{Connection, ConnectionKind, NULL_TARGET};
use crate::context::{ContextRef, JobContext, ThreadContext};
use crate::error::ReadResult;
use crate::phase::ReadStep;
use crate::session::Session;

impl<'a> JobContext<'_, 'a> {
    /// Apply `connection`. Returns `false` when a target could not be
    /// found; the connection is then left untouched.
    pub fn process_connection(&mut self, connection: &Connection) -> bool {
        match self.apply_connection(connection) {
            Ok(applied) => applied,
            Err(err) => {
                log::warn!(
                    "Cannot connect {} to {}: {}",
                    connection.attribute,
                    connection.target,
                    err
                );
                true
            }
        }
    }

    fn apply_connection(&mut self, connection: &Connection) -> ReadResult<bool> {
        let universe = self.universe();

        if connection.kind == ConnectionKind::Array {
            let mut nodes = Vec::new();
            for target in connection.targets() {
                if target == NULL_TARGET {
                    nodes.push(AttrValue::Node(None));
                    continue;
                }
                match self.resolve_target(target) {
                    Some(node) => nodes.push(AttrValue::Node(Some(node))),
                    None => return Ok(false),
                }
            }
            universe.set(connection.source, &connection.attribute, AttrValue::Array(nodes))?;
            return Ok(true);
        }

        let target = connection.target.as_str();
        if connection.kind == ConnectionKind::Link && (target.is_empty() || target == NULL_TARGET) {
            universe.unlink(connection.source, &connection.attribute)?;
            return Ok(true);
        }

        let node = match self.resolve_target(target) {
            Some(node) => node,
            None if connection.kind == ConnectionKind::Ptr && self.is_dangling_prototype(target) => {
                self.create_prototype_node(target)?
            }
            None => return Ok(false),
        };

        match connection.kind {
            ConnectionKind::Link => match connection.output_component() {
                Some(component) => universe.link_output(
                    node,
                    Some(component.to_string().as_str()),
                    connection.source,
                    &connection.attribute,
                )?,
                None => universe.link(node, connection.source, &connection.attribute)?,
            },
            _ => universe.set(connection.source, &connection.attribute, AttrValue::Node(Some(node)))?,
        }
        Ok(true)
    }

    /// Node named `target`. While resolving dangling connections, a
    /// missing target prim is translated on the spot.
    fn resolve_target(&mut self, target: &str) -> Option<NodeHandle> {
        if let Some(node) = self.lookup_node(target) {
            return Some(node);
        }
        if self.read_step() != ReadStep::DanglingConnections {
            return None;
        }

        let prim = self.stage().prim_at_path(target)?;
        let session = self.session();
        let mut child = self.child(prim.find_primvars_with_inheritance());
        session.read_primitive(prim, &mut child, false);
        drop(child);
        self.lookup_node(target)
    }

    fn is_dangling_prototype(&self, target: &str) -> bool {
        self.read_step() == ReadStep::DanglingConnections
            && self.stage().prim_at_path(target).is_some_and(|prim| prim.is_prototype())
    }

    /// Hidden node translating the prototype at `path` from the same
    /// source as this read. Instances pointing at it make it visible.
    fn create_prototype_node(&mut self, path: &str) -> ReadResult<NodeHandle> {
        let node = self.create_node("usd", path)?;
        let universe = self.universe();
        let time = self.time();
        let source = self.session().source;

        universe.set(node, "filename", source.filename.as_str())?;
        universe.set(node, "object_path", path)?;
        universe.set(node, "frame", time.frame)?;
        universe.set(node, "motion_start", time.motion_start)?;
        universe.set(node, "motion_end", time.motion_end)?;
        if !source.overrides.is_empty() {
            let overrides = source.overrides.iter().map(|o| AttrValue::Str(o.clone())).collect();
            universe.set(node, "overrides", AttrValue::Array(overrides))?;
        }
        if source.cache_id != 0 {
            universe.set(node, "cache_id", AttrValue::Int(source.cache_id))?;
        }
        universe.set(node, "visibility", AttrValue::Byte(0))?;
        Ok(node)
    }
}

/// Resolve the connections `thread` queued while traversing. The ones
/// whose target is missing stay queued on the thread.
pub(crate) fn process_connections(session: &Session<'_>, thread: &mut ThreadContext) {
    let connections = thread.take_connections();
    let mut ctx = JobContext::new(session, ContextRef::Exclusive(&mut *thread), Arc::default());
    let dangling: Vec<Connection> = connections
        .into_iter()
        .filter(|connection| !ctx.process_connection(connection))
        .collect();
    drop(ctx);
    thread.set_connections(dangling);
}

/// Retry `dangling` connections one at a time, translating missing target
/// prims first. Nodes created for each connection are merged into the
/// session before the next one, so later connections can find them.
pub(crate) fn resolve_dangling(session: &Session<'_>, thread: &mut ThreadContext, dangling: Vec<Connection>) {
    for connection in dangling {
        let mut ctx = JobContext::new(session, ContextRef::Exclusive(&mut *thread), Arc::default());
        if ctx.lookup_node(&connection.target).is_none() {
            if let Some(prim) = session.stage.prim_at_path(&connection.target) {
                let mut child = ctx.child(prim.find_primvars_with_inheritance());
                session.read_primitive(prim, &mut child, false);
            }
        }
        if !ctx.process_connection(&connection) {
            log::debug!(
                "Connection {} -> {} has no target, dropped",
                connection.attribute,
                connection.target
            );
        }
        drop(ctx);
        session.merge(thread);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReaderConfig;
    use crate::phase::ReadPhase;
    use crate::registry::ReaderRegistry;
    use crate::session::ReadSource;
    use strata_render::Universe;
    use strata_scene::Stage;

    #[test]
    fn test_connections_follow_read_step() {
        let stage = Stage::from_string("#usda 1.0\ndef Sphere \"Ball\" {}\n").unwrap();
        let universe = Universe::new();
        let registry = ReaderRegistry::new();
        let phase = ReadPhase::new();
        let source = ReadSource::default();
        let session = Session::new(&stage, &universe, &registry, &phase, ReaderConfig::default(), None, &source);
        let mut thread = ThreadContext::new(session.time);

        let shape = universe.create_node("sphere", "shape", None).unwrap();
        let surface = universe.create_node("standard_surface", "surf", None).unwrap();

        phase.advance(ReadStep::Traverse).unwrap();
        let mut ctx = JobContext::new(&session, ContextRef::Exclusive(&mut thread), Arc::default());
        ctx.add_connection(Connection::new(shape, "shader", "surf", ConnectionKind::Ptr));
        ctx.add_connection(Connection::new(shape, "disp_map", "/Missing", ConnectionKind::Ptr));
        drop(ctx);
        assert_eq!(thread.connections().len(), 2);
        assert_eq!(universe.get(shape, "shader"), None);

        phase.advance(ReadStep::ProcessConnections).unwrap();
        process_connections(&session, &mut thread);
        assert_eq!(universe.get(shape, "shader"), Some(AttrValue::Node(Some(surface))));
        assert_eq!(thread.connections().len(), 1);

        // Ignored outside of traversal and dangling resolution
        let mut ctx = JobContext::new(&session, ContextRef::Exclusive(&mut thread), Arc::default());
        ctx.add_connection(Connection::new(surface, "base_color", "surf", ConnectionKind::Link));
        drop(ctx);
        assert_eq!(thread.connections().len(), 1);
        assert_eq!(universe.get_link(surface, "base_color"), None);

        phase.advance(ReadStep::DanglingConnections).unwrap();
        let other = universe.create_node("sphere", "other", None).unwrap();
        let mut ctx = JobContext::new(&session, ContextRef::Exclusive(&mut thread), Arc::default());
        ctx.add_connection(Connection::new(other, "shader", "surf NULL", ConnectionKind::Array));
        drop(ctx);
        assert_eq!(
            universe.get(other, "shader"),
            Some(AttrValue::Array(vec![AttrValue::Node(Some(surface)), AttrValue::Node(None)]))
        );
    }

    #[test]
    fn test_link_output_component() {
        let stage = Stage::from_string("#usda 1.0\n").unwrap();
        let universe = Universe::new();
        let registry = ReaderRegistry::new();
        let phase = ReadPhase::new();
        let source = ReadSource::default();
        let session = Session::new(&stage, &universe, &registry, &phase, ReaderConfig::default(), None, &source);
        let mut thread = ThreadContext::new(session.time);

        let image = universe.create_node("image", "/Tex", None).unwrap();
        let surface = universe.create_node("standard_surface", "/Surf", None).unwrap();

        let mut ctx = JobContext::new(&session, ContextRef::Exclusive(&mut thread), Arc::default());
        let link = Connection::new(surface, "base_color", "/Tex", ConnectionKind::Link);
        assert!(ctx.process_connection(&link.clone().with_output("outputs:r")));
        let applied = universe.get_link(surface, "base_color").unwrap();
        assert_eq!(applied.source, image);
        assert_eq!(applied.output.as_deref(), Some("r"));

        assert!(ctx.process_connection(&link.clone().with_output("outputs:rgb")));
        assert_eq!(universe.get_link(surface, "base_color").unwrap().output, None);

        let unlink = Connection::new(surface, "base_color", NULL_TARGET, ConnectionKind::Link);
        assert!(ctx.process_connection(&unlink));
        assert_eq!(universe.get_link(surface, "base_color"), None);

        // Targets are only translated on demand while resolving dangling connections
        assert!(!ctx.process_connection(&Connection::new(surface, "normal_camera", "/Nope", ConnectionKind::Link)));
    }
}
