//! Per-thread and per-job translation state.
//!
//! A [`ThreadContext`] collects what one walker thread produces: nodes,
//! node name aliases, queued connections and transform caches. Converters
//! never see it directly; they get a [`JobContext`] wrapping it together
//! with the data prepared for their prim.

use std::collections::HashMap;
use std::sync::Arc;

use strata_math::Mat4;
use strata_render::{AttrValue, NodeCategory, NodeHandle, Universe};
use strata_scene::{Prim, Primvar, Stage, XformCache};

use crate::access::Guarded;
use crate::config::ReaderConfig;
use crate::connection::Connection;
use crate::error::ReadResult;
use crate::phase::ReadStep;
use crate::session::Session;
use crate::time::TimeSettings;

/// Transform caches of one thread, keyed by frame.
///
/// The current frame uses the main cache. Other frames, only requested
/// when sampling motion, get their own cache on first use and keep it
/// until the thread context goes away.
#[derive(Debug)]
pub struct XformCachePool {
    time: TimeSettings,
    main: XformCache,
    off_frame: HashMap<u32, XformCache>,
}

impl XformCachePool {
    pub fn new(time: TimeSettings) -> Self {
        Self {
            time,
            main: XformCache::new(time.frame as f64),
            off_frame: HashMap::new(),
        }
    }

    /// Cache evaluating transforms at `frame`.
    pub fn cache(&mut self, frame: f32) -> &mut XformCache {
        if !self.time.motion_blur || frame == self.time.frame {
            return &mut self.main;
        }
        self.off_frame
            .entry(frame.to_bits())
            .or_insert_with(|| XformCache::new(frame as f64))
    }

    /// Number of caches, the main one included.
    #[cfg(test)]
    fn cache_count(&self) -> usize {
        1 + self.off_frame.len()
    }
}

/// State owned by one walker thread for the duration of a read.
#[derive(Debug)]
pub struct ThreadContext {
    nodes: Guarded<Vec<NodeHandle>>,
    node_names: Guarded<HashMap<String, NodeHandle>>,
    connections: Guarded<Vec<Connection>>,
    xforms: Guarded<XformCachePool>,
}

impl ThreadContext {
    pub fn new(time: TimeSettings) -> Self {
        Self {
            nodes: Guarded::default(),
            node_names: Guarded::default(),
            connections: Guarded::default(),
            xforms: Guarded::new(XformCachePool::new(time)),
        }
    }

    pub fn take_nodes(&mut self) -> Vec<NodeHandle> {
        std::mem::take(self.nodes.get_mut())
    }

    pub fn take_node_names(&mut self) -> HashMap<String, NodeHandle> {
        std::mem::take(self.node_names.get_mut())
    }

    pub fn take_connections(&mut self) -> Vec<Connection> {
        std::mem::take(self.connections.get_mut())
    }

    pub fn set_connections(&mut self, connections: Vec<Connection>) {
        *self.connections.get_mut() = connections;
    }

    pub fn connections(&mut self) -> &[Connection] {
        self.connections.get_mut()
    }
}

/// How a job reaches its thread context: exclusively from the thread
/// that owns it, or shared with the other jobs that thread spawned.
pub enum ContextRef<'c> {
    Exclusive(&'c mut ThreadContext),
    Shared(&'c ThreadContext),
}

impl ContextRef<'_> {
    pub fn reborrow(&mut self) -> ContextRef<'_> {
        match self {
            ContextRef::Exclusive(thread) => ContextRef::Exclusive(&mut **thread),
            ContextRef::Shared(thread) => ContextRef::Shared(&**thread),
        }
    }

    fn with<T, R>(
        &mut self,
        field: fn(&ThreadContext) -> &Guarded<T>,
        field_mut: fn(&mut ThreadContext) -> &mut Guarded<T>,
        f: impl FnOnce(&mut T) -> R,
    ) -> R {
        match self {
            ContextRef::Exclusive(thread) => field_mut(&mut **thread).with_mut(f),
            ContextRef::Shared(thread) => field(&**thread).with(f),
        }
    }

    pub fn push_node(&mut self, node: NodeHandle) {
        self.with(|t| &t.nodes, |t| &mut t.nodes, |nodes| nodes.push(node));
    }

    pub fn add_node_name(&mut self, name: &str, node: NodeHandle) {
        self.with(
            |t| &t.node_names,
            |t| &mut t.node_names,
            |names| names.insert(name.to_string(), node),
        );
    }

    pub fn lookup_name(&mut self, name: &str) -> Option<NodeHandle> {
        self.with(|t| &t.node_names, |t| &mut t.node_names, |names| names.get(name).copied())
    }

    pub fn push_connection(&mut self, connection: Connection) {
        self.with(
            |t| &t.connections,
            |t| &mut t.connections,
            |connections| connections.push(connection),
        );
    }

    pub fn with_xform_cache<R>(&mut self, frame: f32, f: impl FnOnce(&mut XformCache) -> R) -> R {
        self.with(|t| &t.xforms, |t| &mut t.xforms, |pool| f(pool.cache(frame)))
    }
}

/// What a converter gets to translate one prim.
///
/// Holds the thread context the prim is read on, the inherited primvars
/// at the prim's place in the hierarchy and, for jobs run off the walker
/// thread, the prim's precomputed world matrices.
pub struct JobContext<'c, 'a> {
    session: &'c Session<'a>,
    thread: ContextRef<'c>,
    matrices: Option<Vec<Mat4>>,
    primvars: Arc<Vec<Primvar<'a>>>,
}

impl<'c, 'a> JobContext<'c, 'a> {
    pub(crate) fn new(session: &'c Session<'a>, thread: ContextRef<'c>, primvars: Arc<Vec<Primvar<'a>>>) -> Self {
        Self {
            session,
            thread,
            matrices: None,
            primvars,
        }
    }

    pub(crate) fn with_matrices(mut self, matrices: Vec<Mat4>) -> Self {
        self.matrices = Some(matrices);
        self
    }

    pub(crate) fn session(&self) -> &'c Session<'a> {
        self.session
    }

    /// Context on the same thread for reading another prim.
    pub(crate) fn child(&mut self, primvars: Vec<Primvar<'a>>) -> JobContext<'_, 'a> {
        JobContext::new(self.session, self.thread.reborrow(), Arc::new(primvars))
    }

    pub(crate) fn precomputed_matrices(&self) -> Option<&[Mat4]> {
        self.matrices.as_deref()
    }

    pub fn stage(&self) -> &'a Stage {
        self.session.stage
    }

    pub fn universe(&self) -> &'a Universe {
        self.session.universe
    }

    pub fn time(&self) -> TimeSettings {
        self.session.time
    }

    pub fn config(&self) -> &'c ReaderConfig {
        &self.session.config
    }

    /// Node all created nodes are scoped to.
    pub fn parent(&self) -> Option<NodeHandle> {
        self.session.parent
    }

    pub fn read_step(&self) -> ReadStep {
        self.session.phase.get()
    }

    /// Inherited primvars at this prim's level of the hierarchy.
    pub fn primvars(&self) -> &[Primvar<'a>] {
        &self.primvars
    }

    /// Create a node owned by this read. Shapes created under a parent
    /// node are stamped with the reader id.
    pub fn create_node(&mut self, node_type: &str, name: &str) -> ReadResult<NodeHandle> {
        let session = self.session;
        let node = session.universe.create_node(node_type, name, session.parent)?;
        if session.parent.is_some() && session.universe.node_category(node)? == NodeCategory::Shape {
            session.universe.set(node, "id", AttrValue::Int(session.config.id as i64))?;
        }
        self.thread.push_node(node);
        Ok(node)
    }

    /// Make `node` reachable under `name` (usually the prim path of a
    /// renamed node) when resolving connections.
    pub fn add_node_name(&mut self, name: &str, node: NodeHandle) {
        self.thread.add_node_name(name, node);
    }

    /// Record a reference to another node. Queued while traversing,
    /// applied immediately while resolving dangling connections, ignored
    /// otherwise.
    pub fn add_connection(&mut self, connection: Connection) {
        match self.read_step() {
            ReadStep::Traverse => self.thread.push_connection(connection),
            ReadStep::DanglingConnections => {
                self.process_connection(&connection);
            }
            step => log::debug!(
                "Ignoring connection {} -> {} during {:?}",
                connection.attribute,
                connection.target,
                step
            ),
        }
    }

    /// Find a node by alias or name, aliases registered on this thread
    /// first.
    pub fn lookup_node(&mut self, name: &str) -> Option<NodeHandle> {
        self.thread.lookup_name(name).or_else(|| self.session.lookup_node(name))
    }

    /// Shader assigned to shapes without a material.
    pub fn default_shader(&self) -> ReadResult<NodeHandle> {
        self.session.default_shader()
    }

    /// Whether `prim` is visible at `frame`. Only computed while resolving
    /// dangling connections: prims reached during traversal are visible,
    /// hidden ones were pruned.
    pub fn prim_visibility(&self, prim: &Prim<'_>, frame: f32) -> bool {
        if self.read_step() == ReadStep::DanglingConnections && prim.is_imageable() {
            return prim.compute_visibility(frame as f64);
        }
        true
    }

    pub fn with_xform_cache<R>(&mut self, frame: f32, f: impl FnOnce(&mut XformCache) -> R) -> R {
        self.thread.with_xform_cache(frame, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_main_cache_without_motion_blur() {
        let mut pool = XformCachePool::new(TimeSettings::default());
        assert_eq!(pool.cache(5.0).time(), 1.0);
        assert_eq!(pool.cache_count(), 1);
    }

    #[test]
    fn test_off_frame_caches_are_kept() {
        let time = TimeSettings {
            frame: 10.0,
            motion_blur: true,
            motion_start: -0.5,
            motion_end: 0.5,
        };
        let mut pool = XformCachePool::new(time);

        assert_eq!(pool.cache(10.0).time(), 10.0);
        assert_eq!(pool.cache(9.5).time(), 9.5);
        assert_eq!(pool.cache(10.5).time(), 10.5);
        assert_eq!(pool.cache(9.5).time(), 9.5);
        assert_eq!(pool.cache_count(), 3);
    }

    #[test]
    fn test_context_ref_modes() {
        let universe = Universe::new();
        let node = universe.create_node("sphere", "/Ball", None).unwrap();

        let mut thread = ThreadContext::new(TimeSettings::default());
        ContextRef::Exclusive(&mut thread).push_node(node);
        ContextRef::Shared(&thread).add_node_name("/Alias", node);

        assert_eq!(thread.take_nodes(), vec![node]);
        assert_eq!(thread.take_node_names().get("/Alias"), Some(&node));
        assert!(thread.take_nodes().is_empty());
    }
}
