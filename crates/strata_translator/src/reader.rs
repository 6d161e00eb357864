//! The public entry point: one [`Reader`] per import.
//!
//! A read runs in three passes over the stage:
//!
//! 1. **Traverse**: walkers visit the hierarchy and convert prims. Node to
//!    node references are queued as [`Connection`]s.
//! 2. **Process connections**: each thread resolves what it queued, now
//!    that every node of the first pass exists.
//! 3. **Dangling connections**: references to prims that were never
//!    converted (pruned, or prototypes) are retried on one thread, which
//!    converts the missing targets first.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use strata_render::{NodeHandle, NodeMask, Universe};
use strata_scene::{Layer, Prim, Stage, StageCache, Value};

use crate::config::ReaderConfig;
use crate::connection::Connection;
use crate::context::ThreadContext;
use crate::error::{ReadError, ReadResult};
use crate::phase::{ReadPhase, ReadStep};
use crate::registry::ReaderRegistry;
use crate::resolver::{process_connections, resolve_dangling};
use crate::session::{ReadSource, Session};
use crate::time::TimeSettings;
use crate::walker::{walk, Dispatch};

/// Counter naming the anonymous override layers of every reader.
static OVERRIDE_LAYER_COUNT: AtomicUsize = AtomicUsize::new(0);

/// Categories a translation nested under a parent node may produce.
const NESTED_MASK: NodeMask = NodeMask(
    NodeMask::CAMERA.0 | NodeMask::LIGHT.0 | NodeMask::SHAPE.0 | NodeMask::SHADER.0 | NodeMask::OPERATOR.0,
);

/// Translates a stage into nodes of a [`Universe`].
///
/// The nodes created by the last read stay listed until
/// [`Reader::clear_nodes`] is called; reading again before that does
/// nothing.
pub struct Reader {
    config: ReaderConfig,
    universe: Arc<Universe>,
    parent: Option<NodeHandle>,
    registry: Option<Arc<ReaderRegistry>>,
    nodes: Vec<NodeHandle>,
    node_names: HashMap<String, NodeHandle>,
    default_shader: Option<NodeHandle>,
    phase: ReadPhase,
}

impl Reader {
    pub fn new(universe: Arc<Universe>) -> Self {
        Self::with_config(universe, ReaderConfig::default())
    }

    pub fn with_config(universe: Arc<Universe>, config: ReaderConfig) -> Self {
        Self {
            config,
            universe,
            parent: None,
            registry: None,
            nodes: Vec::new(),
            node_names: HashMap::new(),
            default_shader: None,
            phase: ReadPhase::new(),
        }
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn time(&self) -> TimeSettings {
        self.config.time()
    }

    pub fn universe(&self) -> &Arc<Universe> {
        &self.universe
    }

    pub fn parent(&self) -> Option<NodeHandle> {
        self.parent
    }

    pub fn read_step(&self) -> ReadStep {
        self.phase.get()
    }

    /// Nodes created by the last read, in creation order per thread.
    pub fn nodes(&self) -> &[NodeHandle] {
        &self.nodes
    }

    /// Prim paths of nodes renamed with `arnold:name`.
    pub fn node_names(&self) -> &HashMap<String, NodeHandle> {
        &self.node_names
    }

    pub fn default_shader(&self) -> Option<NodeHandle> {
        self.default_shader
    }

    /// Find a node of the last read by alias, or by name in the reader's
    /// scope.
    pub fn lookup_node(&self, name: &str) -> Option<NodeHandle> {
        if let Some(node) = self.node_names.get(name) {
            return Some(*node);
        }
        let node = self.universe.lookup_node(name, self.parent)?;
        match self.universe.node_parent(node) {
            Ok(owner) if owner == self.parent || owner.is_none() => Some(node),
            _ => None,
        }
    }

    pub fn set_frame(&mut self, frame: f32) {
        self.clear_nodes();
        self.config.frame = frame;
    }

    /// Shutter relative to the frame. Reads without a parent replace it
    /// with the render camera's shutter when the stage names one.
    pub fn set_motion_blur(&mut self, motion_blur: bool, motion_start: f32, motion_end: f32) {
        self.clear_nodes();
        self.config.motion_blur = motion_blur;
        self.config.motion_start = motion_start;
        self.config.motion_end = motion_end;
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.config.debug = debug;
    }

    pub fn set_thread_count(&mut self, thread_count: usize) {
        self.config.thread_count = thread_count;
    }

    pub fn set_convert_primitives(&mut self, convert_primitives: bool) {
        self.clear_nodes();
        self.config.convert_primitives = convert_primitives;
    }

    pub fn set_mask(&mut self, mask: NodeMask) {
        self.config.mask = mask;
    }

    pub fn set_purpose(&mut self, purpose: impl Into<String>) {
        self.config.purpose = purpose.into();
    }

    pub fn set_id(&mut self, id: u32) {
        self.config.id = id;
    }

    /// Translate under `parent`: nodes are created in its scope and are
    /// owned by it.
    pub fn set_parent(&mut self, parent: Option<NodeHandle>) {
        self.clear_nodes();
        self.parent = parent;
    }

    /// Ignored when a parent is set, since the parent's universe is the
    /// only valid one.
    pub fn set_universe(&mut self, universe: Arc<Universe>) {
        if Arc::ptr_eq(&self.universe, &universe) {
            return;
        }
        if self.parent.is_some() {
            log::error!("Cannot change the universe of a reader with a parent node");
            return;
        }
        self.clear_nodes();
        self.universe = universe;
    }

    /// Converters to use instead of the process-wide registry.
    pub fn set_registry(&mut self, registry: Option<Arc<ReaderRegistry>>) {
        self.registry = registry;
    }

    /// Forget the nodes of the last read. They are destroyed only when
    /// the reader owns them, i.e. without a parent.
    pub fn clear_nodes(&mut self) {
        if self.parent.is_none() {
            for node in self.nodes.drain(..) {
                if let Err(err) = self.universe.destroy_node(node) {
                    log::debug!("Node already destroyed: {}", err);
                }
            }
        }
        self.nodes.clear();
        self.node_names.clear();
        self.default_shader = None;
    }

    /// Read the USDA file at `path` with `overrides` layered over it.
    ///
    /// Each non-empty override is the text of a layer, stronger than the
    /// file and than the overrides after it. The file may be missing when
    /// there are overrides.
    ///
    /// Like [`Reader::read_stage`], this may replace the motion blur
    /// settings with the render camera's shutter.
    pub fn read_file(&mut self, path: impl AsRef<Path>, overrides: &[String], root: Option<&str>) -> ReadResult<()> {
        let path = path.as_ref();
        let overrides: Vec<String> = overrides.iter().filter(|o| !o.is_empty()).cloned().collect();

        let mut layers = Vec::with_capacity(overrides.len() + 1);
        for content in &overrides {
            let identifier = format!(
                "anonymous__override__{}.usda",
                OVERRIDE_LAYER_COUNT.fetch_add(1, Ordering::Relaxed)
            );
            match Layer::from_string(identifier.as_str(), content) {
                Ok(layer) => layers.push(layer),
                Err(err) => log::warn!("Cannot parse override layer {}: {}", identifier, err),
            }
        }

        match Layer::open(path) {
            Ok(layer) => layers.push(layer),
            Err(err) if !layers.is_empty() => {
                log::warn!("Cannot open {}, reading the overrides only: {}", path.display(), err);
            }
            Err(err) => {
                log::error!("Unable to create stage from {}: {}", path.display(), err);
                return Err(err.into());
            }
        }

        let stage = Stage::from_layers(layers).map_err(|err| {
            log::error!("Unable to create stage from {}: {}", path.display(), err);
            ReadError::from(err)
        })?;

        let source = ReadSource {
            filename: path.display().to_string(),
            overrides,
            cache_id: 0,
        };
        self.read(&stage, root, &source)
    }

    /// Read a stage registered in the process-wide [`StageCache`]. The
    /// shutter is discovered as in [`Reader::read_stage`].
    pub fn read_cached(&mut self, cache_id: i64, root: Option<&str>) -> ReadResult<()> {
        let stage = StageCache::global().find(cache_id).map_err(|err| {
            log::error!("Unable to find stage {} in the cache: {}", cache_id, err);
            ReadError::from(err)
        })?;

        let source = ReadSource {
            cache_id,
            ..Default::default()
        };
        self.read(&stage, root, &source)
    }

    /// Read an already composed stage, optionally only the subtree at
    /// `root`.
    ///
    /// Without a parent, when `/options` names a render camera
    /// (`arnold:camera`), the motion window becomes the camera's
    /// `shutter:open`/`shutter:close`, with motion blur on only when close
    /// is past open. This overrides [`Reader::set_motion_blur`] and stays
    /// in [`Reader::config`] after the read.
    pub fn read_stage(&mut self, stage: &Stage, root: Option<&str>) -> ReadResult<()> {
        self.read(stage, root, &ReadSource::default())
    }

    fn read(&mut self, stage: &Stage, root: Option<&str>, source: &ReadSource) -> ReadResult<()> {
        if !self.nodes.is_empty() {
            log::debug!("Stage already read, clear the nodes to read again");
            return Ok(());
        }

        if self.config.debug {
            match self.parent.and_then(|p| self.universe.node_name(p).ok()) {
                Some(parent) => log::warn!("==== Initializing reader for procedural {}", parent),
                None => log::warn!("==== Initializing reader"),
            }
        }

        let root_prim = match root.filter(|path| !path.is_empty()) {
            None => stage.pseudo_root(),
            Some(path) => match stage.prim_at_path(path) {
                None => {
                    log::error!("Object path {} is not valid", path);
                    return Err(ReadError::InvalidRootPath(path.to_string()));
                }
                Some(prim) if !prim.is_active() => {
                    log::warn!("Object path primitive {} is not active", path);
                    return Err(ReadError::InactiveRootPath(path.to_string()));
                }
                Some(prim) => prim,
            },
        };

        if self.parent.is_none() {
            self.read_render_camera_shutter(stage);
        }

        let mut config = self.config.clone();
        if self.parent.is_some() {
            config.mask &= NESTED_MASK;
        }
        let thread_count = config.thread_count;
        let pool = if thread_count > 1 {
            Some(ThreadPoolBuilder::new().num_threads(thread_count).build()?)
        } else {
            None
        };

        let universe = Arc::clone(&self.universe);
        let registry = self.registry.clone();
        let registry = registry.as_deref().unwrap_or_else(|| ReaderRegistry::global());

        self.phase.reset();
        let session = Session::new(stage, &universe, registry, &self.phase, config, self.parent, source);

        self.phase.advance(ReadStep::Traverse)?;
        let mut threads = traverse(&session, root_prim, pool.as_ref());
        for thread in &mut threads {
            session.merge(thread);
        }

        self.phase.advance(ReadStep::ProcessConnections)?;
        match &pool {
            Some(pool) => pool.install(|| {
                threads
                    .par_iter_mut()
                    .for_each(|thread| process_connections(&session, thread))
            }),
            None => threads
                .iter_mut()
                .for_each(|thread| process_connections(&session, thread)),
        }

        self.phase.advance(ReadStep::DanglingConnections)?;
        let dangling: Vec<Connection> = threads.iter_mut().flat_map(|t| t.take_connections()).collect();
        if !dangling.is_empty() {
            if let Some(first) = threads.first_mut() {
                resolve_dangling(&session, first, dangling);
            }
        }
        for thread in &mut threads {
            session.merge(thread);
        }
        drop(threads);

        self.phase.advance(ReadStep::Finished)?;
        let (nodes, node_names, default_shader) = session.into_parts();
        log::debug!("Read {} nodes", nodes.len());

        self.nodes = nodes;
        self.node_names = node_names;
        self.default_shader = default_shader;
        Ok(())
    }

    /// Take the motion window from the shutter of the render camera
    /// named on `/options`.
    fn read_render_camera_shutter(&mut self, stage: &Stage) {
        let Some(options) = stage.prim_at_path("/options") else {
            return;
        };
        let frame = self.config.frame as f64;
        let camera = ["arnold:camera", "camera"]
            .into_iter()
            .find(|name| options.attribute(name).is_some())
            .and_then(|name| match options.get(name, frame) {
                Some(Value::String(path)) if !path.is_empty() => Some(path),
                _ => None,
            })
            .and_then(|path| stage.prim_at_path(&path));
        let Some(camera) = camera else {
            return;
        };

        let shutter = |name: &str| camera.get(name, frame).and_then(|v| v.as_float()).unwrap_or(0.0) as f32;
        let (open, close) = (shutter("shutter:open"), shutter("shutter:close"));
        self.config.motion_blur = close > open;
        self.config.motion_start = open;
        self.config.motion_end = close;
    }
}

impl std::fmt::Debug for Reader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader")
            .field("config", &self.config)
            .field("parent", &self.parent)
            .field("nodes", &self.nodes.len())
            .field("step", &self.phase.get())
            .finish()
    }
}

/// First pass. Returns the context of every walker, in walker order.
fn traverse<'a>(session: &Session<'a>, root: Prim<'a>, pool: Option<&ThreadPool>) -> Vec<ThreadContext> {
    let time = session.time;
    match (pool, session.config.thread_count) {
        (Some(pool), _) => {
            let count = pool.current_num_threads();
            let slots: Vec<Mutex<ThreadContext>> = (0..count).map(|_| Mutex::new(ThreadContext::new(time))).collect();
            pool.broadcast(|ctx| {
                if let Some(slot) = slots.get(ctx.index()) {
                    let mut thread = slot.lock().unwrap_or_else(PoisonError::into_inner);
                    walk(session, root, ctx.index(), count, Dispatch::Inline(&mut *thread));
                }
            });
            slots
                .into_iter()
                .map(|slot| slot.into_inner().unwrap_or_else(PoisonError::into_inner))
                .collect()
        }
        (None, 0) => {
            let thread = ThreadContext::new(time);
            rayon::scope(|scope| {
                walk(session, root, 0, 1, Dispatch::Spawn { scope, thread: &thread });
            });
            vec![thread]
        }
        (None, _) => {
            let mut thread = ThreadContext::new(time);
            walk(session, root, 0, 1, Dispatch::Inline(&mut thread));
            vec![thread]
        }
    }
}
