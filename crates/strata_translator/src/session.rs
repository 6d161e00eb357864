//! Shared state of one read, borrowed by every thread taking part in it.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError, RwLock};

use strata_math::Vec3;
use strata_render::{ray, AttrValue, NodeHandle, NodeMask, Universe};
use strata_scene::{Prim, Stage};

use crate::config::ReaderConfig;
use crate::connection::{Connection, ConnectionKind};
use crate::context::{JobContext, ThreadContext};
use crate::error::ReadResult;
use crate::phase::ReadPhase;
use crate::registry::{PrimReader, ReaderRegistry};
use crate::time::TimeSettings;

pub const DEFAULT_SHADER: &str = "_default_arnold_shader";
pub const DEFAULT_SHADER_COLOR: &str = "_default_arnold_shader_color";

/// Where the stage being read came from. Prototype nodes created while
/// resolving instances point back at the same source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadSource {
    pub filename: String,
    /// In-memory layers stacked over the root layer
    pub overrides: Vec<String>,
    /// Stage cache id, 0 when the stage was not read from the cache
    pub cache_id: i64,
}

pub(crate) struct Session<'a> {
    pub stage: &'a Stage,
    pub universe: &'a Universe,
    pub registry: &'a ReaderRegistry,
    pub phase: &'a ReadPhase,
    pub config: ReaderConfig,
    pub time: TimeSettings,
    pub parent: Option<NodeHandle>,
    pub source: &'a ReadSource,
    nodes: Mutex<Vec<NodeHandle>>,
    node_names: RwLock<HashMap<String, NodeHandle>>,
    default_shader: Mutex<Option<NodeHandle>>,
}

impl<'a> Session<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        stage: &'a Stage,
        universe: &'a Universe,
        registry: &'a ReaderRegistry,
        phase: &'a ReadPhase,
        config: ReaderConfig,
        parent: Option<NodeHandle>,
        source: &'a ReadSource,
    ) -> Self {
        Self {
            stage,
            universe,
            registry,
            phase,
            time: config.time(),
            config,
            parent,
            source,
            nodes: Mutex::new(Vec::new()),
            node_names: RwLock::new(HashMap::new()),
            default_shader: Mutex::new(None),
        }
    }

    /// Find a node by alias or name. Nodes owned by another parent scope
    /// are never returned.
    pub fn lookup_node(&self, name: &str) -> Option<NodeHandle> {
        let alias = self
            .node_names
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .copied();
        if alias.is_some() {
            return alias;
        }

        let node = self.universe.lookup_node(name, self.parent)?;
        match self.universe.node_parent(node) {
            Ok(Some(owner)) if Some(owner) != self.parent => None,
            Ok(_) => Some(node),
            Err(_) => None,
        }
    }

    /// Move what a thread produced into the session.
    pub fn merge(&self, thread: &mut ThreadContext) {
        let nodes = thread.take_nodes();
        let names = thread.take_node_names();
        if !nodes.is_empty() {
            self.nodes.lock().unwrap_or_else(PoisonError::into_inner).extend(nodes);
        }
        if !names.is_empty() {
            self.node_names
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .extend(names);
        }
    }

    /// The shader assigned to shapes without a material, created on first
    /// request. It shows the `displayColor` primvar, white when absent.
    pub fn default_shader(&self) -> ReadResult<NodeHandle> {
        let mut shader = self.default_shader.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(node) = *shader {
            return Ok(node);
        }

        let surface = self.universe.create_node("standard_surface", DEFAULT_SHADER, self.parent)?;
        let color = self.universe.create_node("user_data_rgb", DEFAULT_SHADER_COLOR, self.parent)?;
        self.universe.set(color, "attribute", "displayColor")?;
        self.universe.set(color, "default", AttrValue::Rgb(Vec3::ONE))?;
        self.universe.link(color, surface, "base_color")?;

        self.nodes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend([surface, color]);
        *shader = Some(surface);
        Ok(surface)
    }

    /// Converter for `prim`, if its type has one and the mask allows it.
    pub fn prim_reader(&self, prim: &Prim<'a>) -> Option<&'a dyn PrimReader> {
        let reader = self.registry.reader(prim.type_name())?;
        if self.config.mask & reader.mask() == NodeMask::NONE {
            return None;
        }

        if self.config.debug {
            log::info!("Object {} (type: {})", prim.path(), prim.type_name());
        } else {
            log::debug!("Object {} (type: {})", prim.path(), prim.type_name());
        }
        Some(reader)
    }

    /// Create the proxy node of an instance. Its prototype is referenced
    /// through a connection, so it is only translated once it is needed.
    pub fn read_instance(&self, prim: Prim<'a>, ctx: &mut JobContext<'_, 'a>) -> ReadResult<()> {
        let Some(prototype) = prim.prototype() else {
            return Ok(());
        };

        let node = ctx.create_node("ginstance", prim.path())?;
        if prim.is_xformable() {
            ctx.read_matrix(&prim, node, true)?;
        }
        self.universe.set(node, "motion_start", self.time.motion_start)?;
        self.universe.set(node, "motion_end", self.time.motion_end)?;
        self.universe.set(node, "visibility", AttrValue::Byte(ray::ALL))?;
        self.universe.set(node, "inherit_xform", false)?;

        ctx.add_connection(Connection::new(node, "node", prototype.path(), ConnectionKind::Ptr));
        Ok(())
    }

    /// Translate one prim on the calling thread.
    pub fn read_primitive(&self, prim: Prim<'a>, ctx: &mut JobContext<'_, 'a>, is_instance: bool) {
        if is_instance {
            if let Err(err) = self.read_instance(prim, ctx) {
                log::error!("{}: {}", prim.path(), err);
            }
            return;
        }
        if let Some(reader) = self.prim_reader(&prim) {
            self.run_reader(reader, prim, ctx);
        }
    }

    /// Run a converter. A failure only loses this prim.
    pub fn run_reader(&self, reader: &dyn PrimReader, prim: Prim<'a>, ctx: &mut JobContext<'_, 'a>) {
        if let Err(err) = reader.read(prim, ctx) {
            log::error!("{}: {}", prim.path(), err);
        }
    }

    /// Created nodes, name aliases and default shader.
    pub fn into_parts(self) -> (Vec<NodeHandle>, HashMap<String, NodeHandle>, Option<NodeHandle>) {
        (
            self.nodes.into_inner().unwrap_or_else(PoisonError::into_inner),
            self.node_names.into_inner().unwrap_or_else(PoisonError::into_inner),
            self.default_shader.into_inner().unwrap_or_else(PoisonError::into_inner),
        )
    }
}
