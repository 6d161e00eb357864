//! Multithreaded translation of a scene stage into renderer nodes.
//!
//! A [`Reader`] walks a [`strata_scene::Stage`] and creates nodes in a
//! [`strata_render::Universe`]. Each prim type is converted by a
//! [`PrimReader`] looked up in a [`ReaderRegistry`]; references between
//! nodes are collected as [`Connection`]s and resolved once every node
//! exists.
//!
//! ```no_run
//! use std::sync::Arc;
//! use strata_render::Universe;
//! use strata_translator::Reader;
//!
//! let universe = Arc::new(Universe::new());
//! let mut reader = Reader::new(universe);
//! reader.set_thread_count(4);
//! reader.read_file("scene.usda", &[], None)?;
//! println!("{} nodes", reader.nodes().len());
//! # Ok::<(), strata_translator::ReadError>(())
//! ```

mod access;
pub mod config;
pub mod connection;
pub mod context;
pub mod error;
pub mod phase;
pub mod reader;
pub mod readers;
pub mod registry;
mod resolver;
mod session;
pub mod time;
pub mod transform;
mod walker;

pub use config::ReaderConfig;
pub use connection::{Connection, ConnectionKind, NULL_TARGET};
pub use context::{ContextRef, JobContext, ThreadContext};
pub use error::{ReadError, ReadResult};
pub use phase::{ReadPhase, ReadStep};
pub use reader::Reader;
pub use registry::{PrimReader, ReaderRegistry};
pub use session::{ReadSource, DEFAULT_SHADER, DEFAULT_SHADER_COLOR};
pub use time::TimeSettings;
pub use transform::is_transform_animated;
